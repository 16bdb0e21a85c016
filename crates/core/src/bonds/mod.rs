//! Bond Accrual Engine (C2): a pure, deterministic event walk computing a
//! bond's carrying value at any target date.
//!
//! Grounded on `original_source/backend/assets/bonds/update_bonds_prices.py::calculate_bond_value`
//! (same step schedule, same 365-day convention, same flat-tail rule), ported
//! to a typed event walk over `rust_decimal::Decimal` and `chrono::NaiveDate`.
//! This is the most delicate arithmetic in the pipeline (spec §4.2) — it
//! determines the carrying value of an entire asset class.

use rust_decimal::Decimal;
use std::cmp::min;

use crate::domain::BondSettings;
use crate::errors::{CoreError, Result};
use crate::time_utils::{add_months, calendar_days, full_months};
use chrono::NaiveDate;

const DAYS_PER_YEAR: i64 = 365;

/// `bond_value(P0, settings, t_target) -> value` (spec §4.2).
pub fn bond_value(
    p0: Decimal,
    settings: &BondSettings,
    purchase_date: NaiveDate,
    t_target: NaiveDate,
) -> Result<Decimal> {
    let horizon = min(t_target, settings.maturity_date);
    if horizon < purchase_date {
        return Err(CoreError::BadBondRange {
            purchase: purchase_date,
            target: t_target,
        });
    }

    let mut clock = purchase_date;
    let mut principal = p0;
    let mut accrued = Decimal::ZERO;

    while clock < horizon {
        let period_index =
            full_months(purchase_date, clock) / settings.rate_reset_frequency_months as i64 + 1;
        let rate_annual = rate_for_period(settings, period_index);

        let next_reset = add_months(clock, settings.rate_reset_frequency_months as i64);
        let next_capitalization = match (
            settings.capitalization_of_interest,
            settings.capitalization_frequency_months,
        ) {
            (true, Some(freq)) => add_months(clock, freq as i64),
            _ => settings.maturity_date,
        };

        let event = [next_reset, next_capitalization, horizon, settings.maturity_date]
            .into_iter()
            .min()
            .unwrap();

        let days = calendar_days(clock, event);
        let daily_rate = rate_annual / Decimal::from(DAYS_PER_YEAR);
        accrued += principal * daily_rate * Decimal::from(days);

        if settings.capitalization_of_interest
            && settings.capitalization_frequency_months.is_some()
            && event == next_capitalization
        {
            principal += accrued;
            accrued = Decimal::ZERO;
        }

        clock = event;
    }

    Ok(principal + accrued)
}

/// Rate for a reset period, applying the flat-tail rule: indices beyond the
/// last defined key use the last defined rate indefinitely.
fn rate_for_period(settings: &BondSettings, period_index: i64) -> Decimal {
    if let Some(entry) = settings.interest_rates.get(&period_index.to_string()) {
        return entry.rate_percent / Decimal::from(100);
    }
    let last_key = settings
        .interest_rates
        .keys()
        .filter_map(|k| k.parse::<i64>().ok())
        .max();
    match last_key {
        Some(k) => {
            let entry = &settings.interest_rates[&k.to_string()];
            entry.rate_percent / Decimal::from(100)
        }
        None => Decimal::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn settings(
        cap: bool,
        cap_freq: Option<u32>,
        reset_freq: u32,
        rates: &[(&str, Decimal)],
        maturity: NaiveDate,
    ) -> BondSettings {
        let mut interest_rates = HashMap::new();
        for (k, v) in rates {
            interest_rates.insert(
                k.to_string(),
                crate::domain::asset::BondRateEntry { rate_percent: *v },
            );
        }
        BondSettings {
            capitalization_of_interest: cap,
            capitalization_frequency_months: cap_freq,
            rate_reset_frequency_months: reset_freq,
            interest_rates,
            maturity_date: maturity,
        }
    }

    #[test]
    fn at_purchase_date_returns_principal() {
        let maturity = NaiveDate::from_ymd_opt(2029, 11, 17).unwrap();
        let purchase = NaiveDate::from_ymd_opt(2024, 11, 17).unwrap();
        let s = settings(true, Some(12), 12, &[("1", dec!(4.5))], maturity);
        let v = bond_value(dec!(1000), &s, purchase, purchase).unwrap();
        assert_eq!(v, dec!(1000));
    }

    #[test]
    fn capitalization_example_from_spec() {
        // P0=1000, 4.5% year 1, 2% thereafter, annual reset+capitalization.
        let maturity = NaiveDate::from_ymd_opt(2029, 11, 17).unwrap();
        let purchase = NaiveDate::from_ymd_opt(2024, 11, 17).unwrap();
        let s = settings(
            true,
            Some(12),
            12,
            &[("1", dec!(4.5)), ("2", dec!(2))],
            maturity,
        );

        let one_year = NaiveDate::from_ymd_opt(2025, 11, 17).unwrap();
        let v1 = bond_value(dec!(1000), &s, purchase, one_year).unwrap();
        assert!((v1 - dec!(1045.00)).abs() <= dec!(0.02));

        let two_year = NaiveDate::from_ymd_opt(2026, 11, 17).unwrap();
        let v2 = bond_value(dec!(1000), &s, purchase, two_year).unwrap();
        assert!((v2 - dec!(1065.90)).abs() <= dec!(0.05));
    }

    #[test]
    fn flat_tail_uses_last_defined_rate() {
        let maturity = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        let purchase = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let s = settings(false, None, 12, &[("1", dec!(3.0))], maturity);
        // period index 5 has no entry; must fall back to period 1's rate.
        let target = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let v = bond_value(dec!(1000), &s, purchase, target).unwrap();
        // 5 years of simple (non-capitalizing) 3% interest, 365-day convention.
        assert!((v - dec!(1150)).abs() < dec!(0.5));
    }

    #[test]
    fn target_before_purchase_errors() {
        let maturity = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        let purchase = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let s = settings(false, None, 12, &[("1", dec!(3.0))], maturity);
        let before = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        assert!(matches!(
            bond_value(dec!(1000), &s, purchase, before),
            Err(CoreError::BadBondRange { .. })
        ));
    }

    #[test]
    fn target_beyond_maturity_clamps_to_maturity() {
        let maturity = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let purchase = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let s = settings(false, None, 12, &[("1", dec!(5.0))], maturity);
        let far_future = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        let at_maturity = bond_value(dec!(1000), &s, purchase, maturity).unwrap();
        let beyond = bond_value(dec!(1000), &s, purchase, far_future).unwrap();
        assert_eq!(at_maturity, beyond);
    }

    #[test]
    fn no_capitalization_accrues_simple_interest_to_maturity() {
        let maturity = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let purchase = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let s = settings(false, None, 12, &[("1", dec!(10.0))], maturity);
        let v = bond_value(dec!(1000), &s, purchase, maturity).unwrap();
        // 366 days (2024 is a leap year) at 10%/365 daily simple rate.
        let expected = dec!(1000) + dec!(1000) * dec!(0.10) / dec!(365) * dec!(366);
        assert!((v - expected).abs() < dec!(0.01));
    }
}
