//! Diesel table definitions, hand-written to match `migrations/`. Money
//! columns are stored as `Text` and parsed through `rust_decimal::Decimal`
//! at the model boundary (`models.rs`) — SQLite has no native decimal type
//! and diesel's `Numeric` sql type does not bridge to `rust_decimal`.

diesel::table! {
    assets (id) {
        id -> Text,
        user_id -> Text,
        name -> Text,
        classification -> Text,
        status -> Text,
        symbol -> Nullable<Text>,
        venue_code -> Nullable<Text>,
        purchase_price -> Text,
        purchase_date -> Date,
        quantity -> Text,
        currency -> Nullable<Text>,
        current_price -> Nullable<Text>,
        bond_settings_json -> Nullable<Text>,
        quote_mode -> Text,
        closed_at -> Nullable<Timestamp>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    ohlcv_bars (id) {
        id -> Integer,
        symbol -> Text,
        venue_code -> Text,
        timestamp -> Timestamp,
        interval -> Text,
        open -> Text,
        high -> Text,
        low -> Text,
        close -> Text,
        volume -> Text,
        quote_currency -> Text,
    }
}

diesel::table! {
    instrument_directory (symbol, venue_code) {
        symbol -> Text,
        venue_code -> Text,
        display_venue -> Text,
        name -> Text,
        country -> Nullable<Text>,
        quote_currency -> Text,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    fx_rates (source_ccy, target_ccy) {
        source_ccy -> Text,
        target_ccy -> Text,
        rate -> Text,
        fetched_at -> Timestamp,
    }
}

diesel::table! {
    statistics (id) {
        id -> Integer,
        user_id -> Text,
        date -> Timestamp,
        total_portfolio_value_usd -> Text,
        distribution_by_class_json -> Text,
    }
}
