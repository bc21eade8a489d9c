//! Unit conversion and derived ad metrics.
//!
//! The reporting API returns earnings as micros already denominated in the
//! account's currency, so one local unit is 1,000 micros.

/// Micros per local currency unit
pub const MICROS_PER_UNIT: f64 = 1_000.0;

/// Convert raw micros into local currency
pub fn micros_to_local(micros: f64) -> f64 {
    if micros.is_finite() {
        micros / MICROS_PER_UNIT
    } else {
        0.0
    }
}

/// Round to two decimals for display
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Click-through rate in percent
pub fn ctr(clicks: u64, impressions: u64) -> f64 {
    if impressions == 0 {
        return 0.0;
    }
    clicks as f64 / impressions as f64 * 100.0
}

/// Earnings per thousand impressions
pub fn cpm(earnings: f64, impressions: u64) -> f64 {
    if impressions == 0 {
        return 0.0;
    }
    earnings / impressions as f64 * 1_000.0
}

/// Earnings per thousand page views
pub fn rpm(earnings: f64, page_views: u64) -> f64 {
    if page_views == 0 {
        return 0.0;
    }
    earnings / page_views as f64 * 1_000.0
}
