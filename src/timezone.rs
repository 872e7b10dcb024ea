//! Validation of the IANA timezone names stored on user profiles.

/// Check whether `canonical_timezone` names a known timezone, e.g. "Pacific/Auckland".
pub fn is_valid_timezone(canonical_timezone: &str) -> bool {
    time_tz::timezones::get_by_name(canonical_timezone).is_some()
}
