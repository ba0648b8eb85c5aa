//! Centralized validation and helper functions.

use chrono::NaiveDate;

use crate::config::Settings;

/// Maximum number of values accepted for a single property of an example
/// entity (DOS protection)
pub const MAX_PROPERTY_VALUES: usize = 100;

/// Maximum length of a single property value in an example entity
pub const MAX_VALUE_LENGTH: usize = 4096;

/// Clamp a requested page window against the configured bounds.
///
/// The limit falls back to `default` when absent, is capped at `max_page`,
/// and the offset is capped at `max_offset`. The combined window never
/// extends past `max_results`, the deepest result the backend will page to.
///
/// # Examples
///
/// ```
/// use entity_matcher::config::Settings;
/// use entity_matcher::utils::validation::limit_window;
///
/// let settings = Settings::default();
/// assert_eq!(limit_window(&settings, Some(20), Some(0), 10), (20, 0));
/// assert_eq!(limit_window(&settings, None, None, 10), (10, 0));
/// assert_eq!(limit_window(&settings, Some(100_000), Some(0), 10).0, settings.max_page);
/// ```
#[must_use]
pub fn limit_window(
    settings: &Settings,
    limit: Option<usize>,
    offset: Option<usize>,
    default: usize,
) -> (usize, usize) {
    let limit = limit.unwrap_or(default).min(settings.max_page);
    let offset = offset.unwrap_or(0).min(settings.max_offset);
    let limit = if offset + limit > settings.max_results {
        settings.max_results.saturating_sub(offset)
    } else {
        limit
    };
    (limit, offset)
}

/// Normalize a date value to a (possibly partial) ISO 8601 date.
///
/// Accepts `YYYY`, `YYYY-MM`, `YYYY-MM-DD` and longer timestamps, which are
/// truncated to the day. Returns None if the value is not a valid date prefix.
///
/// # Examples
///
/// ```
/// use entity_matcher::utils::validation::normalize_date;
///
/// assert_eq!(normalize_date("1975-04-21"), Some("1975-04-21".to_string()));
/// assert_eq!(normalize_date("1975-04-21T10:00:00"), Some("1975-04-21".to_string()));
/// assert_eq!(normalize_date("1975"), Some("1975".to_string()));
/// assert_eq!(normalize_date("21/04/1975"), None);
/// assert_eq!(normalize_date("1975-04-21garbage"), None);
/// ```
#[must_use]
pub fn normalize_date(value: &str) -> Option<String> {
    let value = value.trim();
    if !value.is_ascii() {
        return None;
    }
    if value.len() >= 10 {
        let day = &value[..10];
        if value.len() > 10 && !matches!(value.as_bytes()[10], b'T' | b' ') {
            return None;
        }
        return NaiveDate::parse_from_str(day, "%Y-%m-%d")
            .ok()
            .map(|_| day.to_string());
    }
    if value.len() == 7 {
        return NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d")
            .ok()
            .map(|_| value.to_string());
    }
    if value.len() == 4 && value.chars().all(|c| c.is_ascii_digit()) {
        return Some(value.to_string());
    }
    None
}

/// Normalize a country code to lowercase.
///
/// Accepts ISO 3166-1 alpha-2 codes, optionally followed by a subdivision
/// suffix (`gb-sct`), and four-letter historic codes (`suhh`, `csxx`).
///
/// # Examples
///
/// ```
/// use entity_matcher::utils::validation::normalize_country;
///
/// assert_eq!(normalize_country("US"), Some("us".to_string()));
/// assert_eq!(normalize_country("gb-sct"), Some("gb-sct".to_string()));
/// assert_eq!(normalize_country("United States"), None);
/// ```
#[must_use]
pub fn normalize_country(value: &str) -> Option<String> {
    let code = value.trim().to_lowercase();
    let letters = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_lowercase());
    let valid = match code.split_once('-') {
        Some((base, sub)) => {
            base.len() == 2 && letters(base) && (2..=3).contains(&sub.len()) && letters(sub)
        }
        None => (code.len() == 2 || code.len() == 4) && letters(&code),
    };
    valid.then_some(code)
}

/// Normalize an identifier (registration number, passport number, IMO...)
/// for comparison: uppercase, alphanumerics only.
#[must_use]
pub fn normalize_identifier(value: &str) -> String {
    value
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Validate an entity id as received in a URL path.
///
/// Ids are opaque, but must be non-empty, bounded in length and free of
/// whitespace and control characters.
#[must_use]
pub fn is_valid_entity_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 255
        && !id.chars().any(|c| c.is_whitespace() || c.is_control())
}
