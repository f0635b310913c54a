use indexmap::IndexMap;
use serde::Serialize;
use std::time::Duration;

/// Interval used when `refresh` is absent or given without a value.
pub const DEFAULT_REFRESH_SECONDS: u64 = 60;

/// Page query parameters: key to optional value, in the order they appeared.
pub type QueryParams = IndexMap<String, Option<String>>;

/// Polling policy derived once from the page parameters.
///
/// An interval of zero disables polling entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RefreshConfig {
    pub interval_millis: u64,
    pub is_static: bool,
}

impl RefreshConfig {
    /// Parses a raw query string such as `?static&refresh=5`.
    pub fn from_query(query: &str) -> Self {
        Self::from_params(&parse_query(query))
    }

    /// Applies the refresh rules to already-split parameters.
    ///
    /// - `static` present (any value): no polling
    /// - `refresh` absent or bare: 60 seconds
    /// - `refresh=`: no polling
    /// - `refresh=NN`: NN seconds; anything that is not a non-negative number counts as 0
    pub fn from_params(params: &QueryParams) -> Self {
        if params.contains_key("static") {
            return Self {
                interval_millis: 0,
                is_static: true,
            };
        }

        let interval_millis = match params.get("refresh") {
            None | Some(None) => DEFAULT_REFRESH_SECONDS * 1000,
            Some(Some(value)) => seconds_to_millis(value),
        };

        Self {
            interval_millis,
            is_static: false,
        }
    }

    pub fn is_polling(&self) -> bool {
        self.interval_millis > 0
    }

    pub fn interval(&self) -> Option<Duration> {
        self.is_polling()
            .then(|| Duration::from_millis(self.interval_millis))
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self::from_params(&QueryParams::new())
    }
}

/// Splits `a&b=1&c=` into `{a: None, b: Some("1"), c: Some("")}`.
///
/// Only the first `=` separates key from value. A repeated key keeps its last value.
pub fn parse_query(query: &str) -> QueryParams {
    query
        .trim_start_matches('?')
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (key.to_string(), Some(value.to_string())),
            None => (pair.to_string(), None),
        })
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

// Empty, non-numeric and negative values all coerce to zero.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn seconds_to_millis(value: &str) -> u64 {
    match value.trim().parse::<f64>() {
        Ok(seconds) if seconds.is_finite() && seconds > 0.0 => (seconds * 1000.0).round() as u64,
        _ => 0,
    }
}
