use serde::Deserialize;

/// How a parameter's `{pattern}` is applied to a request segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamMatch {
    /// The pattern must match the whole segment.
    #[default]
    Segment,
    /// The pattern only needs to occur somewhere in the segment
    /// (`[0-9]+` accepts `"ab3cd"`). Kept for compatibility with route
    /// tables written against unanchored matching.
    Substring,
}

/// Route registration and matching settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub param_match: ParamMatch,
}

/// Settings for the tower adapter that feeds transport requests into an app.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Request header carrying the API version, e.g. `accept-version: v1.2`.
    pub version_header: String,
    /// Deadline for one full dispatch in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            version_header: "accept-version".to_string(),
            request_timeout_ms: 30_000,
        }
    }
}
