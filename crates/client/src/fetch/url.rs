//! URL resolution for manifest entries and origin-form request targets.

/// Error type for URL resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Resolve `input` against `base` into an absolute, fetchable URL.
///
/// 1. Trim leading/trailing whitespace
/// 2. Absolute inputs are parsed as-is; anything else is joined onto `base`
/// 3. Only http and https are accepted
/// 4. The fragment is removed; the query string is kept untouched
pub fn resolve(base: &url::Url, input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = match url::Url::parse(trimmed) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            base.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?
        }
        Err(e) => return Err(UrlError::InvalidUrl(format!("{trimmed}: {e}"))),
    };

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if !parsed.has_host() {
        return Err(UrlError::InvalidUrl(format!("{trimmed}: missing host")));
    }

    parsed.set_fragment(None);

    Ok(parsed)
}
