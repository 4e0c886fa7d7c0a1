//! Endpoint joining for catalog base URLs.

/// Joins a base endpoint and a path with exactly one slash between them.
///
/// Catalog endpoints are stored without a version segment, and users may
/// paste them with a trailing slash, so both sides are trimmed first.
///
/// ```
/// use supercharge::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("https://api.groq.com/openai/", "v1/chat/completions"),
///     "https://api.groq.com/openai/v1/chat/completions"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let endpoint = endpoint.trim_start_matches('/');
    format!("{base}/{endpoint}")
}
