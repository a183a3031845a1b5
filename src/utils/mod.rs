//! Utility functions and helpers.

pub mod http;
pub mod log;

use url::Url;

/// Join `path` under `base` and append the query parameters in order.
pub fn endpoint_url(
    base: &Url,
    path: &str,
    params: &[(&str, &str)],
) -> Result<Url, url::ParseError> {
    let mut url = base.join(path.trim_start_matches('/'))?;
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params.iter().copied());
    }
    Ok(url)
}
