#[cfg(feature = "openai-compat")]
pub(crate) mod http;
pub mod partial_json;
#[cfg(feature = "openai-compat")]
pub(crate) mod sse;
pub(crate) mod stream_lifecycle;

/// Trim trailing slashes and a trailing `/v1` so adapters can append their own path.
pub fn normalize_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    trimmed
        .strip_suffix("/v1")
        .unwrap_or(trimmed)
        .to_string()
}
