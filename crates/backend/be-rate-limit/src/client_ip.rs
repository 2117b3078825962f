use axum::http::HeaderMap;

/// Bucket shared by every request that carries no identifying header.
pub const UNKNOWN_CLIENT: &str = "unknown";

const IP_HEADERS: &[&str] = &["x-forwarded-for", "x-real-ip", "cf-connecting-ip"];

/// Resolves the rate-limit key for a request.
///
/// Headers are consulted in order; for `X-Forwarded-For` only the first hop is used.
pub fn client_id_from_headers(headers: &HeaderMap) -> String {
    IP_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name).and_then(|v| v.to_str().ok()))
        .filter_map(|value| value.split(',').next().map(str::trim))
        .find(|ip| !ip.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}
