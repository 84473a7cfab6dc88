//! Caller identity - who a request is counted against.

use actix_web::HttpRequest;
use actix_web::http::header::HeaderName;

fn header<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Client IP: first `X-Forwarded-For` entry, then `X-Real-IP`, then the peer address.
pub fn client_ip(req: &HttpRequest) -> String {
    if let Some(first) = header(req, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first.to_string();
    }

    if let Some(real_ip) = header(req, "x-real-ip") {
        return real_ip.to_string();
    }

    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// API token from `header_name`, if present and non-empty.
pub fn api_token(req: &HttpRequest, header_name: &HeaderName) -> Option<String> {
    header(req, header_name.as_str()).map(str::to_string)
}
