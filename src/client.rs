//! Client Context
//!
//! Explicit request metadata passed into every operation instead of ambient
//! request state: the services never touch the HTTP layer directly.

use axum::http::HeaderMap;

/// Where a request came from
///
/// Built once per request at the HTTP boundary and threaded through the auth
/// backend and token service as a plain parameter.
#[derive(Debug, Clone, Default)]
pub struct ClientContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientContext {
    pub fn new(ip_address: Option<String>, user_agent: Option<String>) -> Self {
        Self { ip_address, user_agent }
    }

    /// Build context from request headers
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let user_agent = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        Self {
            ip_address: extract_client_ip(headers),
            user_agent,
        }
    }

    /// The user agent, or empty string for logging/storage
    pub fn user_agent_str(&self) -> &str {
        self.user_agent.as_deref().unwrap_or("")
    }

    /// "{device} - {browser}" summary for the token ledger
    pub fn device_summary(&self) -> String {
        device_summary(self.user_agent_str())
    }
}

/// Extract client IP from proxy headers
///
/// Checks (in order): X-Forwarded-For (first hop), X-Real-IP
pub fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(xff) = headers.get("x-forwarded-for") {
        if let Ok(s) = xff.to_str() {
            if let Some(first_ip) = s.split(',').next() {
                let trimmed = first_ip.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
    }

    if let Some(xri) = headers.get("x-real-ip") {
        if let Ok(s) = xri.to_str() {
            let trimmed = s.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }

    None
}

/// Summarize a user-agent string as "{device} - {browser}"
///
/// Pure substring classification. Empty/missing user agent yields "Unknown".
/// Browser checks run firefox, chrome, safari, edge in that order, so an
/// Edge user agent (which also advertises Chrome) classifies as Chrome.
pub fn device_summary(user_agent: &str) -> String {
    if user_agent.is_empty() {
        return "Unknown".to_string();
    }

    let ua = user_agent.to_lowercase();

    let device = if ua.contains("mobile") || ua.contains("android") {
        "Mobile"
    } else if ua.contains("tablet") || ua.contains("ipad") {
        "Tablet"
    } else {
        "Desktop"
    };

    let browser = if ua.contains("firefox") {
        "Firefox"
    } else if ua.contains("chrome") || ua.contains("crios") {
        "Chrome"
    } else if ua.contains("safari") {
        "Safari"
    } else if ua.contains("edge") || ua.contains("edg") {
        "Edge"
    } else {
        "Other"
    };

    format!("{} - {}", device, browser)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_device_summary_empty_is_unknown() {
        assert_eq!(device_summary(""), "Unknown");
    }

    #[test]
    fn test_device_summary_classification() {
        let cases = [
            (
                "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0",
                "Desktop - Firefox",
            ),
            (
                "Mozilla/5.0 (Linux; Android 14) AppleWebKit/537.36 Chrome/126.0 Mobile Safari/537.36",
                "Mobile - Chrome",
            ),
            (
                "Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X) AppleWebKit/605.1.15 Safari/604.1",
                "Tablet - Safari",
            ),
            ("curl/8.5.0", "Desktop - Other"),
        ];

        for (ua, expected) in cases {
            assert_eq!(device_summary(ua), expected, "for UA {}", ua);
        }
    }

    #[test]
    fn test_edge_ua_classifies_as_chrome() {
        // Edge advertises Chrome too; the chrome check runs first.
        let ua = "Mozilla/5.0 (Windows NT 10.0) AppleWebKit/537.36 Chrome/126.0 Safari/537.36 Edg/126.0";
        assert_eq!(device_summary(ua), "Desktop - Chrome");
    }

    #[test]
    fn test_extract_ip_forwarded_for_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1, 10.0.0.2"),
        );
        assert_eq!(extract_client_ip(&headers).as_deref(), Some("203.0.113.9"));
    }

    #[test]
    fn test_extract_ip_real_ip_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.7"));
        assert_eq!(extract_client_ip(&headers).as_deref(), Some("198.51.100.7"));
    }

    #[test]
    fn test_extract_ip_absent() {
        assert_eq!(extract_client_ip(&HeaderMap::new()), None);
    }

    #[test]
    fn test_context_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::USER_AGENT,
            HeaderValue::from_static("Mozilla/5.0 Firefox/128.0"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.7"));

        let ctx = ClientContext::from_headers(&headers);
        assert_eq!(ctx.ip_address.as_deref(), Some("198.51.100.7"));
        assert_eq!(ctx.device_summary(), "Desktop - Firefox");
    }

    #[test]
    fn test_default_context_is_unknown_device() {
        let ctx = ClientContext::default();
        assert_eq!(ctx.device_summary(), "Unknown");
        assert_eq!(ctx.user_agent_str(), "");
    }
}
