//! Request inspection helpers for access logs.

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::{header::USER_AGENT, Extensions, HeaderMap};
use woothee::parser::Parser;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Peer address recorded by the connection service.
pub fn peer_addr(extensions: &Extensions) -> Option<SocketAddr> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Remote host for logging: `X-Forwarded-For` when a relay set it, else the peer address.
pub fn remote_host(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(forwarded) = headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        return forwarded.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Short "Browser N, OS V" description of the client for access logs.
pub fn describe_user_agent(headers: &HeaderMap) -> String {
    let Some(agent) = headers.get(USER_AGENT).and_then(|v| v.to_str().ok()) else {
        return "unknown user agent".to_string();
    };
    let parsed = Parser::new().parse(agent);

    let browser = parsed
        .as_ref()
        .filter(|ua| known(ua.name) && known(ua.version))
        .map(|ua| {
            let major = ua.version.split('.').next().unwrap_or(ua.version);
            format!("{} {}", ua.name, major)
        })
        .unwrap_or_else(|| "unknown browser".to_string());

    let system = parsed
        .as_ref()
        .filter(|ua| known(ua.os) && known(&ua.os_version))
        .map(|ua| format!("{} {}", ua.os, ua.os_version))
        .unwrap_or_else(|| "unknown OS".to_string());

    format!("{browser}, {system}")
}

fn known(field: &str) -> bool {
    !field.is_empty() && field != "UNKNOWN"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("203.0.113.7"));
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        assert_eq!(remote_host(&headers, Some(peer)), "203.0.113.7");
    }

    #[test]
    fn falls_back_to_peer() {
        let peer: SocketAddr = "192.168.1.20:5000".parse().unwrap();
        assert_eq!(remote_host(&HeaderMap::new(), Some(peer)), "192.168.1.20");
        assert_eq!(remote_host(&HeaderMap::new(), None), "unknown");
    }

    #[test]
    fn user_agent_defaults() {
        assert_eq!(describe_user_agent(&HeaderMap::new()), "unknown user agent");
    }

    #[test]
    fn user_agent_is_summarised() {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/120.0.6099.109 Safari/537.36",
            ),
        );
        let summary = describe_user_agent(&headers);
        assert!(summary.starts_with("Chrome 120, "), "{summary}");
        assert!(summary.contains("Windows"), "{summary}");
        assert!(!summary.contains("6099"), "{summary}");
    }

    #[test]
    fn unrecognised_user_agent() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("xyzzy"));
        assert_eq!(describe_user_agent(&headers), "unknown browser, unknown OS");
    }
}
