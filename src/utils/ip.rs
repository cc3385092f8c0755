//! 客户端 IP 提取
//!
//! 优先级：CF-Connecting-IP → X-Forwarded-For 第一个 → X-Real-IP → 连接地址。
//! 只用于事件记录，不做可信代理校验。

use std::net::SocketAddr;

use actix_web::HttpRequest;
use actix_web::http::header::HeaderMap;

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// 从请求头提取转发的 IP
pub fn extract_forwarded_ip_from_headers(headers: &HeaderMap) -> Option<String> {
    header_value(headers, "cf-connecting-ip")
        .or_else(|| {
            // 取第一个，即原始客户端 IP
            header_value(headers, "x-forwarded-for")
                .and_then(|s| s.split(',').next().map(|s| s.trim().to_string()))
                .filter(|s| !s.is_empty())
        })
        .or_else(|| header_value(headers, "x-real-ip"))
}

/// 请求头优先，最后回退到连接地址（去掉端口）
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    extract_forwarded_ip_from_headers(headers).or_else(|| peer.map(|addr| addr.ip().to_string()))
}

/// 从 HttpRequest 提取客户端 IP
pub fn extract_client_ip(req: &HttpRequest) -> Option<String> {
    resolve_client_ip(req.headers(), req.peer_addr())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header::{HeaderName, HeaderValue};

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }
        map
    }

    #[test]
    fn test_cf_connecting_ip_wins() {
        let map = headers(&[
            ("cf-connecting-ip", "1.1.1.1"),
            ("x-forwarded-for", "2.2.2.2, 10.0.0.1"),
            ("x-real-ip", "3.3.3.3"),
        ]);
        assert_eq!(resolve_client_ip(&map, None).as_deref(), Some("1.1.1.1"));
    }

    #[test]
    fn test_forwarded_for_first_entry() {
        let map = headers(&[("x-forwarded-for", "2.2.2.2, 10.0.0.1"), ("x-real-ip", "3.3.3.3")]);
        assert_eq!(resolve_client_ip(&map, None).as_deref(), Some("2.2.2.2"));
    }

    #[test]
    fn test_real_ip_then_peer() {
        let map = headers(&[("x-real-ip", "3.3.3.3")]);
        assert_eq!(resolve_client_ip(&map, None).as_deref(), Some("3.3.3.3"));

        let peer: SocketAddr = "192.168.1.5:51234".parse().unwrap();
        assert_eq!(
            resolve_client_ip(&HeaderMap::new(), Some(peer)).as_deref(),
            Some("192.168.1.5")
        );
        assert_eq!(resolve_client_ip(&HeaderMap::new(), None), None);
    }
}
