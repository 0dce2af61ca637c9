//! End-to-end verification against in-process proxies and a mocked geolocation service

mod common;

use common::{
    checker_config, echo_body, geo_server, refused_addr, spawn_socks_proxy, SocksBehavior,
};
use proxy_probe::{ProxyChecker, ProxyTarget, ProxyType, VerificationResult};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn socks5_proxy_is_verified_and_geolocated() {
    let geo = geo_server(
        "198.51.100.7",
        json!({"status": "success", "country": "Testland", "city": "Testville"}),
    )
    .await;
    let (addr, mut sessions) =
        spawn_socks_proxy(SocksBehavior::Echo(echo_body("198.51.100.7"))).await;

    let checker = ProxyChecker::with_config(checker_config(&geo)).unwrap();
    let target = ProxyTarget::new("127.0.0.1", addr.port(), ProxyType::Socks5);
    let result = checker.verify(&target).await;

    assert!(result.working);
    assert!(result.response_time_millis > 0);
    assert_eq!(result.egress_ip.as_deref(), Some("198.51.100.7"));
    assert_eq!(result.country, "Testland");
    let geo_record = result.geo.unwrap();
    assert_eq!(geo_record.country, "Testland");
    assert_eq!(geo_record.city, "Testville");
    assert_eq!(geo_record.isp, "Unknown");

    let session = sessions.recv().await.unwrap();
    assert_eq!(session.version, 5);
    assert_eq!(
        session.http_request,
        b"GET /ip HTTP/1.1\r\nHost: httpbin.org\r\n\r\n".to_vec()
    );
}

#[tokio::test]
async fn socks4_proxy_uses_first_chained_origin() {
    let geo = geo_server("203.0.113.5", json!({"status": "success", "country": "Testland"})).await;
    let (addr, mut sessions) =
        spawn_socks_proxy(SocksBehavior::Echo(echo_body("203.0.113.5, 10.0.0.1"))).await;

    let checker = ProxyChecker::with_config(checker_config(&geo)).unwrap();
    let target = ProxyTarget::new("127.0.0.1", addr.port(), ProxyType::Socks4);
    let result = checker.verify(&target).await;

    assert!(result.working);
    assert_eq!(result.egress_ip.as_deref(), Some("203.0.113.5"));
    assert_eq!(sessions.recv().await.unwrap().version, 4);
}

#[tokio::test]
async fn rejected_socks_connect_is_canonical_failure() {
    let geo = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&geo)
        .await;
    let (addr, _sessions) = spawn_socks_proxy(SocksBehavior::Reject).await;

    let checker = ProxyChecker::with_config(checker_config(&geo)).unwrap();
    for protocol in [ProxyType::Socks4, ProxyType::Socks5] {
        let target = ProxyTarget::new("127.0.0.1", addr.port(), protocol);
        assert_eq!(checker.verify(&target).await, VerificationResult::not_working());
    }
}

#[tokio::test]
async fn socks_proxy_answering_with_error_page_fails() {
    let geo = MockServer::start().await;
    let raw = "HTTP/1.1 403 Forbidden\r\nContent-Length: 9\r\n\r\nForbidden".to_string();
    let (addr, _sessions) = spawn_socks_proxy(SocksBehavior::Raw(raw)).await;

    let checker = ProxyChecker::with_config(checker_config(&geo)).unwrap();
    let target = ProxyTarget::new("127.0.0.1", addr.port(), ProxyType::Socks5);
    assert_eq!(checker.verify(&target).await, VerificationResult::not_working());
}

#[tokio::test]
async fn socks_proxy_with_non_ip_origin_fails() {
    let geo = MockServer::start().await;
    let (addr, _sessions) =
        spawn_socks_proxy(SocksBehavior::Echo(echo_body("proxy error"))).await;

    let checker = ProxyChecker::with_config(checker_config(&geo)).unwrap();
    let target = ProxyTarget::new("127.0.0.1", addr.port(), ProxyType::Socks5);
    assert_eq!(checker.verify(&target).await, VerificationResult::not_working());
}

#[tokio::test]
async fn refused_proxies_are_canonical_failures() {
    let geo = MockServer::start().await;
    let checker = ProxyChecker::with_config(checker_config(&geo)).unwrap();
    let addr = refused_addr();

    for protocol in [
        ProxyType::Http,
        ProxyType::Https,
        ProxyType::Socks4,
        ProxyType::Socks5,
    ] {
        let target = ProxyTarget::new("127.0.0.1", addr.port(), protocol);
        assert_eq!(checker.verify(&target).await, VerificationResult::not_working());
    }
}

#[tokio::test]
async fn http_proxy_is_verified_through_forward_request() {
    let geo = geo_server("203.0.113.5", json!({"status": "success", "country": "Testland"})).await;

    // the mock server plays the forward proxy and receives the absolute-form request
    let proxy = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ip"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"origin": "203.0.113.5, 10.0.0.1"})),
        )
        .expect(1)
        .mount(&proxy)
        .await;

    let config = checker_config(&geo).with_test_url("http://echo.test/ip".to_string());
    let checker = ProxyChecker::with_config(config).unwrap();
    let port = proxy.address().port();

    let result = checker
        .verify(&ProxyTarget::new("127.0.0.1", port, ProxyType::Http))
        .await;

    assert!(result.working);
    assert!(result.response_time_millis > 0);
    assert_eq!(result.egress_ip.as_deref(), Some("203.0.113.5"));
    assert_eq!(result.country, "Testland");
}

#[tokio::test]
async fn http_proxy_error_status_fails() {
    let geo = MockServer::start().await;
    let proxy = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&proxy)
        .await;

    let config = checker_config(&geo).with_test_url("http://echo.test/ip".to_string());
    let checker = ProxyChecker::with_config(config).unwrap();
    let target = ProxyTarget::new("127.0.0.1", proxy.address().port(), ProxyType::Https);

    assert_eq!(checker.verify(&target).await, VerificationResult::not_working());
}

#[tokio::test]
async fn slow_http_proxy_times_out() {
    let geo = MockServer::start().await;
    let proxy = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"origin": "203.0.113.5"}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&proxy)
        .await;

    let config = checker_config(&geo)
        .with_test_url("http://echo.test/ip".to_string())
        .with_timeout(Duration::from_millis(300));
    let checker = ProxyChecker::with_config(config).unwrap();
    let target = ProxyTarget::new("127.0.0.1", proxy.address().port(), ProxyType::Http);

    let err = checker.probe(&target).await.unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(checker.verify(&target).await, VerificationResult::not_working());
}

#[tokio::test]
async fn failed_geolocation_still_reports_working_proxy() {
    let geo = geo_server("198.51.100.7", json!({"status": "fail", "message": "private range"})).await;
    let (addr, _sessions) =
        spawn_socks_proxy(SocksBehavior::Echo(echo_body("198.51.100.7"))).await;

    let checker = ProxyChecker::with_config(checker_config(&geo)).unwrap();
    let target = ProxyTarget::new("127.0.0.1", addr.port(), ProxyType::Socks5);
    let result = checker.verify(&target).await;

    assert!(result.working);
    assert_eq!(result.country, "Unknown");
    assert!(result.geo.unwrap().is_unknown());
}

#[tokio::test]
async fn verify_all_keeps_input_order() {
    let geo = geo_server("198.51.100.7", json!({"status": "success", "country": "Testland"})).await;
    let (addr, _sessions) =
        spawn_socks_proxy(SocksBehavior::Echo(echo_body("198.51.100.7"))).await;
    let dead = refused_addr();

    let checker = ProxyChecker::with_config(checker_config(&geo)).unwrap();
    let results = checker
        .verify_all(&[
            ProxyTarget::new("127.0.0.1", dead.port(), ProxyType::Socks5),
            ProxyTarget::new("127.0.0.1", addr.port(), ProxyType::Socks5),
        ])
        .await;

    assert_eq!(results.len(), 2);
    assert!(!results[0].working);
    assert!(results[1].working);
}

#[tokio::test]
async fn verify_all_with_bounded_concurrency_checks_every_target() {
    let geo = geo_server("198.51.100.7", json!({"status": "success", "country": "Testland"})).await;
    let (addr, mut sessions) =
        spawn_socks_proxy(SocksBehavior::Echo(echo_body("198.51.100.7"))).await;
    let dead = refused_addr();

    let checker = ProxyChecker::with_config(checker_config(&geo).with_concurrency(2)).unwrap();
    let targets: Vec<_> = (0..5)
        .map(|i| match i % 2 {
            0 => ProxyTarget::new("127.0.0.1", addr.port(), ProxyType::Socks5),
            _ => ProxyTarget::new("127.0.0.1", dead.port(), ProxyType::Socks4),
        })
        .collect();

    let results = checker.verify_all(&targets).await;

    let working: Vec<bool> = results.iter().map(|r| r.working).collect();
    assert_eq!(working, vec![true, false, true, false, true]);
    for _ in 0..3 {
        assert_eq!(sessions.recv().await.unwrap().version, 5);
    }
}
