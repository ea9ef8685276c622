// End-to-end lookups through the orchestrator with scripted renders
mod common;

use common::{BASE_URL, ScriptedDriver, pad, service_with};
use library_holdings::{LookupQuery, RenderError, ResultSource, ServiceError};

const ISBN: &str = "9788966262281";

#[tokio::test]
async fn held_and_available_item() {
    let text = pad("held items 1 loan available central library 005.133", 900);
    let (service, driver) = service_with(ScriptedDriver::text(text));

    let response = service.check_holding(&LookupQuery::isbn(ISBN)).await.unwrap();

    assert!(!response.cached);
    assert_eq!(response.source, ResultSource::Render);
    let result = &response.result;
    assert!(result.is_found());
    assert!(result.is_available());
    assert_eq!(result.location(), "central library");
    assert_eq!(result.call_number(), "005.133");
    assert_eq!(result.error_message(), "");
    assert_eq!(result.detail_url(), format!("{BASE_URL}#/total/{ISBN}"));
    assert_eq!(driver.calls(), 1);
}

#[tokio::test]
async fn no_results_is_confident_negative() {
    let (service, driver) = service_with(ScriptedDriver::text(pad("no results found", 900)));

    let response = service.check_holding(&LookupQuery::isbn(ISBN)).await.unwrap();
    assert!(!response.result.is_found());
    assert!(!response.result.is_available());
    assert_eq!(response.result.error_message(), "");

    // confident negatives are cached
    let again = service.check_holding(&LookupQuery::isbn(ISBN)).await.unwrap();
    assert!(again.cached);
    assert_eq!(driver.calls(), 1);
}

#[tokio::test]
async fn render_timeout_degrades_to_error_result() {
    let url = format!("{BASE_URL}#/total/{ISBN}");
    let (service, driver) = service_with(ScriptedDriver::failing(RenderError::NavigationTimeout {
        url: url.clone(),
        timeout_ms: 25_000,
    }));

    let response = service.check_holding(&LookupQuery::isbn(ISBN)).await.unwrap();
    let result = &response.result;
    assert!(!result.is_found());
    assert!(result.error_message().starts_with("render failed: navigation timed out"));
    assert_eq!(result.detail_url(), url);

    // failures are not cached, so the next call renders again
    let again = service.check_holding(&LookupQuery::isbn(ISBN)).await.unwrap();
    assert!(!again.cached);
    assert_eq!(driver.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn second_call_is_served_from_cache() {
    let text = pad("held items 1 loan available central library 005.133", 900);
    let (service, driver) = service_with(ScriptedDriver::text(text));

    let first = service.check_holding(&LookupQuery::isbn(ISBN)).await.unwrap();
    let second = service.check_holding(&LookupQuery::isbn(ISBN)).await.unwrap();

    assert!(second.cached);
    assert_eq!(second.source, ResultSource::Cache);
    assert_eq!(second.result, first.result);
    // sub-millisecond: the hit never waits on a timer or the render path
    assert_eq!(second.response_time_ms, 0);
    assert_eq!(driver.calls(), 1);
}

#[tokio::test]
async fn hyphenated_identifier_shares_cache_slot() {
    let (service, driver) = service_with(ScriptedDriver::text(pad("held items 2", 900)));

    service.check_holding(&LookupQuery::isbn(ISBN)).await.unwrap();
    let response = service
        .check_holding(&LookupQuery::isbn("978-89-6626-228-1"))
        .await
        .unwrap();

    assert!(response.cached);
    assert_eq!(driver.calls(), 1);
}

#[tokio::test]
async fn missing_input_is_invalid_argument() {
    let (service, driver) = service_with(ScriptedDriver::text(pad("held items 1", 900)));

    let err = service.check_holding(&LookupQuery::default()).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidArgument(_)));

    let blank = LookupQuery {
        isbn: Some("--".to_string()),
        title: Some("   ".to_string()),
    };
    assert!(service.check_holding(&blank).await.is_err());
    assert_eq!(driver.calls(), 0);
}

#[tokio::test]
async fn short_render_is_load_failure_and_not_cached() {
    let (service, driver) = service_with(ScriptedDriver::text("loading..."));

    let response = service.check_holding(&LookupQuery::isbn(ISBN)).await.unwrap();
    assert!(!response.result.is_found());
    assert_eq!(response.result.error_message(), "page load failed");

    service.check_holding(&LookupQuery::isbn(ISBN)).await.unwrap();
    assert_eq!(driver.calls(), 2);

    let stats = service.stats().await;
    assert_eq!(stats.stats.load_failures, 2);
    assert_eq!(stats.cache.size, 0);
}

#[tokio::test]
async fn title_lookup_uses_trimmed_title() {
    let (service, _driver) = service_with(ScriptedDriver::text(pad("소장자료 1 대출중 제2자료실 813.6", 900)));

    let response = service
        .check_holding(&LookupQuery::title("  채식주의자 "))
        .await
        .unwrap();
    let result = &response.result;
    assert!(result.is_found());
    assert!(!result.is_available());
    assert_eq!(result.location(), "제2자료실");
    assert_eq!(result.call_number(), "813.6");
    assert_eq!(result.detail_url(), format!("{BASE_URL}#/total/채식주의자"));
}

#[tokio::test]
async fn clear_cache_reports_evictions() {
    let (service, driver) = service_with(ScriptedDriver::text(pad("held items 1", 900)));

    service.check_holding(&LookupQuery::isbn("1111")).await.unwrap();
    service.check_holding(&LookupQuery::isbn("2222")).await.unwrap();

    let cleared = service.clear_cache().await;
    assert_eq!(cleared.evicted_count, 2);

    let response = service.check_holding(&LookupQuery::isbn("1111")).await.unwrap();
    assert!(!response.cached);
    assert_eq!(driver.calls(), 3);
}

#[tokio::test]
async fn shutdown_rejects_new_renders() {
    let (service, driver) = service_with(ScriptedDriver::text(pad("held items 1", 900)));

    service.shutdown().await;
    let response = service.check_holding(&LookupQuery::isbn(ISBN)).await.unwrap();

    assert!(!response.result.is_found());
    assert!(response.result.error_message().starts_with("render failed:"));
    assert_eq!(driver.calls(), 0);
}

#[tokio::test]
async fn stats_count_hits_and_renders() {
    let (service, _driver) = service_with(ScriptedDriver::text(pad("held items 1", 900)));

    for _ in 0..4 {
        service.check_holding(&LookupQuery::isbn(ISBN)).await.unwrap();
    }

    let snapshot = service.stats().await;
    assert_eq!(snapshot.stats.total_requests, 4);
    assert_eq!(snapshot.stats.cache_hits, 3);
    assert_eq!(snapshot.stats.renders, 1);
    assert_eq!(snapshot.stats.cache_hit_rate_percent, 75.0);
    assert_eq!(snapshot.cache.size, 1);
    assert_eq!(snapshot.cache.max_entries, 5000);
    assert_eq!(snapshot.cache.ttl_seconds, 1800);
    assert_eq!(snapshot.gate.capacity, 3);
    assert_eq!(snapshot.gate.in_use, 0);
}

#[test]
fn health_is_static() {
    let (service, _driver) = service_with(ScriptedDriver::text(""));
    let health = service.health_check();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

#[test]
fn unbuildable_api_client_fails_service_construction() {
    let mut config = common::test_config();
    config.api_probe.enabled = true;
    config.browser.user_agent = "broken\nagent".to_string();

    let driver = std::sync::Arc::new(ScriptedDriver::text(""));
    let err = library_holdings::HoldingService::new(&config, driver).err().unwrap();
    assert!(matches!(err, ServiceError::HttpClient(_)));
}
