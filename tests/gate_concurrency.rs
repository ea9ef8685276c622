// Concurrency bound on renders
mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

use common::{BASE_URL, ScriptedDriver, pad, service_with, test_config};
use library_holdings::{
    ConcurrencyGate, HoldingService, LookupQuery, RenderDriver, RenderError, RenderedPage,
    SearchTerm,
};

#[tokio::test]
async fn gate_never_admits_more_than_capacity() {
    const CALLERS: usize = 10;
    const CAPACITY: usize = 3;

    let gate = Arc::new(ConcurrencyGate::new(CAPACITY));
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::with_capacity(CALLERS);
    for _ in 0..CALLERS {
        let gate = gate.clone();
        let running = running.clone();
        let peak = peak.clone();
        handles.push(tokio::spawn(async move {
            let _permit = gate.acquire().await.unwrap();
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            running.fetch_sub(1, Ordering::SeqCst);
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= CAPACITY);
    assert_eq!(gate.in_use(), 0);
}

#[tokio::test]
async fn service_bounds_concurrent_renders() {
    let driver = ScriptedDriver::text(pad("held items 1", 900)).with_delay(Duration::from_millis(30));
    let (service, driver) = service_with(driver);

    let mut handles = Vec::new();
    for i in 0..10 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            // distinct terms so no request is a cache hit
            let query = LookupQuery::isbn(format!("97800000000{i:02}"));
            service.check_holding(&query).await.unwrap()
        }));
    }

    for handle in handles {
        assert!(handle.await.unwrap().result.is_found());
    }

    assert_eq!(driver.calls(), 10);
    assert!(driver.max_active() <= 3);
    assert!(driver.max_active() >= 1);
}

#[tokio::test]
async fn waiters_proceed_after_release() {
    let gate = ConcurrencyGate::new(1);
    let first = gate.acquire().await.unwrap();

    let blocked = tokio::time::timeout(Duration::from_millis(20), gate.acquire()).await;
    assert!(blocked.is_err());

    drop(first);
    let second = tokio::time::timeout(Duration::from_millis(20), gate.acquire()).await;
    assert!(second.is_ok());
}

/// Driver whose work outlives the caller's future, like a render running on
/// its own task
struct DetachedDriver {
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    started: Arc<AtomicUsize>,
}

#[async_trait]
impl RenderDriver for DetachedDriver {
    async fn fetch_rendered_text(&self, term: &SearchTerm) -> Result<RenderedPage, RenderError> {
        let active = self.active.clone();
        let peak = self.peak.clone();
        self.started.fetch_add(1, Ordering::SeqCst);
        let canonical_url = term.detail_url(BASE_URL);

        tokio::spawn(async move {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(500)).await;
            active.fetch_sub(1, Ordering::SeqCst);
            RenderedPage {
                text: pad("held items 1", 900),
                canonical_url,
            }
        })
        .await
        .map_err(|e| RenderError::SessionFailed(e.to_string()))
    }
}

#[tokio::test(start_paused = true)]
async fn cancelled_requests_keep_their_gate_slot() {
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let started = Arc::new(AtomicUsize::new(0));
    let driver = DetachedDriver {
        active: active.clone(),
        peak: peak.clone(),
        started: started.clone(),
    };
    let service = Arc::new(HoldingService::new(&test_config(), Arc::new(driver)).unwrap());

    // every client disconnects long before its render would finish
    let mut handles = Vec::new();
    for i in 0..10 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            let query = LookupQuery::isbn(format!("97800000001{i:02}"));
            timeout(Duration::from_millis(50), service.check_holding(&query)).await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_err());
    }

    // renders already admitted still run to completion before slots free up
    let snapshot = service.stats().await;
    assert_eq!(snapshot.gate.in_use, 3);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(started.load(Ordering::SeqCst), 3);
    assert_eq!(active.load(Ordering::SeqCst), 0);
    assert_eq!(service.stats().await.gate.in_use, 0);
}
