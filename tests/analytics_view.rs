use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use platdex::analytics::{AnalyticsReporter, EventSink};
use platdex::error::ApiError;
use platdex::types::{AnalyticsEvent, EntityType, EventType};

#[derive(Default)]
struct Collector(Mutex<Vec<AnalyticsEvent>>);

#[async_trait]
impl EventSink for Collector {
    async fn send(&self, event: &AnalyticsEvent) -> Result<(), ApiError> {
        self.0.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn leaving_within_fifty_ms_sends_nothing() {
    let sink = Arc::new(Collector::default());
    let reporter = AnalyticsReporter::new(sink.clone(), Duration::from_millis(200));

    let mut scope = reporter.mount();
    scope.log_view(EntityType::Collection, 42, None);
    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(scope);

    tokio::time::sleep(Duration::from_secs(1)).await;
    reporter.flush().await;
    assert!(sink.0.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn staying_mounted_sends_one_view() {
    let sink = Arc::new(Collector::default());
    let reporter = AnalyticsReporter::new(sink.clone(), Duration::from_millis(200));

    let mut scope = reporter.mount();
    scope.log_view(EntityType::Platform, 8, None);
    scope.log_view(EntityType::Platform, 8, None);
    tokio::time::sleep(Duration::from_millis(500)).await;
    reporter.flush().await;

    let events = sink.0.lock().unwrap().clone();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::View);

    let json = serde_json::to_value(&events[0]).unwrap();
    assert_eq!(json["entity_type"], "platform");
    assert_eq!(json["entity_id"], 8);
    assert_eq!(json["event_type"], "view");
    assert!(json.get("metadata").is_none());
}

#[tokio::test]
async fn click_does_not_wait_for_delivery() {
    struct Slow;

    #[async_trait]
    impl EventSink for Slow {
        async fn send(&self, _event: &AnalyticsEvent) -> Result<(), ApiError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    let reporter = AnalyticsReporter::new(Arc::new(Slow), Duration::from_millis(200));
    let started = std::time::Instant::now();
    reporter.log_click(EntityType::Collection, 1, None);
    assert!(started.elapsed() < Duration::from_secs(1));
}
