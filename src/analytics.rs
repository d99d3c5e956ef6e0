//! Fire-and-forget view/click reporting.
//!
//! Clicks go out immediately. Views are deferred by `view_delay` and bound to
//! a [`ViewScope`]; dropping the scope before the delay elapses cancels the
//! report. Once a report is handed to the sink it runs as a detached task, so
//! it finishes even if the scope that issued it is gone.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::debug::{self, cat};
use crate::error::ApiError;
use crate::types::{AnalyticsEvent, EntityType, EventType, Metadata};

pub const DEFAULT_VIEW_DELAY: Duration = Duration::from_millis(200);

#[async_trait]
pub trait EventSink: Send + Sync + 'static {
    async fn send(&self, event: &AnalyticsEvent) -> Result<(), ApiError>;
}

#[derive(Default)]
struct Outstanding {
    count: AtomicUsize,
    idle: Notify,
}

#[derive(Clone)]
pub struct AnalyticsReporter {
    sink: Arc<dyn EventSink>,
    view_delay: Duration,
    outstanding: Arc<Outstanding>,
}

impl AnalyticsReporter {
    pub fn new(sink: Arc<dyn EventSink>, view_delay: Duration) -> Self {
        Self {
            sink,
            view_delay,
            outstanding: Arc::new(Outstanding::default()),
        }
    }

    /// Sent right away on every call; the caller never waits on delivery.
    pub fn log_click(&self, entity_type: EntityType, entity_id: i64, metadata: Option<Metadata>) {
        self.dispatch(event(entity_type, entity_id, EventType::Click, metadata));
    }

    pub fn mount(&self) -> ViewScope {
        ViewScope {
            reporter: self.clone(),
            logged: HashSet::new(),
            timers: Vec::new(),
            disable_view: false,
        }
    }

    /// Wait until every dispatched event has been handed off or dropped.
    /// Pending view timers are not included.
    pub async fn flush(&self) {
        loop {
            let notified = self.outstanding.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.outstanding.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    fn dispatch(&self, event: AnalyticsEvent) {
        let sink = Arc::clone(&self.sink);
        let outstanding = Arc::clone(&self.outstanding);
        outstanding.count.fetch_add(1, Ordering::SeqCst);
        debug::log(
            cat::ANALYTICS,
            format!("{:?} {:?}#{}", event.event_type, event.entity_type, event.entity_id),
        );
        tokio::spawn(async move {
            if let Err(e) = sink.send(&event).await {
                log::debug!("[analytics] dropped {:?} event: {e}", event.event_type);
            }
            if outstanding.count.fetch_sub(1, Ordering::SeqCst) == 1 {
                outstanding.idle.notify_waiters();
            }
        });
    }
}

/// Metadata for a platform click made from inside a collection page.
pub fn collection_source(collection_slug: &str) -> Metadata {
    let mut meta = Metadata::new();
    meta.insert("source".into(), format!("collection:{collection_slug}"));
    meta
}

fn event(entity_type: EntityType, entity_id: i64, event_type: EventType, metadata: Option<Metadata>) -> AnalyticsEvent {
    AnalyticsEvent {
        entity_type,
        entity_id,
        event_type,
        occurred_at: Some(Utc::now()),
        metadata,
    }
}

/// One mounted view. Views are logged at most once per `(entity_type,
/// entity_id)` for the lifetime of the scope.
pub struct ViewScope {
    reporter: AnalyticsReporter,
    logged: HashSet<(EntityType, i64)>,
    timers: Vec<JoinHandle<()>>,
    disable_view: bool,
}

impl ViewScope {
    pub fn disable_view(mut self) -> Self {
        self.disable_view = true;
        self
    }

    /// Returns true when a report was scheduled.
    pub fn log_view(&mut self, entity_type: EntityType, entity_id: i64, metadata: Option<Metadata>) -> bool {
        if self.disable_view || !self.logged.insert((entity_type, entity_id)) {
            return false;
        }
        let reporter = self.reporter.clone();
        let delay = reporter.view_delay;
        self.timers.retain(|t| !t.is_finished());
        self.timers.push(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            reporter.dispatch(event(entity_type, entity_id, EventType::View, metadata));
        }));
        true
    }

    pub fn log_click(&self, entity_type: EntityType, entity_id: i64, metadata: Option<Metadata>) {
        self.reporter.log_click(entity_type, entity_id, metadata);
    }

    pub fn pending_views(&self) -> usize {
        self.timers.iter().filter(|t| !t.is_finished()).count()
    }

    /// Let every scheduled view fire, for callers that stay mounted past the
    /// delay (the CLI shows a page and then exits).
    pub async fn settle(&mut self) {
        for timer in self.timers.drain(..) {
            let _ = timer.await;
        }
    }
}

impl Drop for ViewScope {
    fn drop(&mut self) {
        let mut cancelled = 0;
        for timer in self.timers.drain(..) {
            if !timer.is_finished() {
                cancelled += 1;
            }
            timer.abort();
        }
        if cancelled > 0 {
            debug::log(cat::ANALYTICS, format!("unmount cancelled {cancelled} pending view(s)"));
        }
    }
}
