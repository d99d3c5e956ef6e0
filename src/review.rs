//! Admin side: the submission review state machine and the two
//! cookie-authenticated pages (submission queue, metrics dashboard).
//!
//! A 401 on any admin call puts the page back on the login form; it is never
//! shown as an error banner.

use std::sync::Arc;

use async_trait::async_trait;

use crate::api::{DEFAULT_DASHBOARD_DAYS, DEFAULT_DASHBOARD_TOP_LIMIT};
use crate::debug::{self, cat};
use crate::error::ApiError;
use crate::types::{AdminCredentials, AnalyticsDashboard, Submission, SubmissionList, SubmissionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    Approve,
    Reject,
}

impl SubmissionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SubmissionStatus::Pending)
    }

    /// `pending -> approved | rejected`; nothing leaves a terminal state.
    pub fn can_transition_to(self, next: SubmissionStatus) -> bool {
        matches!(
            (self, next),
            (SubmissionStatus::Pending, SubmissionStatus::Approved)
                | (SubmissionStatus::Pending, SubmissionStatus::Rejected)
        )
    }

    /// Actions offered to the admin. Only pending submissions get any.
    pub fn available_actions(self) -> &'static [ReviewAction] {
        match self {
            SubmissionStatus::Pending => &[ReviewAction::Approve, ReviewAction::Reject],
            _ => &[],
        }
    }
}

/// Cookie-authenticated admin endpoints.
#[async_trait]
pub trait AdminApi: Send + Sync + 'static {
    async fn login(&self, creds: &AdminCredentials) -> Result<(), ApiError>;
    async fn submissions(&self) -> Result<SubmissionList, ApiError>;
    async fn approve(&self, id: i64) -> Result<Submission, ApiError>;
    async fn reject(&self, id: i64, reason: &str) -> Result<Submission, ApiError>;
    async fn dashboard(&self, days: u32, top_limit: u32) -> Result<AnalyticsDashboard, ApiError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdminView<T> {
    Loading,
    Login { error: Option<String> },
    Ready(T),
    Failed(String),
}

impl<T> AdminView<T> {
    fn from_load(result: Result<T, ApiError>) -> Self {
        match result {
            Ok(v) => AdminView::Ready(v),
            Err(ApiError::Unauthorized) => AdminView::Login { error: None },
            Err(e) => AdminView::Failed(e.user_message()),
        }
    }

    pub fn needs_login(&self) -> bool {
        matches!(self, AdminView::Login { .. })
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            AdminView::Ready(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// Carries the confirmation shown to the admin.
    Done(String),
    /// No reason given for a rejection; nothing was sent.
    Aborted,
    Failed(ApiError),
}

fn credentials(username: &str, password: &str) -> AdminCredentials {
    AdminCredentials {
        username: username.trim().to_string(),
        password: password.to_string(),
    }
}

/// Submission queue page.
pub struct ReviewDesk<A> {
    api: Arc<A>,
    view: AdminView<SubmissionList>,
    message: Option<String>,
}

impl<A: AdminApi> ReviewDesk<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            view: AdminView::Loading,
            message: None,
        }
    }

    pub fn view(&self) -> &AdminView<SubmissionList> {
        &self.view
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn find(&self, id: i64) -> Option<&Submission> {
        self.view.ready()?.items.iter().find(|s| s.id == id)
    }

    pub async fn load(&mut self) -> &AdminView<SubmissionList> {
        self.view = AdminView::from_load(self.api.submissions().await);
        debug::log(cat::ADMIN, format!("submissions view: {}", view_name(&self.view)));
        &self.view
    }

    pub async fn login(&mut self, username: &str, password: &str) -> &AdminView<SubmissionList> {
        self.message = None;
        if let Err(e) = self.api.login(&credentials(username, password)).await {
            log::info!("[admin] login rejected: {e}");
            self.view = AdminView::Login {
                error: Some(e.user_message()),
            };
            return &self.view;
        }
        self.load().await;
        if matches!(self.view, AdminView::Ready(_)) {
            self.message = Some("Logged in.".to_string());
        }
        &self.view
    }

    pub async fn approve(&mut self, submission: &Submission) -> ActionOutcome {
        let result = self.api.approve(submission.id).await;
        self.finish(result, format!("{} approved.", submission.platform_name)).await
    }

    /// An absent, empty or blank reason aborts without touching the network.
    pub async fn reject(&mut self, submission: &Submission, reason: Option<&str>) -> ActionOutcome {
        let Some(reason) = reason.map(str::trim).filter(|r| !r.is_empty()) else {
            debug::log(cat::ADMIN, format!("reject #{} aborted: no reason", submission.id));
            return ActionOutcome::Aborted;
        };
        let result = self.api.reject(submission.id, reason).await;
        self.finish(result, format!("{} rejected.", submission.platform_name)).await
    }

    async fn finish(&mut self, result: Result<Submission, ApiError>, done: String) -> ActionOutcome {
        match result {
            Ok(updated) => {
                log::info!("[admin] submission #{} is now {}", updated.id, updated.status);
                self.load().await;
                self.message = Some(done.clone());
                ActionOutcome::Done(done)
            }
            Err(e) => {
                if e.is_unauthorized() {
                    self.view = AdminView::Login { error: None };
                }
                log::warn!("[admin] action failed: {e}");
                ActionOutcome::Failed(e)
            }
        }
    }
}

/// Analytics dashboard page.
pub struct MetricsDesk<A> {
    api: Arc<A>,
    days: u32,
    top_limit: u32,
    view: AdminView<AnalyticsDashboard>,
}

impl<A: AdminApi> MetricsDesk<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self::with_window(api, DEFAULT_DASHBOARD_DAYS, DEFAULT_DASHBOARD_TOP_LIMIT)
    }

    pub fn with_window(api: Arc<A>, days: u32, top_limit: u32) -> Self {
        Self {
            api,
            days,
            top_limit,
            view: AdminView::Loading,
        }
    }

    pub fn view(&self) -> &AdminView<AnalyticsDashboard> {
        &self.view
    }

    pub async fn load(&mut self) -> &AdminView<AnalyticsDashboard> {
        self.view = AdminView::from_load(self.api.dashboard(self.days, self.top_limit).await);
        debug::log(cat::ADMIN, format!("dashboard view: {}", view_name(&self.view)));
        &self.view
    }

    pub async fn login(&mut self, username: &str, password: &str) -> &AdminView<AnalyticsDashboard> {
        if let Err(e) = self.api.login(&credentials(username, password)).await {
            self.view = AdminView::Login {
                error: Some(e.user_message()),
            };
            return &self.view;
        }
        self.load().await
    }
}

fn view_name<T>(view: &AdminView<T>) -> &'static str {
    match view {
        AdminView::Loading => "loading",
        AdminView::Login { .. } => "login",
        AdminView::Ready(_) => "ready",
        AdminView::Failed(_) => "failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn submission(id: i64, status: SubmissionStatus) -> Submission {
        Submission {
            id,
            submitter_name: "Kim".into(),
            submitter_email: "kim@example.com".into(),
            platform_name: format!("Platform {id}"),
            description: None,
            website_url: None,
            ios_url: None,
            android_url: None,
            web_url: None,
            screenshot_url: None,
            status,
            rejection_reason: None,
            platform_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            approved_at: None,
            rejected_at: None,
        }
    }

    #[derive(Default)]
    struct FakeAdmin {
        logged_in: AtomicBool,
        password: String,
        calls: AtomicUsize,
        items: Mutex<Vec<Submission>>,
    }

    impl FakeAdmin {
        fn with_password(password: &str) -> Self {
            Self {
                password: password.into(),
                ..Default::default()
            }
        }

        fn guard(&self) -> Result<(), ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.logged_in.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(ApiError::Unauthorized)
            }
        }

        fn set_status(&self, id: i64, status: SubmissionStatus) -> Result<Submission, ApiError> {
            let mut items = self.items.lock().unwrap();
            let item = items
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or_else(|| ApiError::NotFound("Submission not found".into()))?;
            if !item.status.can_transition_to(status) {
                return Err(ApiError::Request {
                    status: 400,
                    message: "Submission already processed".into(),
                });
            }
            item.status = status;
            Ok(item.clone())
        }
    }

    #[async_trait]
    impl AdminApi for FakeAdmin {
        async fn login(&self, creds: &AdminCredentials) -> Result<(), ApiError> {
            if creds.username == "admin" && creds.password == self.password {
                self.logged_in.store(true, Ordering::SeqCst);
                Ok(())
            } else {
                Err(ApiError::Request {
                    status: 401,
                    message: "Invalid credentials".into(),
                })
            }
        }

        async fn submissions(&self) -> Result<SubmissionList, ApiError> {
            self.guard()?;
            let items = self.items.lock().unwrap().clone();
            Ok(SubmissionList {
                total: items.len() as u64,
                items,
            })
        }

        async fn approve(&self, id: i64) -> Result<Submission, ApiError> {
            self.guard()?;
            self.set_status(id, SubmissionStatus::Approved)
        }

        async fn reject(&self, id: i64, _reason: &str) -> Result<Submission, ApiError> {
            self.guard()?;
            self.set_status(id, SubmissionStatus::Rejected)
        }

        async fn dashboard(&self, _days: u32, _top_limit: u32) -> Result<AnalyticsDashboard, ApiError> {
            self.guard()?;
            Ok(AnalyticsDashboard::default())
        }
    }

    #[test]
    fn only_pending_moves() {
        use SubmissionStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(!Approved.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Pending.can_transition_to(Pending));
        assert!(Approved.is_terminal() && Rejected.is_terminal());
        assert_eq!(Pending.available_actions().len(), 2);
        assert!(Approved.available_actions().is_empty());
    }

    #[tokio::test]
    async fn reject_without_reason_sends_nothing() {
        let api = Arc::new(FakeAdmin::with_password("pw"));
        api.logged_in.store(true, Ordering::SeqCst);
        api.items.lock().unwrap().push(submission(1, SubmissionStatus::Pending));
        let mut desk = ReviewDesk::new(api.clone());
        desk.load().await;
        let calls = api.calls.load(Ordering::SeqCst);

        let target = submission(1, SubmissionStatus::Pending);
        assert_eq!(desk.reject(&target, Some("")).await, ActionOutcome::Aborted);
        assert_eq!(desk.reject(&target, Some("   ")).await, ActionOutcome::Aborted);
        assert_eq!(desk.reject(&target, None).await, ActionOutcome::Aborted);

        assert_eq!(api.calls.load(Ordering::SeqCst), calls);
        assert_eq!(api.items.lock().unwrap()[0].status, SubmissionStatus::Pending);
    }

    #[tokio::test]
    async fn approve_reloads_and_confirms() {
        let api = Arc::new(FakeAdmin::with_password("pw"));
        api.logged_in.store(true, Ordering::SeqCst);
        api.items.lock().unwrap().push(submission(4, SubmissionStatus::Pending));
        let mut desk = ReviewDesk::new(api.clone());
        desk.load().await;

        let target = desk.find(4).cloned().unwrap();
        let outcome = desk.approve(&target).await;
        assert_eq!(outcome, ActionOutcome::Done("Platform 4 approved.".into()));
        assert_eq!(desk.message(), Some("Platform 4 approved."));
        assert_eq!(desk.find(4).unwrap().status, SubmissionStatus::Approved);
    }

    #[tokio::test]
    async fn second_transition_is_a_server_error() {
        let api = Arc::new(FakeAdmin::with_password("pw"));
        api.logged_in.store(true, Ordering::SeqCst);
        api.items.lock().unwrap().push(submission(2, SubmissionStatus::Approved));
        let mut desk = ReviewDesk::new(api.clone());
        desk.load().await;
        let target = desk.find(2).cloned().unwrap();
        match desk.reject(&target, Some("spam")).await {
            ActionOutcome::Failed(ApiError::Request { status, .. }) => assert_eq!(status, 400),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(matches!(desk.view(), AdminView::Ready(_)));
    }

    #[tokio::test]
    async fn unauthorized_load_shows_login() {
        let api = Arc::new(FakeAdmin::with_password("pw"));
        let mut desk = ReviewDesk::new(api.clone());
        assert_eq!(desk.load().await, &AdminView::Login { error: None });

        let view = desk.login("admin", "wrong").await;
        assert_eq!(
            view,
            &AdminView::Login {
                error: Some("Invalid credentials".into())
            }
        );

        let view = desk.login("  admin ", "pw").await;
        assert!(matches!(view, AdminView::Ready(_)));
        assert_eq!(desk.message(), Some("Logged in."));
    }

    #[tokio::test]
    async fn expired_session_during_action_returns_to_login() {
        let api = Arc::new(FakeAdmin::with_password("pw"));
        api.logged_in.store(true, Ordering::SeqCst);
        api.items.lock().unwrap().push(submission(5, SubmissionStatus::Pending));
        let mut desk = ReviewDesk::new(api.clone());
        desk.load().await;
        api.logged_in.store(false, Ordering::SeqCst);

        let target = desk.find(5).cloned().unwrap();
        assert_eq!(desk.approve(&target).await, ActionOutcome::Failed(ApiError::Unauthorized));
        assert!(desk.view().needs_login());
    }

    #[tokio::test]
    async fn dashboard_login_flow() {
        let api = Arc::new(FakeAdmin::with_password("pw"));
        let mut desk = MetricsDesk::new(api);
        assert!(desk.load().await.needs_login());
        assert!(matches!(desk.login("admin", "pw").await, AdminView::Ready(_)));
    }
}
