//! Application state for the conservatory dashboard.
//!
//! `App` owns the configuration, session, dashboard snapshot and the
//! channel background tasks report back on. Every network call runs in a
//! spawned task through `Services::run_action`, so the draw loop never
//! waits on the backend.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local, Utc};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use conservatory_core::auth::{CredentialStore, Session, SessionData};
use conservatory_core::cache::CacheManager;
use conservatory_core::dashboard::DashboardSummary;
use conservatory_core::notify::{Notice, Notifier};
use conservatory_core::reminders::ReminderOptions;
use conservatory_core::repo::Resource;
use conservatory_core::tasks::{OpenTask, TaskKind};
use conservatory_core::{BackendError, Config, RestBackend, Services};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
const CHANNEL_BUFFER_SIZE: usize = 16;

/// Longest address accepted by the login form.
const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum length for password input.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Number of items to scroll on page up/down.
pub const PAGE_SCROLL_SIZE: usize = 10;

// ============================================================================
// UI State Types
// ============================================================================

/// Main navigation tabs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Overview,
    Tasks,
    Payments,
    Activity,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Overview, Tab::Tasks, Tab::Payments, Tab::Activity];

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Overview => "Overview",
            Tab::Tasks => "Tasks",
            Tab::Payments => "Payments",
            Tab::Activity => "Activity",
        }
    }

    /// Get the next tab (wrapping around)
    pub fn next(&self) -> Self {
        match self {
            Tab::Overview => Tab::Tasks,
            Tab::Tasks => Tab::Payments,
            Tab::Payments => Tab::Activity,
            Tab::Activity => Tab::Overview,
        }
    }

    /// Get the previous tab (wrapping around)
    pub fn prev(&self) -> Self {
        match self {
            Tab::Overview => Tab::Activity,
            Tab::Tasks => Tab::Overview,
            Tab::Payments => Tab::Tasks,
            Tab::Activity => Tab::Payments,
        }
    }
}

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    ShowingHelp,
    LoggingIn,
    ConfirmingReminders,
    ConfirmingQuit,
    Quitting,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoginFocus {
    Email,
    Password,
    Button,
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Messages from spawned tasks back to the draw loop.
enum RefreshResult {
    Dashboard(DashboardSummary),
    Tasks(Resource<Vec<OpenTask>>),
    /// All refresh fetches finished (successfully or not)
    RefreshComplete,
    /// A write action finished; the dashboard should be reloaded
    ActionComplete,
}

// ============================================================================
// Main Application Struct
// ============================================================================

pub struct App {
    pub config: Config,
    pub session: Session,
    pub cache: CacheManager,
    services: Option<Services>,
    notifier: Notifier,
    notices: mpsc::UnboundedReceiver<Notice>,

    // UI State
    pub state: AppState,
    pub current_tab: Tab,

    // Login form state
    pub login_email: String,
    pub login_password: String,
    pub login_focus: LoginFocus,
    pub login_error: Option<String>,

    // Selection indices
    pub task_selection: usize,
    pub payment_selection: usize,
    pub activity_selection: usize,

    // Data
    pub summary: Option<DashboardSummary>,
    pub tasks: Resource<Vec<OpenTask>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub showing_stale: bool,

    // Background task channel
    refresh_rx: mpsc::Receiver<RefreshResult>,
    refresh_tx: mpsc::Sender<RefreshResult>,
    pub refreshing: bool,

    // Status line
    pub status_message: Option<Notice>,
}

impl App {
    /// Create a new application instance
    pub fn new() -> Result<Self> {
        let config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        }
        .with_env();

        let cache_dir = config.cache_dir().unwrap_or_else(|_| PathBuf::from("./cache"));
        debug!(?cache_dir, "Cache directory configured");

        let mut session = Session::new(cache_dir.clone());
        let load_result = session.load();
        debug!(?load_result, has_data = session.data.is_some(), "Session loaded");

        let cache = CacheManager::new(cache_dir)?;
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let (notifier, notices) = Notifier::channel();

        let login_email = config.last_email.clone().unwrap_or_default();

        let mut app = Self {
            config,
            session,
            cache,
            services: None,
            notifier,
            notices,

            state: AppState::Normal,
            current_tab: Tab::Overview,

            login_email,
            login_password: String::new(),
            login_focus: LoginFocus::Email,
            login_error: None,

            task_selection: 0,
            payment_selection: 0,
            activity_selection: 0,

            summary: None,
            tasks: Resource::Idle,
            updated_at: None,
            showing_stale: false,

            refresh_rx: rx,
            refresh_tx: tx,
            refreshing: false,

            status_message: None,
        };

        if app.session.is_valid() {
            if let Err(e) = app.connect() {
                warn!(error = %e, "Could not connect with saved session");
            }
        }
        Ok(app)
    }

    /// Build services from the current configuration and session token.
    fn connect(&mut self) -> Result<()> {
        let token = self.session.token().map(str::to_string);
        let services = Services::connect(self.config.clone(), token, self.notifier.clone())?;
        if services.email.is_none() {
            debug!("Email provider not configured; reminders are disabled");
        }
        self.services = Some(services);
        Ok(())
    }

    fn services(&self) -> Option<Services> {
        if self.services.is_none() {
            self.notifier.error("Not connected. Log in first.");
        }
        self.services.clone()
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    pub fn is_authenticated(&self) -> bool {
        self.session.is_valid() && self.services.is_some()
    }

    /// Start the login process (show login overlay)
    pub fn start_login(&mut self) {
        self.state = AppState::LoggingIn;
        self.login_focus = if self.login_email.is_empty() {
            LoginFocus::Email
        } else {
            LoginFocus::Password
        };
        self.login_error = None;
    }

    /// Attempt login with the credentials from the login form
    pub async fn attempt_login(&mut self) -> Result<()> {
        let email = self.login_email.trim().to_string();
        let password = self.login_password.clone();

        if email.is_empty() || password.is_empty() {
            self.login_error = Some("Email and password required".to_string());
            return Err(anyhow!("Email and password required"));
        }

        self.login_error = None;

        match authenticate(&self.config, &email, &password).await {
            Ok(session_data) => {
                if let Err(e) = CredentialStore::store(&email, &password) {
                    warn!(error = %e, "Failed to store credentials");
                }

                self.config.last_email = Some(email);
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }

                self.session.update(session_data);
                if let Err(e) = self.session.save() {
                    warn!(error = %e, "Failed to save session");
                }

                if let Err(e) = self.connect() {
                    self.login_error = Some(format!("Login failed: {}", e));
                    return Err(e);
                }

                self.login_password.clear();
                self.state = AppState::Normal;
                info!("Login successful");
                Ok(())
            }
            Err(e) => {
                let detail = format!("{:#}", e);
                error!(error = %detail, "Login failed");
                self.login_error = Some(login_error_message(&e));
                Err(e)
            }
        }
    }

    // =========================================================================
    // Cache
    // =========================================================================

    /// Show the last saved dashboard until a refresh lands.
    pub fn load_from_cache(&mut self) {
        match self.cache.load_dashboard() {
            Ok(Some(cached)) => {
                self.showing_stale = cached.is_stale();
                self.updated_at = Some(cached.cached_at);
                self.tasks = Resource::Loaded(cached.data.top_tasks.clone());
                self.summary = Some(cached.data);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Ignoring unreadable dashboard cache"),
        }
    }

    pub fn last_updated(&self) -> String {
        match self.updated_at {
            None => "never".to_string(),
            Some(at) => {
                let minutes = (Utc::now() - at).num_minutes();
                if minutes < 1 {
                    "just now".to_string()
                } else if minutes < 60 {
                    format!("{}m ago", minutes)
                } else {
                    format!("{}h ago", minutes / 60)
                }
            }
        }
    }

    // =========================================================================
    // Background work
    // =========================================================================

    /// Reload the dashboard and the full task list in the background.
    pub fn refresh_background(&mut self) {
        if self.refreshing {
            return;
        }
        let Some(services) = self.services() else {
            return;
        };
        let tx = self.refresh_tx.clone();
        self.refreshing = true;
        if self.tasks.data().is_none() {
            self.tasks = Resource::Loading;
        }
        info!("Starting background refresh");

        tokio::spawn(async move {
            if let Some(summary) = services
                .run_action("Dashboard refresh", services.dashboard())
                .await
            {
                send_result(&tx, RefreshResult::Dashboard(summary)).await;
            }
            let tasks = Resource::load(services.open_tasks()).await;
            if let Some(message) = tasks.error() {
                error!(error = %message, "Task refresh failed");
                services
                    .notifier
                    .error("Task refresh failed. See the log for details.");
            }
            send_result(&tx, RefreshResult::Tasks(tasks)).await;
            send_result(&tx, RefreshResult::RefreshComplete).await;
        });
    }

    /// Send a reminder for every past-due payment.
    pub fn send_reminders_background(&mut self) {
        let Some(services) = self.services() else {
            return;
        };
        let tx = self.refresh_tx.clone();
        self.notifier.info("Sending payment reminders...");

        tokio::spawn(async move {
            let options = ReminderOptions::default();
            if let Some(report) = services
                .run_action("Payment reminders", services.send_reminders(&options))
                .await
            {
                let message = format!(
                    "Sent {} reminder(s), {} failed",
                    report.sent(),
                    report.failed()
                );
                if report.failed() > 0 {
                    services.notifier.error(message);
                } else {
                    services.notifier.success(message);
                }
                send_result(&tx, RefreshResult::ActionComplete).await;
            }
        });
    }

    /// Mark the highlighted payment as paid today.
    pub fn record_selected_payment(&mut self) {
        let Some(schedule_id) = self.selected_schedule_id() else {
            self.notifier.info("Select a payment first");
            return;
        };
        let Some(services) = self.services() else {
            return;
        };
        let tx = self.refresh_tx.clone();
        let today = Local::now().date_naive();

        tokio::spawn(async move {
            if let Some(schedule) = services
                .run_action("Record payment", services.record_payment(&schedule_id, today))
                .await
            {
                services
                    .notifier
                    .success(format!("Recorded payment: {}", schedule.label()));
                send_result(&tx, RefreshResult::ActionComplete).await;
            }
        });
    }

    /// Schedule id behind the current selection, if it is a payment.
    pub fn selected_schedule_id(&self) -> Option<String> {
        match self.current_tab {
            Tab::Payments => self
                .summary
                .as_ref()?
                .upcoming_payments
                .get(self.payment_selection)
                .map(|p| p.id.clone()),
            Tab::Tasks => self
                .task_rows()
                .get(self.task_selection)
                .filter(|t| t.kind == TaskKind::OverduePayment)
                .map(|t| t.source_id.clone()),
            Tab::Overview | Tab::Activity => None,
        }
    }

    /// Drain background results and notices.
    pub fn check_background_tasks(&mut self) {
        let mut results = Vec::new();
        while let Ok(result) = self.refresh_rx.try_recv() {
            results.push(result);
        }
        for result in results {
            self.process_refresh_result(result);
        }

        while let Ok(notice) = self.notices.try_recv() {
            self.status_message = Some(notice);
        }
    }

    fn process_refresh_result(&mut self, result: RefreshResult) {
        match result {
            RefreshResult::Dashboard(summary) => {
                if let Err(e) = self.cache.save_dashboard(&summary) {
                    warn!(error = %e, "Failed to cache dashboard");
                }
                self.updated_at = Some(Utc::now());
                self.showing_stale = false;
                self.summary = Some(summary);
                self.clamp_selections();
            }
            RefreshResult::Tasks(tasks) => {
                // A failed refresh keeps whatever list is on screen
                if tasks.data().is_some() || self.tasks.data().is_none() {
                    self.tasks = tasks;
                }
                self.clamp_selections();
            }
            RefreshResult::RefreshComplete => {
                self.refreshing = false;
            }
            RefreshResult::ActionComplete => {
                self.refresh_background();
            }
        }
    }

    fn clamp_selections(&mut self) {
        let payments = self
            .summary
            .as_ref()
            .map_or(0, |s| s.upcoming_payments.len());
        let activity = self
            .summary
            .as_ref()
            .map_or(0, |s| s.recent_activity.len());
        self.task_selection = self
            .task_selection
            .min(self.task_rows().len().saturating_sub(1));
        self.payment_selection = self.payment_selection.min(payments.saturating_sub(1));
        self.activity_selection = self.activity_selection.min(activity.saturating_sub(1));
    }

    /// Loaded tasks; empty while loading or after a failure.
    pub fn task_rows(&self) -> &[OpenTask] {
        self.tasks.data().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of rows in the current tab's list.
    pub fn current_list_len(&self) -> usize {
        match self.current_tab {
            Tab::Overview => 0,
            Tab::Tasks => self.task_rows().len(),
            Tab::Payments => self
                .summary
                .as_ref()
                .map_or(0, |s| s.upcoming_payments.len()),
            Tab::Activity => self
                .summary
                .as_ref()
                .map_or(0, |s| s.recent_activity.len()),
        }
    }

    pub fn current_selection_mut(&mut self) -> Option<&mut usize> {
        match self.current_tab {
            Tab::Overview => None,
            Tab::Tasks => Some(&mut self.task_selection),
            Tab::Payments => Some(&mut self.payment_selection),
            Tab::Activity => Some(&mut self.activity_selection),
        }
    }

    /// Forget the session, stored password and cached dashboard, then show
    /// the login form.
    pub fn logout(&mut self) {
        if let Some(email) = self.session.email().map(str::to_string) {
            if let Err(e) = CredentialStore::delete(&email) {
                warn!(error = %e, "Failed to delete stored password");
            }
        }
        if let Err(e) = self.session.clear() {
            warn!(error = %e, "Failed to clear session");
        }
        if let Err(e) = self.cache.clear() {
            warn!(error = %e, "Failed to clear cache");
        }
        self.services = None;
        self.summary = None;
        self.tasks = Resource::Idle;
        self.updated_at = None;
        self.start_login();
    }
}

async fn send_result(tx: &mpsc::Sender<RefreshResult>, result: RefreshResult) {
    if tx.send(result).await.is_err() {
        debug!("Refresh result dropped; app is shutting down");
    }
}

/// Sign in against the configured backend.
pub async fn authenticate(config: &Config, email: &str, password: &str) -> Result<SessionData> {
    let (url, key) = config.require_backend()?;
    RestBackend::new(url, key)?.authenticate(email, password).await
}

/// Short, user-facing text for a failed login.
pub fn login_error_message(error: &anyhow::Error) -> String {
    match error.downcast_ref::<BackendError>() {
        Some(BackendError::Unauthorized) | Some(BackendError::AccessDenied(_)) => {
            "Invalid email or password".to_string()
        }
        Some(BackendError::NetworkError(_)) => {
            "Unable to connect to server. Check your internet connection.".to_string()
        }
        Some(BackendError::RateLimited) => "Too many attempts. Please wait.".to_string(),
        _ => format!("Login failed: {}", error),
    }
}

// ============================================================================
// Input validation helpers
// ============================================================================

fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

pub fn can_add_email_char(current_len: usize, c: char) -> bool {
    current_len < MAX_EMAIL_LENGTH && is_valid_input_char(c) && !c.is_whitespace()
}

pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && is_valid_input_char(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_next() {
        assert_eq!(Tab::Overview.next(), Tab::Tasks);
        assert_eq!(Tab::Tasks.next(), Tab::Payments);
        assert_eq!(Tab::Payments.next(), Tab::Activity);
        assert_eq!(Tab::Activity.next(), Tab::Overview);
    }

    #[test]
    fn test_tab_prev_undoes_next() {
        for tab in Tab::ALL {
            assert_eq!(tab.next().prev(), tab);
        }
    }

    #[test]
    fn test_can_add_email_char() {
        assert!(can_add_email_char(0, 'a'));
        assert!(can_add_email_char(0, '@'));
        assert!(!can_add_email_char(0, ' '));
        assert!(!can_add_email_char(0, '\n'));
        assert!(!can_add_email_char(254, 'a'));
    }

    #[test]
    fn test_can_add_password_char() {
        assert!(can_add_password_char(0, ' '));
        assert!(can_add_password_char(127, '!'));
        assert!(!can_add_password_char(128, 'a'));
        assert!(!can_add_password_char(0, '\x00'));
    }

    #[test]
    fn test_login_error_message() {
        let unauthorized = anyhow::Error::new(BackendError::Unauthorized);
        assert_eq!(login_error_message(&unauthorized), "Invalid email or password");

        let wrapped = anyhow::Error::new(BackendError::RateLimited).context("Signing in");
        assert_eq!(login_error_message(&wrapped), "Too many attempts. Please wait.");

        let other = anyhow!("Backend URL is not configured");
        assert_eq!(
            login_error_message(&other),
            "Login failed: Backend URL is not configured"
        );
    }

    #[tokio::test]
    async fn test_authenticate_requires_backend_config() {
        let err = authenticate(&Config::default(), "a@example.org", "pw")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Backend URL is not configured"));
    }
}
