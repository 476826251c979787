//! Application state and business logic.
//!
//! This module contains the core `App` struct that owns the session, the API
//! client and the events page controller, and runs every network call as a
//! background task whose result comes back over an MPSC channel.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use eventdesk_core::api::{ApiClient, ApiError, EventsApi};
use eventdesk_core::auth::{CredentialStore, Session};
use eventdesk_core::cache::{CacheManager, QueryCache, QueryKey, EVENTS};
use eventdesk_core::config::{Config, ENV_PASSWORD};
use eventdesk_core::models::EventsResponse;
use eventdesk_core::notify::{error_message, Toast};
use eventdesk_core::page::{EventsPage, Mutation, MutationOutcome};
use eventdesk_core::table::{fetch_page, Pagination, RowAction, TableConfig};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background result channel
const CHANNEL_BUFFER_SIZE: usize = 32;

/// Maximum username length (an email address)
const MAX_USERNAME_LENGTH: usize = 254;

/// Maximum password length
const MAX_PASSWORD_LENGTH: usize = 128;

/// How long a notification stays on screen
const TOAST_DURATION: Duration = Duration::from_secs(5);

// ============================================================================
// Enums
// ============================================================================

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    ShowingHelp,
    LoggingIn,
    ConfirmingQuit,
    Quitting,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoginFocus {
    Username,
    Password,
    Button,
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Results sent back from spawned network tasks
enum BackgroundResult {
    Page {
        page: u32,
        result: Result<EventsResponse>,
    },
    /// Registered events, requested when the page's registration set was at `rev`
    Registrations {
        rev: u64,
        result: Result<EventsResponse>,
    },
    Settled {
        mutation: Mutation,
        result: Result<MutationOutcome>,
    },
}

// ============================================================================
// App
// ============================================================================

pub struct App {
    // Core services
    pub config: Config,
    pub session: Session,
    pub api: ApiClient,
    pub disk_cache: CacheManager,
    pub page: EventsPage,

    // UI State
    pub state: AppState,

    // Login form state
    pub login_username: String,
    pub login_password: String,
    pub login_focus: LoginFocus,
    pub login_error: Option<String>,

    /// Most recent notification and when it appeared
    pub toast: Option<(Toast, Instant)>,
    pub status_message: Option<String>,
    pub cache_age: String,
    /// Page or mutation requests still running
    pub in_flight: usize,

    // Background task channel
    result_rx: mpsc::Receiver<BackgroundResult>,
    result_tx: mpsc::Sender<BackgroundResult>,
}

impl App {
    /// Create a new application instance
    pub async fn new() -> Result<Self> {
        let config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };

        let cache_dir = config.cache_dir().unwrap_or_else(|_| PathBuf::from("./cache"));
        debug!(?cache_dir, "Cache directory configured");

        let mut session = Session::new(cache_dir.clone());
        let load_result = session.load();
        debug!(?load_result, has_data = session.data.is_some(), "Session loaded");

        let mut api = ApiClient::new(config.api_base_url())?;
        if let Some(token) = session.token() {
            api.set_token(token.to_string());
        }

        let disk_cache = CacheManager::new(cache_dir)?;
        let cache_age = disk_cache.events_age();

        let table_config = TableConfig {
            pagination: if config.use_total_count {
                Pagination::TotalCount
            } else {
                Pagination::ShortPage
            },
            ..TableConfig::default()
        };
        let mut page = EventsPage::new(
            Arc::new(api.clone()),
            QueryCache::new(config.stale_after()),
            table_config,
        );
        page.set_user(session.user().cloned());

        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        let login_username = config.username().unwrap_or_default();
        let login_password = std::env::var(ENV_PASSWORD)
            .ok()
            .or_else(|| {
                if login_username.is_empty() {
                    return None;
                }
                CredentialStore::new(api.base_url(), &login_username).lookup()
            })
            .unwrap_or_default();

        Ok(Self {
            config,
            session,
            api,
            disk_cache,
            page,

            state: AppState::Normal,

            login_username,
            login_password,
            login_focus: LoginFocus::Username,
            login_error: None,

            toast: None,
            status_message: None,
            cache_age,
            in_flight: 0,

            result_rx: rx,
            result_tx: tx,
        })
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    pub fn is_authenticated(&self) -> bool {
        self.session.is_valid()
    }

    /// Interactive login on the plain terminal (`--login`)
    pub async fn login_interactive(&mut self) -> Result<()> {
        println!("\n=== eventdesk login ===\n");

        let username = match self.config.username() {
            Some(last_user) => {
                print!("Email [{}]: ", last_user);
                io::stdout().flush()?;
                let input = Self::read_line()?;
                if input.is_empty() {
                    last_user
                } else {
                    input
                }
            }
            None => {
                print!("Email: ");
                io::stdout().flush()?;
                Self::read_line()?
            }
        };

        let stored = CredentialStore::new(self.api.base_url(), &username).lookup();
        let password = match stored {
            Some(stored) => {
                print!("Use stored password? [Y/n]: ");
                io::stdout().flush()?;
                if Self::read_line()?.to_lowercase() != "n" {
                    stored
                } else {
                    rpassword::prompt_password("Password: ")?
                }
            }
            None => rpassword::prompt_password("Password: ")?,
        };

        println!("\nAuthenticating...");
        self.complete_login(&username, &password).await?;
        println!("Login successful!\n");
        Ok(())
    }

    fn read_line() -> Result<String> {
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        Ok(input.trim().to_string())
    }

    /// Authenticate and persist the session, credentials and username
    async fn complete_login(&mut self, username: &str, password: &str) -> Result<()> {
        let session_data = self.api.authenticate(username, password).await?;

        if let Err(e) = CredentialStore::new(self.api.base_url(), username).store(password) {
            warn!(error = %e, "Failed to store credentials");
        }

        self.config.last_username = Some(username.to_string());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        self.api.set_token(session_data.token.clone());
        self.page.set_api(Arc::new(self.api.clone()));
        self.page.set_user(Some(session_data.user.clone()));

        self.session.update(session_data);
        if let Err(e) = self.session.save() {
            warn!(error = %e, "Failed to save session");
        }
        Ok(())
    }

    /// Attempt login with the credentials from the login form
    pub async fn attempt_login(&mut self) -> Result<()> {
        let username = self.login_username.trim().to_string();
        let password = self.login_password.clone();

        if username.is_empty() || password.is_empty() {
            self.login_error = Some("Email and password required".to_string());
            return Err(anyhow::anyhow!("Email and password required"));
        }

        self.login_error = None;
        self.status_message = Some("Signing in...".to_string());

        match self.complete_login(&username, &password).await {
            Ok(()) => {
                self.login_password.clear();
                self.status_message = None;
                self.state = AppState::Normal;
                info!("Login successful");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Login failed");
                self.status_message = None;
                self.login_error = Some(error_message(&e));
                Err(e)
            }
        }
    }

    /// Start the login process (show login overlay)
    pub fn start_login(&mut self) {
        self.state = AppState::LoggingIn;
        self.login_focus = if self.login_username.is_empty() {
            LoginFocus::Username
        } else {
            LoginFocus::Password
        };
        self.login_error = None;
    }

    /// Forget the session, the stored password and every cached page,
    /// then ask for a login
    pub async fn logout(&mut self) {
        info!("Logging out");
        if let Some(username) = self.session.data.as_ref().map(|d| d.username.clone()) {
            if let Err(e) = CredentialStore::new(self.api.base_url(), &username).forget() {
                warn!(error = %e, "Failed to forget stored password");
            }
        }
        self.login_password.clear();
        if let Err(e) = self.session.clear() {
            warn!(error = %e, "Failed to clear session");
        }
        if let Err(e) = self.disk_cache.clear() {
            warn!(error = %e, "Failed to clear cache");
        }
        self.page.cache().clear().await;
        self.page.set_user(None);
        self.cache_age = self.disk_cache.events_age();
        self.start_login();
    }

    // =========================================================================
    // Data loading
    // =========================================================================

    /// Show the last saved first page and registrations before any request
    pub async fn load_from_cache(&mut self) {
        match self.disk_cache.load_events_page(1) {
            Ok(Some(cached)) => {
                let cache = self.page.cache().clone();
                cache.set(QueryKey::events_page(1), cached.data).await;
                // Disk snapshots are only placeholders until the server answers
                cache.invalidate(EVENTS).await;
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to load cached events"),
        }

        if self.page.user().is_some() {
            match self.disk_cache.load_registered() {
                Ok(Some(cached)) if cached.is_stale() => {
                    debug!(
                        age = %cached.age_display(),
                        "Saved registrations too old, waiting for server"
                    );
                }
                Ok(Some(cached)) => self.page.restore_registrations(cached.data),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Failed to load cached registrations"),
            }
        }

        self.page.sync_table().await;
    }

    /// Send a background result, logging if the app already went away
    async fn send_result(tx: &mpsc::Sender<BackgroundResult>, result: BackgroundResult) {
        if let Err(e) = tx.send(result).await {
            error!(error = %e, "Failed to send background result - channel closed");
        }
    }

    /// Show the current page from cache and fetch it if missing or stale
    pub async fn refresh_page(&mut self) {
        if !self.is_authenticated() {
            return;
        }
        if !self.page.sync_table().await {
            self.start_prefetch();
            return;
        }

        let window = self.page.table().window();
        let cache = self.page.cache().clone();
        let api = self.page.api();
        let tx = self.result_tx.clone();
        self.in_flight += 1;

        tokio::spawn(async move {
            let result = fetch_page(&cache, api, window).await;
            Self::send_result(
                &tx,
                BackgroundResult::Page {
                    page: window.page,
                    result,
                },
            )
            .await;
        });
    }

    /// Fetch the current page and the registrations side by side
    pub async fn refresh_all(&mut self) {
        if !self.is_authenticated() {
            return;
        }
        self.page.sync_table().await;

        let window = self.page.table().window();
        let cache = self.page.cache().clone();
        let api = self.page.api();
        let with_registrations = self.page.user().is_some();
        let rev = self.page.registrations_rev();
        let tx = self.result_tx.clone();
        self.in_flight += 1;

        tokio::spawn(async move {
            let page = fetch_page(&cache, api.clone(), window);
            let registrations = async {
                if with_registrations {
                    Some(api.registered_events().await)
                } else {
                    None
                }
            };
            let (result, registrations) = futures::future::join(page, registrations).await;

            Self::send_result(
                &tx,
                BackgroundResult::Page {
                    page: window.page,
                    result,
                },
            )
            .await;
            if let Some(result) = registrations {
                Self::send_result(&tx, BackgroundResult::Registrations { rev, result }).await;
            }
        });
    }

    /// Refetch the registration set in the background
    fn sync_registrations(&self) {
        if !self.is_authenticated() || self.page.user().is_none() {
            return;
        }
        let api = self.page.api();
        let rev = self.page.registrations_rev();
        let tx = self.result_tx.clone();

        tokio::spawn(async move {
            let result = api.registered_events().await;
            Self::send_result(&tx, BackgroundResult::Registrations { rev, result }).await;
        });
    }

    /// Drop every cached page and reload from the server
    pub async fn force_refresh(&mut self) {
        self.page.cache().invalidate(EVENTS).await;
        self.status_message = Some("Refreshing...".to_string());
        self.refresh_all().await;
    }

    fn start_prefetch(&self) {
        if let Some(handle) = self.page.prefetch_next() {
            debug!(page = self.page.table().page() + 1, "Prefetching next page");
            drop(handle);
        }
    }

    pub async fn next_page(&mut self) {
        if self.page.next_page() {
            self.refresh_page().await;
        }
    }

    pub async fn previous_page(&mut self) {
        if self.page.previous_page() {
            self.refresh_page().await;
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Send a mutation in the background; it is settled in `check_background_tasks`
    pub fn dispatch(&mut self, mutation: Option<Mutation>) {
        let Some(mutation) = mutation else {
            self.show_notifications();
            return;
        };
        debug!(mutation = mutation.name(), "Dispatching mutation");

        let api: Arc<dyn EventsApi> = self.page.api();
        let tx = self.result_tx.clone();
        self.in_flight += 1;

        tokio::spawn(async move {
            let result = mutation.send(api.as_ref()).await;
            Self::send_result(&tx, BackgroundResult::Settled { mutation, result }).await;
        });
    }

    /// Act on the selected row
    pub fn activate_selected(&mut self, action: RowAction) {
        let Some(event) = self.page.table().selected_event().cloned() else {
            return;
        };
        let allowed = self
            .page
            .table()
            .actions_for(&event, self.page.registered(), self.page.user_id());
        if !allowed.contains(&action) {
            debug!(?action, "Action not available for this event");
            return;
        }
        let mutation = self.page.activate(action, &event);
        if mutation.is_some() {
            self.dispatch(mutation);
        }
    }

    /// Register or withdraw, whichever applies to the selected row
    pub fn toggle_registration(&mut self) {
        let Some(event) = self.page.table().selected_event() else {
            return;
        };
        let action = if self.page.is_registered(event.id) {
            RowAction::Withdraw
        } else {
            RowAction::Register
        };
        self.activate_selected(action);
    }

    // =========================================================================
    // Background results
    // =========================================================================

    /// Check for completed background tasks and process results
    pub async fn check_background_tasks(&mut self) {
        let mut results = Vec::new();
        while let Ok(result) = self.result_rx.try_recv() {
            results.push(result);
        }

        for result in results {
            self.process_result(result).await;
        }

        if let Some((_, shown_at)) = &self.toast {
            if shown_at.elapsed() >= TOAST_DURATION {
                self.toast = None;
            }
        }
    }

    async fn process_result(&mut self, result: BackgroundResult) {
        match result {
            BackgroundResult::Page { page, result } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                self.status_message = None;
                match &result {
                    Ok(response) if page == 1 => {
                        if let Err(e) = self.disk_cache.save_events_page(1, response) {
                            warn!(error = %e, "Failed to cache events page");
                        }
                        self.cache_age = self.disk_cache.events_age();
                    }
                    Err(e) if Self::is_unauthorized(e) => {
                        self.session_expired();
                        return;
                    }
                    Err(e) => {
                        self.status_message = Some(format!("Failed to load page {}", page));
                        debug!(error = %e, "Page load failed");
                    }
                    _ => {}
                }
                self.page.page_loaded(page, result);
                if page == self.page.table().page() {
                    self.start_prefetch();
                }
            }
            BackgroundResult::Registrations {
                rev,
                result: Ok(response),
            } => {
                if !self.page.registrations_loaded(rev, &response) {
                    return;
                }
                if let Err(e) = self.disk_cache.save_registered(self.page.registered()) {
                    warn!(error = %e, "Failed to cache registrations");
                }
            }
            BackgroundResult::Registrations { result: Err(e), .. } => {
                if Self::is_unauthorized(&e) {
                    self.session_expired();
                } else {
                    error!(error = %e, "Failed to fetch registered events");
                }
            }
            BackgroundResult::Settled { mutation, result } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                self.page.settle(mutation, result).await;
                self.show_notifications();
                self.refresh_page().await;
                self.sync_registrations();
            }
        }
    }

    fn is_unauthorized(err: &anyhow::Error) -> bool {
        err.chain()
            .any(|cause| matches!(cause.downcast_ref::<ApiError>(), Some(ApiError::Unauthorized)))
    }

    fn session_expired(&mut self) {
        warn!("Session rejected by server, asking for login");
        if let Err(e) = self.session.clear() {
            warn!(error = %e, "Failed to clear session");
        }
        self.page.set_user(None);
        self.start_login();
        self.login_error = Some("Your session has expired. Please log in again.".to_string());
    }

    /// Move page notifications into the toast slot; the newest wins
    fn show_notifications(&mut self) {
        if let Some(toast) = self.page.take_notifications().pop() {
            self.toast = Some((toast, Instant::now()));
        }
    }
}

// ============================================================================
// Input validation helpers (exported for use in input.rs)
// ============================================================================

/// Check if a character is valid for input (no control characters)
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

pub fn can_add_username_char(current_len: usize, c: char) -> bool {
    current_len < MAX_USERNAME_LENGTH && is_valid_input_char(c)
}

pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && is_valid_input_char(c)
}

// ============================================================================
// Tests
// ============================================================================
