//! Events page controller.
//!
//! `EventsPage` owns everything the events screen shows besides raw page data:
//! the signed-in user, the set of events that user is registered for, which
//! dialog is open and the forms inside those dialogs. The table and forms are
//! exposed read-only; every state change goes through a method here.
//!
//! Server mutations are split in three steps so a front end can run the
//! network call off its UI loop:
//!
//! 1. a `begin_*` / `withdraw` / `confirm_delete` call applies any optimistic
//!    change and returns a `Mutation`
//! 2. `Mutation::send` performs the request
//! 3. `EventsPage::settle` reconciles: rollback and error toast on failure,
//!    success toast on success, and invalidation of cached pages either way
//!
//! `EventsPage::run` does all three in sequence.
//!
//! Registration lists fetched in the background carry the
//! `registrations_rev` current when the request started. A list that began
//! before a local register or withdraw is dropped by `registrations_loaded`,
//! so it can't undo the newer change. Resync after every settle.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::api::EventsApi;
use crate::cache::{QueryCache, Snapshot, EVENTS};
use crate::forms::{EventForm, RegistrationForm};
use crate::models::{
    Event, EventCreate, EventRegistration, EventUpdate, EventsResponse, Message, User,
};
use crate::notify::Toast;
use crate::table::{fetch_page, prefetch_page, EventsTable, RowAction, TableBody, TableConfig};

/// Dialog currently shown over the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modal {
    Add,
    Edit,
    Register,
    ConfirmDelete,
}

/// A server change that has been applied locally (where applicable) and
/// still has to be sent.
#[derive(Debug)]
pub enum Mutation {
    Create {
        payload: EventCreate,
        snapshot: Snapshot<EventsResponse>,
    },
    Update {
        id: Uuid,
        update: EventUpdate,
    },
    Delete {
        id: Uuid,
    },
    Register {
        event_id: Uuid,
        previous: HashSet<Uuid>,
    },
    Withdraw {
        event_id: Uuid,
        previous: HashSet<Uuid>,
    },
}

#[derive(Debug, Clone)]
pub enum MutationOutcome {
    Created(Event),
    Updated(Event),
    Deleted(Message),
    Registered(EventRegistration),
    Withdrawn(Message),
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::Create { .. } => "create",
            Mutation::Update { .. } => "update",
            Mutation::Delete { .. } => "delete",
            Mutation::Register { .. } => "register",
            Mutation::Withdraw { .. } => "withdraw",
        }
    }

    pub async fn send(&self, api: &dyn EventsApi) -> Result<MutationOutcome> {
        match self {
            Mutation::Create { payload, .. } => api
                .create_event(payload)
                .await
                .map(MutationOutcome::Created)
                .context("Failed to create event"),
            Mutation::Update { id, update } => api
                .update_event(*id, update)
                .await
                .map(MutationOutcome::Updated)
                .context("Failed to update event"),
            Mutation::Delete { id } => api
                .delete_event(*id)
                .await
                .map(MutationOutcome::Deleted)
                .context("Failed to delete event"),
            Mutation::Register { event_id, .. } => api
                .register_for_event(*event_id)
                .await
                .map(MutationOutcome::Registered)
                .context("Failed to register for event"),
            Mutation::Withdraw { event_id, .. } => api
                .unregister_from_event(*event_id)
                .await
                .map(MutationOutcome::Withdrawn)
                .context("Failed to withdraw from event"),
        }
    }
}

pub struct EventsPage {
    api: Arc<dyn EventsApi>,
    cache: QueryCache<EventsResponse>,
    table: EventsTable,
    user: Option<User>,
    registered: HashSet<Uuid>,
    registrations_rev: u64,
    selected_event: Option<Event>,
    modal: Option<Modal>,
    add_form: EventForm,
    edit_form: Option<EventForm>,
    registration_form: Option<RegistrationForm>,
    notifications: VecDeque<Toast>,
}

impl EventsPage {
    pub fn new(
        api: Arc<dyn EventsApi>,
        cache: QueryCache<EventsResponse>,
        config: TableConfig,
    ) -> Self {
        Self {
            api,
            cache,
            table: EventsTable::new(config),
            user: None,
            registered: HashSet::new(),
            registrations_rev: 0,
            selected_event: None,
            modal: None,
            add_form: EventForm::create(),
            edit_form: None,
            registration_form: None,
            notifications: VecDeque::new(),
        }
    }

    /// Swap the backend handle, e.g. after a fresh login
    pub fn set_api(&mut self, api: Arc<dyn EventsApi>) {
        self.api = api;
    }

    // ===== Read-only views =====

    pub fn api(&self) -> Arc<dyn EventsApi> {
        Arc::clone(&self.api)
    }

    pub fn cache(&self) -> &QueryCache<EventsResponse> {
        &self.cache
    }

    pub fn table(&self) -> &EventsTable {
        &self.table
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user.as_ref().map(|u| u.id)
    }

    pub fn registered(&self) -> &HashSet<Uuid> {
        &self.registered
    }

    pub fn is_registered(&self, event_id: Uuid) -> bool {
        self.registered.contains(&event_id)
    }

    /// Bumped on every local change to the registration set
    pub fn registrations_rev(&self) -> u64 {
        self.registrations_rev
    }

    pub fn selected_event(&self) -> Option<&Event> {
        self.selected_event.as_ref()
    }

    pub fn modal(&self) -> Option<Modal> {
        self.modal
    }

    pub fn add_form(&self) -> &EventForm {
        &self.add_form
    }

    pub fn edit_form(&self) -> Option<&EventForm> {
        self.edit_form.as_ref()
    }

    pub fn registration_form(&self) -> Option<&RegistrationForm> {
        self.registration_form.as_ref()
    }

    pub fn rows(&self) -> TableBody {
        self.table.rows(&self.registered, self.user_id())
    }

    /// Form of the open add/edit dialog, for keyboard input
    pub fn active_form_mut(&mut self) -> Option<&mut EventForm> {
        match self.modal {
            Some(Modal::Add) => Some(&mut self.add_form),
            Some(Modal::Edit) => self.edit_form.as_mut(),
            _ => None,
        }
    }

    pub fn registration_form_mut(&mut self) -> Option<&mut RegistrationForm> {
        match self.modal {
            Some(Modal::Register) => self.registration_form.as_mut(),
            _ => None,
        }
    }

    // ===== Notifications =====

    fn notify(&mut self, toast: Toast) {
        debug!(title = %toast.title, level = ?toast.level, "Notification");
        self.notifications.push_back(toast);
    }

    pub fn take_notifications(&mut self) -> Vec<Toast> {
        self.notifications.drain(..).collect()
    }

    // ===== User and registrations =====

    /// Returns true when the user changed and registrations should be resynced
    pub fn set_user(&mut self, user: Option<User>) -> bool {
        if self.user == user {
            return false;
        }
        // Another account's registrations must not show while resyncing
        if self.user_id() != user.as_ref().map(|u| u.id) {
            self.registered.clear();
            self.touch_registrations();
        }
        self.user = user;
        true
    }

    fn touch_registrations(&mut self) {
        self.registrations_rev += 1;
    }

    /// Replace the registration set wholesale from the server's list
    pub fn replace_registrations(&mut self, response: &EventsResponse) {
        if response.invalid {
            warn!("Registered events payload was not an event list, keeping local set");
            return;
        }
        self.registered = response.data.iter().map(|e| e.id).collect();
        debug!(count = self.registered.len(), "Registrations synced");
    }

    /// Accept a registration list requested at `rev`. Returns false when a
    /// local change happened since, in which case the list is ignored.
    pub fn registrations_loaded(&mut self, rev: u64, response: &EventsResponse) -> bool {
        if rev != self.registrations_rev {
            debug!(rev, current = self.registrations_rev, "Dropping outdated registrations");
            return false;
        }
        self.replace_registrations(response);
        true
    }

    /// Seed the registration set from a local snapshot
    pub fn restore_registrations(&mut self, registered: HashSet<Uuid>) {
        self.registered = registered;
        self.touch_registrations();
    }

    // ===== Table =====

    /// Show whatever the cache has for the current page.
    /// Returns true when that page still has to be fetched.
    pub async fn sync_table(&mut self) -> bool {
        self.table.sync_from_cache(&self.cache).await
    }

    /// Show the current page, fetching it when the cache has nothing fresh
    pub async fn load_page(&mut self) -> Result<()> {
        if !self.sync_table().await {
            return Ok(());
        }
        let window = self.table.window();
        let response = fetch_page(&self.cache, self.api(), window)
            .await
            .with_context(|| format!("Failed to load events page {}", window.page))?;
        self.table.apply(window.page, response);
        Ok(())
    }

    /// Accept a page fetched elsewhere (e.g. by a background task)
    pub fn page_loaded(&mut self, page: u32, result: Result<EventsResponse>) {
        match result {
            Ok(response) => {
                self.table.apply(page, response);
            }
            Err(e) => warn!(page, error = %e, "Failed to load events page"),
        }
    }

    /// Start warming the next page when the table says one exists
    pub fn prefetch_next(&self) -> Option<JoinHandle<bool>> {
        self.table
            .prefetch_window()
            .map(|window| prefetch_page(&self.cache, self.api(), window))
    }

    pub fn next_page(&mut self) -> bool {
        self.table.next_page()
    }

    pub fn previous_page(&mut self) -> bool {
        self.table.previous_page()
    }

    pub fn select_next(&mut self) {
        self.table.select_next();
    }

    pub fn select_previous(&mut self) {
        self.table.select_previous();
    }

    // ===== Dialogs =====

    pub fn open_add(&mut self) {
        self.modal = Some(Modal::Add);
    }

    /// Only the organizer may edit an event
    pub fn open_edit(&mut self, event: &Event) -> bool {
        if !event.is_organized_by(self.user_id()) {
            return false;
        }
        self.edit_form = Some(EventForm::edit(event));
        self.modal = Some(Modal::Edit);
        true
    }

    pub fn open_register(&mut self, event: &Event) {
        self.registration_form = Some(RegistrationForm::new(event.id, self.user.as_ref()));
        self.selected_event = Some(event.clone());
        self.modal = Some(Modal::Register);
    }

    /// Ask for confirmation before deleting; organizer only
    pub fn request_delete(&mut self, event: &Event) -> bool {
        if !event.is_organized_by(self.user_id()) {
            return false;
        }
        self.selected_event = Some(event.clone());
        self.modal = Some(Modal::ConfirmDelete);
        true
    }

    /// Close whatever dialog is open. The add form keeps its text.
    pub fn close_modal(&mut self) {
        match self.modal.take() {
            Some(Modal::Edit) => self.edit_form = None,
            Some(Modal::Register) => self.registration_form = None,
            Some(Modal::ConfirmDelete) => self.selected_event = None,
            Some(Modal::Add) | None => {}
        }
    }

    /// Dispatch a row action for an event
    pub fn activate(&mut self, action: RowAction, event: &Event) -> Option<Mutation> {
        match action {
            RowAction::Register => {
                self.open_register(event);
                None
            }
            RowAction::Withdraw => self.withdraw(event.id),
            RowAction::Edit => {
                self.open_edit(event);
                None
            }
            RowAction::Delete => {
                self.request_delete(event);
                None
            }
        }
    }

    // ===== Mutations =====

    /// Validate the add form and optimistically insert the new event into
    /// the current page. Returns None when validation fails.
    pub async fn begin_add(&mut self) -> Option<Mutation> {
        if self.add_form.submitting || !self.add_form.check() {
            return None;
        }
        let payload = match self.add_form.to_create() {
            Ok(payload) => payload,
            Err(errors) => {
                debug!(%errors, "Add form rejected");
                return None;
            }
        };
        self.add_form.submitting = true;

        let local = Event::local(&payload, self.user_id());
        debug!(id = %local.id, "Optimistic insert");
        let snapshot = self
            .cache
            .optimistic_update(self.table.window().key(), move |old| {
                let mut page = old.unwrap_or_default();
                page.invalid = false;
                page.data.push(local);
                page.count = page.count.map(|c| c + 1);
                page
            })
            .await;
        self.table.sync_from_cache(&self.cache).await;

        Some(Mutation::Create { payload, snapshot })
    }

    /// Validate the edit form. Returns None when invalid or nothing changed.
    pub fn begin_edit(&mut self) -> Option<Mutation> {
        let form = self.edit_form.as_mut()?;
        if !form.can_submit() || !form.check() {
            return None;
        }
        let id = form.original()?.id;
        let update = form.to_update().ok()?;
        // Whitespace-only edits trim back to the original values
        if update.is_empty() {
            return None;
        }
        form.submitting = true;
        Some(Mutation::Update { id, update })
    }

    /// Submit the registration dialog: closes it and registers optimistically
    pub fn submit_registration(&mut self) -> Option<Mutation> {
        let intent = self.registration_form.as_mut()?.submit()?;
        info!(event_id = %intent.event_id, "Registering for event");
        self.close_modal();
        Some(self.begin_register(intent.event_id))
    }

    pub fn begin_register(&mut self, event_id: Uuid) -> Mutation {
        let previous = self.registered.clone();
        self.registered.insert(event_id);
        self.touch_registrations();
        Mutation::Register { event_id, previous }
    }

    /// Optimistically drop a registration. None if not registered.
    pub fn withdraw(&mut self, event_id: Uuid) -> Option<Mutation> {
        if !self.registered.contains(&event_id) {
            return None;
        }
        let previous = self.registered.clone();
        self.registered.remove(&event_id);
        self.touch_registrations();
        Some(Mutation::Withdraw { event_id, previous })
    }

    pub fn confirm_delete(&mut self) -> Option<Mutation> {
        if self.modal != Some(Modal::ConfirmDelete) {
            return None;
        }
        let event = self.selected_event.take()?;
        self.modal = None;
        Some(Mutation::Delete { id: event.id })
    }

    /// Put an event's registration back the way the snapshot had it
    fn restore_registration(&mut self, event_id: Uuid, previous: &HashSet<Uuid>) {
        if previous.contains(&event_id) {
            self.registered.insert(event_id);
        } else {
            self.registered.remove(&event_id);
        }
        self.touch_registrations();
    }

    /// Reconcile local state with the result of a sent mutation.
    /// Cached pages are invalidated either way; reload the page and resync
    /// registrations afterwards.
    pub async fn settle(&mut self, mutation: Mutation, result: Result<MutationOutcome>) {
        let name = mutation.name();
        match (mutation, result) {
            (Mutation::Create { snapshot, .. }, Err(e)) => {
                self.cache.rollback(snapshot).await;
                self.table.sync_from_cache(&self.cache).await;
                self.add_form.submitting = false;
                self.notify(Toast::from_error(&e));
            }
            (Mutation::Create { .. }, Ok(_)) => {
                self.add_form.reset();
                if self.modal == Some(Modal::Add) {
                    self.modal = None;
                }
                self.notify(Toast::success("Success!", "Event created successfully."));
            }
            (Mutation::Update { .. }, Err(e)) => {
                if let Some(form) = self.edit_form.as_mut() {
                    form.submitting = false;
                }
                self.notify(Toast::from_error(&e));
            }
            (Mutation::Update { .. }, Ok(_)) => {
                if self.modal == Some(Modal::Edit) {
                    self.close_modal();
                }
                self.notify(Toast::success("Success!", "Event updated successfully."));
            }
            (Mutation::Delete { .. }, Err(e)) => {
                self.notify(Toast::from_error(&e));
            }
            (Mutation::Delete { .. }, Ok(_)) => {
                self.notify(Toast::success("Success!", "Event deleted successfully."));
            }
            (Mutation::Register { event_id, previous }, Err(e)) => {
                error!(%event_id, error = %e, "Registration failed");
                self.restore_registration(event_id, &previous);
                self.notify(Toast::error(
                    "Registration failed.",
                    "There was an error registering for the event.",
                ));
            }
            (Mutation::Register { event_id, .. }, Ok(_)) => {
                self.registered.insert(event_id);
                self.touch_registrations();
                self.notify(Toast::success(
                    "Registration successful.",
                    "You have successfully registered for the event.",
                ));
            }
            (Mutation::Withdraw { event_id, previous }, Err(e)) => {
                error!(%event_id, error = %e, "Withdrawal failed");
                self.restore_registration(event_id, &previous);
                self.notify(Toast::error(
                    "Withdrawal failed.",
                    "There was an error withdrawing from the event.",
                ));
            }
            (Mutation::Withdraw { event_id, .. }, Ok(_)) => {
                self.registered.remove(&event_id);
                self.touch_registrations();
                self.notify(Toast::success(
                    "Withdrawal successful.",
                    "You have successfully withdrawn from the event.",
                ));
            }
        }

        let marked = self.cache.invalidate(EVENTS).await;
        debug!(mutation = name, marked, "Mutation settled");
    }

    /// Send a mutation and settle it. Returns whether the server accepted it.
    pub async fn run(&mut self, mutation: Mutation) -> bool {
        let result = mutation.send(self.api.as_ref()).await;
        let ok = result.is_ok();
        self.settle(mutation, result).await;
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::cache::QueryKey;
    use crate::forms::EventField;
    use crate::notify::ToastLevel;
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory backend. Operations named in `failing` return a 400 with a detail.
    #[derive(Default)]
    struct FakeApi {
        events: Mutex<Vec<Event>>,
        registered: Mutex<HashSet<Uuid>>,
        list_calls: Mutex<Vec<(u32, u32)>>,
        updates: Mutex<Vec<EventUpdate>>,
        failing: Mutex<HashSet<&'static str>>,
    }

    impl FakeApi {
        fn with_events(count: usize, organizer: Option<Uuid>) -> Self {
            let api = Self::default();
            {
                let mut events = api.events.lock().unwrap();
                for i in 0..count {
                    events.push(sample_event(i, organizer));
                }
            }
            api
        }

        fn fail(&self, op: &'static str) {
            self.failing.lock().unwrap().insert(op);
        }

        fn check(&self, op: &'static str) -> Result<()> {
            if self.failing.lock().unwrap().contains(op) {
                return Err(ApiError::BadRequest(format!("{} rejected", op)).into());
            }
            Ok(())
        }
    }

    #[async_trait]
    impl EventsApi for FakeApi {
        async fn list_events(&self, skip: u32, limit: u32) -> Result<EventsResponse> {
            self.check("list")?;
            self.list_calls.lock().unwrap().push((skip, limit));
            let events = self.events.lock().unwrap();
            let data = events
                .iter()
                .skip(skip as usize)
                .take(limit as usize)
                .cloned()
                .collect();
            Ok(EventsResponse::new(data, Some(events.len() as u64)))
        }

        async fn read_event(&self, id: Uuid) -> Result<Event> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .find(|e| e.id == id)
                .cloned()
                .ok_or_else(|| ApiError::NotFound("Event not found".into()).into())
        }

        async fn create_event(&self, event: &EventCreate) -> Result<Event> {
            self.check("create")?;
            let created = Event::local(event, None);
            self.events.lock().unwrap().push(created.clone());
            Ok(created)
        }

        async fn update_event(&self, id: Uuid, update: &EventUpdate) -> Result<Event> {
            self.check("update")?;
            self.updates.lock().unwrap().push(update.clone());
            self.read_event(id).await
        }

        async fn delete_event(&self, id: Uuid) -> Result<Message> {
            self.check("delete")?;
            self.events.lock().unwrap().retain(|e| e.id != id);
            Ok(Message {
                message: "Event deleted successfully".into(),
            })
        }

        async fn registered_events(&self) -> Result<EventsResponse> {
            self.check("registered")?;
            let ids = self.registered.lock().unwrap().clone();
            let data = self
                .events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| ids.contains(&e.id))
                .cloned()
                .collect();
            Ok(EventsResponse::new(data, None))
        }

        async fn register_for_event(&self, id: Uuid) -> Result<EventRegistration> {
            self.check("register")?;
            self.registered.lock().unwrap().insert(id);
            Ok(EventRegistration {
                id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                event_id: id,
                registration_date: Utc::now().naive_utc(),
            })
        }

        async fn unregister_from_event(&self, id: Uuid) -> Result<Message> {
            self.check("unregister")?;
            self.registered.lock().unwrap().remove(&id);
            Ok(Message {
                message: "Unregistered".into(),
            })
        }
    }

    fn sample_event(n: usize, organizer: Option<Uuid>) -> Event {
        Event {
            id: Uuid::new_v4(),
            title: format!("Event {}", n),
            description: None,
            date: NaiveDate::from_ymd_opt(2026, 7, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            location: Some("Park".into()),
            organizer_id: organizer,
        }
    }

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "kim@example.com".into(),
            full_name: Some("Kim".into()),
            is_active: true,
            is_superuser: false,
        }
    }

    fn page_with(api: Arc<FakeApi>) -> EventsPage {
        EventsPage::new(
            api,
            QueryCache::new(Duration::from_secs(60)),
            TableConfig::default(),
        )
    }

    fn first_event(page: &EventsPage) -> Event {
        page.table().selected_event().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_load_page_and_prefetch() {
        let api = Arc::new(FakeApi::with_events(12, None));
        let mut page = page_with(Arc::clone(&api));

        page.load_page().await.unwrap();
        assert_eq!(*api.list_calls.lock().unwrap(), vec![(0, 5)]);
        assert!(page.table().has_next());

        let handle = page.prefetch_next().unwrap();
        assert!(handle.await.unwrap());
        assert!(page.cache().get_fresh(QueryKey::events_page(2)).await.is_some());

        // Page 2 comes from the prefetched entry without another request
        assert!(page.next_page());
        page.load_page().await.unwrap();
        assert_eq!(api.list_calls.lock().unwrap().len(), 2);
        assert!(!page.table().is_placeholder());

        assert!(page.next_page());
        page.load_page().await.unwrap();
        assert_eq!(api.list_calls.lock().unwrap().last(), Some(&(10, 5)));
        assert!(!page.table().has_next());
        assert!(page.prefetch_next().is_none());
    }

    #[tokio::test]
    async fn test_registrations_loaded_replaces_set() {
        let api = Arc::new(FakeApi::with_events(3, None));
        let joined = api.events.lock().unwrap()[1].id;
        api.registered.lock().unwrap().insert(joined);

        let mut page = page_with(Arc::clone(&api));
        assert!(page.set_user(Some(user())));
        page.begin_register(Uuid::new_v4());

        let rev = page.registrations_rev();
        let response = api.registered_events().await.unwrap();
        assert!(page.registrations_loaded(rev, &response));
        assert_eq!(page.registered(), &[joined].into_iter().collect::<HashSet<_>>());

        // A non-list payload leaves the set alone
        page.registrations_loaded(rev, &EventsResponse::invalid());
        assert!(page.is_registered(joined));

        assert!(page.set_user(None));
        assert!(page.registered().is_empty());
    }

    #[tokio::test]
    async fn test_set_user_switch_clears_registrations() {
        let mut page = page_with(Arc::new(FakeApi::default()));
        let kim = user();
        page.set_user(Some(kim.clone()));
        let event_id = Uuid::new_v4();
        page.begin_register(event_id);

        // Same account with a refreshed profile keeps the set
        let renamed = User {
            full_name: Some("Kim Lee".into()),
            ..kim
        };
        assert!(page.set_user(Some(renamed)));
        assert!(page.is_registered(event_id));

        assert!(page.set_user(Some(user())));
        assert!(page.registered().is_empty());
    }

    #[tokio::test]
    async fn test_outdated_registrations_do_not_undo_register() {
        let api = Arc::new(FakeApi::with_events(2, None));
        let mut page = page_with(Arc::clone(&api));
        page.set_user(Some(user()));
        page.load_page().await.unwrap();
        let event = first_event(&page);

        // List requested before the register reaches the server
        let rev = page.registrations_rev();
        let before = api.registered_events().await.unwrap();
        let mutation = page.begin_register(event.id);
        assert!(!page.registrations_loaded(rev, &before));
        assert!(page.is_registered(event.id));

        // Even a wholesale replace is overridden by the successful settle
        page.replace_registrations(&EventsResponse::new(vec![], None));
        assert!(page.run(mutation).await);
        assert!(page.is_registered(event.id));

        let rev = page.registrations_rev();
        let after = api.registered_events().await.unwrap();
        assert!(page.registrations_loaded(rev, &after));
        assert!(page.is_registered(event.id));
    }

    #[tokio::test]
    async fn test_successful_withdraw_survives_outdated_list() {
        let api = Arc::new(FakeApi::with_events(2, None));
        let mut page = page_with(Arc::clone(&api));
        page.load_page().await.unwrap();
        let event = first_event(&page);
        let register = page.begin_register(event.id);
        page.run(register).await;

        let stale = api.registered_events().await.unwrap();
        let mutation = page.withdraw(event.id).unwrap();
        page.replace_registrations(&stale);
        assert!(page.is_registered(event.id));

        assert!(page.run(mutation).await);
        assert!(!page.is_registered(event.id));
    }

    #[tokio::test]
    async fn test_failed_page_load_keeps_rows() {
        let api = Arc::new(FakeApi::with_events(7, None));
        let mut page = page_with(Arc::clone(&api));
        page.load_page().await.unwrap();
        let shown = first_event(&page);

        api.fail("list");
        page.cache().invalidate(EVENTS).await;
        assert!(page.load_page().await.is_err());
        page.page_loaded(1, Err(anyhow::anyhow!("connection reset")));

        assert_eq!(first_event(&page).id, shown.id);
        assert!(matches!(page.rows(), TableBody::Rows(rows) if rows.len() == 5));
    }

    #[tokio::test]
    async fn test_register_success() {
        let api = Arc::new(FakeApi::with_events(2, None));
        let mut page = page_with(Arc::clone(&api));
        page.set_user(Some(user()));
        page.load_page().await.unwrap();

        let event = first_event(&page);
        assert!(page.activate(RowAction::Register, &event).is_none());
        assert_eq!(page.modal(), Some(Modal::Register));
        assert_eq!(page.registration_form().unwrap().name, "Kim");

        let mutation = page.submit_registration().unwrap();
        assert!(page.modal().is_none());
        assert!(page.is_registered(event.id));

        assert!(page.run(mutation).await);
        assert!(page.is_registered(event.id));
        assert!(api.registered.lock().unwrap().contains(&event.id));
        assert!(page.cache().get_fresh(QueryKey::events_page(1)).await.is_none());

        let toasts = page.take_notifications();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].title, "Registration successful.");
    }

    #[tokio::test]
    async fn test_register_failure_restores_set() {
        let api = Arc::new(FakeApi::with_events(1, None));
        api.fail("register");
        let mut page = page_with(Arc::clone(&api));
        page.load_page().await.unwrap();
        let event = first_event(&page);

        let mutation = page.begin_register(event.id);
        assert!(page.is_registered(event.id));
        assert!(!page.run(mutation).await);
        assert!(!page.is_registered(event.id));

        let toasts = page.take_notifications();
        assert_eq!(
            toasts,
            vec![Toast::error(
                "Registration failed.",
                "There was an error registering for the event."
            )]
        );
    }

    #[tokio::test]
    async fn test_withdraw_success_and_failure() {
        let api = Arc::new(FakeApi::with_events(2, None));
        let mut page = page_with(Arc::clone(&api));
        page.load_page().await.unwrap();
        let event = first_event(&page);

        assert!(page.withdraw(event.id).is_none());

        let register = page.begin_register(event.id);
        page.run(register).await;

        let mutation = page.activate(RowAction::Withdraw, &event).unwrap();
        assert!(!page.is_registered(event.id));
        assert!(page.run(mutation).await);
        assert!(!page.is_registered(event.id));

        let register = page.begin_register(event.id);
        page.run(register).await;
        page.take_notifications();

        api.fail("unregister");
        let mutation = page.withdraw(event.id).unwrap();
        assert!(!page.is_registered(event.id));
        assert!(!page.run(mutation).await);
        assert!(page.is_registered(event.id));
        let toasts = page.take_notifications();
        assert_eq!(toasts[0].title, "Withdrawal failed.");
        assert_eq!(toasts[0].level, ToastLevel::Error);
    }

    #[tokio::test]
    async fn test_add_requires_title_and_date() {
        let api = Arc::new(FakeApi::default());
        let mut page = page_with(Arc::clone(&api));
        page.open_add();

        {
            let form = page.active_form_mut().unwrap();
            form.focus = EventField::Location;
            for c in "Hall".chars() {
                form.push_char(c);
            }
        }
        assert!(page.begin_add().await.is_none());
        let form = page.add_form();
        assert_eq!(form.error(EventField::Title).unwrap().to_string(), "Title is required.");
        assert_eq!(form.error(EventField::Date).unwrap().to_string(), "Date is required.");
        assert!(api.events.lock().unwrap().is_empty());
        assert_eq!(page.modal(), Some(Modal::Add));
    }

    fn fill_add_form(page: &mut EventsPage) {
        page.open_add();
        let form = page.active_form_mut().unwrap();
        form.title = "Picnic".into();
        form.date = "2026-08-15T11:00".into();
        form.location = "Lakeside".into();
    }

    #[tokio::test]
    async fn test_optimistic_create_rolled_back_on_failure() {
        let api = Arc::new(FakeApi::with_events(2, None));
        api.fail("create");
        let mut page = page_with(Arc::clone(&api));
        page.load_page().await.unwrap();

        fill_add_form(&mut page);
        let mutation = page.begin_add().await.unwrap();
        assert!(page.add_form().submitting);

        // Local event visible before the server answers
        let cached = page.cache().get(QueryKey::events_page(1)).await.unwrap();
        assert_eq!(cached.data.data.len(), 3);
        assert_eq!(cached.data.data[2].title, "Picnic");
        assert!(matches!(page.rows(), TableBody::Rows(rows) if rows.len() == 3));

        assert!(!page.run(mutation).await);
        let cached = page.cache().get(QueryKey::events_page(1)).await.unwrap();
        assert_eq!(cached.data.data.len(), 2);
        assert!(!cached.is_fresh);

        // Dialog stays open with the text intact
        assert_eq!(page.modal(), Some(Modal::Add));
        assert_eq!(page.add_form().title, "Picnic");
        assert!(!page.add_form().submitting);
        let toasts = page.take_notifications();
        assert_eq!(toasts, vec![Toast::error("Error", "create rejected")]);
    }

    #[tokio::test]
    async fn test_create_success() {
        let api = Arc::new(FakeApi::with_events(1, None));
        let mut page = page_with(Arc::clone(&api));
        let me = user();
        page.set_user(Some(me.clone()));
        page.load_page().await.unwrap();

        fill_add_form(&mut page);
        let mutation = page.begin_add().await.unwrap();
        let Mutation::Create { ref payload, .. } = mutation else {
            panic!("expected create");
        };
        assert_eq!(payload.location, "Lakeside");
        let cached = page.cache().get(QueryKey::events_page(1)).await.unwrap();
        assert_eq!(cached.data.data[1].organizer_id, Some(me.id));

        assert!(page.run(mutation).await);
        assert!(page.modal().is_none());
        assert!(!page.add_form().is_dirty());
        assert_eq!(api.events.lock().unwrap().len(), 2);
        assert_eq!(
            page.take_notifications(),
            vec![Toast::success("Success!", "Event created successfully.")]
        );

        // Invalidated page refetches and reconciles with the server
        page.load_page().await.unwrap();
        assert_eq!(api.list_calls.lock().unwrap().len(), 2);
        assert!(matches!(page.rows(), TableBody::Rows(rows) if rows.len() == 2));
    }

    #[tokio::test]
    async fn test_edit_flow() {
        let me = user();
        let api = Arc::new(FakeApi::with_events(1, Some(me.id)));
        api.events.lock().unwrap().push(sample_event(9, None));
        let mut page = page_with(Arc::clone(&api));
        page.load_page().await.unwrap();
        let mine = first_event(&page);

        // Not signed in as the organizer yet
        assert!(!page.open_edit(&mine));
        page.set_user(Some(me));
        assert!(page.open_edit(&mine));
        assert_eq!(page.modal(), Some(Modal::Edit));

        assert!(page.begin_edit().is_none());

        // Trailing whitespace makes the form dirty but changes nothing
        page.active_form_mut().unwrap().location = "Park ".into();
        assert!(page.edit_form().unwrap().can_submit());
        assert!(page.begin_edit().is_none());
        assert!(!page.edit_form().unwrap().submitting);

        page.active_form_mut().unwrap().location = "Stadium".into();
        let mutation = page.begin_edit().unwrap();
        assert!(page.run(mutation).await);
        assert!(page.modal().is_none());
        assert!(page.edit_form().is_none());
        assert_eq!(
            *api.updates.lock().unwrap(),
            vec![EventUpdate {
                location: Some("Stadium".into()),
                ..EventUpdate::default()
            }]
        );
        assert_eq!(page.take_notifications()[0].description, "Event updated successfully.");
    }

    #[tokio::test]
    async fn test_edit_failure_keeps_dialog_open() {
        let me = user();
        let api = Arc::new(FakeApi::with_events(1, Some(me.id)));
        api.fail("update");
        let mut page = page_with(Arc::clone(&api));
        page.set_user(Some(me));
        page.load_page().await.unwrap();
        let mine = first_event(&page);

        page.activate(RowAction::Edit, &mine);
        page.active_form_mut().unwrap().title = "Renamed".into();
        let mutation = page.begin_edit().unwrap();
        assert!(!page.run(mutation).await);
        assert_eq!(page.modal(), Some(Modal::Edit));
        assert!(page.edit_form().unwrap().can_submit());
        assert_eq!(page.take_notifications()[0].description, "update rejected");
    }

    #[tokio::test]
    async fn test_delete_requires_organizer_and_confirmation() {
        let me = user();
        let api = Arc::new(FakeApi::with_events(1, Some(me.id)));
        let mut page = page_with(Arc::clone(&api));
        page.load_page().await.unwrap();
        let mine = first_event(&page);

        assert!(!page.request_delete(&mine));
        assert!(page.confirm_delete().is_none());

        page.set_user(Some(me));
        assert!(page.activate(RowAction::Delete, &mine).is_none());
        assert_eq!(page.modal(), Some(Modal::ConfirmDelete));

        let mutation = page.confirm_delete().unwrap();
        assert!(page.run(mutation).await);
        assert!(api.events.lock().unwrap().is_empty());

        page.load_page().await.unwrap();
        assert!(matches!(page.rows(), TableBody::Empty { .. }));
    }

    #[tokio::test]
    async fn test_close_modal_discards_dialog_state() {
        let api = Arc::new(FakeApi::with_events(1, None));
        let mut page = page_with(api);
        page.load_page().await.unwrap();
        let event = first_event(&page);

        page.open_register(&event);
        assert_eq!(page.selected_event().map(|e| e.id), Some(event.id));
        page.close_modal();
        assert!(page.registration_form().is_none());
        assert!(page.submit_registration().is_none());
        assert!(!page.is_registered(event.id));
    }
}
