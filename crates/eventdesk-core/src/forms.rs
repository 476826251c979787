//! Event and registration forms.
//!
//! Forms hold raw text exactly as typed. Validation runs on submit and
//! produces field-level errors that stay with the form; nothing here touches
//! the network.

use thiserror::Error;
use uuid::Uuid;

use crate::models::{event_date, Event, EventCreate, EventUpdate, User, MAX_FIELD_LENGTH};
use crate::utils::non_blank;

/// Upper bound on typed input; longer values are rejected by validation first
const MAX_INPUT_LENGTH: usize = 1024;

/// Check if a typed character should be accepted into a field
pub fn can_add_char(current_len: usize, c: char) -> bool {
    current_len < MAX_INPUT_LENGTH && !c.is_control()
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("{0} is required.")]
    Required(&'static str),

    #[error("Date is invalid.")]
    InvalidDate,

    #[error("{0} must be at most {max} characters.", max = MAX_FIELD_LENGTH)]
    TooLong(&'static str),
}

/// Validation failures keyed by field
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} field(s) need attention", .errors.len())]
pub struct FieldErrors<F> {
    errors: Vec<(F, FieldError)>,
}

impl<F> Default for FieldErrors<F> {
    fn default() -> Self {
        Self { errors: Vec::new() }
    }
}

impl<F: Copy + PartialEq> FieldErrors<F> {
    fn push(&mut self, field: F, error: FieldError) {
        self.errors.push((field, error));
    }

    pub fn get(&self, field: F) -> Option<&FieldError> {
        self.errors.iter().find(|(f, _)| *f == field).map(|(_, e)| e)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(F, FieldError)> {
        self.errors.iter()
    }
}

// ============================================================================
// Event form
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventField {
    Title,
    Description,
    Date,
    Location,
}

impl EventField {
    pub const ALL: [EventField; 4] = [
        EventField::Title,
        EventField::Description,
        EventField::Date,
        EventField::Location,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            EventField::Title => "Title",
            EventField::Description => "Description",
            EventField::Date => "Date",
            EventField::Location => "Location",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            EventField::Title => EventField::Description,
            EventField::Description => EventField::Date,
            EventField::Date => EventField::Location,
            EventField::Location => EventField::Title,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            EventField::Title => EventField::Location,
            EventField::Description => EventField::Title,
            EventField::Date => EventField::Description,
            EventField::Location => EventField::Date,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormMode {
    Create,
    Edit { original: Event },
}

/// Shared state of the add and edit event dialogs
#[derive(Debug, Clone)]
pub struct EventForm {
    mode: FormMode,
    pub title: String,
    pub description: String,
    pub date: String,
    pub location: String,
    pub focus: EventField,
    pub submitting: bool,
    errors: FieldErrors<EventField>,
}

impl EventForm {
    pub fn create() -> Self {
        Self {
            mode: FormMode::Create,
            title: String::new(),
            description: String::new(),
            date: String::new(),
            location: String::new(),
            focus: EventField::Title,
            submitting: false,
            errors: FieldErrors::default(),
        }
    }

    /// Form pre-filled from an existing event
    pub fn edit(event: &Event) -> Self {
        Self {
            title: event.title.clone(),
            description: event.description.clone().unwrap_or_default(),
            date: event.date_input_value(),
            location: event.location.clone().unwrap_or_default(),
            mode: FormMode::Edit {
                original: event.clone(),
            },
            focus: EventField::Title,
            submitting: false,
            errors: FieldErrors::default(),
        }
    }

    pub fn mode(&self) -> &FormMode {
        &self.mode
    }

    pub fn is_edit(&self) -> bool {
        matches!(self.mode, FormMode::Edit { .. })
    }

    /// Event being edited, if any
    pub fn original(&self) -> Option<&Event> {
        match &self.mode {
            FormMode::Edit { original } => Some(original),
            FormMode::Create => None,
        }
    }

    pub fn title_text(&self) -> &'static str {
        match self.mode {
            FormMode::Create => "Add Event",
            FormMode::Edit { .. } => "Edit Event",
        }
    }

    pub fn value(&self, field: EventField) -> &str {
        match field {
            EventField::Title => &self.title,
            EventField::Description => &self.description,
            EventField::Date => &self.date,
            EventField::Location => &self.location,
        }
    }

    fn value_mut(&mut self, field: EventField) -> &mut String {
        match field {
            EventField::Title => &mut self.title,
            EventField::Description => &mut self.description,
            EventField::Date => &mut self.date,
            EventField::Location => &mut self.location,
        }
    }

    pub fn push_char(&mut self, c: char) {
        let field = self.value_mut(self.focus);
        if can_add_char(field.chars().count(), c) {
            field.push(c);
        }
    }

    pub fn backspace(&mut self) {
        self.value_mut(self.focus).pop();
    }

    pub fn focus_next(&mut self) {
        self.focus = self.focus.next();
    }

    pub fn focus_prev(&mut self) {
        self.focus = self.focus.prev();
    }

    /// Required markers differ between modes
    pub fn is_required(&self, field: EventField) -> bool {
        match field {
            EventField::Title | EventField::Date => true,
            EventField::Location => !self.is_edit(),
            EventField::Description => false,
        }
    }

    pub fn errors(&self) -> &FieldErrors<EventField> {
        &self.errors
    }

    pub fn error(&self, field: EventField) -> Option<&FieldError> {
        self.errors.get(field)
    }

    pub fn validate(&self) -> FieldErrors<EventField> {
        let mut errors = FieldErrors::default();

        for field in EventField::ALL {
            let value = self.value(field);
            if self.is_required(field) && value.trim().is_empty() {
                errors.push(field, FieldError::Required(field.label()));
            } else if value.trim().chars().count() > MAX_FIELD_LENGTH {
                errors.push(field, FieldError::TooLong(field.label()));
            } else if field == EventField::Date
                && !value.trim().is_empty()
                && event_date::parse(value).is_none()
            {
                errors.push(field, FieldError::InvalidDate);
            }
        }

        errors
    }

    /// Run validation and keep the result for display. Returns true when valid.
    pub fn check(&mut self) -> bool {
        self.errors = self.validate();
        self.errors.is_empty()
    }

    fn initial(&self) -> Option<[String; 4]> {
        self.original().map(|event| {
            [
                event.title.clone(),
                event.description.clone().unwrap_or_default(),
                event.date_input_value(),
                event.location.clone().unwrap_or_default(),
            ]
        })
    }

    /// Whether any field differs from its starting value
    pub fn is_dirty(&self) -> bool {
        match self.initial() {
            Some(initial) => EventField::ALL
                .iter()
                .zip(initial.iter())
                .any(|(field, start)| self.value(*field) != start),
            None => EventField::ALL.iter().any(|f| !self.value(*f).is_empty()),
        }
    }

    /// Edit saves stay disabled until something changed
    pub fn can_submit(&self) -> bool {
        !self.submitting && (!self.is_edit() || self.is_dirty())
    }

    pub fn to_create(&self) -> Result<EventCreate, FieldErrors<EventField>> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(errors);
        }
        let date = event_date::parse(&self.date).ok_or_else(|| {
            let mut errors = FieldErrors::default();
            errors.push(EventField::Date, FieldError::InvalidDate);
            errors
        })?;

        Ok(EventCreate {
            title: self.title.trim().to_string(),
            description: non_blank(&self.description),
            date,
            location: self.location.trim().to_string(),
        })
    }

    /// Partial update holding only the fields that changed
    pub fn to_update(&self) -> Result<EventUpdate, FieldErrors<EventField>> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(errors);
        }
        let Some(original) = self.original() else {
            return Ok(EventUpdate::default());
        };

        let mut update = EventUpdate::default();

        let title = self.title.trim();
        if title != original.title {
            update.title = Some(title.to_string());
        }

        let description = non_blank(&self.description);
        if description != original.description {
            // Clearing a description sends an empty string
            update.description = Some(description.unwrap_or_default());
        }

        if let Some(date) = event_date::parse(&self.date) {
            if date != original.date {
                update.date = Some(date);
            }
        }

        if let Some(location) = non_blank(&self.location) {
            if Some(&location) != original.location.as_ref() {
                update.location = Some(location);
            }
        }

        Ok(update)
    }

    /// Back to an empty create form (or the original values when editing)
    pub fn reset(&mut self) {
        *self = match &self.mode {
            FormMode::Create => Self::create(),
            FormMode::Edit { original } => Self::edit(original),
        };
    }
}

// ============================================================================
// Registration dialog
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationField {
    Name,
    Email,
}

impl RegistrationField {
    pub fn label(&self) -> &'static str {
        match self {
            RegistrationField::Name => "Name",
            RegistrationField::Email => "Email",
        }
    }

    pub fn toggle(&self) -> Self {
        match self {
            RegistrationField::Name => RegistrationField::Email,
            RegistrationField::Email => RegistrationField::Name,
        }
    }
}

/// What the registration dialog hands back to the page on submit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationIntent {
    pub event_id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct RegistrationForm {
    event_id: Uuid,
    pub name: String,
    pub email: String,
    pub focus: RegistrationField,
    errors: FieldErrors<RegistrationField>,
}

impl RegistrationForm {
    pub fn new(event_id: Uuid, user: Option<&User>) -> Self {
        Self {
            event_id,
            name: user.map(|u| u.display_name().to_string()).unwrap_or_default(),
            email: user.map(|u| u.email.clone()).unwrap_or_default(),
            focus: RegistrationField::Name,
            errors: FieldErrors::default(),
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn value(&self, field: RegistrationField) -> &str {
        match field {
            RegistrationField::Name => &self.name,
            RegistrationField::Email => &self.email,
        }
    }

    pub fn push_char(&mut self, c: char) {
        let field = match self.focus {
            RegistrationField::Name => &mut self.name,
            RegistrationField::Email => &mut self.email,
        };
        if can_add_char(field.chars().count(), c) {
            field.push(c);
        }
    }

    pub fn backspace(&mut self) {
        match self.focus {
            RegistrationField::Name => self.name.pop(),
            RegistrationField::Email => self.email.pop(),
        };
    }

    pub fn toggle_focus(&mut self) {
        self.focus = self.focus.toggle();
    }

    pub fn error(&self, field: RegistrationField) -> Option<&FieldError> {
        self.errors.get(field)
    }

    /// Validate and produce the intent, keeping errors for display on failure
    pub fn submit(&mut self) -> Option<RegistrationIntent> {
        let mut errors = FieldErrors::default();
        for field in [RegistrationField::Name, RegistrationField::Email] {
            if self.value(field).trim().is_empty() {
                errors.push(field, FieldError::Required(field.label()));
            }
        }
        self.errors = errors;

        if !self.errors.is_empty() {
            return None;
        }
        Some(RegistrationIntent {
            event_id: self.event_id,
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NO_NAME_PROVIDED;
    use chrono::NaiveDate;

    fn sample_event() -> Event {
        Event {
            id: Uuid::new_v4(),
            title: "Cleanup".to_string(),
            description: Some("Bring gloves".to_string()),
            date: NaiveDate::from_ymd_opt(2026, 4, 12)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
            location: Some("Riverside".to_string()),
            organizer_id: None,
        }
    }

    fn filled_create() -> EventForm {
        let mut form = EventForm::create();
        form.title = "Potluck".into();
        form.date = "2026-06-01T18:00".into();
        form.location = "Hall".into();
        form
    }

    #[test]
    fn test_empty_create_form_errors() {
        let mut form = EventForm::create();
        assert!(!form.check());
        assert_eq!(form.error(EventField::Title).unwrap().to_string(), "Title is required.");
        assert_eq!(form.error(EventField::Date).unwrap().to_string(), "Date is required.");
        assert_eq!(
            form.error(EventField::Location).unwrap().to_string(),
            "Location is required."
        );
        assert!(form.error(EventField::Description).is_none());
        assert!(form.to_create().is_err());
    }

    #[test]
    fn test_missing_title_blocks_create() {
        let mut form = filled_create();
        form.title = "   ".into();
        let errors = form.to_create().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get(EventField::Title), Some(&FieldError::Required("Title")));
    }

    #[test]
    fn test_invalid_and_long_values() {
        let mut form = filled_create();
        form.date = "next tuesday".into();
        form.description = "x".repeat(MAX_FIELD_LENGTH + 1);
        let errors = form.validate();
        assert_eq!(errors.get(EventField::Date), Some(&FieldError::InvalidDate));
        assert_eq!(
            errors.get(EventField::Description).unwrap().to_string(),
            "Description must be at most 255 characters."
        );
    }

    #[test]
    fn test_to_create_payload() {
        let mut form = filled_create();
        form.description = "  ".into();
        let create = form.to_create().unwrap();
        assert_eq!(create.title, "Potluck");
        assert_eq!(create.description, None);
        assert_eq!(create.location, "Hall");
        assert_eq!(create.date.format("%Y-%m-%d %H:%M").to_string(), "2026-06-01 18:00");
    }

    #[test]
    fn test_edit_requires_changes() {
        let event = sample_event();
        let mut form = EventForm::edit(&event);
        assert!(form.is_edit());
        assert!(!form.is_dirty());
        assert!(!form.can_submit());

        form.focus = EventField::Title;
        form.push_char('!');
        assert!(form.is_dirty());
        assert!(form.can_submit());

        form.backspace();
        assert!(!form.is_dirty());
    }

    #[test]
    fn test_edit_sends_only_changed_fields() {
        let event = sample_event();
        let mut form = EventForm::edit(&event);
        form.location = "Harbor".into();
        let update = form.to_update().unwrap();
        assert_eq!(
            update,
            EventUpdate {
                location: Some("Harbor".into()),
                ..EventUpdate::default()
            }
        );

        form.location = String::new();
        form.description = String::new();
        form.date = "2026-04-13T09:30".into();
        let update = form.to_update().unwrap();
        assert_eq!(update.description, Some(String::new()));
        assert!(update.location.is_none());
        assert!(update.date.is_some());
        assert!(update.title.is_none());
    }

    #[test]
    fn test_edit_location_optional() {
        let mut event = sample_event();
        event.location = None;
        let mut form = EventForm::edit(&event);
        assert!(form.check());
        form.title.clear();
        assert!(!form.check());
    }

    #[test]
    fn test_reset() {
        let mut form = filled_create();
        form.submitting = true;
        form.reset();
        assert!(!form.is_dirty());
        assert!(!form.submitting);
    }

    #[test]
    fn test_control_chars_rejected() {
        let mut form = EventForm::create();
        form.push_char('\n');
        form.push_char('a');
        assert_eq!(form.title, "a");
        assert!(!can_add_char(MAX_INPUT_LENGTH, 'a'));
    }

    #[test]
    fn test_registration_prefill_and_intent() {
        let user: User = serde_json::from_str(
            r#"{"id":"0b6f5d7e-1c2a-4f57-9d8e-3a4b5c6d7e8f","email":"sam@example.com"}"#,
        )
        .unwrap();
        let event_id = Uuid::new_v4();
        let mut form = RegistrationForm::new(event_id, Some(&user));
        assert_eq!(form.name, NO_NAME_PROVIDED);
        assert_eq!(form.email, "sam@example.com");

        let intent = form.submit().unwrap();
        assert_eq!(intent.event_id, event_id);
        assert_eq!(intent.email, "sam@example.com");
    }

    #[test]
    fn test_registration_requires_fields() {
        let mut form = RegistrationForm::new(Uuid::new_v4(), None);
        assert!(form.submit().is_none());
        assert_eq!(
            form.error(RegistrationField::Name).unwrap().to_string(),
            "Name is required."
        );
        assert_eq!(
            form.error(RegistrationField::Email).unwrap().to_string(),
            "Email is required."
        );

        form.push_char('A');
        form.toggle_focus();
        for c in "a@b.c".chars() {
            form.push_char(c);
        }
        assert!(form.submit().is_some());
        assert!(form.error(RegistrationField::Name).is_none());
    }
}
