//! Core library for eventdesk.
//!
//! Everything the events screen needs apart from drawing it: the REST client,
//! session handling, the shared query cache, the paginated table, the event
//! and registration forms, and the page controller that ties them together.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod forms;
pub mod models;
pub mod notify;
pub mod page;
pub mod table;
pub mod utils;

pub use api::{ApiClient, ApiError, EventsApi};
pub use config::Config;
pub use page::{EventsPage, Modal, Mutation, MutationOutcome};
pub use table::{EventsTable, TableConfig};
