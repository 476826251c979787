//! REST API client module for the events service.
//!
//! This module provides the `ApiClient` for communicating with the events
//! backend (list, create, update, delete, register, unregister) and the
//! `EventsApi` trait the controllers depend on.
//!
//! The API uses bearer token authentication obtained from the
//! `/login/access-token` endpoint.

pub mod client;
pub mod error;

pub use client::{ApiClient, EventsApi, DEFAULT_BASE_URL};
pub use error::ApiError;
