//! Data models for the events service.
//!
//! This module contains the wire types exchanged with the backend:
//!
//! - `Event`, `EventCreate`, `EventUpdate`: events and their mutation payloads
//! - `EventsResponse`: one page of the events collection
//! - `EventRegistration`, `Message`: registration and acknowledgement bodies
//! - `User`, `Token`: the signed-in account

pub mod event;
pub mod user;

pub use event::{
    event_date, Event, EventCreate, EventRegistration, EventUpdate, EventsResponse, Message,
    MAX_FIELD_LENGTH,
};
pub use user::{Token, User, NO_NAME_PROVIDED};
