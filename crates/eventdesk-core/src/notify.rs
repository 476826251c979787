//! Transient notifications and the shared error-to-message handler.

use tracing::error;

use crate::api::ApiError;

/// Fallback text when an error carries no server message
pub const GENERIC_ERROR: &str = "Something went wrong.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub title: String,
    pub description: String,
    pub level: ToastLevel,
}

impl Toast {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            level: ToastLevel::Success,
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            level: ToastLevel::Error,
        }
    }

    /// Toast for a failed API call, using the server's detail when it sent one
    pub fn from_error(err: &anyhow::Error) -> Self {
        Self::error("Error", error_message(err))
    }

    pub fn is_error(&self) -> bool {
        self.level == ToastLevel::Error
    }
}

/// User-facing text for an error. Server details win; everything else is
/// logged and reported generically.
pub fn error_message(err: &anyhow::Error) -> String {
    let api_error = err.chain().find_map(|cause| cause.downcast_ref::<ApiError>());
    if let Some(detail) = api_error.and_then(ApiError::detail) {
        return detail.to_string();
    }
    error!(error = %format!("{:#}", err), "Request failed");
    GENERIC_ERROR.to_string()
}
