//! Application-wide constants
//!
//! Centralized location for magic strings and configuration values
//! that are used across multiple modules.

/// Default REST API base URL (the self-hosted backend)
pub const DEFAULT_API_BASE: &str = "http://localhost:3000/api";

/// Greeting shown when a transcript would otherwise be empty
pub const WELCOME_MESSAGE: &str =
    "Hi! I'm your memory assistant. Ask me anything about your captured moments.";

/// Content used for the optimistic user message when only an image is sent
pub const IMAGE_ONLY_PLACEHOLDER: &str = "Sent an image";

/// Assistant reply substituted when a send fails
pub const SEND_FAILURE_REPLY: &str =
    "Sorry, something went wrong while looking through your memories. Please try again.";

// Toast defaults
/// Maximum number of toasts held at once; the oldest is evicted past this
pub const TOAST_CAPACITY: usize = 4;
/// Default toast display duration in milliseconds
pub const DEFAULT_TOAST_DURATION_MS: i64 = 4500;

/// Filename (under the data dir) holding the persisted active session id
pub const ACTIVE_SESSION_FILE: &str = "active_session.json";

/// Default send timeout in seconds; a hung call becomes an ordinary failure
pub const DEFAULT_SEND_TIMEOUT_SECS: u64 = 30;
