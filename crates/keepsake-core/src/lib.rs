pub mod api;
pub mod attachment;
pub mod config;
pub mod constants;
pub mod controller;
pub mod directory;
pub mod events;
pub mod models;
pub mod storage;
pub mod toast;
pub mod tracing_setup;

// Re-export the types a shell needs at crate root for convenience
pub use api::{HttpMemoryApi, MemoryApi};
pub use controller::{ChatController, ControllerState};
pub use events::EventBus;
pub use toast::{Toast, ToastHost, ToastVariant};
