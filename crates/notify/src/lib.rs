//! Notification composition and delivery for matched tenders.
//!
//! This crate provides:
//! - `Composer` turning a match group into one payload per recipient
//! - Free-text (minijinja) and placeholder message renderers
//! - `Transport` trait with Infobip WhatsApp and dry-run implementations
//! - `Dispatcher` delivering payloads concurrently and collecting outcomes

pub mod compose;
pub mod dispatcher;
pub mod infobip;
pub mod log;
pub mod templating;
pub mod traits;

pub use compose::{Composer, Envelope, FreeTextRenderer, MessageRenderer, PlaceholderRenderer};
pub use dispatcher::{DispatchReport, Dispatcher};
pub use infobip::InfobipTransport;
pub use log::LogTransport;
pub use traits::{
    DispatchResult, MessageContent, NotificationPayload, NotifyError, Transport, TransportResponse,
};
