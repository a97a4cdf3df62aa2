//! HTTP endpoint handlers.

mod callback;
mod extract;
mod health;

use serde::Serialize;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub use callback::whatsapp_callback;
pub use extract::extract_data;
pub use health::health;
