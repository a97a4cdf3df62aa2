use axum::http::StatusCode;

/// Delivery-status callback from the messaging provider. Logged only.
pub async fn whatsapp_callback(body: String) -> StatusCode {
    tracing::info!(body = %body, "WhatsApp delivery callback");
    StatusCode::OK
}
