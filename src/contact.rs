use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::MessageResponse,
    error::{AppError, Result},
    extract::AppJson,
    mailer::{Mail, MailFormat},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
}

impl ContactRequest {
    fn is_complete(&self) -> bool {
        [&self.name, &self.email, &self.phone, &self.subject, &self.message]
            .iter()
            .all(|v| !v.trim().is_empty())
    }

    fn into_mail(self, to: &str) -> Mail {
        Mail {
            to: to.to_string(),
            subject: format!("Contact Form: {}", self.subject),
            body: format!(
                "Name: {}\nEmail: {}\nPhone: {}\n\nMessage:\n{}",
                self.name, self.email, self.phone, self.message
            ),
            format: MailFormat::Plain,
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/contact-us", post(contact_us))
}

#[instrument(skip(state, payload))]
pub async fn contact_us(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ContactRequest>,
) -> Result<Response> {
    if !payload.is_complete() {
        warn!("incomplete contact form");
        return Err(AppError::bad_request("All fields are required."));
    }

    let mail = payload.into_mail(state.mailer.contact_recipient());
    if let Err(e) = state.mailer.send(mail).await {
        error!(error = ?e, "contact mail failed");
        let body = Json(json!({ "error": "Failed to send your message." }));
        return Ok((StatusCode::INTERNAL_SERVER_ERROR, body).into_response());
    }

    info!("contact message forwarded");
    Ok(Json(MessageResponse::new("Your message has been sent successfully!")).into_response())
}
