use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{
    dispatch::{DispatchError, FailurePolicy, SendOptions, SendResult},
    domain::{
        Alert, Company, Notification, Recipient, RecipientEmail, TemplateDescriptor,
        TemplateKind, TemplateUser,
    },
    startup::AppState,
};

/// Extra addressees copied on a message.
#[derive(Deserialize, Default)]
pub struct Copies {
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
}

impl Copies {
    fn parse(self) -> Result<(Vec<String>, Vec<String>), EmailError> {
        let parse_all = |addresses: Vec<String>| {
            addresses
                .into_iter()
                .map(|a| RecipientEmail::parse(a).map(|e| e.as_ref().to_owned()))
                .collect::<Result<Vec<_>, _>>()
                .map_err(EmailError::InvalidRecipient)
        };
        Ok((parse_all(self.cc)?, parse_all(self.bcc)?))
    }
}

#[derive(Deserialize)]
pub struct WelcomeRequest {
    pub company: Company,
    pub user: Recipient,
    pub dashboard_url: String,
    #[serde(flatten)]
    pub copies: Copies,
}

#[derive(Deserialize)]
pub struct PasswordResetRequest {
    pub company: Company,
    pub user: Recipient,
    pub reset_url: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: u32,
    #[serde(flatten)]
    pub copies: Copies,
}

fn default_expires_in() -> u32 {
    24
}

#[derive(Deserialize)]
pub struct NotificationRequest {
    pub company: Company,
    pub user: Recipient,
    pub notification: Notification,
    pub preferences_url: String,
    #[serde(flatten)]
    pub copies: Copies,
}

#[derive(Deserialize)]
pub struct AlertRequest {
    pub company: Company,
    pub user: Recipient,
    pub alert: Alert,
    #[serde(flatten)]
    pub copies: Copies,
}

#[derive(Serialize)]
pub struct MessageSent {
    pub status: &'static str,
    pub message_id: String,
}

#[tracing::instrument(
    name = "Sending a welcome email",
    skip(app_state, request),
    fields(recipient_email = %request.user.email)
)]
pub async fn send_welcome(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<WelcomeRequest>,
) -> Result<Json<MessageSent>, EmailError> {
    let kind = TemplateKind::Welcome {
        dashboard_url: request.dashboard_url,
    };
    send_to_user(&app_state, request.company, request.user, kind, request.copies).await
}

#[tracing::instrument(
    name = "Sending a password reset email",
    skip(app_state, request),
    fields(recipient_email = %request.user.email)
)]
pub async fn send_password_reset(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<PasswordResetRequest>,
) -> Result<Json<MessageSent>, EmailError> {
    let kind = TemplateKind::PasswordReset {
        reset_url: request.reset_url,
        expires_in: request.expires_in,
    };
    send_to_user(&app_state, request.company, request.user, kind, request.copies).await
}

#[tracing::instrument(
    name = "Sending a notification email",
    skip(app_state, request),
    fields(recipient_email = %request.user.email)
)]
pub async fn send_notification(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<NotificationRequest>,
) -> Result<Json<MessageSent>, EmailError> {
    let kind = TemplateKind::Notification {
        notification: request.notification,
        preferences_url: request.preferences_url,
    };
    send_to_user(&app_state, request.company, request.user, kind, request.copies).await
}

#[tracing::instrument(
    name = "Sending an alert email",
    skip(app_state, request),
    fields(recipient_email = %request.user.email)
)]
pub async fn send_alert(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<AlertRequest>,
) -> Result<Json<MessageSent>, EmailError> {
    let kind = TemplateKind::Alert {
        alert: request.alert,
    };
    send_to_user(&app_state, request.company, request.user, kind, request.copies).await
}

async fn send_to_user(
    app_state: &AppState,
    company: Company,
    user: Recipient,
    kind: TemplateKind,
    copies: Copies,
) -> Result<Json<MessageSent>, EmailError> {
    let user = Recipient::parse(user.email, user.display_name)
        .map_err(EmailError::InvalidRecipient)?;
    let (cc, bcc) = copies.parse()?;

    let template = TemplateDescriptor::new(
        company,
        Some(TemplateUser {
            name: user.display_name.clone(),
            email: user.email.clone(),
        }),
        kind,
    );
    let subject = template.default_subject();
    let options = SendOptions {
        cc,
        bcc,
        ..Default::default()
    };

    let results = app_state
        .dispatcher
        .send(&template, std::slice::from_ref(&user), &subject, &options)
        .await?;

    Ok(Json(MessageSent {
        status: "success",
        message_id: delivered_message_id(results)?,
    }))
}

fn delivered_message_id(results: Vec<SendResult>) -> Result<String, EmailError> {
    results
        .into_iter()
        .find_map(|result| match result {
            SendResult::Success { message_id, .. } => Some(message_id),
            SendResult::Failure { .. } => None,
        })
        .ok_or(EmailError::NotDelivered)
}

#[derive(Deserialize)]
pub struct SendRequest {
    pub company: Company,
    pub template: TemplateKind,
    pub to: Vec<Recipient>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(flatten)]
    pub copies: Copies,
    #[serde(default)]
    pub personalize: bool,
    #[serde(default)]
    pub on_failure: FailurePolicy,
}

#[derive(Serialize)]
pub struct MessagesSent {
    pub status: &'static str,
    pub message_ids: Vec<String>,
    pub failures: Vec<SendResult>,
}

#[tracing::instrument(
    name = "Sending a templated email",
    skip(app_state, request),
    fields(recipients = request.to.len(), personalize = request.personalize)
)]
pub async fn send_email(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<SendRequest>,
) -> Result<Json<MessagesSent>, EmailError> {
    let to = request
        .to
        .into_iter()
        .filter(Recipient::has_email)
        .map(|r| Recipient::parse(r.email, r.display_name))
        .collect::<Result<Vec<_>, _>>()
        .map_err(EmailError::InvalidRecipient)?;
    let (cc, bcc) = request.copies.parse()?;

    // A joint message only greets its addressee when there is exactly one.
    let user = match to.as_slice() {
        _ if request.personalize => Some(TemplateUser::default()),
        [only] => Some(TemplateUser {
            name: only.display_name.clone(),
            email: only.email.clone(),
        }),
        _ => None,
    };
    let template = TemplateDescriptor::new(request.company, user, request.template);
    let subject = request
        .subject
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| template.default_subject());
    let options = SendOptions {
        from: None,
        cc,
        bcc,
        personalize: request.personalize,
        on_failure: request.on_failure,
    };

    let results = app_state
        .dispatcher
        .send(&template, &to, &subject, &options)
        .await?;

    let (succeeded, failures): (Vec<_>, Vec<_>) =
        results.into_iter().partition(SendResult::is_success);
    let message_ids = succeeded
        .into_iter()
        .filter_map(|result| match result {
            SendResult::Success { message_id, .. } => Some(message_id),
            SendResult::Failure { .. } => None,
        })
        .collect();

    Ok(Json(MessagesSent {
        status: if failures.is_empty() { "success" } else { "partial" },
        message_ids,
        failures,
    }))
}

#[derive(thiserror::Error, Debug)]
pub enum EmailError {
    #[error("invalid recipient, {0}")]
    InvalidRecipient(String),
    #[error("the email was not delivered")]
    NotDelivered,
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    detail: String,
}

impl IntoResponse for EmailError {
    fn into_response(self) -> Response {
        tracing::error!("{}", self);
        let status = match &self {
            EmailError::InvalidRecipient(_)
            | EmailError::Dispatch(DispatchError::EmptyRecipientList)
            | EmailError::Dispatch(DispatchError::MissingRequiredField(_)) => {
                StatusCode::BAD_REQUEST
            }
            EmailError::NotDelivered
            | EmailError::Dispatch(DispatchError::Render(_))
            | EmailError::Dispatch(DispatchError::Provider { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = ErrorBody {
            status: "error",
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
