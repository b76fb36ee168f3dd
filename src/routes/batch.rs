use std::{collections::HashSet, sync::Arc};

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::{
    dispatch::SendResult,
    domain::{
        Company, Recipient, RecipientName, TemplateDescriptor, TemplateKind, TemplateUser,
        validate_addresses,
    },
    startup::AppState,
};

use super::EmailError;

#[derive(Deserialize)]
pub struct BatchRequest {
    pub company: Company,
    pub template: TemplateKind,
    pub recipients: Vec<Recipient>,
    #[serde(default)]
    pub subject: Option<String>,
}

#[derive(Serialize)]
pub struct BatchSent {
    pub status: &'static str,
    pub sent: usize,
    pub failed: usize,
    pub total: usize,
    pub invalid: Vec<String>,
    pub failures: Vec<SendResult>,
}

#[tracing::instrument(
    name = "Sending a batch email",
    skip(app_state, request),
    fields(recipients = request.recipients.len())
)]
pub async fn send_batch(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<BatchRequest>,
) -> Result<Json<BatchSent>, EmailError> {
    let mut invalid = Vec::new();
    let mut recipients = Vec::with_capacity(request.recipients.len());
    for recipient in request.recipients.into_iter().filter(Recipient::has_email) {
        let email = recipient.email.trim().to_string();
        let display_name = match recipient
            .display_name
            .filter(|name| !name.trim().is_empty())
            .map(RecipientName::parse)
            .transpose()
        {
            Ok(name) => name.map(RecipientName::into_inner),
            Err(e) => {
                tracing::warn!(%email, error = %e, "Skipping recipient with an invalid name");
                invalid.push(email);
                continue;
            }
        };
        recipients.push(Recipient {
            email,
            display_name,
        });
    }

    let (valid, invalid_addresses) =
        validate_addresses(recipients.iter().map(|r| r.email.clone()));
    if !invalid_addresses.is_empty() {
        tracing::warn!(invalid = ?invalid_addresses, "Skipping invalid recipient addresses");
    }
    invalid.extend(invalid_addresses);
    let valid: HashSet<String> = valid.into_iter().collect();
    let recipients: Vec<Recipient> = recipients
        .into_iter()
        .filter(|r| valid.contains(&r.email))
        .collect();

    let template = TemplateDescriptor::new(
        request.company,
        Some(TemplateUser::default()),
        request.template,
    );
    let subject = request
        .subject
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| template.default_subject());

    let outcome = app_state
        .dispatcher
        .send_batch(&template, &recipients, &subject)
        .await?;
    let failures = outcome.failures().cloned().collect();

    Ok(Json(BatchSent {
        status: "success",
        sent: outcome.sent,
        failed: outcome.failed,
        total: outcome.total,
        invalid,
        failures,
    }))
}
