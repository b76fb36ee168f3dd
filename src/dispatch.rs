use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    domain::{Recipient, TemplateDescriptor},
    email_client::{MessageSender, OutgoingMessage, ProviderError},
    rendering::{RenderError, TemplateRenderer},
};

/// Outcome of one attempted delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SendResult {
    Success { email: String, message_id: String },
    Failure { email: String, error_detail: String },
}

impl SendResult {
    pub fn is_success(&self) -> bool {
        matches!(self, SendResult::Success { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub sent: usize,
    pub failed: usize,
    pub total: usize,
    pub results: Vec<SendResult>,
}

impl BatchOutcome {
    pub fn from_results(results: Vec<SendResult>) -> Self {
        let sent = results.iter().filter(|r| r.is_success()).count();
        let total = results.len();
        Self {
            sent,
            failed: total - sent,
            total,
            results,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &SendResult> {
        self.results.iter().filter(|r| !r.is_success())
    }
}

/// What a personalized send does when one recipient fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the first render or provider error and return it.
    #[default]
    FailFast,
    /// Record the failure and carry on with the next recipient.
    Isolate,
}

#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Overrides the configured sender.
    pub from: Option<Recipient>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub personalize: bool,
    pub on_failure: FailurePolicy,
}

#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    #[error("at least one recipient is required")]
    EmptyRecipientList,
    #[error("missing required field {0}")]
    MissingRequiredField(&'static str),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("couldn't send email to {email}, {source}")]
    Provider {
        email: String,
        #[source]
        source: ProviderError,
    },
}

/// Renders and sends one template to many recipients, one message at a time.
#[derive(Clone)]
pub struct Dispatcher {
    renderer: Arc<dyn TemplateRenderer>,
    sender: Arc<dyn MessageSender>,
    from: String,
    placeholder_name: String,
}

impl Dispatcher {
    pub fn new(
        renderer: Arc<dyn TemplateRenderer>,
        sender: Arc<dyn MessageSender>,
        from: String,
        placeholder_name: String,
    ) -> Self {
        Self {
            renderer,
            sender,
            from,
            placeholder_name,
        }
    }

    /// Sends `template` to every recipient separately. Failures are recorded in
    /// the outcome and never stop the remaining sends.
    #[tracing::instrument(
        name = "Sending a batch of emails",
        skip(self, template, recipients),
        fields(template = %template.template_id(), recipients = recipients.len())
    )]
    pub async fn send_batch(
        &self,
        template: &TemplateDescriptor,
        recipients: &[Recipient],
        subject: &str,
    ) -> Result<BatchOutcome, DispatchError> {
        if recipients.is_empty() {
            return Err(DispatchError::EmptyRecipientList);
        }
        template
            .validate()
            .map_err(DispatchError::MissingRequiredField)?;

        let mut results = Vec::with_capacity(recipients.len());
        for recipient in recipients.iter().filter(|r| r.has_email()) {
            let result = self
                .send_personalized(template, recipient, subject, &self.from, &[], &[])
                .await;
            results.push(record(recipient, result));
        }

        let outcome = BatchOutcome::from_results(results);
        tracing::info!(
            sent = outcome.sent,
            failed = outcome.failed,
            total = outcome.total,
            "Batch finished"
        );
        Ok(outcome)
    }

    /// Without `personalize`, renders once and sends a single message to all
    /// of `to`. With it, sends one message per recipient and handles failures
    /// according to `options.on_failure`.
    #[tracing::instrument(
        name = "Sending an email",
        skip(self, template, to, options),
        fields(
            template = %template.template_id(),
            recipients = to.len(),
            personalize = options.personalize
        )
    )]
    pub async fn send(
        &self,
        template: &TemplateDescriptor,
        to: &[Recipient],
        subject: &str,
        options: &SendOptions,
    ) -> Result<Vec<SendResult>, DispatchError> {
        let to: Vec<&Recipient> = to.iter().filter(|r| r.has_email()).collect();
        if to.is_empty() {
            return Err(DispatchError::EmptyRecipientList);
        }
        template
            .validate()
            .map_err(DispatchError::MissingRequiredField)?;

        let from = options
            .from
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| self.from.clone());

        if !options.personalize {
            let html = self.renderer.render(template)?;
            let addresses = to
                .iter()
                .map(|r| r.email.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let message = OutgoingMessage {
                from,
                to: to.iter().map(ToString::to_string).collect(),
                subject: subject.to_string(),
                html,
                cc: options.cc.clone(),
                bcc: options.bcc.clone(),
            };
            let message_id = self.sender.send(&message).await.map_err(|source| {
                DispatchError::Provider {
                    email: addresses.clone(),
                    source,
                }
            })?;
            return Ok(vec![SendResult::Success {
                email: addresses,
                message_id,
            }]);
        }

        let mut results = Vec::with_capacity(to.len());
        for recipient in to {
            let result = self
                .send_personalized(template, recipient, subject, &from, &options.cc, &options.bcc)
                .await;
            match (result, options.on_failure) {
                (Err(e), FailurePolicy::FailFast) => return Err(e),
                (result, _) => results.push(record(recipient, result)),
            }
        }
        Ok(results)
    }

    async fn send_personalized(
        &self,
        template: &TemplateDescriptor,
        recipient: &Recipient,
        subject: &str,
        from: &str,
        cc: &[String],
        bcc: &[String],
    ) -> Result<String, DispatchError> {
        let context = template.personalized_for(recipient, &self.placeholder_name);
        let html = self.renderer.render(&context)?;
        let message = OutgoingMessage {
            from: from.to_string(),
            to: vec![recipient.to_string()],
            subject: subject.to_string(),
            html,
            cc: cc.to_vec(),
            bcc: bcc.to_vec(),
        };
        self.sender
            .send(&message)
            .await
            .map_err(|source| DispatchError::Provider {
                email: recipient.email.clone(),
                source,
            })
    }
}

fn record(recipient: &Recipient, result: Result<String, DispatchError>) -> SendResult {
    match result {
        Ok(message_id) => SendResult::Success {
            email: recipient.email.clone(),
            message_id,
        },
        Err(e) => {
            tracing::error!(email = %recipient.email, error = %e, "Failed to send email");
            let error_detail = match e {
                DispatchError::Provider { source, .. } => source.to_string(),
                other => other.to_string(),
            };
            SendResult::Failure {
                email: recipient.email.clone(),
                error_detail,
            }
        }
    }
}
