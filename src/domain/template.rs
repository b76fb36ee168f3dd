use std::collections::BTreeMap;

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

use super::Recipient;

/// Company details shown in the header and footer of every email.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Company {
    pub name: String,
    pub address: String,
    pub support_email: String,
    pub website: String,
    #[serde(default)]
    pub social_media: BTreeMap<String, String>,
    #[serde(default)]
    pub logo_url: Option<String>,
}

/// The person an email greets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TemplateUser {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub action_url: Option<String>,
    #[serde(default)]
    pub action_text: Option<String>,
    #[serde(default)]
    pub additional_info: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    #[default]
    Info,
    Warning,
    Error,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Info => "info",
            AlertLevel::Warning => "warning",
            AlertLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Alert {
    pub title: String,
    pub message: String,
    #[serde(default, rename = "type")]
    pub level: AlertLevel,
    #[serde(default)]
    pub steps: Option<Vec<String>>,
    #[serde(default)]
    pub action_url: Option<String>,
    #[serde(default)]
    pub action_text: Option<String>,
    #[serde(default = "default_contact_support")]
    pub contact_support: bool,
}

fn default_contact_support() -> bool {
    true
}

fn default_expires_in() -> u32 {
    24
}

/// Which template to render, together with the fields only that template uses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TemplateKind {
    Welcome {
        dashboard_url: String,
    },
    PasswordReset {
        reset_url: String,
        /// Hours until the reset link stops working.
        #[serde(default = "default_expires_in")]
        expires_in: u32,
    },
    Notification {
        notification: Notification,
        preferences_url: String,
    },
    Alert {
        alert: Alert,
    },
}

impl TemplateKind {
    pub fn template_id(&self) -> &'static str {
        match self {
            TemplateKind::Welcome { .. } => "welcome.html",
            TemplateKind::PasswordReset { .. } => "password_reset.html",
            TemplateKind::Notification { .. } => "notification.html",
            TemplateKind::Alert { .. } => "alert.html",
        }
    }
}

/// Everything shared by all recipients of one send request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDescriptor {
    pub company: Company,
    pub user: Option<TemplateUser>,
    pub year: i32,
    pub kind: TemplateKind,
}

impl TemplateDescriptor {
    pub fn new(company: Company, user: Option<TemplateUser>, kind: TemplateKind) -> Self {
        Self {
            company,
            user,
            year: Utc::now().year(),
            kind,
        }
    }

    pub fn template_id(&self) -> &'static str {
        self.kind.template_id()
    }

    /// Subject line used when the caller does not supply one.
    pub fn default_subject(&self) -> String {
        match &self.kind {
            TemplateKind::Welcome { .. } => format!("¡Bienvenido a {}!", self.company.name),
            TemplateKind::PasswordReset { .. } => "Restablecimiento de contraseña".to_string(),
            TemplateKind::Notification { notification, .. } => notification.title.clone(),
            TemplateKind::Alert { alert } => alert.title.clone(),
        }
    }

    /// Returns the name of the first required field that is blank.
    pub fn validate(&self) -> Result<(), &'static str> {
        fn blank(value: &str) -> bool {
            value.trim().is_empty()
        }

        if blank(&self.company.name) {
            return Err("company.name");
        }
        match &self.kind {
            TemplateKind::Welcome { dashboard_url } if blank(dashboard_url) => {
                Err("dashboard_url")
            }
            TemplateKind::PasswordReset { reset_url, .. } if blank(reset_url) => Err("reset_url"),
            TemplateKind::Notification { notification, .. } if blank(&notification.title) => {
                Err("notification.title")
            }
            TemplateKind::Notification { notification, .. } if blank(&notification.message) => {
                Err("notification.message")
            }
            TemplateKind::Alert { alert } if blank(&alert.title) => Err("alert.title"),
            TemplateKind::Alert { alert } if blank(&alert.message) => Err("alert.message"),
            _ => Ok(()),
        }
    }

    /// A copy addressed to `recipient`. Only a descriptor that already greets a
    /// user is rewritten; the name falls back to the existing one, then to
    /// `placeholder_name`.
    pub fn personalized_for(&self, recipient: &Recipient, placeholder_name: &str) -> Self {
        let mut context = self.clone();
        if let Some(user) = context.user.as_mut() {
            let name = recipient
                .display_name
                .clone()
                .filter(|name| !name.trim().is_empty())
                .or_else(|| user.name.take())
                .unwrap_or_else(|| placeholder_name.to_string());
            *user = TemplateUser {
                name: Some(name),
                email: recipient.email.clone(),
            };
        }
        context
    }
}
