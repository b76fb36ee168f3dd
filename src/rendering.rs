use rinja::Template;

use crate::domain::{Alert, Company, Notification, TemplateDescriptor, TemplateKind, TemplateUser};

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("template {0} is not available")]
    MissingTemplate(String),
    #[error("failed to render template {template}, {source}")]
    Rendering {
        template: &'static str,
        #[source]
        source: rinja::Error,
    },
}

/// Turns a template context into an HTML body.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, context: &TemplateDescriptor) -> Result<String, RenderError>;
}

#[derive(Template)]
#[template(path = "welcome.html")]
struct WelcomeTemplate<'a> {
    company: &'a Company,
    user: Option<&'a TemplateUser>,
    year: i32,
    dashboard_url: &'a str,
}

#[derive(Template)]
#[template(path = "password_reset.html")]
struct PasswordResetTemplate<'a> {
    company: &'a Company,
    user: Option<&'a TemplateUser>,
    year: i32,
    reset_url: &'a str,
    expires_in: u32,
}

#[derive(Template)]
#[template(path = "notification.html")]
struct NotificationTemplate<'a> {
    company: &'a Company,
    user: Option<&'a TemplateUser>,
    year: i32,
    notification: &'a Notification,
    preferences_url: &'a str,
}

#[derive(Template)]
#[template(path = "alert.html")]
struct AlertTemplate<'a> {
    company: &'a Company,
    user: Option<&'a TemplateUser>,
    year: i32,
    alert: &'a Alert,
}

/// Renders the compiled-in templates under `templates/`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl TemplateRenderer for HtmlRenderer {
    fn render(&self, context: &TemplateDescriptor) -> Result<String, RenderError> {
        let company = &context.company;
        let user = context.user.as_ref();
        let year = context.year;

        let rendered = match &context.kind {
            TemplateKind::Welcome { dashboard_url } => WelcomeTemplate {
                company,
                user,
                year,
                dashboard_url,
            }
            .render(),
            TemplateKind::PasswordReset {
                reset_url,
                expires_in,
            } => PasswordResetTemplate {
                company,
                user,
                year,
                reset_url,
                expires_in: *expires_in,
            }
            .render(),
            TemplateKind::Notification {
                notification,
                preferences_url,
            } => NotificationTemplate {
                company,
                user,
                year,
                notification,
                preferences_url,
            }
            .render(),
            TemplateKind::Alert { alert } => AlertTemplate {
                company,
                user,
                year,
                alert,
            }
            .render(),
        };

        rendered.map_err(|source| RenderError::Rendering {
            template: context.template_id(),
            source,
        })
    }
}
