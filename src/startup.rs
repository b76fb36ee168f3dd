use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    extract::Request,
    response::Response,
    routing::{get, post},
    serve::Serve,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{Span, info, info_span};
use uuid::Uuid;

use crate::{
    configuration::{EmailClientSettings, Settings},
    dispatch::Dispatcher,
    email_client::{ConsoleSender, EmailClient, MessageSender},
    rendering::HtmlRenderer,
    routes::{
        health_check, send_alert, send_batch, send_email, send_notification,
        send_password_reset, send_welcome,
    },
};

pub struct AppState {
    pub dispatcher: Dispatcher,
}

pub async fn run(
    listener: TcpListener,
    dispatcher: Dispatcher,
) -> anyhow::Result<Serve<TcpListener, Router, Router>> {
    let app_state = Arc::new(AppState { dispatcher });
    let app = Router::new()
        .route("/health_check", get(health_check))
        .route("/api/emails/welcome", post(send_welcome))
        .route("/api/emails/password-reset", post(send_password_reset))
        .route("/api/emails/notification", post(send_notification))
        .route("/api/emails/alert", post(send_alert))
        .route("/api/emails/send", post(send_email))
        .route("/api/emails/batch", post(send_batch))
        .with_state(app_state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_response(|response: &Response, latency: Duration, span: &Span| {
                    let status = response.status();
                    let headers = response.headers();
                    span.record("status", status.as_u16());
                    info!(parent: span, ?status, ?headers, ?latency, "Response sent");
                }),
        );

    Ok(axum::serve(listener, app))
}

/// `status` starts empty and is recorded once the response is sent.
fn request_span(request: &Request) -> Span {
    let request_id = Uuid::new_v4();
    info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        version = ?request.version(),
        request_id = ?request_id,
        status = tracing::field::Empty,
    )
}

pub struct Application {
    port: u16,
    server: Serve<TcpListener, Router, Router>,
}

impl Application {
    pub async fn build(configuration: Settings) -> anyhow::Result<Self> {
        let dispatcher = build_dispatcher(&configuration.email_client)?;

        let listener = TcpListener::bind(format!(
            "{}:{}",
            configuration.application.host, configuration.application.port
        ))
        .await?;
        let port = listener.local_addr()?.port();

        let server = run(listener, dispatcher).await?;

        Ok(Self { server, port })
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        Ok(self.server.await?)
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

pub fn build_dispatcher(configuration: &EmailClientSettings) -> anyhow::Result<Dispatcher> {
    let sender = configuration
        .sender()
        .map_err(|e| anyhow::anyhow!("Invalid sender email address. {}", e))?;

    let message_sender: Arc<dyn MessageSender> = if configuration.dry_run {
        tracing::warn!("Dry run enabled, emails will be logged and not delivered");
        Arc::new(ConsoleSender)
    } else {
        Arc::new(EmailClient::new(
            configuration.base_url.clone(),
            configuration.authorization_token.clone(),
            configuration.timeout(),
        )?)
    };

    Ok(Dispatcher::new(
        Arc::new(HtmlRenderer),
        message_sender,
        sender.to_string(),
        configuration.default_recipient_name.clone(),
    ))
}
