use std::sync::LazyLock;

use email_dispatch::{
    configuration::get_configuration,
    startup::Application,
    telemetry::{get_subscriber, init_subscriber},
};
use serde_json::{Value, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

// Ensure that the `tracing` stack is only initialised once
static TRACING: LazyLock<()> = LazyLock::new(|| {
    let default_filter_level = "info".to_string();
    let subscriber_name = "test".to_string();
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::stdout);
        init_subscriber(subscriber);
    } else {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::sink);
        init_subscriber(subscriber);
    }
});

pub struct TestApp {
    pub address: String,
    pub email_server: MockServer,
    pub api_client: reqwest::Client,
}

impl TestApp {
    pub async fn post_json(&self, route: &str, body: &Value) -> reqwest::Response {
        self.api_client
            .post(format!("{}{}", &self.address, route))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Every mounted provider call succeeds and returns a fresh message id.
    pub async fn provider_accepts_everything(&self) {
        Mock::given(path("/emails"))
            .and(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "msg_123"})))
            .mount(&self.email_server)
            .await;
    }

    /// Bodies of every request the fake provider received, in order.
    pub async fn sent_emails(&self) -> Vec<Value> {
        self.email_server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|request| serde_json::from_slice(&request.body).unwrap())
            .collect()
    }
}

pub async fn spawn_app() -> TestApp {
    LazyLock::force(&TRACING);

    let email_server = MockServer::start().await;

    let configuration = {
        let mut c = get_configuration().expect("Failed to read configuration.");
        // Use a random OS port
        c.application.port = 0;
        c.application.host = "127.0.0.1".to_string();
        c.email_client.base_url = email_server.uri();
        c.email_client.dry_run = false;
        c
    };

    let application = Application::build(configuration)
        .await
        .expect("Failed to build application.");
    let address = format!("http://127.0.0.1:{}", application.port());
    tokio::spawn(application.run_until_stopped());

    TestApp {
        address,
        email_server,
        api_client: reqwest::Client::new(),
    }
}

pub fn company() -> Value {
    json!({
        "name": "Mi Empresa",
        "address": "Calle Principal 123",
        "support_email": "soporte@miempresa.com",
        "website": "https://miempresa.com",
        "logo_url": "https://miempresa.com/logo.png"
    })
}
