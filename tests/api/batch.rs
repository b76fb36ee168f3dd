use serde_json::{Value, json};
use wiremock::matchers::{any, body_partial_json, path};
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::{company, spawn_app};

fn batch_body(recipients: Value) -> Value {
    json!({
        "company": company(),
        "template": {
            "kind": "notification",
            "notification": {
                "title": "Mantenimiento programado",
                "message": "El servicio no estará disponible el domingo",
                "type": "info"
            },
            "preferences_url": "https://miempresa.com/preferencias"
        },
        "recipients": recipients
    })
}

fn scenario_recipients() -> Value {
    json!([
        {"email": "a@x.com", "name": "A"},
        {"email": "bad", "name": "B"},
        {"email": "c@x.com", "name": "C"}
    ])
}

#[tokio::test]
async fn batch_sends_to_every_valid_recipient() {
    // Arrange
    let app = spawn_app().await;
    app.provider_accepts_everything().await;

    // Act
    let response = app
        .post_json("/api/emails/batch", &batch_body(scenario_recipients()))
        .await;

    // Assert
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["sent"], 2);
    assert_eq!(body["failed"], 0);
    assert_eq!(body["total"], 2);
    assert_eq!(body["invalid"], json!(["bad"]));

    let sent = app.sent_emails().await;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0]["to"], json!(["A <a@x.com>"]));
    assert_eq!(sent[1]["to"], json!(["C <c@x.com>"]));
    assert_eq!(sent[0]["subject"], "Mantenimiento programado");
    assert!(sent[0]["html"].as_str().unwrap().contains("Hola A,"));
    assert!(sent[1]["html"].as_str().unwrap().contains("Hola C,"));
}

#[tokio::test]
async fn batch_reports_a_failing_recipient_and_carries_on() {
    // Arrange
    let app = spawn_app().await;
    Mock::given(path("/emails"))
        .and(body_partial_json(json!({"to": ["C <c@x.com>"]})))
        .respond_with(ResponseTemplate::new(422).set_body_string("invalid recipient"))
        .mount(&app.email_server)
        .await;
    app.provider_accepts_everything().await;

    // Act
    let response = app
        .post_json("/api/emails/batch", &batch_body(scenario_recipients()))
        .await;

    // Assert
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["sent"], 1);
    assert_eq!(body["failed"], 1);
    assert_eq!(body["total"], 2);
    assert_eq!(body["failures"][0]["email"], "c@x.com");
    assert_eq!(body["failures"][0]["status"], "failure");
}

#[tokio::test]
async fn batch_skips_entries_without_an_address() {
    // Arrange
    let app = spawn_app().await;
    app.provider_accepts_everything().await;
    let recipients = json!([
        {"name": "Sin correo"},
        {"email": "", "name": "Vacío"},
        {"email": "a@x.com"}
    ]);

    // Act
    let response = app.post_json("/api/emails/batch", &batch_body(recipients)).await;

    // Assert
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["total"], 1);
    assert_eq!(body["invalid"], json!([]));
    let sent = app.sent_emails().await;
    assert!(sent[0]["html"].as_str().unwrap().contains("Hola Usuario,"));
}

#[tokio::test]
async fn batch_returns_a_400_when_no_recipient_is_valid() {
    // Arrange
    let app = spawn_app().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.email_server)
        .await;
    let test_cases = vec![
        (json!([]), "an empty recipient list"),
        (json!([{"email": "bad"}, {"email": "juan@ejemplo"}]), "only invalid addresses"),
    ];

    for (recipients, description) in test_cases {
        // Act
        let response = app.post_json("/api/emails/batch", &batch_body(recipients)).await;

        // Assert
        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not return a 400 Bad Request for {}.",
            description
        );
    }
}

#[tokio::test]
async fn batch_skips_a_recipient_with_an_invalid_name_and_sends_the_rest() {
    // Arrange
    let app = spawn_app().await;
    app.provider_accepts_everything().await;
    let recipients = json!([
        {"email": "a@x.com", "name": "A"},
        {"email": "b@x.com", "name": "<B>"},
        {"email": "c@x.com", "name": "C"}
    ]);

    // Act
    let response = app.post_json("/api/emails/batch", &batch_body(recipients)).await;

    // Assert
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["sent"], 2);
    assert_eq!(body["total"], 2);
    assert_eq!(body["invalid"], json!(["b@x.com"]));

    let sent = app.sent_emails().await;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0]["to"], json!(["A <a@x.com>"]));
    assert_eq!(sent[1]["to"], json!(["C <c@x.com>"]));
}
