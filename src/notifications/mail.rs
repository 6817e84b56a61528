use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{NotificationError, ReceiptNotification, ReceiptNotifier};

#[derive(Debug, Serialize)]
struct OutgoingMail<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: String,
    html: String,
}

/// Sends receipt notifications through a JSON mail API.
#[derive(Clone)]
pub struct HttpMailNotifier {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    from: String,
    recipient: String,
}

impl HttpMailNotifier {
    pub fn new(
        api_url: &str,
        api_key: Option<String>,
        from: &str,
        recipient: &str,
        timeout: Duration,
    ) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url: api_url.to_string(),
            api_key,
            from: from.to_string(),
            recipient: recipient.to_string(),
        })
    }
}

#[async_trait]
impl ReceiptNotifier for HttpMailNotifier {
    #[instrument(skip_all, fields(receipt_no = %notification.receipt.receipt_no))]
    async fn send(&self, notification: &ReceiptNotification) -> Result<(), NotificationError> {
        let mail = OutgoingMail {
            from: &self.from,
            to: vec![&self.recipient],
            subject: notification.subject(),
            html: notification.html(),
        };
        let mut request = self.client.post(&self.api_url).json(&mail);
        if let Some(key) = &self.api_key {
            request = request.header(AUTHORIZATION, format!("Bearer {key}"));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        debug!("receipt notification delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::fixtures;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notifier(server: &MockServer) -> HttpMailNotifier {
        HttpMailNotifier::new(
            &format!("{}/emails", server.uri()),
            Some("mail-key".into()),
            "receiving@example.com",
            "admin@example.com",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn posts_subject_and_recipient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(header("authorization", "Bearer mail-key"))
            .and(body_partial_json(serde_json::json!({
                "from": "receiving@example.com",
                "to": ["admin@example.com"],
                "subject": "[Receiving Alert] Receipt #RCV-20240101-000001 - Pallet <Blue>"
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        notifier(&server)
            .send(&fixtures::notification())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = notifier(&server)
            .send(&fixtures::notification())
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::Rejected { status: 503, .. }));
    }
}
