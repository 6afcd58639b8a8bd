pub mod render;
pub mod transport;

pub use transport::{MailTransport, MailerFactory, SmtpMailer, SmtpMailerFactory, TransportSettings};

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::{Address, Message};

use crate::error::{AppError, Result};
use render::MessageContext;

/// Sender identity attached to every outgoing message.
#[derive(Debug, Clone)]
pub struct SenderIdentity {
    pub name: String,
    pub address: String,
}

/// Fan out one render+send per recipient over a verified transport.
///
/// The transport is preflight-checked before any send is attempted; the
/// per-recipient sends then run concurrently behind a single aggregate
/// await. Any send failure fails the whole call — per-recipient outcomes
/// are not reported back.
pub async fn send_bulk(
    transport: &dyn MailTransport,
    sender: &SenderIdentity,
    recipients: &[String],
    subject: &str,
    body: &str,
    is_html: bool,
) -> Result<usize> {
    transport
        .verify()
        .await
        .map_err(|e| AppError::mail("Failed to send emails", e))?;

    let date = render::today_short();
    let sends = recipients.iter().map(|recipient| {
        let message = build_message(sender, recipient, subject, body, is_html, &date);
        async move {
            transport
                .send(message?)
                .await
                .map_err(|e| AppError::mail("Failed to send emails", e))
        }
    });

    futures::future::try_join_all(sends).await?;

    tracing::info!(count = recipients.len(), "Bulk email dispatched");
    Ok(recipients.len())
}

fn build_message(
    sender: &SenderIdentity,
    recipient: &str,
    subject: &str,
    body: &str,
    is_html: bool,
    date: &str,
) -> Result<Message> {
    let ctx = MessageContext {
        recipient,
        sender_name: Some(sender.name.as_str()),
        date,
    };
    let subject = render::expand_tokens(subject, &ctx);
    let body = render::expand_tokens(body, &ctx);

    let from = Mailbox::new(Some(sender.name.clone()), sender.address.parse::<Address>()?);
    let to: Mailbox = recipient.parse()?;
    let content_type = if is_html {
        ContentType::TEXT_HTML
    } else {
        ContentType::TEXT_PLAIN
    };

    Ok(Message::builder()
        .from(from)
        .to(to)
        .subject(subject)
        .header(content_type)
        .body(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Records sent messages instead of talking to an SMTP server.
    struct MockTransport {
        sent: Mutex<Vec<String>>,
        send_count: AtomicU32,
        fail_verify: AtomicBool,
        fail_send: AtomicBool,
    }

    impl MockTransport {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                send_count: AtomicU32::new(0),
                fail_verify: AtomicBool::new(false),
                fail_send: AtomicBool::new(false),
            }
        }

        fn formatted(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MailTransport for MockTransport {
        async fn verify(&self) -> std::result::Result<(), String> {
            if self.fail_verify.load(Ordering::SeqCst) {
                Err("535 authentication failed".to_string())
            } else {
                Ok(())
            }
        }

        async fn send(&self, message: Message) -> std::result::Result<(), String> {
            self.send_count.fetch_add(1, Ordering::SeqCst);
            if self.fail_send.load(Ordering::SeqCst) {
                return Err("550 mailbox unavailable".to_string());
            }
            let raw = String::from_utf8_lossy(&message.formatted()).to_string();
            self.sent.lock().unwrap().push(raw);
            Ok(())
        }
    }

    fn sender() -> SenderIdentity {
        SenderIdentity {
            name: "Brightlens".to_string(),
            address: "hello@brightlens.test".to_string(),
        }
    }

    #[tokio::test]
    async fn sends_one_message_per_recipient() {
        let transport = MockTransport::new();
        let recipients = vec![
            "alice@x.com".to_string(),
            "bob@x.com".to_string(),
            "carol@x.com".to_string(),
        ];

        let count = send_bulk(&transport, &sender(), &recipients, "Hi", "Hello", false)
            .await
            .unwrap();

        assert_eq!(count, 3);
        assert_eq!(transport.formatted().len(), 3);
    }

    #[tokio::test]
    async fn renders_tokens_per_recipient() {
        let transport = MockTransport::new();
        let recipients = vec!["alice@x.com".to_string()];

        send_bulk(
            &transport,
            &sender(),
            &recipients,
            "For $userName",
            "Dear $userName, regards $companyName",
            false,
        )
        .await
        .unwrap();

        let raw = transport.formatted().remove(0);
        assert!(raw.contains("For alice"));
        assert!(raw.contains("Dear alice, regards Brightlens"));
    }

    #[tokio::test]
    async fn preflight_failure_aborts_before_any_send() {
        let transport = MockTransport::new();
        transport.fail_verify.store(true, Ordering::SeqCst);

        let recipients = vec!["alice@x.com".to_string(), "bob@x.com".to_string()];
        let err = send_bulk(&transport, &sender(), &recipients, "Hi", "Hello", false)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Mail { .. }));
        assert_eq!(transport.send_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn any_send_failure_fails_the_whole_call() {
        let transport = MockTransport::new();
        transport.fail_send.store(true, Ordering::SeqCst);

        let recipients = vec!["alice@x.com".to_string(), "bob@x.com".to_string()];
        let result = send_bulk(&transport, &sender(), &recipients, "Hi", "Hello", false).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn html_flag_sets_the_content_type() {
        let transport = MockTransport::new();
        let recipients = vec!["alice@x.com".to_string()];

        send_bulk(
            &transport,
            &sender(),
            &recipients,
            "Hi",
            "<h1>Hello</h1>",
            true,
        )
        .await
        .unwrap();

        let raw = transport.formatted().remove(0);
        assert!(raw.contains("text/html"));
        assert!(raw.contains("<h1>Hello</h1>"));
    }

    #[tokio::test]
    async fn invalid_recipient_address_is_a_bad_request() {
        let transport = MockTransport::new();
        let recipients = vec!["not-an-address".to_string()];

        let err = send_bulk(&transport, &sender(), &recipients, "Hi", "Hello", false)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
