use std::sync::Arc;

use async_trait::async_trait;
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::error::{AppError, Result};
use crate::models::{EmailConfig, EmailService};

/// Standard encrypted SMTP submission port; custom configurations on this
/// port use implicit TLS, anything else negotiates STARTTLS.
pub const SMTPS_PORT: u16 = 465;

struct ServicePreset {
    service: EmailService,
    host: &'static str,
    port: u16,
    implicit_tls: bool,
}

/// Known providers map to presets; adding one is a data change.
const SERVICE_PRESETS: &[ServicePreset] = &[
    ServicePreset {
        service: EmailService::Gmail,
        host: "smtp.gmail.com",
        port: 465,
        implicit_tls: true,
    },
    ServicePreset {
        service: EmailService::Outlook,
        host: "smtp-mail.outlook.com",
        port: 587,
        implicit_tls: false,
    },
    ServicePreset {
        service: EmailService::Yahoo,
        host: "smtp.mail.yahoo.com",
        port: 465,
        implicit_tls: true,
    },
];

/// Connection settings resolved from a stored configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    pub host: String,
    pub port: u16,
    pub implicit_tls: bool,
    pub username: String,
    pub password: String,
}

impl TransportSettings {
    pub fn from_config(config: &EmailConfig) -> Result<Self> {
        let (host, port, implicit_tls) = match config.email_service {
            EmailService::Custom => {
                let host = config.custom_host.clone().ok_or_else(|| {
                    AppError::BadRequest(
                        "Custom host and port are required for custom email service".to_string(),
                    )
                })?;
                let port = config.custom_port.ok_or_else(|| {
                    AppError::BadRequest(
                        "Custom host and port are required for custom email service".to_string(),
                    )
                })?;
                (host, port, port == SMTPS_PORT)
            }
            service => {
                let preset = SERVICE_PRESETS
                    .iter()
                    .find(|preset| preset.service == service)
                    .ok_or_else(|| {
                        AppError::InternalError(format!("No preset for service {:?}", service))
                    })?;
                (preset.host.to_string(), preset.port, preset.implicit_tls)
            }
        };

        Ok(Self {
            host,
            port,
            implicit_tls,
            username: config.sender_email.clone(),
            password: config.sender_password.clone(),
        })
    }
}

/// Async mail transport abstraction; the real SMTP transport lives behind
/// it so tests can inject a mock.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Preflight connectivity/credential check; no message is sent.
    async fn verify(&self) -> std::result::Result<(), String>;

    async fn send(&self, message: Message) -> std::result::Result<(), String>;
}

/// Builds a transport for a resolved configuration.
pub trait MailerFactory: Send + Sync {
    fn build(&self, settings: &TransportSettings) -> Result<Arc<dyn MailTransport>>;
}

/// SMTP transport backed by lettre.
pub struct SmtpMailer {
    inner: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn from_settings(settings: &TransportSettings) -> Result<Self> {
        let tls = TlsParameters::new(settings.host.clone())
            .map_err(|e| AppError::mail("TLS configuration error", e))?;

        // App passwords copied from provider UIs often carry stray spaces.
        let password: String = settings
            .password
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let credentials = Credentials::new(settings.username.clone(), password);

        let builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
            .port(settings.port)
            .authentication(vec![Mechanism::Plain, Mechanism::Login])
            .credentials(credentials);

        let builder = if settings.implicit_tls {
            builder.tls(Tls::Wrapper(tls))
        } else {
            builder.tls(Tls::Required(tls))
        };

        Ok(Self {
            inner: builder.build(),
        })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn verify(&self) -> std::result::Result<(), String> {
        match self.inner.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err("SMTP server rejected the connection".to_string()),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn send(&self, message: Message) -> std::result::Result<(), String> {
        self.inner
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

pub struct SmtpMailerFactory;

impl MailerFactory for SmtpMailerFactory {
    fn build(&self, settings: &TransportSettings) -> Result<Arc<dyn MailTransport>> {
        Ok(Arc::new(SmtpMailer::from_settings(settings)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mongodb::bson::oid::ObjectId;
    use pretty_assertions::assert_eq;

    fn config(service: EmailService) -> EmailConfig {
        EmailConfig {
            id: Some(ObjectId::new()),
            user_id: ObjectId::new(),
            sender_email: "marco@studio.test".to_string(),
            sender_password: "secret".to_string(),
            sender_name: "Marco".to_string(),
            email_service: service,
            custom_host: None,
            custom_port: None,
            is_verified: false,
            last_verified: None,
            is_default: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn known_services_resolve_to_presets() {
        let settings = TransportSettings::from_config(&config(EmailService::Gmail)).unwrap();
        assert_eq!(settings.host, "smtp.gmail.com");
        assert_eq!(settings.port, 465);
        assert!(settings.implicit_tls);

        let settings = TransportSettings::from_config(&config(EmailService::Outlook)).unwrap();
        assert_eq!(settings.host, "smtp-mail.outlook.com");
        assert_eq!(settings.port, 587);
        assert!(!settings.implicit_tls);

        let settings = TransportSettings::from_config(&config(EmailService::Yahoo)).unwrap();
        assert_eq!(settings.host, "smtp.mail.yahoo.com");
        assert_eq!(settings.port, 465);
        assert!(settings.implicit_tls);
    }

    #[test]
    fn custom_service_uses_stored_host_and_port() {
        let mut cfg = config(EmailService::Custom);
        cfg.custom_host = Some("mail.studio.test".to_string());
        cfg.custom_port = Some(2525);

        let settings = TransportSettings::from_config(&cfg).unwrap();
        assert_eq!(settings.host, "mail.studio.test");
        assert_eq!(settings.port, 2525);
        assert!(!settings.implicit_tls);
    }

    #[test]
    fn custom_service_on_submission_port_is_implicit_tls() {
        let mut cfg = config(EmailService::Custom);
        cfg.custom_host = Some("mail.studio.test".to_string());
        cfg.custom_port = Some(SMTPS_PORT);

        let settings = TransportSettings::from_config(&cfg).unwrap();
        assert!(settings.implicit_tls);
    }

    #[test]
    fn custom_service_without_host_or_port_is_rejected() {
        let cfg = config(EmailService::Custom);
        let err = TransportSettings::from_config(&cfg).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn credentials_come_from_the_sender_identity() {
        let settings = TransportSettings::from_config(&config(EmailService::Gmail)).unwrap();
        assert_eq!(settings.username, "marco@studio.test");
        assert_eq!(settings.password, "secret");
    }
}
