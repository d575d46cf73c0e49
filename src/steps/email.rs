//! Email Step
//!
//! Sends a plain-text message over SMTP. Supported configuration:
//!
//! - `to`, `subject`, `body` (required, interpolated)
//! - `from` (defaults to `smtp_user`)
//! - `smtp_host`, `smtp_port` (default to the engine's SMTP settings)
//! - `smtp_user`, `smtp_pass` (credentials; omitted when empty)
//!
//! Delivery goes through a [`Mailer`] so the transport can be swapped.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::{debug, info};
use serde_json::{json, Value};
use std::sync::Arc;

use super::interpolate::interpolate;
use super::{Step, StepContext, WorkingContext};
use crate::config::SmtpDefaults;
use crate::error::StepError;
use crate::graph::Node;

/// Connection settings for one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

/// A fully resolved message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Delivers resolved messages.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail, smtp: &SmtpSettings) -> Result<(), StepError>;
}

/// Mailer backed by an async STARTTLS SMTP relay.
#[derive(Debug, Clone)]
pub struct SmtpMailer {
    timeout: Duration,
}

impl SmtpMailer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

fn mailbox(field: &str, address: &str) -> Result<Mailbox, StepError> {
    address
        .parse()
        .map_err(|e| StepError::InvalidConfig(format!("invalid {} address '{}': {}", field, address, e)))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail, smtp: &SmtpSettings) -> Result<(), StepError> {
        let message = Message::builder()
            .from(mailbox("from", &email.from)?)
            .to(mailbox("to", &email.to)?)
            .subject(email.subject.clone())
            .body(email.body.clone())
            .map_err(|e| StepError::InvalidConfig(e.to_string()))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
            .map_err(|e| StepError::InvalidConfig(format!("invalid smtp_host '{}': {}", smtp.host, e)))?
            .port(smtp.port)
            .timeout(Some(self.timeout));

        if !smtp.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                smtp.username.clone(),
                smtp.password.clone(),
            ));
        }

        builder
            .build()
            .send(message)
            .await
            .map_err(|e| StepError::Email(e.to_string()))?;

        info!("Sent email to {} via {}:{}", email.to, smtp.host, smtp.port);
        Ok(())
    }
}

/// Sends an email built from node configuration.
#[derive(Clone)]
pub struct EmailStep {
    mailer: Arc<dyn Mailer>,
    defaults: SmtpDefaults,
}

impl EmailStep {
    pub fn new(mailer: Arc<dyn Mailer>, defaults: SmtpDefaults) -> Self {
        Self { mailer, defaults }
    }

    /// Step that delivers through [`SmtpMailer`].
    pub fn smtp(defaults: SmtpDefaults) -> Self {
        let mailer = SmtpMailer::new(defaults.timeout());
        Self::new(Arc::new(mailer), defaults)
    }

    fn settings_for(&self, node: &Node) -> Result<SmtpSettings, StepError> {
        let port = match node.config_value("smtp_port") {
            None | Some(Value::Null) => self.defaults.port,
            Some(Value::String(s)) if s.is_empty() => self.defaults.port,
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map_err(|_| StepError::InvalidConfig(format!("invalid smtp_port '{}'", s)))?,
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|p| u16::try_from(p).ok())
                .ok_or_else(|| StepError::InvalidConfig(format!("invalid smtp_port '{}'", n)))?,
            Some(other) => {
                return Err(StepError::InvalidConfig(format!("invalid smtp_port '{}'", other)))
            }
        };

        Ok(SmtpSettings {
            host: node
                .config_str("smtp_host")
                .unwrap_or(&self.defaults.host)
                .to_string(),
            port,
            username: node.config_str("smtp_user").unwrap_or_default().to_string(),
            password: node.config_str("smtp_pass").unwrap_or_default().to_string(),
        })
    }
}

#[async_trait]
impl Step for EmailStep {
    async fn execute(
        &self,
        _ctx: &StepContext,
        node: &Node,
        input: &WorkingContext,
    ) -> Result<WorkingContext, StepError> {
        let (Some(to), Some(subject), Some(body)) = (
            node.config_str("to"),
            node.config_str("subject"),
            node.config_str("body"),
        ) else {
            return Err(StepError::MissingConfig(
                "to, subject, and body are required".to_string(),
            ));
        };

        let smtp = self.settings_for(node)?;
        let email = OutgoingEmail {
            from: node
                .config_str("from")
                .unwrap_or(&smtp.username)
                .to_string(),
            to: interpolate(to, input),
            subject: interpolate(subject, input),
            body: interpolate(body, input),
        };

        debug!("Node '{}': sending email to {}", node.id, email.to);
        self.mailer.send(&email, &smtp).await?;

        let mut output = WorkingContext::new();
        output.insert("email_sent".to_string(), json!(true));
        output.insert("to".to_string(), json!(email.to));
        output.insert("subject".to_string(), json!(email.subject));
        Ok(output)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tokio::sync::Mutex;

    /// Mailer that records deliveries, optionally failing every send.
    #[derive(Default)]
    pub(crate) struct RecordingMailer {
        pub sent: Mutex<Vec<(OutgoingEmail, SmtpSettings)>>,
        pub fail_with: Option<String>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: &OutgoingEmail, smtp: &SmtpSettings) -> Result<(), StepError> {
            if let Some(reason) = &self.fail_with {
                return Err(StepError::Email(reason.clone()));
            }
            self.sent.lock().await.push((email.clone(), smtp.clone()));
            Ok(())
        }
    }

    fn context() -> WorkingContext {
        let mut ctx = WorkingContext::new();
        ctx.insert("name".to_string(), json!("Ann"));
        ctx.insert("email".to_string(), json!("ann@example.test"));
        ctx
    }

    #[tokio::test]
    async fn test_sends_interpolated_message() {
        let mailer = Arc::new(RecordingMailer::default());
        let step = EmailStep::new(mailer.clone(), SmtpDefaults::default());
        let node = Node::action("m1", "email").with_config(json!({
            "to": "{{email}}",
            "subject": "Hello {{name}}",
            "body": "Hi {{name}}, welcome.",
            "smtp_user": "bot@example.test",
            "smtp_pass": "pw"
        }));

        let output = step
            .execute(&StepContext::detached(), &node, &context())
            .await
            .unwrap();

        assert_eq!(output["email_sent"], json!(true));
        assert_eq!(output["to"], json!("ann@example.test"));
        assert_eq!(output["subject"], json!("Hello Ann"));

        let sent = mailer.sent.lock().await;
        let (email, smtp) = &sent[0];
        assert_eq!(email.from, "bot@example.test");
        assert_eq!(email.body, "Hi Ann, welcome.");
        assert_eq!(smtp.host, "smtp.gmail.com");
        assert_eq!(smtp.port, 587);
        assert_eq!(smtp.password, "pw");
    }

    #[tokio::test]
    async fn test_node_overrides_smtp_settings() {
        let mailer = Arc::new(RecordingMailer::default());
        let step = EmailStep::new(mailer.clone(), SmtpDefaults::default());
        let node = Node::action("m1", "email").with_config(json!({
            "to": "a@example.test",
            "subject": "s",
            "body": "b",
            "from": "noreply@example.test",
            "smtp_host": "mail.example.test",
            "smtp_port": "2525"
        }));

        step.execute(&StepContext::detached(), &node, &context())
            .await
            .unwrap();

        let sent = mailer.sent.lock().await;
        let (email, smtp) = &sent[0];
        assert_eq!(email.from, "noreply@example.test");
        assert_eq!(smtp.host, "mail.example.test");
        assert_eq!(smtp.port, 2525);
        assert!(smtp.username.is_empty());
    }

    #[tokio::test]
    async fn test_numeric_port() {
        let step = EmailStep::new(Arc::new(RecordingMailer::default()), SmtpDefaults::default());
        let node = Node::action("m1", "email")
            .with_config(json!({"to": "a@example.test", "subject": "s", "body": "b", "smtp_port": 465}));
        assert_eq!(step.settings_for(&node).unwrap().port, 465);

        let node = Node::action("m1", "email").with_config(json!({"smtp_port": 70000}));
        assert!(matches!(step.settings_for(&node), Err(StepError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_missing_required_fields() {
        let mailer = Arc::new(RecordingMailer::default());
        let step = EmailStep::new(mailer.clone(), SmtpDefaults::default());
        let node = Node::action("m1", "email").with_config(json!({"to": "a@example.test", "subject": "s"}));

        let err = step
            .execute(&StepContext::detached(), &node, &context())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "to, subject, and body are required");
        assert!(mailer.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_surfaces() {
        let mailer = Arc::new(RecordingMailer {
            fail_with: Some("connection refused".to_string()),
            ..Default::default()
        });
        let step = EmailStep::new(mailer, SmtpDefaults::default());
        let node = Node::action("m1", "email")
            .with_config(json!({"to": "a@example.test", "subject": "s", "body": "b"}));

        let err = step
            .execute(&StepContext::detached(), &node, &context())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "failed to send email: connection refused");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_smtp_mailer_rejects_bad_address() {
        let mailer = SmtpMailer::new(Duration::from_secs(1));
        let email = OutgoingEmail {
            from: "not an address".to_string(),
            to: "a@example.test".to_string(),
            subject: "s".to_string(),
            body: "b".to_string(),
        };
        let smtp = SmtpSettings {
            host: "localhost".to_string(),
            port: 2525,
            username: String::new(),
            password: String::new(),
        };

        let err = mailer.send(&email, &smtp).await.unwrap_err();
        assert!(err.to_string().contains("invalid from address"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_missing_sender_is_not_retryable() {
        let mailer = SmtpMailer::new(Duration::from_secs(1));
        let email = OutgoingEmail {
            from: String::new(),
            to: "a@example.test".to_string(),
            subject: "s".to_string(),
            body: "b".to_string(),
        };
        let smtp = SmtpSettings {
            host: "localhost".to_string(),
            port: 2525,
            username: String::new(),
            password: String::new(),
        };

        let err = mailer.send(&email, &smtp).await.unwrap_err();
        assert!(matches!(err, StepError::InvalidConfig(_)));
        assert!(err
            .to_string()
            .starts_with("invalid configuration: invalid from address ''"));
        assert!(!err.is_retryable());
    }
}
