use crate::config::{Config, MailConfig};
use async_trait::async_trait;
use std::sync::Arc;

/// Account events that result in an email to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    ActivationRequested { email: String, code: String },
    PasswordResetRequested { email: String, token: String },
}

impl Notification {
    pub fn recipient(&self) -> &str {
        match self {
            Notification::ActivationRequested { email, .. }
            | Notification::PasswordResetRequested { email, .. } => email,
        }
    }
}

/// Consumer of account notifications. Delivery is best-effort: callers log
/// failures and never undo the state change that produced the notification.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), anyhow::Error>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<(), anyhow::Error>;
}

/// Writes outgoing mail to the log instead of delivering it.
#[derive(Debug, Default, Clone)]
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn send(&self, message: MailMessage) -> Result<(), anyhow::Error> {
        log::info!(
            "Mail queued: from={}, to={:?}, subject={:?}\n{}",
            message.from,
            message.to,
            message.subject,
            message.body
        );
        Ok(())
    }
}

/// Renders notifications into mail and hands them to a transport.
pub struct MailNotifier {
    mail: MailConfig,
    public_base_url: String,
    transport: Arc<dyn MailTransport>,
}

impl MailNotifier {
    pub fn new(config: &Config, transport: Arc<dyn MailTransport>) -> Self {
        MailNotifier {
            mail: config.mail.clone(),
            public_base_url: config.server.public_base_url.trim_end_matches('/').to_string(),
            transport,
        }
    }

    pub fn render(&self, notification: &Notification) -> MailMessage {
        let (subject, body) = match notification {
            Notification::ActivationRequested { code, .. } => (
                format!("Account activation for {}", self.mail.site_title),
                format!(
                    "Your activation code: {}\nSubmit it to {}/account/activation/",
                    code, self.public_base_url
                ),
            ),
            Notification::PasswordResetRequested { token, .. } => (
                format!("Password Reset for {}", self.mail.site_title),
                format!(
                    "{}/account/password_reset/?token={}",
                    self.public_base_url, token
                ),
            ),
        };

        MailMessage {
            from: self.mail.from.clone(),
            to: vec![notification.recipient().to_string()],
            subject,
            body,
        }
    }
}

#[async_trait]
impl Notifier for MailNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), anyhow::Error> {
        let message = self.render(&notification);
        self.transport.send(message).await
    }
}

/// Hand a notification to the notifier; failures are logged, never returned.
pub async fn dispatch(notifier: &dyn Notifier, notification: Notification) {
    let recipient = notification.recipient().to_string();
    if let Err(e) = notifier.notify(notification).await {
        log::warn!("Failed to send notification to {}: {:?}", recipient, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CapturingTransport {
        sent: Mutex<Vec<MailMessage>>,
    }

    #[async_trait]
    impl MailTransport for CapturingTransport {
        async fn send(&self, message: MailMessage) -> Result<(), anyhow::Error> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(&self, _notification: Notification) -> Result<(), anyhow::Error> {
            Err(anyhow::anyhow!("smtp down"))
        }
    }

    fn config() -> Config {
        let mut config = Config::from_env().unwrap();
        config.server.public_base_url = "http://shop.test/".to_string();
        config.mail.site_title = "Shop".to_string();
        config.mail.from = "noreply@shop.test".to_string();
        config
    }

    #[tokio::test]
    async fn test_password_reset_mail_carries_token_link() {
        let transport = Arc::new(CapturingTransport::default());
        let notifier = MailNotifier::new(&config(), transport.clone());

        notifier
            .notify(Notification::PasswordResetRequested {
                email: "a@x.com".to_string(),
                token: "abc123".to_string(),
            })
            .await
            .unwrap();

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Password Reset for Shop");
        assert_eq!(
            sent[0].body,
            "http://shop.test/account/password_reset/?token=abc123"
        );
        assert_eq!(sent[0].to, vec!["a@x.com".to_string()]);
        assert_eq!(sent[0].from, "noreply@shop.test");
    }

    #[test]
    fn test_activation_mail_contains_code() {
        let notifier = MailNotifier::new(&config(), Arc::new(LogTransport));
        let message = notifier.render(&Notification::ActivationRequested {
            email: "a@x.com".to_string(),
            code: "Zx81QwEr".to_string(),
        });
        assert!(message.body.contains("Zx81QwEr"));
    }

    #[tokio::test]
    async fn test_dispatch_swallows_failures() {
        dispatch(
            &FailingNotifier,
            Notification::ActivationRequested {
                email: "a@x.com".to_string(),
                code: "code".to_string(),
            },
        )
        .await;
    }
}
