use crate::config::MailConfig;
use crate::error::NotifyError;
use crate::monitor::alerts::Notifier;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use log::info;

/// Port where the server expects TLS from the first byte; anything else
/// upgrades with STARTTLS.
const IMPLICIT_TLS_PORT: u16 = 465;

/// Alert mail over SMTP. Sends are bounded by the configured timeout.
pub struct SmtpNotifier {
    transport: SmtpTransport,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &MailConfig) -> Result<Self, NotifyError> {
        let from: Mailbox = config.username.parse()?;
        let to: Mailbox = config.recipient.parse()?;

        let builder = if config.port == IMPLICIT_TLS_PORT {
            SmtpTransport::relay(&config.host)?
        } else {
            SmtpTransport::starttls_relay(&config.host)?
        };
        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(config.timeout))
            .build();

        Ok(Self {
            transport,
            from,
            to,
        })
    }
}

impl Notifier for SmtpNotifier {
    fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        self.transport.send(&email)?;
        Ok(())
    }
}

/// Stand-in used when no SMTP credentials are configured.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        info!("ALERT (mail disabled) {}: {}", subject, body);
        Ok(())
    }
}
