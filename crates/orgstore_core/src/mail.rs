//! Create notifications.
//!
//! # Responsibility
//! - Define the [`Mailer`] collaborator consumed by the write service.
//! - Dispatch mails off the caller's thread so delivery never gates a write.
//!
//! # Invariants
//! - [`Notifier::dispatch`] returns before the mail is sent.
//! - Mail failures and mailer panics are logged, never returned.

use crate::config::MailConfig;
use crate::logging::sanitize_message;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

const MAIL_THREAD_NAME: &str = "orgstore-mail";
const MAX_LOGGED_ERROR_CHARS: usize = 200;

pub type MailResult<T> = Result<T, MailError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailError {
    /// Transport refused or failed to deliver the message.
    Delivery(String),
}

impl Display for MailError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Delivery(message) => write!(f, "mail delivery failed: {message}"),
        }
    }
}

impl Error for MailError {}

/// Outbound mail transport.
pub trait Mailer: Send + Sync + 'static {
    fn sendmail(&self, subject: &str, body: &str) -> MailResult<()>;
}

/// Mailer that records each message as a log event.
#[derive(Debug, Clone)]
pub struct LogMailer {
    recipient: String,
}

impl LogMailer {
    pub fn new(recipient: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
        }
    }
}

impl Mailer for LogMailer {
    fn sendmail(&self, subject: &str, body: &str) -> MailResult<()> {
        info!(
            "event=mail_send module=mail status=ok recipient={} subject={} body_chars={}",
            self.recipient,
            sanitize_message(subject, MAX_LOGGED_ERROR_CHARS),
            body.chars().count()
        );
        Ok(())
    }
}

/// Fire-and-forget dispatcher around a [`Mailer`].
pub struct Notifier<M: Mailer> {
    mailer: Arc<M>,
    enabled: bool,
}

impl<M: Mailer> Clone for Notifier<M> {
    fn clone(&self) -> Self {
        Self {
            mailer: Arc::clone(&self.mailer),
            enabled: self.enabled,
        }
    }
}

impl<M: Mailer> Notifier<M> {
    pub fn new(mailer: M) -> Self {
        Self {
            mailer: Arc::new(mailer),
            enabled: true,
        }
    }

    /// Creates a notifier honoring `config.enabled`.
    pub fn with_config(mailer: M, config: &MailConfig) -> Self {
        Self {
            mailer: Arc::new(mailer),
            enabled: config.enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Sends one mail on a detached thread.
    ///
    /// Returns the worker handle when a thread was started; callers on the
    /// write path drop it.
    pub fn dispatch(&self, subject: String, body: String) -> Option<JoinHandle<()>> {
        if !self.enabled {
            return None;
        }

        let mailer = Arc::clone(&self.mailer);
        let spawned = thread::Builder::new()
            .name(MAIL_THREAD_NAME.to_string())
            .spawn(move || deliver(mailer.as_ref(), &subject, &body));

        match spawned {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(
                    "event=mail_dispatch module=mail status=error error_code=spawn_failed error={}",
                    err
                );
                None
            }
        }
    }
}

fn deliver<M: Mailer>(mailer: &M, subject: &str, body: &str) {
    match panic::catch_unwind(AssertUnwindSafe(|| mailer.sendmail(subject, body))) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(
            "event=mail_dispatch module=mail status=error error_code=delivery_failed error={}",
            sanitize_message(&err.to_string(), MAX_LOGGED_ERROR_CHARS)
        ),
        Err(_) => warn!("event=mail_dispatch module=mail status=error error_code=mailer_panicked"),
    }
}
