/// Telegram Bot API notifier.
pub mod telegram;

use std::{fmt, future::Future};

use either::Either;
use quest_model::{AdminAction, UserId};

pub use telegram::TelegramNotifier;

/// Recipient of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// The admin chat.
    Admin,
    /// A user.
    User(UserId),
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::User(user) => write!(f, "user:{user}"),
        }
    }
}

/// An action button attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    /// Label.
    pub label: String,
    /// Action triggered by the button.
    pub action: AdminAction,
}

/// Notification message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Text.
    pub text: String,
    /// Action buttons.
    pub buttons: Vec<Button>,
}

impl Message {
    /// Create a message without buttons.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            buttons: vec![],
        }
    }

    /// Attach a button.
    pub fn with_button(mut self, label: impl Into<String>, action: AdminAction) -> Self {
        self.buttons.push(Button {
            label: label.into(),
            action,
        });
        self
    }
}

/// Delivers notifications to admins and users.
///
/// Delivery is best-effort: the engine logs failures and never propagates
/// them to the operation that produced the message.
pub trait Notifier: Send + Sync + 'static {
    /// Send a message.
    fn send(
        &self,
        recipient: &Recipient,
        message: &Message,
    ) -> impl Future<Output = crate::Result<()>> + Send;
}

/// A [`Notifier`] that only writes messages to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn send(&self, recipient: &Recipient, message: &Message) -> crate::Result<()> {
        let actions = message
            .buttons
            .iter()
            .map(|button| button.action.to_string())
            .collect::<Vec<_>>();
        tracing::info!(%recipient, ?actions, "{}", message.text);
        Ok(())
    }
}

impl<L, R> Notifier for Either<L, R>
where
    L: Notifier,
    R: Notifier,
{
    async fn send(&self, recipient: &Recipient, message: &Message) -> crate::Result<()> {
        match self {
            Self::Left(notifier) => notifier.send(recipient, message).await,
            Self::Right(notifier) => notifier.send(recipient, message).await,
        }
    }
}
