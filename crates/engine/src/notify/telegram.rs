use std::fmt;

use reqwest::{IntoUrl, Url};
use serde::{Deserialize, Serialize};

use super::{Message, Notifier, Recipient};

/// Default base URL of the Telegram Bot API.
pub const DEFAULT_BOT_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
struct InlineKeyboardMarkup {
    inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Serialize)]
struct InlineKeyboardButton {
    text: String,
    callback_data: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// A [`Notifier`] sending messages through the Telegram Bot API.
///
/// Admin messages go to the configured admin chat. User messages go to the
/// private chat of the user, whose id equals the Telegram user id.
#[derive(Clone)]
pub struct TelegramNotifier {
    base: Url,
    client: reqwest::Client,
    admin_chat_id: i64,
}

impl fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("admin_chat_id", &self.admin_chat_id)
            .finish_non_exhaustive()
    }
}

impl TelegramNotifier {
    /// Create a new [`TelegramNotifier`] with the given API base.
    pub fn try_new(base: impl IntoUrl, bot_token: &str, admin_chat_id: i64) -> crate::Result<Self> {
        if bot_token.is_empty() {
            return Err(crate::Error::invalid_argument("empty bot token"));
        }
        let base = base.into_url()?.join(&format!("./bot{bot_token}/"))?;
        Ok(Self {
            base,
            client: reqwest::Client::new(),
            admin_chat_id,
        })
    }

    /// Create a new [`TelegramNotifier`] with the default API base.
    pub fn with_token(bot_token: &str, admin_chat_id: i64) -> crate::Result<Self> {
        Self::try_new(DEFAULT_BOT_API_BASE, bot_token, admin_chat_id)
    }

    fn chat_id(&self, recipient: &Recipient) -> crate::Result<i64> {
        match recipient {
            Recipient::Admin => Ok(self.admin_chat_id),
            Recipient::User(user) => i64::try_from(user.0)
                .map_err(|_| crate::Error::invalid_argument("user id out of range")),
        }
    }

    fn request<'a>(
        &self,
        recipient: &Recipient,
        message: &'a Message,
    ) -> crate::Result<SendMessage<'a>> {
        let reply_markup = (!message.buttons.is_empty()).then(|| InlineKeyboardMarkup {
            inline_keyboard: vec![message
                .buttons
                .iter()
                .map(|button| InlineKeyboardButton {
                    text: button.label.clone(),
                    callback_data: button.action.to_string(),
                })
                .collect()],
        });
        Ok(SendMessage {
            chat_id: self.chat_id(recipient)?,
            text: &message.text,
            reply_markup,
        })
    }
}

impl Notifier for TelegramNotifier {
    async fn send(&self, recipient: &Recipient, message: &Message) -> crate::Result<()> {
        let body = self.request(recipient, message)?;
        let url = self.base.join("sendMessage")?;
        let response: ApiResponse = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;
        if !response.ok {
            return Err(crate::Error::transport(
                response
                    .description
                    .unwrap_or_else(|| "telegram api error".to_string()),
            ));
        }
        Ok(())
    }
}
