use std::future::Future;

use log::{debug, warn};
use teloxide::{
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup},
    RequestError,
};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Telegram request failed: {0}")]
    Request(#[from] RequestError),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Could not open WhatsApp.")]
    Unavailable,

    #[error("{0}")]
    Open(#[from] SinkError),
}

/// The messaging app the finished request is handed to.
pub trait MessageSink {
    fn can_open(&self, url: &Url) -> impl Future<Output = Result<bool, SinkError>> + Send;

    fn open(&self, url: &Url) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// Asks the sink whether it understands `url` and opens it if so.
pub async fn dispatch<S: MessageSink>(sink: &S, url: &Url) -> Result<(), SubmitError> {
    if !sink.can_open(url).await? {
        warn!("Sink refused to open {}", url.host_str().unwrap_or("<no host>"));
        return Err(SubmitError::Unavailable);
    }
    sink.open(url).await?;
    debug!("Opened deep link to {}", url.host_str().unwrap_or("<no host>"));
    Ok(())
}

/// Hands the deep link to the user as a URL button in their chat.
pub struct TelegramLinkSink {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramLinkSink {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        TelegramLinkSink { bot, chat_id }
    }
}

impl MessageSink for TelegramLinkSink {
    async fn can_open(&self, url: &Url) -> Result<bool, SinkError> {
        Ok(matches!(url.scheme(), "https" | "http") && url.host_str().is_some())
    }

    async fn open(&self, url: &Url) -> Result<(), SinkError> {
        let keyboard = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::url(
            "📲 Send on WhatsApp",
            url.clone(),
        )]]);
        self.bot
            .send_message(
                self.chat_id,
                "Your booking request is ready! Tap the button to send it to the studio.",
            )
            .reply_markup(keyboard)
            .await?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::fake::FakeSink;
    use super::*;

    fn link() -> Url {
        Url::parse("https://wa.me/5511981296861?text=hi").unwrap()
    }

    #[tokio::test]
    async fn supported_sink_opens_the_link() {
        let sink = FakeSink::new(true, None);
        dispatch(&sink, &link()).await.unwrap();
        assert_eq!(sink.opened(), vec![link()]);
    }

    #[tokio::test]
    async fn unsupported_sink_reports_failure_without_opening() {
        let sink = FakeSink::new(false, None);
        let err = dispatch(&sink, &link()).await.unwrap_err();
        assert!(matches!(err, SubmitError::Unavailable));
        assert_eq!(err.to_string(), "Could not open WhatsApp.");
        assert!(sink.opened().is_empty());
    }

    #[tokio::test]
    async fn open_errors_carry_the_underlying_text() {
        let sink = FakeSink::new(true, Some("app crashed"));
        let err = dispatch(&sink, &link()).await.unwrap_err();
        assert!(matches!(err, SubmitError::Open(_)));
        assert_eq!(err.to_string(), "app crashed");
    }

    #[tokio::test]
    async fn telegram_sink_only_accepts_web_links() {
        let sink = TelegramLinkSink::new(Bot::new("123:TEST"), ChatId(1));
        assert!(sink.can_open(&link()).await.unwrap());
        let mailto = Url::parse("mailto:studio@example.com").unwrap();
        assert!(!sink.can_open(&mailto).await.unwrap());
    }
}
