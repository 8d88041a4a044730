use std::sync::Arc;

use config::Config;
use handlers::{handle_callback_query, handle_message, SessionStore};
mod config;
mod handlers;
mod message;
mod models;
mod picker;
mod sink;
mod validation;
use teloxide::{
    dispatching::UpdateFilterExt,
    prelude::*,
    types::CallbackQuery,
};

extern crate pretty_env_logger;
#[macro_use] extern crate log;

#[tokio::main]
async fn main() {
    pretty_env_logger::init();
    let config = match Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(err) => {
            error!("Invalid configuration: {}", err);
            std::process::exit(1);
        }
    };
    let bot = Bot::from_env();
    info!("Booking requests will be sent to {}/{}", config.target.host, config.target.destination);

    let user_sessions = Arc::new(SessionStore::default());

    let handler = dptree::entry()
    .branch(
        Update::filter_message().endpoint({
        let user_sessions = user_sessions.clone();

        move |bot: Bot, msg: Message| {
            let user_sessions = user_sessions.clone();

            async move {
                let mut slot = user_sessions.lock(msg.chat.id).await;
                if let Err(err) = handle_message(bot, msg, &mut slot).await {
                    error!("Failed to handle message: {}", err);
                }
                respond(())
            }
        }
    }))
    .branch(Update::filter_callback_query().endpoint({
        let config = config.clone();
        let user_sessions = user_sessions.clone();

        move |q: CallbackQuery, bot: Bot| {
            let config = config.clone();
            let user_sessions = user_sessions.clone();

            async move {
                let message = q.message.as_ref().and_then(|m| m.regular_message()).cloned();
                if let Some(message) = message {
                    let mut slot = user_sessions.lock(message.chat.id).await;
                    if let Err(err) = handle_callback_query(bot, q, message, &config, &mut slot).await {
                        error!("Failed to handle callback query: {}", err);
                    }
                }
                respond(())
            }
        }
    }));

    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}
