use chrono::{Datelike, Local};
use log::{debug, info, warn};
use std::{
    collections::{BTreeSet, HashMap},
    error::Error,
    sync::Arc,
};
use teloxide::{
    prelude::*,
    types::{CallbackQuery, InlineKeyboardButton, InlineKeyboardMarkup, Message},
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::config::Config;
use crate::message::{format_message, MessagingTarget};
use crate::models::{BookingDraft, Field, PetType, SessionLocation, SessionType};
use crate::picker::{
    format_session_date_time, generate_calendar, is_in_past, parse_picker_callback, time_slot_keyboard,
    PickerAction,
};
use crate::sink::{dispatch, MessageSink, SubmitError, TelegramLinkSink};
use crate::validation::{validate, ValidationErrors};

pub type HandlerResult = Result<(), Box<dyn Error + Send + Sync>>;

const SKIP: &str = "-";

// Questions of the form, in the order they are asked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormStep {
    FullName,
    Phone,
    Email,
    Address,
    BirthDate,
    SessionType,
    SessionDate,
    SessionTime,
    Participants,
    ChildrenCount,
    ChildrenAge,
    PetsCount,
    PetTypes,
    Location,
    ExternalAddress,
    AdditionalNotes,
    Preferences,
    Review,
}

impl FormStep {
    fn next(self, draft: &BookingDraft) -> FormStep {
        match self {
            FormStep::FullName => FormStep::Phone,
            FormStep::Phone => FormStep::Email,
            FormStep::Email => FormStep::Address,
            FormStep::Address => FormStep::BirthDate,
            FormStep::BirthDate => FormStep::SessionType,
            FormStep::SessionType => FormStep::SessionDate,
            FormStep::SessionDate => FormStep::SessionTime,
            FormStep::SessionTime => FormStep::Participants,
            FormStep::Participants => FormStep::ChildrenCount,
            FormStep::ChildrenCount => FormStep::ChildrenAge,
            FormStep::ChildrenAge => FormStep::PetsCount,
            FormStep::PetsCount => FormStep::PetTypes,
            FormStep::PetTypes => FormStep::Location,
            FormStep::Location if draft.location() == Some(SessionLocation::External) => {
                FormStep::ExternalAddress
            }
            FormStep::Location | FormStep::ExternalAddress => FormStep::AdditionalNotes,
            FormStep::AdditionalNotes => FormStep::Preferences,
            FormStep::Preferences | FormStep::Review => FormStep::Review,
        }
    }

    fn for_field(field: Field) -> FormStep {
        match field {
            Field::FullName => FormStep::FullName,
            Field::Phone => FormStep::Phone,
            Field::Email => FormStep::Email,
            Field::Participants => FormStep::Participants,
            Field::ChildrenCount => FormStep::ChildrenCount,
            Field::PetsCount => FormStep::PetsCount,
            Field::SessionType => FormStep::SessionType,
            Field::SessionDateTime => FormStep::SessionDate,
            Field::SessionLocation => FormStep::Location,
        }
    }

    fn prompt(self) -> &'static str {
        match self {
            FormStep::FullName => "What is your full name?",
            FormStep::Phone => "Your phone number:",
            FormStep::Email => "Your e-mail:",
            FormStep::Address => "Your address (optional, send - to skip):",
            FormStep::BirthDate => "Your birth date (optional, send - to skip):",
            FormStep::SessionType => "Which session would you like?",
            FormStep::SessionDate => "Pick the session date 📅",
            FormStep::SessionTime => "Pick a convenient time:",
            FormStep::Participants => "How many people will take part?",
            FormStep::ChildrenCount => "How many children? (send - if none)",
            FormStep::ChildrenAge => "How old are the children? (send - to skip)",
            FormStep::PetsCount => "How many pets? (send - if none)",
            FormStep::PetTypes => "Which pets will come along? Tap to select, then Done.",
            FormStep::Location => "Where should the session take place?",
            FormStep::ExternalAddress => {
                "Address of the external session (send - to keep the address you gave earlier):"
            }
            FormStep::AdditionalNotes => "Anything else we should know? (send - to skip)",
            FormStep::Preferences => "Preferences or references for the shoot (send - to skip):",
            FormStep::Review => "All set! Press the button to close your booking.",
        }
    }
}

// One chat's form in progress
pub struct FormSession {
    step: FormStep,
    draft: BookingDraft,
    selected_date: Option<time::Date>,
    // after a failed submit every corrected answer returns straight to review
    fixing: bool,
}

impl FormSession {
    pub fn new() -> Self {
        FormSession {
            step: FormStep::FullName,
            draft: BookingDraft::new(),
            selected_date: None,
            fixing: false,
        }
    }

    fn advance(&mut self) {
        let next = self.step.next(&self.draft);
        self.step = if self.fixing && next != FormStep::ExternalAddress {
            FormStep::Review
        } else {
            next
        };
    }
}

/// Per-chat form slots. The map lock is only held to find a chat's slot, so
/// chats are served independently while each chat's updates run in order.
#[derive(Default)]
pub struct SessionStore {
    chats: Mutex<HashMap<i64, Arc<Mutex<Option<FormSession>>>>>,
}

impl SessionStore {
    pub async fn lock(&self, chat_id: ChatId) -> OwnedMutexGuard<Option<FormSession>> {
        let slot = {
            let mut chats = self.chats.lock().await;
            chats.entry(chat_id.0).or_default().clone()
        };
        slot.lock_owned().await
    }
}

/// Stores a typed answer for the current step. Returns `false` when the step
/// is answered with buttons instead.
fn apply_text(draft: &mut BookingDraft, step: FormStep, text: &str) -> bool {
    let text = text.trim();
    let optional = if text == SKIP { String::new() } else { text.to_string() };
    match step {
        FormStep::FullName => draft.full_name = text.to_string(),
        FormStep::Phone => draft.phone = text.to_string(),
        FormStep::Email => draft.email = text.to_string(),
        FormStep::Participants => draft.participants = text.to_string(),
        FormStep::Address => draft.address = optional,
        FormStep::BirthDate => draft.birth_date = optional,
        FormStep::ChildrenCount => draft.children_count = optional,
        FormStep::ChildrenAge => draft.children_age = optional,
        FormStep::PetsCount => draft.pets_count = optional,
        FormStep::ExternalAddress => {
            if text != SKIP {
                draft.address = optional;
            }
        }
        FormStep::AdditionalNotes => draft.additional_notes = optional,
        FormStep::Preferences => draft.preferences = optional,
        FormStep::SessionType
        | FormStep::SessionDate
        | FormStep::SessionTime
        | FormStep::PetTypes
        | FormStep::Location
        | FormStep::Review => return false,
    }
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormAction {
    SessionType(SessionType),
    TogglePet(PetType),
    PetsDone,
    Location(SessionLocation),
    LocationDone,
    Submit,
    Picker(PickerAction),
}

impl FormAction {
    /// Whether a button of this kind belongs to the keyboard of `step`.
    fn applies_to(self, step: FormStep) -> bool {
        match self {
            FormAction::SessionType(_) => step == FormStep::SessionType,
            FormAction::TogglePet(_) | FormAction::PetsDone => step == FormStep::PetTypes,
            FormAction::Location(_) | FormAction::LocationDone => step == FormStep::Location,
            FormAction::Submit => step == FormStep::Review,
            FormAction::Picker(PickerAction::Ignore) => true,
            FormAction::Picker(PickerAction::SelectDate(_))
            | FormAction::Picker(PickerAction::ChangeMonth { .. }) => step == FormStep::SessionDate,
            FormAction::Picker(PickerAction::SelectTime(_))
            | FormAction::Picker(PickerAction::BackToCalendar) => step == FormStep::SessionTime,
        }
    }
}

fn parse_callback(data: &str) -> Option<FormAction> {
    if let Some(kind) = data.strip_prefix("session_type:") {
        return kind.parse().ok().map(FormAction::SessionType);
    }
    if let Some(pet) = data.strip_prefix("pet:") {
        if pet == "done" {
            return Some(FormAction::PetsDone);
        }
        return pet.parse().ok().map(FormAction::TogglePet);
    }
    if let Some(location) = data.strip_prefix("location:") {
        if location == "done" {
            return Some(FormAction::LocationDone);
        }
        return location.parse().ok().map(FormAction::Location);
    }
    if data == "submit" {
        return Some(FormAction::Submit);
    }
    parse_picker_callback(data).map(FormAction::Picker)
}

fn session_type_keyboard() -> InlineKeyboardMarkup {
    let keyboard = SessionType::ALL
        .iter()
        .map(|kind| {
            vec![InlineKeyboardButton::callback(
                kind.label(),
                format!("session_type:{}", kind),
            )]
        })
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(keyboard)
}

fn pet_types_keyboard(selected: &BTreeSet<PetType>) -> InlineKeyboardMarkup {
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = PetType::ALL
        .iter()
        .map(|pet| {
            let mark = if selected.contains(pet) { "☑️" } else { "⬜" };
            vec![InlineKeyboardButton::callback(
                format!("{} {}", mark, pet),
                format!("pet:{}", pet),
            )]
        })
        .collect();
    keyboard.push(vec![InlineKeyboardButton::callback("Done ✅", "pet:done")]);
    InlineKeyboardMarkup::new(keyboard)
}

fn location_keyboard(current: Option<SessionLocation>) -> InlineKeyboardMarkup {
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = SessionLocation::ALL
        .iter()
        .map(|location| {
            let mark = if current == Some(*location) { "🔘" } else { "⚪" };
            vec![InlineKeyboardButton::callback(
                format!("{} {}", mark, location),
                format!("location:{}", location),
            )]
        })
        .collect();
    keyboard.push(vec![InlineKeyboardButton::callback("Done ✅", "location:done")]);
    InlineKeyboardMarkup::new(keyboard)
}

fn submit_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "📸 Close my booking",
        "submit",
    )]])
}

fn describe_errors(errors: &ValidationErrors) -> String {
    let mut text = String::from("Please fix the following:\n");
    for (_, message) in errors.iter() {
        text.push_str("• ");
        text.push_str(message);
        text.push('\n');
    }
    text
}

async fn send_prompt(bot: &Bot, chat_id: ChatId, session: &FormSession) -> HandlerResult {
    let request = bot.send_message(chat_id, session.step.prompt());
    match session.step {
        FormStep::SessionType => request.reply_markup(session_type_keyboard()).await?,
        FormStep::SessionDate => {
            let today = Local::now().date_naive();
            request
                .reply_markup(generate_calendar(today.month(), today.year(), today))
                .await?
        }
        FormStep::SessionTime => request.reply_markup(time_slot_keyboard()).await?,
        FormStep::PetTypes => request
            .reply_markup(pet_types_keyboard(&session.draft.pet_types))
            .await?,
        FormStep::Location => request
            .reply_markup(location_keyboard(session.draft.location()))
            .await?,
        FormStep::Review => request.reply_markup(submit_keyboard()).await?,
        _ => request.await?,
    };
    Ok(())
}

pub async fn handle_message(
    bot: Bot,
    msg: Message,
    slot: &mut Option<FormSession>,
) -> HandlerResult {
    let chat_id = msg.chat.id;
    let Some(text) = msg.text() else {
        bot.send_message(chat_id, "Please answer with a text message.").await?;
        return Ok(());
    };

    match text.trim() {
        "/start" => {
            info!("Starting a booking form for chat {}", chat_id.0);
            let session = FormSession::new();
            bot.send_message(
                chat_id,
                "Hi! This is Afeto em Foco 📷 Tell us a bit about the session you'd like to book.",
            )
            .await?;
            send_prompt(&bot, chat_id, &session).await?;
            *slot = Some(session);
            return Ok(());
        }
        "/cancel" => {
            if slot.take().is_some() {
                info!("Chat {} cancelled its booking form", chat_id.0);
            }
            bot.send_message(chat_id, "Booking cancelled. Send /start to begin again.")
                .await?;
            return Ok(());
        }
        _ => {}
    }

    let Some(session) = slot.as_mut() else {
        bot.send_message(chat_id, "Send /start to fill in a booking request.")
            .await?;
        return Ok(());
    };

    if !apply_text(&mut session.draft, session.step, text) {
        bot.send_message(chat_id, "Please use the buttons to answer this one.")
            .await?;
        send_prompt(&bot, chat_id, session).await?;
        return Ok(());
    }

    debug!("Chat {} answered {:?}", chat_id.0, session.step);
    session.advance();
    send_prompt(&bot, chat_id, session).await?;
    Ok(())
}

pub async fn handle_callback_query(
    bot: Bot,
    q: CallbackQuery,
    msg: Message,
    config: &Config,
    slot: &mut Option<FormSession>,
) -> HandlerResult {
    let chat_id = msg.chat.id;
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };
    debug!("Callback query from chat {}: {}", chat_id.0, data);

    let Some(action) = parse_callback(data) else {
        warn!("Unknown callback data from chat {}: {}", chat_id.0, data);
        return Ok(());
    };

    let Some(session) = slot.as_mut() else {
        bot.send_message(chat_id, "This form has expired. Send /start to begin a new booking.")
            .await?;
        return Ok(());
    };

    if !action.applies_to(session.step) {
        warn!("Stale {:?} button pressed in chat {} at {:?}", action, chat_id.0, session.step);
        bot.send_message(chat_id, "That button is no longer active.").await?;
        return Ok(());
    }

    let today = Local::now().date_naive();
    let mut discard = false;

    match action {
        FormAction::Picker(PickerAction::Ignore) => {}
        FormAction::SessionType(kind) => {
            session.draft.session_type = kind.to_string();
            bot.edit_message_text(chat_id, msg.id, format!("Session type: {}", kind))
                .await?;
            session.advance();
            send_prompt(&bot, chat_id, session).await?;
        }
        FormAction::Picker(PickerAction::ChangeMonth { month, year }) => {
            bot.edit_message_reply_markup(chat_id, msg.id)
                .reply_markup(generate_calendar(month, year, today))
                .await?;
        }
        FormAction::Picker(PickerAction::SelectDate(date)) => {
            if is_in_past(date, today) {
                bot.send_message(chat_id, "You can't pick a date in the past. Please choose another date.")
                    .await?;
                return Ok(());
            }
            session.selected_date = Some(date);
            session.step = FormStep::SessionTime;
            bot.edit_message_text(chat_id, msg.id, format!("Pick a convenient time on {}:", date))
                .reply_markup(time_slot_keyboard())
                .await?;
        }
        FormAction::Picker(PickerAction::BackToCalendar) => {
            session.step = FormStep::SessionDate;
            let (month, year) = session
                .selected_date
                .map(|date| (u8::from(date.month()) as u32, date.year()))
                .unwrap_or((today.month(), today.year()));
            bot.edit_message_text(chat_id, msg.id, FormStep::SessionDate.prompt())
                .reply_markup(generate_calendar(month, year, today))
                .await?;
        }
        FormAction::Picker(PickerAction::SelectTime(time)) => {
            let Some(date) = session.selected_date else {
                session.step = FormStep::SessionDate;
                send_prompt(&bot, chat_id, session).await?;
                return Ok(());
            };
            let date_time = format_session_date_time(date, time)?;
            bot.edit_message_text(chat_id, msg.id, format!("Date and time: {}", date_time))
                .await?;
            session.draft.session_date_time = date_time;
            session.advance();
            send_prompt(&bot, chat_id, session).await?;
        }
        FormAction::TogglePet(pet) => {
            session.draft.toggle_pet(pet);
            bot.edit_message_reply_markup(chat_id, msg.id)
                .reply_markup(pet_types_keyboard(&session.draft.pet_types))
                .await?;
        }
        FormAction::PetsDone => {
            let chosen = if session.draft.pet_types.is_empty() {
                "none".to_string()
            } else {
                session
                    .draft
                    .pet_types
                    .iter()
                    .map(|pet| pet.label())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            bot.edit_message_text(chat_id, msg.id, format!("Pet types: {}", chosen))
                .await?;
            session.advance();
            send_prompt(&bot, chat_id, session).await?;
        }
        FormAction::Location(location) => {
            session.draft.session_location = location.to_string();
            bot.edit_message_reply_markup(chat_id, msg.id)
                .reply_markup(location_keyboard(Some(location)))
                .await?;
        }
        FormAction::LocationDone => {
            bot.edit_message_text(
                chat_id,
                msg.id,
                format!("Session location: {}", session.draft.session_location),
            )
            .await?;
            session.advance();
            send_prompt(&bot, chat_id, session).await?;
        }
        FormAction::Submit => {
            discard = submit(&bot, chat_id, session, &config.target).await?;
        }
    }

    // a dispatched form is gone, so pressing submit again finds nothing to send
    if discard {
        *slot = None;
    }
    Ok(())
}

#[derive(Debug)]
enum SubmitOutcome {
    Invalid(ValidationErrors),
    Dispatched,
    Failed(SubmitError),
}

/// Validates the draft and hands the finished message to `sink`. A rejected
/// draft is pointed back at its first failing field; every answer is kept
/// unless the request went out.
async fn submit_form<S: MessageSink>(
    sink: &S,
    session: &mut FormSession,
    target: &MessagingTarget,
) -> Result<SubmitOutcome, url::ParseError> {
    let request = match validate(&session.draft) {
        Ok(request) => request,
        Err(errors) => {
            if let Some(field) = errors.first_field() {
                session.fixing = true;
                session.step = FormStep::for_field(field);
            }
            return Ok(SubmitOutcome::Invalid(errors));
        }
    };

    let url = target.link_for(&format_message(&request))?;
    Ok(match dispatch(sink, &url).await {
        Ok(()) => SubmitOutcome::Dispatched,
        Err(err) => SubmitOutcome::Failed(err),
    })
}

/// Returns whether the form was dispatched and can be discarded.
async fn submit(
    bot: &Bot,
    chat_id: ChatId,
    session: &mut FormSession,
    target: &MessagingTarget,
) -> Result<bool, Box<dyn Error + Send + Sync>> {
    let sink = TelegramLinkSink::new(bot.clone(), chat_id);
    match submit_form(&sink, session, target).await? {
        SubmitOutcome::Invalid(errors) => {
            info!("Booking form in chat {} rejected: {}", chat_id.0, errors);
            bot.send_message(chat_id, describe_errors(&errors)).await?;
            send_prompt(bot, chat_id, session).await?;
            Ok(false)
        }
        SubmitOutcome::Dispatched => {
            info!("Booking request from chat {} handed off to {}", chat_id.0, target.host);
            Ok(true)
        }
        SubmitOutcome::Failed(err) => {
            warn!("Could not dispatch booking request from chat {}: {}", chat_id.0, err);
            bot.send_message(chat_id, err.to_string()).await?;
            Ok(false)
        }
    }
}
