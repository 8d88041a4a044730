use chrono::{Datelike, NaiveDate};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use time::{macros::format_description, Date, PrimitiveDateTime, Time};

pub const OPENING_HOUR: u8 = 8;
pub const CLOSING_HOUR: u8 = 20;
const SLOT_MINUTES: u8 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerAction {
    Ignore,
    SelectDate(Date),
    ChangeMonth { month: u32, year: i32 },
    SelectTime(Time),
    BackToCalendar,
}

pub fn parse_picker_callback(data: &str) -> Option<PickerAction> {
    if data == "ignore" {
        return Some(PickerAction::Ignore);
    }
    if data == "back_to_calendar" {
        return Some(PickerAction::BackToCalendar);
    }
    if let Some(date) = data.strip_prefix("calendar:select:") {
        let date_format = format_description!("[year]-[month]-[day]");
        return Date::parse(date, &date_format).ok().map(PickerAction::SelectDate);
    }
    if let Some(time) = data.strip_prefix("time:") {
        let time_format = format_description!("[hour]:[minute]");
        return Time::parse(time, &time_format).ok().map(PickerAction::SelectTime);
    }

    let parts: Vec<&str> = data.split(':').collect();
    match parts.as_slice() {
        ["calendar", direction, month, year] => {
            let month = month.parse::<u32>().ok().filter(|m| (1..=12).contains(m))?;
            let year = year.parse::<i32>().ok()?;
            let (month, year) = match *direction {
                "prev_month" => shift_month(month, year, -1)?,
                "next_month" => shift_month(month, year, 1)?,
                _ => return None,
            };
            Some(PickerAction::ChangeMonth { month, year })
        }
        _ => None,
    }
}

fn shift_month(month: u32, year: i32, delta: i32) -> Option<(u32, i32)> {
    let index = year
        .checked_mul(12)?
        .checked_add(month as i32 - 1)?
        .checked_add(delta)?;
    Some(((index.rem_euclid(12) + 1) as u32, index.div_euclid(12)))
}

/// Month grid starting on Monday. Days before `today` are shown crossed out
/// and do nothing when pressed.
pub fn generate_calendar(month: u32, year: i32, today: NaiveDate) -> InlineKeyboardMarkup {
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = Vec::new();

    keyboard.push(vec![InlineKeyboardButton::callback(
        format!("📅 {} {}", month_name(month), year),
        "ignore",
    )]);

    let weekdays = ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"];
    keyboard.push(
        weekdays
            .into_iter()
            .map(|day| InlineKeyboardButton::callback(day, "ignore"))
            .collect(),
    );

    if let Some(first_day) = NaiveDate::from_ymd_opt(year, month, 1) {
        let mut row: Vec<InlineKeyboardButton> = Vec::new();
        for _ in 0..first_day.weekday().num_days_from_monday() {
            row.push(InlineKeyboardButton::callback(" ", "ignore"));
        }

        for date in first_day.iter_days().take_while(|d| d.month() == month) {
            if date < today {
                row.push(InlineKeyboardButton::callback(format!("❌ {}", date.day()), "ignore"));
            } else {
                row.push(InlineKeyboardButton::callback(
                    format!("{:2}", date.day()),
                    format!("calendar:select:{}", date),
                ));
            }

            if row.len() == 7 {
                keyboard.push(std::mem::take(&mut row));
            }
        }

        if !row.is_empty() {
            while row.len() < 7 {
                row.push(InlineKeyboardButton::callback(" ", "ignore"));
            }
            keyboard.push(row);
        }
    }

    keyboard.push(vec![
        InlineKeyboardButton::callback("< Month", format!("calendar:prev_month:{}:{}", month, year)),
        InlineKeyboardButton::callback("Month >", format!("calendar:next_month:{}:{}", month, year)),
    ]);

    InlineKeyboardMarkup::new(keyboard)
}

pub fn time_slots() -> Vec<Time> {
    (OPENING_HOUR..CLOSING_HOUR)
        .flat_map(|hour| (0..60).step_by(SLOT_MINUTES as usize).map(move |minute| (hour, minute)))
        .filter_map(|(hour, minute)| Time::from_hms(hour, minute, 0).ok())
        .collect()
}

pub fn time_slot_keyboard() -> InlineKeyboardMarkup {
    let time_format = format_description!("[hour]:[minute]");
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = Vec::new();

    for pair in time_slots().chunks(2) {
        keyboard.push(
            pair.iter()
                .filter_map(|slot| slot.format(&time_format).ok())
                .map(|label| InlineKeyboardButton::callback(label.clone(), format!("time:{}", label)))
                .collect(),
        );
    }

    keyboard.push(vec![InlineKeyboardButton::callback(
        "⟵ Back to the calendar",
        "back_to_calendar",
    )]);

    InlineKeyboardMarkup::new(keyboard)
}

/// The text stored as the session date and time, e.g. `2026-11-02 10:30`.
pub fn format_session_date_time(date: Date, time: Time) -> Result<String, time::error::Format> {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]");
    PrimitiveDateTime::new(date, time).format(&format)
}

pub fn is_in_past(date: Date, today: NaiveDate) -> bool {
    NaiveDate::from_ymd_opt(date.year(), u8::from(date.month()) as u32, date.day() as u32)
        .map_or(true, |date| date < today)
}

fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January", 2 => "February", 3 => "March", 4 => "April",
        5 => "May", 6 => "June", 7 => "July", 8 => "August",
        9 => "September", 10 => "October", 11 => "November", 12 => "December",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use teloxide::types::InlineKeyboardButtonKind;
    use time::macros::{date, time};

    use super::*;

    fn callback_data(button: &InlineKeyboardButton) -> &str {
        match &button.kind {
            InlineKeyboardButtonKind::CallbackData(data) => data,
            _ => "",
        }
    }

    #[test]
    fn session_date_time_is_year_month_day_hour_minute() {
        let text = format_session_date_time(date!(2026-11-02), time!(9:30)).unwrap();
        assert_eq!(text, "2026-11-02 09:30");
    }

    #[test]
    fn picker_callbacks_parse() {
        assert_eq!(
            parse_picker_callback("calendar:select:2026-11-02"),
            Some(PickerAction::SelectDate(date!(2026-11-02)))
        );
        assert_eq!(
            parse_picker_callback("time:14:30"),
            Some(PickerAction::SelectTime(time!(14:30)))
        );
        assert_eq!(
            parse_picker_callback("calendar:prev_month:1:2027"),
            Some(PickerAction::ChangeMonth { month: 12, year: 2026 })
        );
        assert_eq!(
            parse_picker_callback("calendar:next_month:12:2026"),
            Some(PickerAction::ChangeMonth { month: 1, year: 2027 })
        );
        assert_eq!(parse_picker_callback("ignore"), Some(PickerAction::Ignore));
        assert_eq!(parse_picker_callback("calendar:select:tomorrow"), None);
        assert_eq!(parse_picker_callback("calendar:next_month:13:2026"), None);
    }

    #[test]
    fn month_navigation_rejects_years_out_of_range() {
        assert_eq!(parse_picker_callback("calendar:next_month:1:2000000000"), None);
        assert_eq!(parse_picker_callback("calendar:prev_month:1:-2000000000"), None);
    }

    #[test]
    fn calendar_disables_past_days() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let markup = generate_calendar(10, 2026, today);
        let days: Vec<&InlineKeyboardButton> = markup.inline_keyboard[2..markup.inline_keyboard.len() - 1]
            .iter()
            .flatten()
            .filter(|button| button.text.trim() != "")
            .collect();

        assert_eq!(days.len(), 31);
        assert_eq!(days[16].text, "❌ 17");
        assert_eq!(callback_data(days[16]), "ignore");
        assert_eq!(callback_data(days[17]), "calendar:select:2026-10-18");
        assert!(markup.inline_keyboard.iter().all(|row| row.len() <= 7));
    }

    #[test]
    fn calendar_first_row_is_offset_to_the_weekday() {
        // 1 October 2026 is a Thursday.
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let markup = generate_calendar(10, 2026, today);
        let first_week = &markup.inline_keyboard[2];
        assert_eq!(first_week.len(), 7);
        assert_eq!(first_week[2].text, " ");
        assert_eq!(first_week[3].text, " 1");
    }

    #[test]
    fn slots_cover_opening_hours_in_pairs() {
        let slots = time_slots();
        assert_eq!(slots.first(), Some(&time!(8:00)));
        assert_eq!(slots.last(), Some(&time!(19:30)));
        assert_eq!(slots.len(), 24);

        let markup = time_slot_keyboard();
        assert_eq!(callback_data(&markup.inline_keyboard[0][1]), "time:08:30");
        assert_eq!(markup.inline_keyboard.len(), 13);
    }

    #[test]
    fn past_dates_are_detected() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        assert!(is_in_past(date!(2026-10-17), today));
        assert!(!is_in_past(date!(2026-10-18), today));
    }
}
