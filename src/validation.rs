use std::collections::BTreeMap;

use thiserror::Error;
use validator::ValidateEmail;

use crate::models::{BookingDraft, BookingRequest, Field, SessionLocation, SessionType};

pub const FULL_NAME_REQUIRED: &str = "Full name is required";
pub const PHONE_REQUIRED: &str = "Phone is required";
pub const INVALID_EMAIL: &str = "Invalid email";
pub const PARTICIPANTS_POSITIVE: &str = "Participant count must be a positive integer";
pub const CHILDREN_COUNT_NUMBER: &str = "Children count must be a whole number";
pub const PETS_COUNT_NUMBER: &str = "Pet count must be a whole number";
pub const SESSION_TYPE_REQUIRED: &str = "Session type is required";
pub const DATE_TIME_REQUIRED: &str = "Date and time are required";
pub const LOCATION_REQUIRED: &str = "Session location is required";

/// Every rule that failed for one draft, keyed by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{} field(s) failed validation", .errors.len())]
pub struct ValidationErrors {
    errors: BTreeMap<Field, &'static str>,
}

impl ValidationErrors {
    fn add(&mut self, field: Field, message: &'static str) {
        self.errors.insert(field, message);
    }

    pub fn get(&self, field: Field) -> Option<&'static str> {
        self.errors.get(&field).copied()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &'static str)> + '_ {
        self.errors.iter().map(|(field, message)| (*field, *message))
    }

    pub fn first_field(&self) -> Option<Field> {
        self.errors.keys().next().copied()
    }
}

/// Checks every rule on the draft and either returns the typed request or
/// all the failures at once.
pub fn validate(draft: &BookingDraft) -> Result<BookingRequest, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let full_name = draft.full_name.trim();
    if full_name.is_empty() {
        errors.add(Field::FullName, FULL_NAME_REQUIRED);
    }

    let phone = draft.phone.trim();
    if phone.is_empty() {
        errors.add(Field::Phone, PHONE_REQUIRED);
    }

    let email = draft.email.trim().to_string();
    if !email.validate_email() {
        errors.add(Field::Email, INVALID_EMAIL);
    }

    let participants = parse_positive(&draft.participants);
    if participants.is_none() {
        errors.add(Field::Participants, PARTICIPANTS_POSITIVE);
    }

    let children_count = parse_optional_count(&draft.children_count)
        .unwrap_or_else(|_| {
            errors.add(Field::ChildrenCount, CHILDREN_COUNT_NUMBER);
            None
        });

    let pets_count = parse_optional_count(&draft.pets_count).unwrap_or_else(|_| {
        errors.add(Field::PetsCount, PETS_COUNT_NUMBER);
        None
    });

    let session_type = draft.session_type.parse::<SessionType>().ok();
    if session_type.is_none() {
        errors.add(Field::SessionType, SESSION_TYPE_REQUIRED);
    }

    let session_date_time = draft.session_date_time.trim();
    if session_date_time.is_empty() {
        errors.add(Field::SessionDateTime, DATE_TIME_REQUIRED);
    }

    let session_location = draft.session_location.parse::<SessionLocation>().ok();
    if session_location.is_none() {
        errors.add(Field::SessionLocation, LOCATION_REQUIRED);
    }

    match (participants, session_type, session_location) {
        (Some(participants), Some(session_type), Some(session_location)) if errors.is_empty() => {
            Ok(BookingRequest {
                full_name: full_name.to_string(),
                phone: phone.to_string(),
                email,
                address: optional_text(&draft.address),
                birth_date: optional_text(&draft.birth_date),
                participants,
                children_count,
                children_age: optional_text(&draft.children_age),
                pets_count,
                pet_types: draft.pet_types.clone(),
                additional_notes: optional_text(&draft.additional_notes),
                session_type,
                session_date_time: session_date_time.to_string(),
                session_location,
                preferences: optional_text(&draft.preferences),
            })
        }
        _ => Err(errors),
    }
}

fn parse_positive(text: &str) -> Option<u64> {
    parse_whole(text).ok().filter(|count| *count > 0).map(|count| count as u64)
}

/// Empty text means "not informed"; anything else must be a whole number.
fn parse_optional_count(text: &str) -> Result<Option<i64>, InvalidNumber> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    parse_whole(text).map(Some)
}

#[derive(Debug, PartialEq, Eq)]
struct InvalidNumber;

// Integral decimals such as "2.0" count as whole numbers, like the form's
// numeric keyboard produces them.
fn parse_whole(text: &str) -> Result<i64, InvalidNumber> {
    let text = text.trim();
    if let Ok(value) = text.parse::<i64>() {
        return Ok(value);
    }
    let value = text.parse::<f64>().map_err(|_| InvalidNumber)?;
    if value.is_finite() && value.fract() == 0.0 && value.abs() < MAX_EXACT_FLOAT {
        Ok(value as i64)
    } else {
        Err(InvalidNumber)
    }
}

// 2^53, the largest range where every integer is exactly representable.
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

fn optional_text(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
