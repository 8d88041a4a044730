use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::models::{BookingRequest, SessionLocation};

const NOT_INFORMED: &str = "Not informed";
const NONE: &str = "None";

// Everything but the characters JavaScript's encodeURIComponent leaves alone.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Where the finished message is sent: `https://<host>/<destination>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagingTarget {
    pub host: String,
    pub destination: String,
}

impl MessagingTarget {
    pub fn link_for(&self, message: &str) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&format!("https://{}/{}", self.host, self.destination))?;
        let text = utf8_percent_encode(message, URI_COMPONENT);
        url.set_query(Some(&format!("text={}", text)));
        Ok(url)
    }
}

pub fn format_message(request: &BookingRequest) -> String {
    let address = text_or(&request.address, NOT_INFORMED);
    let pet_types = if request.pet_types.is_empty() {
        NONE.to_string()
    } else {
        request
            .pet_types
            .iter()
            .map(|pet| pet.label())
            .collect::<Vec<_>>()
            .join(", ")
    };
    let location = match request.session_location {
        SessionLocation::Studio => SessionLocation::Studio.label().to_string(),
        SessionLocation::External => format!("{} - {}", SessionLocation::External, address),
    };

    format!(
        "Hello! Here are the booking form details:\n\
         - Full name: {}\n\
         - Phone: {}\n\
         - E-mail: {}\n\
         - Address: {}\n\
         - Birth date: {}\n\
         - Participants: {}\n\
         - Children: {}\n\
         - Children's ages: {}\n\
         - Pets: {}\n\
         - Pet types: {}\n\
         - Additional notes: {}\n\
         \n\
         Session details:\n\
         - Session type: {}\n\
         - Date and time: {}\n\
         - Location: {}\n\
         - Preferences: {}",
        request.full_name,
        request.phone,
        request.email,
        address,
        text_or(&request.birth_date, NOT_INFORMED),
        request.participants,
        count_or_none(request.children_count),
        text_or(&request.children_age, NOT_INFORMED),
        count_or_none(request.pets_count),
        pet_types,
        text_or(&request.additional_notes, NONE),
        request.session_type,
        request.session_date_time,
        location,
        text_or(&request.preferences, NONE),
    )
}

fn text_or<'a>(value: &'a Option<String>, fallback: &'a str) -> &'a str {
    value.as_deref().unwrap_or(fallback)
}

// Zero counts read the same as an empty answer.
fn count_or_none(count: Option<i64>) -> String {
    match count {
        Some(count) if count != 0 => count.to_string(),
        _ => NONE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::models::{PetType, SessionType};

    fn studio_request() -> BookingRequest {
        BookingRequest {
            full_name: "Maria Silva".to_string(),
            phone: "11999990000".to_string(),
            email: "maria@example.com".to_string(),
            address: Some("Rua Augusta 100".to_string()),
            birth_date: None,
            participants: 3,
            children_count: None,
            children_age: None,
            pets_count: Some(0),
            pet_types: BTreeSet::new(),
            additional_notes: None,
            session_type: SessionType::Newborn,
            session_date_time: "2026-11-02 10:30".to_string(),
            session_location: SessionLocation::Studio,
            preferences: None,
        }
    }

    fn target() -> MessagingTarget {
        MessagingTarget {
            host: "wa.me".to_string(),
            destination: "5511981296861".to_string(),
        }
    }

    #[test]
    fn studio_request_uses_fallbacks_and_hides_address_from_location() {
        let message = format_message(&studio_request());
        assert!(message.contains("- Children: None\n"));
        assert!(message.contains("- Pets: None\n"));
        assert!(message.contains("- Pet types: None\n"));
        assert!(message.contains("- Birth date: Not informed\n"));
        assert!(message.contains("- Location: Studio\n"));
        assert!(message.contains("- Session type: Newborn\n"));
        assert!(message.contains("- Participants: 3\n"));
        assert!(!message.contains("External"));
        assert!(message.ends_with("- Preferences: None"));
    }

    #[test]
    fn external_request_embeds_address_in_location() {
        let request = BookingRequest {
            address: Some("Street 1".to_string()),
            session_location: SessionLocation::External,
            ..studio_request()
        };
        assert!(format_message(&request).contains("- Location: External - Street 1\n"));

        let request = BookingRequest { address: None, ..request };
        assert!(format_message(&request).contains("- Location: External - Not informed\n"));
    }

    #[test]
    fn pets_and_children_are_listed_when_present() {
        let request = BookingRequest {
            children_count: Some(2),
            children_age: Some("3 and 5".to_string()),
            pets_count: Some(1),
            pet_types: [PetType::Cat, PetType::Dog].into_iter().collect(),
            ..studio_request()
        };
        let message = format_message(&request);
        assert!(message.contains("- Children: 2\n"));
        assert!(message.contains("- Children's ages: 3 and 5\n"));
        assert!(message.contains("- Pets: 1\n"));
        assert!(message.contains("- Pet types: Dog, Cat\n"));
    }

    #[test]
    fn formatting_is_deterministic() {
        let request = BookingRequest {
            pet_types: [PetType::Dog, PetType::Cat].into_iter().collect(),
            ..studio_request()
        };
        assert_eq!(format_message(&request), format_message(&request));
    }

    #[test]
    fn link_carries_the_encoded_message() {
        let message = format_message(&studio_request());
        let url = target().link_for(&message).unwrap();

        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("wa.me"));
        assert_eq!(url.path(), "/5511981296861");
        assert!(!url.as_str().contains('\n'));

        let text = url
            .query_pairs()
            .find(|(key, _)| key == "text")
            .map(|(_, value)| value.into_owned());
        assert_eq!(text, Some(message));
    }

    #[test]
    fn link_encodes_spaces_as_percent_twenty() {
        let url = target().link_for("Hi there (it's me)! +55").unwrap();
        let query = url.query().unwrap();

        assert!(query.starts_with("text=Hi%20there%20(it"));
        assert!(query.ends_with("me)!%20%2B55"));
        assert!(!query.contains('+'));

        let text = url.query_pairs().next().map(|(_, value)| value.into_owned());
        assert_eq!(text.as_deref(), Some("Hi there (it's me)! +55"));
    }
}
