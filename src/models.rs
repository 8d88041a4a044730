use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown option: {0:?}")]
pub struct UnknownOption(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SessionType {
    Pregnancy,
    Birthday,
    Christmas,
    Family,
    Newborn,
}

impl SessionType {
    pub const ALL: [SessionType; 5] = [
        SessionType::Pregnancy,
        SessionType::Birthday,
        SessionType::Christmas,
        SessionType::Family,
        SessionType::Newborn,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SessionType::Pregnancy => "Pregnancy",
            SessionType::Birthday => "Birthday",
            SessionType::Christmas => "Christmas",
            SessionType::Family => "Family",
            SessionType::Newborn => "Newborn",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PetType {
    Dog,
    Cat,
}

impl PetType {
    pub const ALL: [PetType; 2] = [PetType::Dog, PetType::Cat];

    pub fn label(&self) -> &'static str {
        match self {
            PetType::Dog => "Dog",
            PetType::Cat => "Cat",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SessionLocation {
    #[default]
    Studio,
    External,
}

impl SessionLocation {
    pub const ALL: [SessionLocation; 2] = [SessionLocation::Studio, SessionLocation::External];

    pub fn label(&self) -> &'static str {
        match self {
            SessionLocation::Studio => "Studio",
            SessionLocation::External => "External",
        }
    }
}

// Labels are matched case-insensitively so hand-typed values are accepted too.
macro_rules! labelled_enum {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.label())
                }
            }

            impl FromStr for $ty {
                type Err = UnknownOption;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    let wanted = s.trim();
                    <$ty>::ALL
                        .into_iter()
                        .find(|option| option.label().eq_ignore_ascii_case(wanted))
                        .ok_or_else(|| UnknownOption(s.to_string()))
                }
            }
        )+
    };
}

labelled_enum!(SessionType, PetType, SessionLocation);

/// Fields that carry a validation rule, in form order. Error reports are
/// sorted by this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    FullName,
    Phone,
    Email,
    Participants,
    ChildrenCount,
    PetsCount,
    SessionType,
    SessionDateTime,
    SessionLocation,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Field::FullName => "fullName",
            Field::Phone => "phone",
            Field::Email => "email",
            Field::Participants => "participants",
            Field::ChildrenCount => "childrenCount",
            Field::PetsCount => "petsCount",
            Field::SessionType => "sessionType",
            Field::SessionDateTime => "sessionDateTime",
            Field::SessionLocation => "sessionLocation",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The form as typed so far. Every answer is kept as raw text; numbers and
/// enumerations are only parsed by [`crate::validation::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingDraft {
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub birth_date: String,
    pub participants: String,
    pub children_count: String,
    pub children_age: String,
    pub pets_count: String,
    pub pet_types: BTreeSet<PetType>,
    pub additional_notes: String,
    pub session_type: String,
    pub session_date_time: String,
    pub session_location: String,
    pub preferences: String,
}

impl BookingDraft {
    /// Empty form with the defaults shown when the form opens.
    pub fn new() -> Self {
        BookingDraft {
            participants: "1".to_string(),
            session_location: SessionLocation::default().to_string(),
            ..Default::default()
        }
    }

    pub fn location(&self) -> Option<SessionLocation> {
        self.session_location.parse().ok()
    }

    pub fn toggle_pet(&mut self, pet: PetType) {
        if !self.pet_types.remove(&pet) {
            self.pet_types.insert(pet);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub address: Option<String>,
    pub birth_date: Option<String>,
    pub participants: u64,
    pub children_count: Option<i64>,
    pub children_age: Option<String>,
    pub pets_count: Option<i64>,
    pub pet_types: BTreeSet<PetType>,
    pub additional_notes: Option<String>,
    pub session_type: SessionType,
    pub session_date_time: String,
    pub session_location: SessionLocation,
    pub preferences: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_draft_defaults_to_studio_and_one_participant() {
        let draft = BookingDraft::new();
        assert_eq!(draft.participants, "1");
        assert_eq!(draft.location(), Some(SessionLocation::Studio));
        assert!(draft.pet_types.is_empty());
    }

    #[test]
    fn labels_parse_case_insensitively() {
        assert_eq!("newborn".parse::<SessionType>(), Ok(SessionType::Newborn));
        assert_eq!(" External ".parse::<SessionLocation>(), Ok(SessionLocation::External));
        assert_eq!("Cat".parse::<PetType>(), Ok(PetType::Cat));
        assert_eq!(
            "Wedding".parse::<SessionType>(),
            Err(UnknownOption("Wedding".to_string()))
        );
    }

    #[test]
    fn every_session_type_round_trips_through_its_label() {
        for kind in SessionType::ALL {
            assert_eq!(kind.to_string().parse::<SessionType>(), Ok(kind));
        }
    }

    #[test]
    fn toggling_a_pet_twice_clears_it() {
        let mut draft = BookingDraft::new();
        draft.toggle_pet(PetType::Dog);
        draft.toggle_pet(PetType::Cat);
        assert_eq!(draft.pet_types.len(), 2);
        draft.toggle_pet(PetType::Dog);
        assert_eq!(draft.pet_types.iter().copied().collect::<Vec<_>>(), vec![PetType::Cat]);
    }
}
