//! Validated domain types shared across the LIS session layer.
//!
//! Every identifier that crosses a crate boundary is a newtype that guarantees
//! non-empty content, so the stores and the orchestrator never have to
//! re-check "is this id actually set" at each call site.

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
    /// The input did not name a known value of the expected type
    #[error("Unrecognised value: {0}")]
    Unrecognised(String),
}

/// A string type that guarantees non-empty content.
///
/// Wraps a `String` and ensures it contains at least one non-whitespace
/// character. Input is trimmed of leading and trailing whitespace during
/// construction, and the same validation runs on deserialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// Returns `Err(TextError::Empty)` if the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// Declares a non-empty string identifier newtype with the same trim/validate
/// behaviour as [`NonEmptyText`], serialized as a plain JSON string.
macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(String);

        impl $name {
            /// Creates the identifier, rejecting empty or whitespace-only input.
            pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
                let trimmed = input.as_ref().trim();
                if trimmed.is_empty() {
                    return Err(TextError::Empty);
                }
                Ok(Self(trimmed.to_owned()))
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                $name::new(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

identifier! {
    /// A physical work room within a department.
    RoomId
}
identifier! {
    /// A hospital department.
    DepartmentId
}
identifier! {
    /// An operator (actor) user account.
    UserId
}
identifier! {
    /// A server-defined workflow state.
    StateId
}
identifier! {
    /// The backend's persisted representation of a lab request once it has
    /// entered the LIS workflow.
    StoredServiceRequestId
}
identifier! {
    /// One child service (test) of a stored service request.
    ServiceId
}
identifier! {
    /// A staining method applicable to a sample.
    StainingMethodId
}

/// Stable identifier of one open tab, unique within the session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TabKey(String);

impl TabKey {
    /// Creates a tab key from existing input (restore path).
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Generates a fresh unique key for a newly opened tab.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TabKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for TabKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for TabKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        TabKey::new(&s).map_err(serde::de::Error::custom)
    }
}

/// The kind of workflow action a transition performs, matching the backend's
/// action enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Start,
    Complete,
    Pause,
    Resume,
    Cancel,
    Skip,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ActionType::Start => "START",
            ActionType::Complete => "COMPLETE",
            ActionType::Pause => "PAUSE",
            ActionType::Resume => "RESUME",
            ActionType::Cancel => "CANCEL",
            ActionType::Skip => "SKIP",
        };
        write!(f, "{name}")
    }
}

impl std::str::FromStr for ActionType {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "START" => Ok(ActionType::Start),
            "COMPLETE" => Ok(ActionType::Complete),
            "PAUSE" => Ok(ActionType::Pause),
            "RESUME" => Ok(ActionType::Resume),
            "CANCEL" => Ok(ActionType::Cancel),
            "SKIP" => Ok(ActionType::Skip),
            other => Err(TextError::Unrecognised(other.to_owned())),
        }
    }
}

/// Reception codes beginning with this prefix mark the special sample
/// category that requires a classification flag before handover.
pub const SPECIAL_CATEGORY_PREFIX: &str = "ST";

/// A generated identifier tagging a physical sample.
///
/// The code's prefix encodes the sample category; see
/// [`ReceptionCode::is_special_category`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceptionCode(String);

impl ReceptionCode {
    /// Creates a reception code, rejecting empty or whitespace-only input.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Whether this code marks the special sample category, making a
    /// classification flag mandatory at transition time.
    pub fn is_special_category(&self) -> bool {
        self.0.starts_with(SPECIAL_CATEGORY_PREFIX)
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReceptionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for ReceptionCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for ReceptionCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ReceptionCode::new(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty_text_trims_input() {
        let text = NonEmptyText::new("  Histology  ").unwrap();
        assert_eq!(text.as_str(), "Histology");
    }

    #[test]
    fn test_non_empty_text_rejects_whitespace() {
        assert!(NonEmptyText::new("   ").is_err());
        assert!(NonEmptyText::new("").is_err());
    }

    #[test]
    fn test_identifier_round_trips_through_json() {
        let id = RoomId::new("room-7").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"room-7\"");
        let back: RoomId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_identifier_rejects_empty_on_deserialize() {
        let result: Result<StateId, _> = serde_json::from_str("\"  \"");
        assert!(result.is_err());
    }

    #[test]
    fn test_tab_keys_are_unique() {
        let a = TabKey::generate();
        let b = TabKey::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_action_type_serializes_screaming_snake() {
        let json = serde_json::to_string(&ActionType::Complete).unwrap();
        assert_eq!(json, "\"COMPLETE\"");
        let back: ActionType = serde_json::from_str("\"SKIP\"").unwrap();
        assert_eq!(back, ActionType::Skip);
    }

    #[test]
    fn test_action_type_parses_case_insensitively() {
        let parsed: ActionType = "complete".parse().unwrap();
        assert_eq!(parsed, ActionType::Complete);
        assert!("advance".parse::<ActionType>().is_err());
    }

    #[test]
    fn test_reception_code_special_category() {
        let special = ReceptionCode::new("ST24-00123").unwrap();
        assert!(special.is_special_category());

        let routine = ReceptionCode::new("HT24-00455").unwrap();
        assert!(!routine.is_special_category());
    }
}
