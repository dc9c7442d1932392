//! Validated primitive types shared across the cohort crates.
//!
//! - [`NonEmptyText`] for names, void reasons and user identifiers.
//! - [`SubjectId`] and the [`Subject`] trait for anything that can be placed in a cohort.

use std::fmt;
use std::str::FromStr;

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
}

/// A string type that guarantees non-empty content.
///
/// The input is trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// # Errors
    ///
    /// Returns [`TextError::Empty`] if the trimmed input is empty.
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

impl fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for NonEmptyText {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
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

/// Errors raised while parsing a subject identifier.
#[derive(Debug, thiserror::Error)]
pub enum SubjectIdError {
    #[error("subject id cannot be blank")]
    Blank,
    #[error("invalid subject id '{token}': {source}")]
    Malformed {
        token: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Integer identifier of a cohort subject (typically a patient id).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct SubjectId(i32);

impl SubjectId {
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i32 {
        self.0
    }
}

impl From<i32> for SubjectId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

impl From<SubjectId> for i32 {
    fn from(id: SubjectId) -> Self {
        id.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SubjectId {
    type Err = SubjectIdError;

    /// Parses a single id token. Surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        if token.is_empty() {
            return Err(SubjectIdError::Blank);
        }
        token
            .parse::<i32>()
            .map(Self)
            .map_err(|source| SubjectIdError::Malformed {
                token: token.to_owned(),
                source,
            })
    }
}

/// Anything that exposes a subject identifier and can therefore become a cohort member.
pub trait Subject {
    fn subject_id(&self) -> SubjectId;
}

impl Subject for SubjectId {
    fn subject_id(&self) -> SubjectId {
        *self
    }
}

impl Subject for i32 {
    fn subject_id(&self) -> SubjectId {
        SubjectId(*self)
    }
}

impl<T: Subject + ?Sized> Subject for &T {
    fn subject_id(&self) -> SubjectId {
        (**self).subject_id()
    }
}
