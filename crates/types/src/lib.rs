//! Validated primitives shared across the dispensing crates.
//!
//! These wrappers are constructed at the edges (user input, configuration, wire data) so the
//! rest of the code can rely on their guarantees without re-checking.

/// Errors that can occur when creating validated input types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,

    /// The input could not be read as a finite number
    #[error("Number is not valid: {0}")]
    NotANumber(String),

    /// The input was a number below zero
    #[error("Number must not be negative: {0}")]
    Negative(String),
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// # Errors
    ///
    /// Returns `InputError::Empty` if the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, InputError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(InputError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
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

/// A finite number that is zero or greater.
///
/// Quantity and dose fields accept only values of this type, so a record can never carry a
/// negative or non-numeric amount that came from a form field.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct NonNegativeNumber(f64);

impl NonNegativeNumber {
    /// Validates an already-numeric value.
    ///
    /// # Errors
    ///
    /// Returns [`InputError::NotANumber`] for NaN or infinite values and
    /// [`InputError::Negative`] for values below zero.
    pub fn new(value: f64) -> Result<Self, InputError> {
        if !value.is_finite() {
            return Err(InputError::NotANumber(value.to_string()));
        }
        if value < 0.0 {
            return Err(InputError::Negative(value.to_string()));
        }
        // Normalise -0.0 so equality and rendering stay predictable.
        Ok(Self(value.abs()))
    }

    /// Parses raw text as typed into a numeric form field.
    ///
    /// Surrounding whitespace is ignored. Empty input is rejected rather than treated as zero.
    pub fn parse(input: &str) -> Result<Self, InputError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(InputError::Empty);
        }
        let value: f64 = trimmed
            .parse()
            .map_err(|_| InputError::NotANumber(trimmed.to_owned()))?;
        Self::new(value).map_err(|err| match err {
            InputError::Negative(_) => InputError::Negative(trimmed.to_owned()),
            _ => InputError::NotANumber(trimmed.to_owned()),
        })
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

impl std::fmt::Display for NonNegativeNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for NonNegativeNumber {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<NonNegativeNumber> for f64 {
    fn from(value: NonNegativeNumber) -> Self {
        value.0
    }
}
