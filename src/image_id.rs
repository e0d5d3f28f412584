use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// Image graph identifier: exactly 64 ASCII hexadecimal characters.
///
/// Case is preserved as stored on disk. Freshly generated identifiers are
/// lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(String);

impl ImageId {
    pub const HEX_LEN: usize = 64;
    const RANDOM_BYTES: usize = Self::HEX_LEN / 2;

    /// Generate a fresh image ID using OS-backed CSPRNG entropy.
    pub fn generate() -> std::result::Result<Self, ImageIdGenerationError> {
        Self::generate_with(|bytes| {
            getrandom::fill(bytes).map_err(ImageIdGenerationError::random_source)
        })
    }

    /// Test hook: inject deterministic random bytes when needed.
    pub fn generate_with<F>(
        mut fill_random: F,
    ) -> std::result::Result<Self, ImageIdGenerationError>
    where
        F: FnMut(&mut [u8]) -> std::result::Result<(), ImageIdGenerationError>,
    {
        let mut bytes = [0_u8; Self::RANDOM_BYTES];
        fill_random(&mut bytes)?;
        Ok(Self(hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    fn validate(value: &str) -> Result<(), ImageIdParseError> {
        if value.is_empty() {
            return Err(ImageIdParseError::Empty);
        }
        if value.len() != Self::HEX_LEN {
            return Err(ImageIdParseError::InvalidLength(value.len()));
        }
        if !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ImageIdParseError::InvalidCharacter);
        }
        Ok(())
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ImageId {
    type Err = ImageIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::validate(s)?;
        Ok(Self(s.to_string()))
    }
}

impl AsRef<str> for ImageId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Serialize for ImageId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageIdGenerationError {
    RandomSource(String),
}

impl ImageIdGenerationError {
    fn random_source(error: impl fmt::Display) -> Self {
        Self::RandomSource(error.to_string())
    }
}

impl fmt::Display for ImageIdGenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RandomSource(message) => write!(f, "image id generation failed: {message}"),
        }
    }
}

impl std::error::Error for ImageIdGenerationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageIdParseError {
    Empty,
    InvalidLength(usize),
    InvalidCharacter,
}

impl fmt::Display for ImageIdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "image id cannot be empty"),
            Self::InvalidLength(actual) => write!(
                f,
                "image id must be exactly {} hex characters (got {})",
                ImageId::HEX_LEN,
                actual
            ),
            Self::InvalidCharacter => {
                write!(
                    f,
                    "image id must contain only ASCII hex characters (0-9, a-f, A-F)"
                )
            }
        }
    }
}

impl std::error::Error for ImageIdParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_str_preserves_case() {
        let raw = format!("{}{}", "AB".repeat(16), "cd".repeat(16));
        let id: ImageId = raw.parse().unwrap();
        assert_eq!(id.as_str(), raw);
    }

    #[test]
    fn from_str_rejects_wrong_length() {
        let err = "abc123".parse::<ImageId>().unwrap_err();
        assert_eq!(err, ImageIdParseError::InvalidLength(6));
    }

    #[test]
    fn from_str_rejects_non_hex() {
        let err = "z".repeat(64).parse::<ImageId>().unwrap_err();
        assert_eq!(err, ImageIdParseError::InvalidCharacter);
    }

    #[test]
    fn from_str_rejects_empty() {
        let err = "".parse::<ImageId>().unwrap_err();
        assert_eq!(err, ImageIdParseError::Empty);
    }

    #[test]
    fn from_str_does_not_trim() {
        let padded = format!(" {}", "a".repeat(63));
        let err = padded.parse::<ImageId>().unwrap_err();
        assert_eq!(err, ImageIdParseError::InvalidCharacter);
    }

    #[test]
    fn generate_produces_lower_hex_of_full_width() {
        let id = ImageId::generate().unwrap();
        assert_eq!(id.as_str().len(), ImageId::HEX_LEN);
        assert!(id.as_str().bytes().all(|b| b.is_ascii_hexdigit()));
        assert_eq!(id.as_str(), id.as_str().to_ascii_lowercase());
    }

    #[test]
    fn generate_twice_differs() {
        let a = ImageId::generate().unwrap();
        let b = ImageId::generate().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn generate_with_allows_deterministic_bytes_for_tests() {
        let id = ImageId::generate_with(|bytes| {
            bytes.fill(0xab);
            Ok(())
        })
        .unwrap();

        assert_eq!(id.as_str(), "ab".repeat(32));
    }

    #[test]
    fn generate_with_propagates_random_source_errors() {
        let err = ImageId::generate_with(|_| {
            Err(ImageIdGenerationError::RandomSource(
                "test entropy failure".to_string(),
            ))
        })
        .unwrap_err();

        assert_eq!(
            err,
            ImageIdGenerationError::RandomSource("test entropy failure".to_string())
        );
    }

    #[test]
    fn serializes_as_plain_string() {
        let id: ImageId = "0".repeat(64).parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", "0".repeat(64)));
    }
}
