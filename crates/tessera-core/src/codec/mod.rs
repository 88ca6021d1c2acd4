//! Composite string codec.
//!
//! Components are joined with a separator; any separator or escape
//! character inside a component is prefixed with the escape character.
//! `decode` is the exact left inverse of `encode` for every non-empty
//! component sequence.


use crate::error::ErrorClass;
use std::borrow::Cow;
use tessera_config::{CodecConfig, DEFAULT_ESCAPE, DEFAULT_SEPARATOR};
use thiserror::Error as ThisError;

///
/// CodecError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum CodecError {
    #[error("separator and escape character must differ (both are '{character}')")]
    ConflictingCharacters { character: char },

    #[error("invalid escape sequence at offset {offset}: '{found}' cannot be escaped")]
    InvalidEscape { offset: usize, found: char },

    #[error("unterminated escape at offset {offset}")]
    TrailingEscape { offset: usize },

    #[error("unescaped separator at offset {offset} inside a single component")]
    UnescapedSeparator { offset: usize },
}

impl CodecError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::ConflictingCharacters { .. } => ErrorClass::InvariantViolation,
            Self::InvalidEscape { .. }
            | Self::TrailingEscape { .. }
            | Self::UnescapedSeparator { .. } => ErrorClass::Invalid,
        }
    }
}

///
/// CompositeCodec
///
/// Separator/escape pair used to flatten composite values into one string.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CompositeCodec {
    separator: char,
    escape: char,
}

impl CompositeCodec {
    pub const DEFAULT: Self = Self {
        separator: DEFAULT_SEPARATOR,
        escape: DEFAULT_ESCAPE,
    };

    pub const fn new(separator: char, escape: char) -> Result<Self, CodecError> {
        if separator == escape {
            return Err(CodecError::ConflictingCharacters {
                character: separator,
            });
        }

        Ok(Self { separator, escape })
    }

    pub const fn from_config(config: &CodecConfig) -> Result<Self, CodecError> {
        Self::new(config.separator, config.escape)
    }

    #[must_use]
    pub const fn separator(&self) -> char {
        self.separator
    }

    #[must_use]
    pub const fn escape(&self) -> char {
        self.escape
    }

    /// Escape every separator and escape character in one component.
    #[must_use]
    pub fn quote<'a>(&self, part: &'a str) -> Cow<'a, str> {
        if !part.contains([self.separator, self.escape]) {
            return Cow::Borrowed(part);
        }

        let mut quoted = String::with_capacity(part.len() + 2);
        for ch in part.chars() {
            if ch == self.separator || ch == self.escape {
                quoted.push(self.escape);
            }
            quoted.push(ch);
        }

        Cow::Owned(quoted)
    }

    /// Reverse `quote` for one component.
    pub fn unquote<'a>(&self, part: &'a str) -> Result<Cow<'a, str>, CodecError> {
        if !part.contains([self.separator, self.escape]) {
            return Ok(Cow::Borrowed(part));
        }

        let mut unquoted = String::with_capacity(part.len());
        let mut chars = part.char_indices();

        while let Some((offset, ch)) = chars.next() {
            if ch == self.separator {
                return Err(CodecError::UnescapedSeparator { offset });
            }
            if ch == self.escape {
                unquoted.push(self.escaped_char(offset, chars.next())?);
            } else {
                unquoted.push(ch);
            }
        }

        Ok(Cow::Owned(unquoted))
    }

    // Resolve the character following an escape at `offset`.
    fn escaped_char(&self, offset: usize, next: Option<(usize, char)>) -> Result<char, CodecError> {
        match next {
            Some((_, next)) if next == self.separator || next == self.escape => Ok(next),
            Some((_, found)) => Err(CodecError::InvalidEscape { offset, found }),
            None => Err(CodecError::TrailingEscape { offset }),
        }
    }

    /// Join components into their canonical string form.
    pub fn encode<I, S>(&self, parts: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut encoded = String::new();
        for (i, part) in parts.into_iter().enumerate() {
            if i > 0 {
                encoded.push(self.separator);
            }
            encoded.push_str(&self.quote(part.as_ref()));
        }

        encoded
    }

    /// Split an encoded string on unescaped separators and unescape each piece.
    ///
    /// Always yields at least one component; `""` decodes to `[""]`.
    pub fn decode(&self, encoded: &str) -> Result<Vec<String>, CodecError> {
        let mut parts = Vec::new();
        let mut current = String::new();
        let mut chars = encoded.char_indices();

        while let Some((offset, ch)) = chars.next() {
            if ch == self.escape {
                current.push(self.escaped_char(offset, chars.next())?);
            } else if ch == self.separator {
                parts.push(std::mem::take(&mut current));
            } else {
                current.push(ch);
            }
        }
        parts.push(current);

        Ok(parts)
    }
}

impl Default for CompositeCodec {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Encode components with the default `,` / `~` codec.
pub fn encode<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    CompositeCodec::DEFAULT.encode(parts)
}

/// Decode a string produced by [`encode`].
pub fn decode(encoded: &str) -> Result<Vec<String>, CodecError> {
    CompositeCodec::DEFAULT.decode(encoded)
}
