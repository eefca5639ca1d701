//! Structural limits for the in-memory registry.
//!
//! The defaults are the limits the platform registry enforces, so code that
//! runs against [`InMemoryRegistry`](super::InMemoryRegistry) fails the same
//! way it would against the real one.

use std::fmt;
use std::io;

/// Default maximum key name (single path component) length: 255 characters
pub const DEFAULT_MAX_KEY_NAME_LENGTH: usize = 255;

/// Default maximum value name length: 16,383 characters
pub const DEFAULT_MAX_VALUE_NAME_LENGTH: usize = 16_383;

/// Default maximum key nesting depth below a root: 512
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Registry limits.
///
/// # Example
///
/// ```rust
/// use regpath::{InMemoryRegistry, RegistryLimits};
///
/// let limits = RegistryLimits::new().max_depth(8).max_key_name_length(32);
/// let backend = InMemoryRegistry::with_limits(limits);
/// ```
///
/// # Default Limits
///
/// | Limit | Default |
/// |-------|---------|
/// | `max_key_name_length` | 255 |
/// | `max_value_name_length` | 16,383 |
/// | `max_depth` | 512 |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryLimits {
    /// Maximum length of a key name, in UTF-16 code units.
    pub max_key_name_length: usize,

    /// Maximum length of a value name, in UTF-16 code units.
    pub max_value_name_length: usize,

    /// Maximum number of keys between a root and the deepest key.
    pub max_depth: usize,
}

impl Default for RegistryLimits {
    fn default() -> Self {
        Self {
            max_key_name_length: DEFAULT_MAX_KEY_NAME_LENGTH,
            max_value_name_length: DEFAULT_MAX_VALUE_NAME_LENGTH,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl RegistryLimits {
    /// Create new limits with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create unlimited limits (no restrictions).
    pub fn unlimited() -> Self {
        Self {
            max_key_name_length: usize::MAX,
            max_value_name_length: usize::MAX,
            max_depth: usize::MAX,
        }
    }

    pub fn max_key_name_length(mut self, len: usize) -> Self {
        self.max_key_name_length = len;
        self
    }

    pub fn max_value_name_length(mut self, len: usize) -> Self {
        self.max_value_name_length = len;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Validate a new key's name and the depth it would be created at.
    pub fn check_key(&self, name: &str, depth: usize) -> Result<(), LimitExceeded> {
        let length = name.encode_utf16().count();
        if length > self.max_key_name_length {
            return Err(LimitExceeded::KeyNameTooLong {
                length,
                limit: self.max_key_name_length,
            });
        }
        if depth > self.max_depth {
            return Err(LimitExceeded::TooDeep {
                depth,
                limit: self.max_depth,
            });
        }
        Ok(())
    }

    /// Validate a value name.
    pub fn check_value_name(&self, name: &str) -> Result<(), LimitExceeded> {
        let length = name.encode_utf16().count();
        if length > self.max_value_name_length {
            return Err(LimitExceeded::ValueNameTooLong {
                length,
                limit: self.max_value_name_length,
            });
        }
        Ok(())
    }
}

/// Error returned when a registry limit is exceeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimitExceeded {
    KeyNameTooLong { length: usize, limit: usize },
    ValueNameTooLong { length: usize, limit: usize },
    TooDeep { depth: usize, limit: usize },
}

impl fmt::Display for LimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitExceeded::KeyNameTooLong { length, limit } => {
                write!(
                    f,
                    "key name too long: {} characters exceeds {} character limit",
                    length, limit
                )
            }
            LimitExceeded::ValueNameTooLong { length, limit } => {
                write!(
                    f,
                    "value name too long: {} characters exceeds {} character limit",
                    length, limit
                )
            }
            LimitExceeded::TooDeep { depth, limit } => {
                write!(
                    f,
                    "key too deep: {} levels exceeds {} level limit",
                    depth, limit
                )
            }
        }
    }
}

impl std::error::Error for LimitExceeded {}

impl From<LimitExceeded> for io::Error {
    fn from(err: LimitExceeded) -> Self {
        io::Error::new(io::ErrorKind::InvalidInput, err)
    }
}
