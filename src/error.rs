// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The two failure categories of the crate.
//!
//! A [`Error::Config`] is raised by validation code before any native call acts on
//! the rejected configuration, so native state is untouched.  A [`Error::Native`]
//! is raised after polling the native error channel and carries the status code.
//!
//! Context loss is not an error; see [`crate::images::Device::frame`].

use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A caller-supplied argument or resource combination violates an invariant.
    #[error("configuration error: {0}")]
    Config(String),
    /// The native API reported a failure the configuration layer could not predict.
    #[error("native error 0x{code:04X} during {during}")]
    Native { code: u32, during: &'static str },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn config(message: impl Display) -> Self {
        Error::Config(message.to_string())
    }

    /// Whether this is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// The native status code, for native errors.
    pub fn native_code(&self) -> Option<u32> {
        match self {
            Error::Native { code, .. } => Some(*code),
            Error::Config(_) => None,
        }
    }
}

/// Returns early with a configuration error when the condition fails.
macro_rules! ensure_config {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::error::Error::Config(format!($($arg)+)));
        }
    };
}
pub(crate) use ensure_config;
