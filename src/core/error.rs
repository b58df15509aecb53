// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Assembly error type and the deferred-evaluation outcome.
//!
//! `AssemblyError` carries a message plus an optional source location. Code
//! that raises an error deep inside expression evaluation usually does not
//! know which line it is working on; the line-processing traversal points
//! call [`AssemblyError::fill_location`] so the most specific location
//! available accretes onto the error on its way up.

use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyError {
    message: String,
    line: Option<u32>,
    file: Option<String>,
}

impl AssemblyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            file: None,
        }
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Fill in location fields that are still empty. Existing fields win,
    /// so the innermost traversal point that knows a location decides it.
    pub fn fill_location(mut self, line: u32, file: &str) -> Self {
        if self.line.is_none() {
            self.line = Some(line);
        }
        if self.file.is_none() && !file.is_empty() {
            self.file = Some(file.to_string());
        }
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn line(&self) -> Option<u32> {
        self.line
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }
}

impl fmt::Display for AssemblyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{file}:{line}: {}", self.message),
            (Some(file), None) => write!(f, "{file}: {}", self.message),
            (None, Some(line)) => write!(f, "line {line}: {}", self.message),
            (None, None) => write!(f, "{}", self.message),
        }
    }
}

impl Error for AssemblyError {}

/// Outcome of an evaluation that may legitimately not have an answer yet.
///
/// An index definition whose index has not been assigned is not an error;
/// the caller switches to a deferred operand and retries at encode time.
/// Real failures travel in the `Err` arm of the surrounding `Result`.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<T> {
    Resolved(T),
    Deferred,
}

impl<T> Resolution<T> {
    pub fn is_deferred(&self) -> bool {
        matches!(self, Resolution::Deferred)
    }

    pub fn resolved(self) -> Option<T> {
        match self {
            Resolution::Resolved(value) => Some(value),
            Resolution::Deferred => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Resolution<U> {
        match self {
            Resolution::Resolved(value) => Resolution::Resolved(f(value)),
            Resolution::Deferred => Resolution::Deferred,
        }
    }

    /// Unwrap a resolution that must be resolved by now, eg. after the
    /// fixpoint passes have assigned every index.
    pub fn required(self, what: &str) -> Result<T, AssemblyError> {
        match self {
            Resolution::Resolved(value) => Ok(value),
            Resolution::Deferred => Err(AssemblyError::new(format!(
                "Unresolved value for {what}"
            ))),
        }
    }
}

/// Evaluation result: hard failure, deferred, or a value.
pub type EvalResult<T> = Result<Resolution<T>, AssemblyError>;
