// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types for parsing and evaluating Eel expressions

use super::error_code::{EL0201, ErrorCode, ErrorInfo};
use std::fmt;
use thiserror::Error;

/// Source location information for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    /// Byte offset from start (0-based)
    pub offset: usize,
    /// Length of the problematic text
    pub length: usize,
}

impl SourceLocation {
    pub fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }

    pub fn point(offset: usize) -> Self {
        Self::new(offset, 1)
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "offset {}", self.offset)
    }
}

/// The three error kinds surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed syntax
    Parse,
    /// A call target did not exist or an operation could not be applied
    Evaluation,
    /// A protected context denied a call
    NotAllowed,
}

/// Main Eel error type
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EelError {
    /// Syntax error, raised before any evaluation happens
    #[error("{error_code}: {message}")]
    Parse {
        error_code: ErrorCode,
        message: String,
        expression: String,
        location: Option<SourceLocation>,
    },

    /// Error raised while evaluating a well-formed expression
    #[error("{error_code}: {message}")]
    Evaluation {
        error_code: ErrorCode,
        message: String,
    },

    /// Call denied by a protected context
    #[error("{error_code}: Method \"{method}\" is not callable in untrusted context")]
    NotAllowed { error_code: ErrorCode, method: String },
}

impl EelError {
    /// Create a parse error
    pub fn parse_error(
        error_code: ErrorCode,
        message: impl Into<String>,
        expression: impl Into<String>,
        location: Option<SourceLocation>,
    ) -> Self {
        Self::Parse {
            error_code,
            message: message.into(),
            expression: expression.into(),
            location,
        }
    }

    /// Create an evaluation error
    pub fn evaluation_error(error_code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Evaluation {
            error_code,
            message: message.into(),
        }
    }

    /// Create a not-allowed error for the given call path
    pub fn not_allowed(method: impl Into<String>) -> Self {
        Self::NotAllowed {
            error_code: EL0201,
            method: method.into(),
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &ErrorCode {
        match self {
            Self::Parse { error_code, .. } => error_code,
            Self::Evaluation { error_code, .. } => error_code,
            Self::NotAllowed { error_code, .. } => error_code,
        }
    }

    /// Which of the three error kinds this is
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Evaluation { .. } => ErrorKind::Evaluation,
            Self::NotAllowed { .. } => ErrorKind::NotAllowed,
        }
    }

    pub fn is_parse_error(&self) -> bool {
        self.kind() == ErrorKind::Parse
    }

    pub fn is_evaluation_error(&self) -> bool {
        self.kind() == ErrorKind::Evaluation
    }

    pub fn is_not_allowed(&self) -> bool {
        self.kind() == ErrorKind::NotAllowed
    }

    /// Get error information with help text
    pub fn error_info(&self) -> &'static ErrorInfo {
        self.error_code().info()
    }

    /// Attach the full expression text to a parse error
    pub(crate) fn with_expression(mut self, source: &str) -> Self {
        if let Self::Parse { expression, .. } = &mut self {
            if expression.is_empty() {
                *expression = source.to_string();
            }
        }
        self
    }
}

/// Result type for Eel operations
pub type Result<T> = std::result::Result<T, EelError>;
