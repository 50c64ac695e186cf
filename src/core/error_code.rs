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

//! Error codes for Eel errors
//!
//! Codes follow the Rust compiler pattern (`EL0001`, `EL0101`, ...). The
//! numeric range of a code identifies its category.

use std::fmt;

/// Error categories derived from the code range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Parser errors (EL0001-EL0100)
    Parser,
    /// Evaluation errors (EL0101-EL0200)
    Evaluation,
    /// Sandbox / whitelist errors (EL0201-EL0300)
    Security,
}

/// Error code following Rust compiler pattern (EL0001, EL0002, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    pub code: u16,
}

impl ErrorCode {
    /// Create a new error code
    pub const fn new(code: u16) -> Self {
        Self { code }
    }

    /// Get the full error code string (e.g., "EL0001")
    pub fn code_str(&self) -> String {
        format!("EL{:04}", self.code)
    }

    /// Get error information from the registry
    pub fn info(&self) -> &'static ErrorInfo {
        ERROR_REGISTRY.get_error_info(self)
    }

    /// Get error category for this error code
    pub fn category(&self) -> ErrorCategory {
        match self.code {
            1..=100 => ErrorCategory::Parser,
            101..=200 => ErrorCategory::Evaluation,
            _ => ErrorCategory::Security,
        }
    }

    /// Get human-readable description for this error code
    pub fn description(&self) -> &'static str {
        self.info().title
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EL{:04}", self.code)
    }
}

/// Error information attached to every code
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    /// Error code number
    pub code: u16,
    /// Human-readable error title
    pub title: &'static str,
    /// Help information and suggested solutions
    pub help: &'static str,
}

impl ErrorInfo {
    pub const fn new(code: u16, title: &'static str, help: &'static str) -> Self {
        Self { code, title, help }
    }
}

/// Central error registry containing all error definitions
pub struct ErrorRegistry;

impl ErrorRegistry {
    /// Get error information for a given error code
    pub fn get_error_info(&self, error_code: &ErrorCode) -> &'static ErrorInfo {
        match error_code.code {
            // Parser Errors (EL0001-EL0100)
            1 => &EL0001_INFO,
            2 => &EL0002_INFO,
            3 => &EL0003_INFO,
            4 => &EL0004_INFO,
            5 => &EL0005_INFO,
            6 => &EL0006_INFO,
            7 => &EL0007_INFO,

            // Evaluation Errors (EL0101-EL0200)
            101 => &EL0101_INFO,
            102 => &EL0102_INFO,
            103 => &EL0103_INFO,
            104 => &EL0104_INFO,
            105 => &EL0105_INFO,
            106 => &EL0106_INFO,
            107 => &EL0107_INFO,
            108 => &EL0108_INFO,

            // Security Errors (EL0201-EL0300)
            201 => &EL0201_INFO,

            _ => &UNKNOWN_ERROR_INFO,
        }
    }
}

/// Global error registry instance
pub static ERROR_REGISTRY: ErrorRegistry = ErrorRegistry;

// Parser Error Codes (EL0001-EL0100)
pub const EL0001: ErrorCode = ErrorCode::new(1); // Invalid syntax
pub const EL0002: ErrorCode = ErrorCode::new(2); // Unexpected token
pub const EL0003: ErrorCode = ErrorCode::new(3); // Unclosed group
pub const EL0004: ErrorCode = ErrorCode::new(4); // Unterminated string
pub const EL0005: ErrorCode = ErrorCode::new(5); // Invalid number literal
pub const EL0006: ErrorCode = ErrorCode::new(6); // Unexpected end of input
pub const EL0007: ErrorCode = ErrorCode::new(7); // Unexpected character

// Evaluation Error Codes (EL0101-EL0200)
pub const EL0101: ErrorCode = ErrorCode::new(101); // Unknown function or method
pub const EL0102: ErrorCode = ErrorCode::new(102); // Value is not callable
pub const EL0103: ErrorCode = ErrorCode::new(103); // Type mismatch
pub const EL0104: ErrorCode = ErrorCode::new(104); // Division by zero
pub const EL0105: ErrorCode = ErrorCode::new(105); // Recursion limit exceeded
pub const EL0106: ErrorCode = ErrorCode::new(106); // Invalid helper arguments
pub const EL0107: ErrorCode = ErrorCode::new(107); // Invalid regular expression
pub const EL0108: ErrorCode = ErrorCode::new(108); // Bytecode limit or malformed program

// Security Error Codes (EL0201-EL0300)
pub const EL0201: ErrorCode = ErrorCode::new(201); // Call not allowed

static EL0001_INFO: ErrorInfo = ErrorInfo::new(
    1,
    "Invalid expression syntax",
    "Check the expression for typos, dangling operators or misplaced literals",
);

static EL0002_INFO: ErrorInfo = ErrorInfo::new(
    2,
    "Unexpected token",
    "The token is not valid at this position; check operator placement",
);

static EL0003_INFO: ErrorInfo = ErrorInfo::new(
    3,
    "Unclosed or unbalanced group",
    "Every '(', '[' and '{' needs a matching closing character",
);

static EL0004_INFO: ErrorInfo = ErrorInfo::new(
    4,
    "Unterminated string literal",
    "Close the string with the same quote character it was opened with",
);

static EL0005_INFO: ErrorInfo = ErrorInfo::new(
    5,
    "Invalid number literal",
    "Number literals are digits with an optional fraction, e.g. 42 or 3.14",
);

static EL0006_INFO: ErrorInfo = ErrorInfo::new(
    6,
    "Unexpected end of expression",
    "The expression ends before an operand or closing character",
);

static EL0007_INFO: ErrorInfo = ErrorInfo::new(
    7,
    "Unexpected character",
    "The character is not part of the expression language",
);

static EL0101_INFO: ErrorInfo = ErrorInfo::new(
    101,
    "Unknown function or method",
    "The call target exists but has no such function; check the name",
);

static EL0102_INFO: ErrorInfo = ErrorInfo::new(
    102,
    "Value is not callable",
    "Only functions and object methods can be called",
);

static EL0103_INFO: ErrorInfo = ErrorInfo::new(
    103,
    "Type mismatch",
    "The operator cannot be applied to values of these types",
);

static EL0104_INFO: ErrorInfo = ErrorInfo::new(
    104,
    "Division by zero",
    "Guard the divisor with a condition before dividing",
);

static EL0105_INFO: ErrorInfo = ErrorInfo::new(
    105,
    "Recursion limit exceeded",
    "The expression is nested too deeply; raise max_recursion_depth or simplify it",
);

static EL0106_INFO: ErrorInfo = ErrorInfo::new(
    106,
    "Invalid helper arguments",
    "Check the number and types of the arguments passed to the helper",
);

static EL0107_INFO: ErrorInfo = ErrorInfo::new(
    107,
    "Invalid regular expression",
    "Patterns use the delimited form /pattern/flags",
);

static EL0108_INFO: ErrorInfo = ErrorInfo::new(
    108,
    "Expression cannot be compiled",
    "The expression exceeds a bytecode limit; split it or use the interpreting evaluator",
);

static EL0201_INFO: ErrorInfo = ErrorInfo::new(
    201,
    "Call not allowed in protected context",
    "Whitelist the method on the protected context, e.g. whitelist(\"String.*\")",
);

static UNKNOWN_ERROR_INFO: ErrorInfo =
    ErrorInfo::new(0, "Unknown error", "No additional information is available");
