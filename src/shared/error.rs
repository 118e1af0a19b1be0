use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the CLI application.
///
/// These codes allow CI systems to gate on the audit result while still
/// telling a finding apart from a broken invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Every control passed, was not applicable, or needs manual review
    Compliant = 0,
    /// At least one control failed or could not be evaluated
    FindingsDetected = 1,
    /// Invalid command-line arguments (clap parsing errors)
    InvalidArguments = 2,
    /// Fatal error before or while opening the target (configuration, connection, load)
    ApplicationError = 3,
    /// The run was interrupted before every control was evaluated
    Cancelled = 130,
}

impl ExitCode {
    /// Convert to i32 for use with std::process::exit
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitCode::Compliant => write!(f, "Compliant (0)"),
            ExitCode::FindingsDetected => write!(f, "Findings Detected (1)"),
            ExitCode::InvalidArguments => write!(f, "Invalid Arguments (2)"),
            ExitCode::ApplicationError => write!(f, "Application Error (3)"),
            ExitCode::Cancelled => write!(f, "Cancelled (130)"),
        }
    }
}

/// Fatal errors of an audit run.
///
/// Every variant aborts the run before (or instead of) producing a report.
/// Failures local to one control are `CheckFailure` values instead and end up
/// inside the report as `error` results.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Invalid configuration: {message}\n\n💡 Hint: {hint}")]
    Configuration { message: String, hint: String },

    #[error("Could not open a session to {target}\nDetails: {details}\n\n💡 Hint: Verify host, port, instance and credentials, and that the target is reachable")]
    Connection { target: String, details: String },

    #[error("Control set rejected: {details}\n\n💡 Hint: Every control needs a unique, non-empty 'id'")]
    DuplicateOrMissingIdentifier { details: String },

    #[error("Invalid control definition '{control}': {reason}\n\n💡 Hint: Check the control source against the documented record format")]
    InvalidControlDefinition { control: String, reason: String },

    #[error("Failed to load controls from: {path}\nDetails: {details}\n\n💡 Hint: Control files must be valid YAML, JSON or TOML")]
    ControlSource { path: PathBuf, details: String },

    #[error("Failed to write to file: {path}\nDetails: {details}\n\n💡 Hint: Please verify that the directory exists and you have write permissions")]
    FileWrite { path: PathBuf, details: String },

    /// Validation error for builder patterns
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Security violation: {path}\nReason: {reason}\n\n💡 Hint: {hint}")]
    SecurityError {
        path: PathBuf,
        reason: String,
        hint: String,
    },
}

impl AuditError {
    /// Shorthand for a configuration error with a hint
    pub fn configuration(message: impl Into<String>, hint: impl Into<String>) -> Self {
        AuditError::Configuration {
            message: message.into(),
            hint: hint.into(),
        }
    }

    /// Shorthand for a malformed control record
    pub fn invalid_control(control: impl Into<String>, reason: impl Into<String>) -> Self {
        AuditError::InvalidControlDefinition {
            control: control.into(),
            reason: reason.into(),
        }
    }
}
