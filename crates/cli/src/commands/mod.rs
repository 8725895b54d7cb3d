pub mod config;
pub mod hybrid;
pub mod pipeline;
pub mod score;
pub mod tables;

use cobuy_core::config::ConfigError;
use cobuy_core::errors::{DataError, DomainError, PipelineError};
use cobuy_io::TableIoError;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    pub fn from_error(command: &str, error: &anyhow::Error) -> Self {
        let (error_class, exit_code) = classify(error);
        Self::failure(command, error_class, format!("{error:#}"), exit_code)
    }

    /// Run a command body and fold its error, if any, into a classified failure.
    pub fn capture(command: &str, body: impl FnOnce() -> anyhow::Result<String>) -> Self {
        match body() {
            Ok(message) => Self::success(command, message),
            Err(error) => Self::from_error(command, &error),
        }
    }
}

/// Map the root cause onto the stable `(error_class, exit_code)` pair.
pub fn classify(error: &anyhow::Error) -> (&'static str, u8) {
    for cause in error.chain() {
        if cause.downcast_ref::<ConfigError>().is_some() {
            return ("config_validation", 2);
        }
        if let Some(error) = cause.downcast_ref::<PipelineError>() {
            return (error.error_class(), error.exit_code());
        }
        if let Some(error) = cause.downcast_ref::<TableIoError>() {
            return (error.error_class(), error.exit_code());
        }
        if cause.downcast_ref::<DataError>().is_some() {
            return ("data_validation", 3);
        }
        if cause.downcast_ref::<DomainError>().is_some() {
            return ("invariant_violation", 1);
        }
    }
    ("pipeline", 1)
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
