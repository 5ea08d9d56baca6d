pub mod config;
pub mod doctor;
pub mod migrate;
pub mod seed;

use serde::Serialize;
use thiserror::Error;
use verdant_core::config::ConfigError;

/// Failure modes of the operator commands, each with a stable class label
/// and exit code so wrapper scripts can branch without parsing messages.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration issue: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to initialize async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error("failed to connect to database: {0}")]
    Database(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("demo fixtures failed to load: {0}")]
    Seed(#[source] sqlx::Error),
    #[error("seeded catalog failed post-load verification")]
    SeedVerify,
}

impl CliError {
    pub fn class(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_validation",
            Self::Runtime(_) => "runtime_init",
            Self::Database(_) => "db_connectivity",
            Self::Migration(_) => "migration",
            Self::Seed(_) => "seed_load",
            Self::SeedVerify => "seed_verify",
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Runtime(_) => 3,
            Self::Database(_) => 4,
            Self::Migration(_) => 5,
            Self::Seed(_) | Self::SeedVerify => 6,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome<'a> {
    command: &'a str,
    status: &'a str,
    error_class: Option<&'a str>,
    message: String,
}

impl CommandResult {
    /// Render a command outcome as the JSON envelope operators script
    /// against.
    pub fn from_outcome(command: &str, outcome: Result<String, CliError>) -> Self {
        match outcome {
            Ok(message) => Self {
                exit_code: 0,
                output: serialize_payload(CommandOutcome {
                    command,
                    status: "ok",
                    error_class: None,
                    message,
                }),
            },
            Err(error) => Self {
                exit_code: error.exit_code(),
                output: serialize_payload(CommandOutcome {
                    command,
                    status: "error",
                    error_class: Some(error.class()),
                    message: error.to_string(),
                }),
            },
        }
    }
}

/// Commands run their async work on a throwaway current-thread runtime; the
/// CLI has no long-lived tasks to justify a multi-threaded one.
pub(crate) fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)
}

fn serialize_payload(payload: CommandOutcome<'_>) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
