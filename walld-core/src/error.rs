use std::path::PathBuf;

use crate::models::ValueKind;

#[derive(Debug, thiserror::Error)]
pub enum WalldError {
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("ipc error: {0}")]
    Ipc(String),

    #[error("launch error: {0}")]
    Launch(String),

    #[error("scan error: {0}")]
    Scan(String),

    #[error("invalid interface name: {0}")]
    InvalidInterfaceName(String),

    #[error("interface `{interface}` has no variable `{variable}`")]
    InvalidVariableName { interface: String, variable: String },

    #[error("variable `{0}` is constant")]
    ImmutableVariable(String),

    #[error("`{value}` is not an option of `{variable}` (options: {options})")]
    InvalidOption {
        variable: String,
        value: String,
        options: String,
    },

    #[error("variable `{variable}` of type {expected} cannot be assigned a value of type {found}")]
    VariableTypeError {
        variable: String,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("unknown time units: {0}")]
    UnknownTimeUnits(String),

    #[error("schedule must be a positive interval of at most one year, got {0}")]
    InvalidSchedule(i64),

    #[error("no files were provided")]
    NoFilesProvided,

    #[error("not an existing file: {}", .0.display())]
    InvalidFile(PathBuf),

    #[error("no wallpaper has been selected yet")]
    NoWallpaperSelected,
}

impl WalldError {
    /// Stable identifier sent to clients alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Toml(_) => "toml",
            Self::Ipc(_) => "ipc",
            Self::Launch(_) => "launch",
            Self::Scan(_) => "scan",
            Self::InvalidInterfaceName(_) => "invalid_interface_name",
            Self::InvalidVariableName { .. } => "invalid_variable_name",
            Self::ImmutableVariable(_) => "immutable_variable",
            Self::InvalidOption { .. } => "invalid_option",
            Self::VariableTypeError { .. } => "variable_type_error",
            Self::UnknownTimeUnits(_) => "unknown_time_units",
            Self::InvalidSchedule(_) => "invalid_schedule",
            Self::NoFilesProvided => "no_files_provided",
            Self::InvalidFile(_) => "invalid_file",
            Self::NoWallpaperSelected => "no_wallpaper_selected",
        }
    }
}

pub type Result<T> = std::result::Result<T, WalldError>;
