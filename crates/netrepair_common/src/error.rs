//! Error types for netrepair.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepairError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Adapter enumeration failed: {0}")]
    Enumeration(String),

    #[error("Network inspection failed: {0}")]
    Inspection(String),

    #[error("Management interface error: {0}")]
    Management(String),

    #[error("Privilege error: {0}")]
    Privilege(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RepairError {
    pub fn code(&self) -> i32 {
        match self {
            RepairError::Spawn { .. } => 10,
            RepairError::Enumeration(_) => 20,
            RepairError::Inspection(_) => 21,
            RepairError::Management(_) => 30,
            RepairError::Privilege(_) => 40,
            RepairError::Config(_) => 50,
            RepairError::Internal(_) => 90,
            RepairError::Io(_) => 91,
            RepairError::Json(_) => 92,
        }
    }
}

pub type Result<T> = std::result::Result<T, RepairError>;
