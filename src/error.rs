use thiserror::Error;

use crate::config::ConfigError;
use crate::output::ReportError;
use crate::registry::CatalogError;
use crate::scan::WalkError;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_INIT_FAILURE: i32 = 1;
pub const EXIT_CANCELLED: i32 = 2;
pub const EXIT_INTERNAL: i32 = 3;

/// Errors that abort a whole run. Per-handler problems never show up here;
/// they are recorded in the report instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Walk(#[from] WalkError),

    #[error("run cancelled")]
    Cancelled,

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::Catalog(_) | EngineError::Config(_) | EngineError::Walk(_) => {
                EXIT_INIT_FAILURE
            }
            EngineError::Cancelled => EXIT_CANCELLED,
            EngineError::Report(_) | EngineError::Internal(_) => EXIT_INTERNAL,
        }
    }
}
