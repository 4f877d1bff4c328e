pub mod config;
pub mod domain;
pub mod errors;

pub use config::{AppConfig, ConfigError, LoadOptions, LogFormat};
pub use domain::leave::{LeaveRequest, UserId, FIELD_PLACEHOLDER};
pub use errors::{ErrorKind, RequiredPermission, WorkflowError};
