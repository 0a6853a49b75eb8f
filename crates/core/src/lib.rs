pub mod catalog;
pub mod config;
pub mod errors;
pub mod permissions;
pub mod rate_limit;
pub mod users;

pub use catalog::{CommandCatalog, CommandCategory, CommandRegistry, CommandSpec};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use permissions::{PermissionError, PermissionManager, PermissionOracle};
pub use rate_limit::{Clock, ManualClock, RateLimiter, SystemClock};
pub use users::{UserManager, UserRecord};
