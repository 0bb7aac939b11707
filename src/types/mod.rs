// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to prevent ID confusion at compile time.

mod container_name;
mod id;

pub use container_name::{ContainerName, ContainerNameError, SNAPSHOT_DELIMITER};
pub use id::{FingerprintError, ImageId, OperationId};
