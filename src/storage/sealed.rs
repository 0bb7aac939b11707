// ABOUTME: Sealed trait pattern for storage backends.
// ABOUTME: Only drivers shipped in this crate can implement Storage.

/// Sealed trait to prevent external implementations.
///
/// New driver hooks can be added to `Storage` without breaking downstream code,
/// because nothing outside this crate can implement it.
pub trait Sealed {}
