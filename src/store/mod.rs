//!  The store is organized through [resolution_storage::JsonResolutionStorage].
//!  The basic idea is:
//!   - Every resolution lives in one json document keyed by its id.
//!   - Logged values are keyed by `M/D/YYYY` dates inside each resolution.
//!   - The document is read and written as a whole.

pub mod entities;
pub mod resolution_storage;
