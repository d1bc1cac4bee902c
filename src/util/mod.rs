//! Basic utilities: errors, POD plumbing, content hashing.

mod error;
mod pod;
mod unique_id;

pub use error::{Error, Result};
pub use pod::{Bool, FbomPod};
pub use unique_id::{ContentHasher, UniqueId};
