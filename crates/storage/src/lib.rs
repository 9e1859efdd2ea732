pub mod backend;
pub mod error;
mod path;

pub use crate::backend::{StagedWrite, StorageBackend};
pub use crate::path::validate as validate_path;
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
