//! Sync domain models and the orchestrator.

mod sync_model;
mod sync_service;
mod sync_traits;

pub use sync_model::*;
pub use sync_service::*;
pub use sync_traits::*;
