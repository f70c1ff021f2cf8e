//! Domain core for the client return tracker: models, return-window
//! arithmetic, storage and remote contracts, and the sync orchestrator.

pub mod clients;
pub mod errors;
pub mod returns;
pub mod settings;
pub mod sync;
pub mod utils;

pub use errors::{Error, Result};
