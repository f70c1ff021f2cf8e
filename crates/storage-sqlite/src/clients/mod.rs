//! SQLite storage for clients and their service visits.

pub(crate) mod model;
mod repository;

pub use model::{ClientDB, NewServiceDB, ServiceDB};
pub use repository::ClientRepository;
