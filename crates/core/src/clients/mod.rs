//! Clients, their service visits, and the repository contract that stores them.

mod clients_model;
mod clients_traits;

pub use clients_model::*;
pub use clients_traits::*;
