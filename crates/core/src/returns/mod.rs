//! Return-window derivation.

mod return_window;

pub use return_window::*;
