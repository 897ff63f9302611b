pub use termination::{create_termination, Interrupted, Terminator};

pub mod connector;
pub mod join;
pub mod navigator;
pub mod state_store;
pub mod sync;
mod termination;
