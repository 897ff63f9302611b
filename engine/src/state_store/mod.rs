pub use action::Action;
pub use state::{Notice, RoomLifecycle, ServerConnectionStatus, SessionState};
pub use state_store::StateStore;

mod action;
pub mod progress;
mod state;
#[allow(clippy::module_inception)]
mod state_store;
