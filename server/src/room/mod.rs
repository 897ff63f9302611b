pub use estimation_room::EstimationRoom;
pub use registry::RoomRegistry;

mod estimation_room;
mod registry;
