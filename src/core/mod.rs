pub mod error;
pub mod events;
pub mod model;
pub mod planner;
pub mod session;
pub mod source;
