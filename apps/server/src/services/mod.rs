//! Orchestration between the repositories and the kitchen hub.
//!
//! - [`floor`] - order mutations with their kitchen broadcasts
//! - [`kds`] - the kitchen display command processor

pub mod floor;
pub mod kds;

pub use floor::FloorService;
pub use kds::run_command_processor;
