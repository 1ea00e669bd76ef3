pub mod attendance;
pub mod core;
pub mod import;
pub mod roster;
pub mod stages;
pub mod transfer;
