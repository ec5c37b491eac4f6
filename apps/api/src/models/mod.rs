pub mod analysis;
pub mod resume;
pub mod session;
pub mod usage;
