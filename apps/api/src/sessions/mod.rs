pub mod handlers;
pub mod trigger;
