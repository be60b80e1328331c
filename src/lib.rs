pub mod api;
pub mod core;
pub mod data;
pub mod logging;
