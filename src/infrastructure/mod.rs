pub mod agent;
pub mod keyboard;
pub mod logging;
