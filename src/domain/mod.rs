pub mod commands;
pub mod keys;
pub mod models;
pub mod settings;
