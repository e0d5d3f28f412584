pub mod commands;
pub mod config;
pub mod error;
pub mod image_id;
pub mod logging;
pub mod mapping;
pub mod output;
pub mod remap;
pub mod store;
