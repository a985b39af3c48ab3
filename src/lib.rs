//! tagscan: a small web service that accepts a photographed tag, stores it,
//! and returns the text regions a detector found in it.

pub mod config;
pub mod detection;
pub mod handler;
pub mod http;
pub mod intake;
pub mod logger;
pub mod server;
