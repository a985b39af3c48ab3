//! Request handler module
//!
//! Responsible for request routing dispatch and business logic processing:
//! the frontend files, the health check, and the detection API.

pub mod detect;
pub mod router;
pub mod static_files;

// Re-export main entry point
pub use router::handle_request;
