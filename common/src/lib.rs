//! Shared building blocks for the migration console.
//!
//! Wire models for the migration backend, the unified error type, environment
//! configuration, the response envelope and HTTP middleware.

pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod response;
