//! Client side of the database migration backend.
//!
//! [`client`] speaks the backend's REST contract, [`tracker`] follows a
//! migration's parent job until it settles, and [`display`] renders the
//! tracker's snapshots for terminals.

pub mod client;
pub mod display;
pub mod tracker;

pub use client::{HttpMigrationApi, MigrationApi};
pub use tracker::{MigrationSummary, MigrationTracker, TrackerHandle, TrackerSnapshot};
