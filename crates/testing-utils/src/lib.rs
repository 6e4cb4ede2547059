//! Shared testing utilities for the atelier workspace.
//!
//! Provides in-memory fakes for every repository trait and outbound port,
//! plus builders for test entities. No database or network required.

pub mod builders;
pub mod mocks;

pub use builders::*;
pub use mocks::*;
