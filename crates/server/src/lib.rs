//! HTTP surface for the token launchpad.

pub mod api;
pub mod metrics;
pub mod state;
