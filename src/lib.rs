//! Lifecycle asset allocation: a human-capital-adjusted Merton share with an
//! explicit cost of leverage.

pub mod api;
pub mod core;
pub mod io;
