//! memlab-core — Round state machine, timing, scoring and aggregation.
//!
//! This crate holds the session driver for a timed recall quiz: a stimulus
//! is shown for a bounded exposure window, a free-text answer is collected
//! and scored remotely, and round outcomes are aggregated into a summary.
//! Remote collaborators are reached only through the traits in [`traits`].

pub mod driver;
pub mod error;
pub mod machine;
pub mod model;
pub mod reporter;
pub mod scoring;
pub mod session;
pub mod timer;
pub mod traits;
