//! Shared utilities.
//!
//! - [`graph`] - Index-arena graph traits and the dominator and traversal algorithms built on them

pub mod graph;
