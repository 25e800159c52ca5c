//! Utility functions for string normalization.

pub mod format;

pub use format::{format_mac, normalize_location};
