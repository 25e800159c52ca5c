//! HTTP client module for the FIND location resolver.
//!
//! This module provides the `Resolver` seam used by the submission worker
//! and `ResolverClient`, its reqwest-backed implementation. Track requests
//! return the inferred location; learn requests train the resolver and
//! their response body is ignored.

pub mod client;
pub mod error;

pub use client::{Resolver, ResolverClient, Submission, TrackResponse};
pub use error::ApiError;
