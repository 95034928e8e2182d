//! Background Tasks Module
//!
//! Contains the shared background runtime that asynchronous lookups and
//! their callbacks run on.

mod runtime;

pub use runtime::{background, spawn};
