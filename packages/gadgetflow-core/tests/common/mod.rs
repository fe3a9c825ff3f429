//! Common test utilities for gadgetflow-core integration tests
//!
//! This module provides shared fixtures, builders, and assertions.

#![allow(dead_code)]

pub mod assertions;
pub mod builders;

pub use assertions::*;
pub use builders::*;
