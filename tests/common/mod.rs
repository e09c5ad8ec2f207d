//! Shared test utilities for logtap integration harnesses.
//!
//! Import everything you need via `mod common; use common::*;` at the top of
//! each harness file.

#![allow(dead_code)]

pub mod fake_container;
pub mod fake_docker_api;
pub mod fixtures;

pub use fake_container::FakeContainer;
pub use fake_docker_api::FakeDockerApi;
pub use fixtures::*;
