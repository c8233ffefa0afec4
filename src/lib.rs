//! Cache warming and revalidation orchestration.
//!
//! The [`warming`] engine refreshes registered targets ahead of user traffic;
//! [`infra`] wires it to HTTP refreshers, an event log backend and the admin
//! API.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod warming;
