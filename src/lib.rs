//! scicloud - client for a remote compute service
//!
//! This library provides the cloud transports (network, simulated and mp),
//! the cloud handle and the namespace binder that swaps transports at runtime,
//! along with the command-line surface built on top of them.

pub mod error;
pub mod cli;
pub mod cloud;
pub mod commands;
pub mod config;
pub mod output;

pub use error::{CloudError, Result};
