//! Push Server
//!
//! Operator binary wiring storage, gateway and reconciliation together.

pub mod cli;
pub mod commands;
pub mod config;
