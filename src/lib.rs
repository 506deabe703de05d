//! PROPDESK Challenge Trading Library
//!
//! Core components for the propdesk prop-trading challenge simulator:
//! the challenge rule engine, the trade execution flow, and the HTTP API
//! around them.

pub mod application;
pub mod auth;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod persistence;
pub mod rate_limit;
