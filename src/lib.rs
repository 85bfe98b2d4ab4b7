//! dumpvault - consistent SQL dumps and restores of the panel database
//!
//! Dumps and restores are driven through the MySQL client tools over a
//! prioritized list of loopback transports, with a named-pipe fallback when
//! TCP is unavailable.

pub mod backup;
pub mod cli;
pub mod config;
pub mod config_validator;
pub mod connection;
pub mod file_storage;
pub mod http_server;
pub mod observability;
pub mod process;
