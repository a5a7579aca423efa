//! Storage infrastructure: the tool's configuration file.
//!
//! The `config` sub-module reads and writes `config.toml` in the platform
//! config directory and converts it into the settings structs the
//! transports and the cloud client take.  A missing file is not an error;
//! every field has a default.

pub mod config;
