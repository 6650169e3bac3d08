//! Compile-time configuration defaults
//!
//! Generated by build.rs from the library defaults, merged with the file
//! named by `UTHREAD_CONFIG_RS` when it is set at build time.

include!(concat!(env!("OUT_DIR"), "/uthread_merged_config.rs"));
