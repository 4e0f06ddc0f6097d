//! Integration tests for sitewatch
//!
//! These tests run monitor files end to end against documents served from a
//! temporary directory through file:// URLs.

pub mod engine_flow;
pub mod helpers;
pub mod monitor_files;
