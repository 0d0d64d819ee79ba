//! Samarth - AI-powered agricultural data analytics API.
//!
//! This library exposes the service modules to the binary and to
//! integration tests.

pub mod analytics;
pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod logging;
pub mod safety;
