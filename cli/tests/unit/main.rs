//! Unit tests for flowkestra CLI
//!
//! These tests use mocked dependencies and run fast without external I/O.

mod config_service;
mod property_tests;
mod remote_backend;
