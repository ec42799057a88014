//! Infrastructure layer — concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: process execution, SSH
//! sessions, filesystem copies, config file access, and the tracking probe.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod command_runner;
pub mod config;
pub mod factory;
pub mod local;
pub mod remote;
pub mod ssh;
pub mod tracking;
