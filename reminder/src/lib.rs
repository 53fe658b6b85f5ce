//! Reminder library
//!
//! This library exposes the task store, trigger compiler, notification
//! gateway and lifecycle coordinator used by the `reminder` binary.

pub mod app;
pub mod commands;
pub mod config;
pub mod database;
pub mod error;
pub mod services;
pub mod storage;
