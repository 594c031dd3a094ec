//! # watchq
//!
//! Folder-watching batch processor. Text files appearing in an input directory
//! are queued and drained by a pool of workers that grows with the backlog (up
//! to a fixed ceiling) and shrinks as workers run out of work. Each result is
//! written to an output directory under the input's file name.

pub mod config;
pub mod engine;
pub mod error;
pub mod generator;
pub mod model;
pub mod processor;
pub mod queue;
pub mod source;
pub mod telemetry;
