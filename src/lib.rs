// src/lib.rs

//! brief: a build-description engine.
//!
//! A repository is described in a JSON superset (comments, trailing commas),
//! parsed into the [`models`] graph, cached in a compact tagged binary form and
//! resolved per task into an effective [`models::Task`] handed to a toolchain.

pub mod cli;
pub mod constants;
pub mod core;
pub mod models;
pub mod system;
