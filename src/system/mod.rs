//! # System Interaction Layer
//!
//! Abstractions over what lives outside the process: external commands, and
//! the toolchain and version control plugins the builder hands work to.
//!
//! ## Modules
//!
//! - **`executor`**: runs an external command in a directory and captures its output.
//! - **`toolchain`**: the `Toolchain` trait and the built-in `dry-run` toolchain.
//! - **`vcs`**: the `Vcs` trait and the git driver.

pub mod executor;
pub mod toolchain;
pub mod vcs;
