//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `rpmbuilder` command-line tool. Each subcommand is defined in its own file.
//!
//! ## Structure
//!
//! Each command module typically contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and performs the
//!   command's logic by calling into the `rpmbuilder` library.
//!
//! `build` and `local` share their run options through [`run::RunArgs`].

pub mod build;
pub mod completions;
pub mod deps;
pub mod local;
pub mod run;
pub mod stash;
pub mod validate;
