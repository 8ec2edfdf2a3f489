//! # rpmbuilder Library
//!
//! This library builds RPM packages from many source projects. It drives
//! the external tools that do the real work (`git`, `mock`, `createrepo`,
//! `spectool`, `rsync`) and adds the bookkeeping around them: it orders
//! projects so that dependencies build first, derives package versions from
//! git history, and skips projects whose sources did not change since their
//! last successful build.
//!
//! It is used by the `rpmbuilder` command-line tool but can also be
//! integrated into other applications.
//!
//! ## Quick Example
//!
//! ```
//! use rpmbuilder::config;
//! use rpmbuilder::project;
//!
//! let config = config::parse(
//!     "[helloworld]\n\
//!      type = project\n\
//!      url = https://git.example.com/helloworld.git\n\
//!      ref = master\n",
//! )
//! .unwrap();
//!
//! let projects = project::from_config(&config);
//! assert_eq!(projects.len(), 1);
//! assert_eq!(projects[0].git_ref(), Some("master"));
//! ```
//!
//! ## Core Concepts
//!
//! - **Configuration (`config`)**: The INI build configuration: projects,
//!   the mock settings repository and the remote backup host.
//! - **Workspace (`workspace`, `git`, `backup`)**: The on-disk layout of a
//!   build run, project checkouts and the remote backup of the workspace.
//! - **Specs and versions (`spec`, `version`)**: What a project produces and
//!   requires, and the version its packages get.
//! - **Change detection (`change`, `state`)**: Fingerprints of built sources,
//!   persisted between runs.
//! - **Building (`builder`, `mock`, `package`, `repository`)**: Spec
//!   patching, release numbering, mock builds and the build repository.
//! - **Phases (`phases`)**: The pipeline tying everything together.
//!
//! ## Execution Flow
//!
//! The main entry point is `phases::orchestrator`, which executes the
//! following high-level steps:
//!
//! 1.  **Checkout**: Clone or update every project and read its spec file.
//! 2.  **Ordering**: Order projects so that dependencies build first.
//! 3.  **Planning**: Resolve versions and decide what needs a build.
//! 4.  **Building**: Build in order, blocking dependents of failed projects.
//! 5.  **Finalize**: Write the build history and push the remote backup.

pub mod backup;
pub mod builder;
pub mod change;
pub mod config;
pub mod defaults;
pub mod error;
pub mod git;
pub mod history;
pub mod mock;
pub mod output;
pub mod package;
pub mod phases;
pub mod project;
pub mod repository;
pub mod spec;
pub mod state;
pub mod version;
mod version_proptest;
pub mod workspace;
