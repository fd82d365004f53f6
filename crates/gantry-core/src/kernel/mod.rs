//! # Gantry Core Kernel
//!
//! Process-level wiring for the plugin lifecycle manager.
//!
//! - **Bootstrap**: [`Application`](bootstrap::Application) builds the
//!   configuration, install store, loaded-plugin registry and plugin manager
//!   once at process start and hands them out by explicit injection.
//! - **Component lifecycle**: [`KernelComponent`](component::KernelComponent)
//!   defines the `initialize`/`start`/`stop` contract.
//! - **Errors**: [`Error`](error::Error), the crate-wide `Result` alias and the
//!   user-facing [`ErrorKind`](error::ErrorKind) taxonomy.
pub mod bootstrap;
pub mod component;
pub mod constants;
pub mod error;

pub use bootstrap::Application;
pub use component::KernelComponent;
pub use error::{Error, ErrorKind, Result};
