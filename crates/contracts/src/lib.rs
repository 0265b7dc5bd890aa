//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Seams
//! - [`FilterCompiler`] / [`FilterPredicate`]: the "compile text → predicate" step
//! - [`SourceRegistry`]: id → [`SourceDescriptor`] lookup for plugin event sources
//! - [`Event`]: one instrumentation record flowing through the dispatcher

mod blueprint;
mod error;
mod event;
mod filter;
mod source;

pub use blueprint::*;
pub use error::*;
pub use event::{Event, EventFields, UNKNOWN_SOURCE};
pub use filter::{FilterCompiler, FilterPredicate};
pub use source::{SourceDescriptor, SourceId, SourceRegistry, StaticSourceRegistry};
