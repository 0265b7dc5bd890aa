//! Filter traits - compiled predicate interface
//!
//! The dispatcher consumes filtering as an opaque "compile text → predicate"
//! step. Any expression language can be plugged in behind [`FilterCompiler`].

use std::sync::Arc;

use crate::{ContractError, Event};

/// Compiled boolean predicate over an [`Event`]
///
/// A predicate is immutable once compiled and is shared by every worker thread,
/// so implementations must be `Send + Sync` and free of interior mutation.
pub trait FilterPredicate: Send + Sync {
    /// Evaluate the predicate against one event
    ///
    /// Takes the event mutably so lazily extracted fields can be cached on it.
    ///
    /// # Errors
    /// Returns an evaluation error (e.g. malformed payload). Callers treat an
    /// error as a negative verdict.
    fn evaluate(&self, event: &mut Event) -> Result<bool, ContractError>;

    /// Filter text this predicate was compiled from
    fn source_text(&self) -> &str;
}

/// Filter compiler trait
pub trait FilterCompiler: Send + Sync {
    /// Compile filter text into a shareable predicate
    ///
    /// # Errors
    /// Returns [`ContractError::FilterSyntax`] for malformed text.
    fn compile(&self, text: &str) -> Result<Arc<dyn FilterPredicate>, ContractError>;
}
