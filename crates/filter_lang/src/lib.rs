//! # Filter Lang
//!
//! Reference implementation of the "compile text → predicate" collaborator.
//!
//! Compile once, evaluate many times: the expression is parsed into a tree at
//! [`compile`] time and the resulting [`CompiledFilter`] is immutable, so one
//! instance can be shared by every filter worker.
//!
//! ## Fields
//! - `evt.num`, `evt.source_id`, `evt.len`: numeric
//! - `evt.source`, `evt.event_source`: from the bound source descriptor
//!   (absent for unregistered sources)
//! - `evt.payload`: payload text
//! - `json.<path>`: field of the JSON payload, extracted lazily
//!
//! ## Example
//!
//! ```
//! use contracts::{Event, FilterPredicate};
//!
//! let filter = filter_lang::compile("json.verb in (create, delete) and evt.len < 1024").unwrap();
//! let mut event = Event::new(1, 7, r#"{"verb":"create"}"#);
//! assert!(filter.evaluate(&mut event).unwrap());
//! ```

mod ast;
mod lexer;
mod parser;
mod predicate;

use std::sync::Arc;

use contracts::{ContractError, FilterCompiler, FilterPredicate};
use tracing::debug;

pub use ast::{CmpOp, Expr, Field, Literal};
pub use predicate::CompiledFilter;

/// Compile filter text
///
/// # Errors
/// Returns [`ContractError::FilterSyntax`] with the byte offset of the first problem.
pub fn compile(text: &str) -> Result<CompiledFilter, ContractError> {
    let expr = parser::Parser::new(text)?.parse()?;
    debug!(filter = %text, "filter compiled");
    Ok(CompiledFilter::new(text, expr))
}

/// [`FilterCompiler`] backed by this crate's expression language
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterLangCompiler;

impl FilterLangCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl FilterCompiler for FilterLangCompiler {
    fn compile(&self, text: &str) -> Result<Arc<dyn FilterPredicate>, ContractError> {
        Ok(Arc::new(compile(text)?))
    }
}
