//! Command implementations.

mod check;
mod info;
mod run;
mod validate;

pub use check::run_check;
pub use info::run_info;
pub use run::run_pipeline;
pub use validate::run_validate;
