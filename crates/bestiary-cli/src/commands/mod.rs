//! Command implementations.

pub mod prompt;
pub mod rows;
pub mod run;

pub use self::prompt::{execute_prompt, render_prompt};
pub use self::rows::execute_rows;
pub use self::run::{execute_run, reconcile};
