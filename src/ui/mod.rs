//! UI helpers for consistent CLI output
//!
//! Status lines and spinners go to stderr so that stdout carries only data
//! (file contents, listings, JSON). Styling is dropped automatically when
//! stderr is not a terminal or when running in CI.
//!
//! # Example
//!
//! ```rust,ignore
//! use nix_cachefs::ui::{self, UiContext, TaskSpinner};
//!
//! let ctx = UiContext::detect();
//!
//! let mut spinner = TaskSpinner::new(&ctx);
//! spinner.start("Fetching /nix/store/...-hello");
//! // ... do work ...
//! spinner.clear();
//!
//! ui::step_ok(&ctx, "Configuration initialized");
//! ui::step_warn_hint(&ctx, "Config already exists", "Use --force to overwrite");
//! ```

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{key_value, step_error_detail, step_ok, step_ok_detail, step_warn_hint};
pub use progress::TaskSpinner;
