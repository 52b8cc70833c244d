//! Command-line interface for mask-guided edits

#[path = "main.rs"]
mod main_impl;

pub use main_impl::run;
