//! Scenario construction.
//!
//! A scenario is the ordered, steppable model of a markdown document: code
//! blocks grouped into steps by heading, plus the resolved environment.

mod builder;
mod rewrite;
mod schema;
mod source;

pub use rewrite::{apply_overrides, leftover_block, rewrite_all_exports, rewrite_export, shell_value};
pub use schema::{group_into_steps, Scenario, Step};
pub use source::{is_remote, parse_ini, resolve_source, sibling_variables};
