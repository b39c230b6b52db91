//! # Execdoc
//!
//! Execute markdown documents as verifiable shell scenarios.
//!
//! A document's fenced code blocks become the steps of a scenario. Each block
//! runs in a `bash` subshell, exported variables carry over between blocks,
//! and declared expected outputs are checked by regex, JSON similarity or
//! text similarity.
//!
//! ## Modes
//!
//! - **Interactive**: step through the scenario in a terminal UI
//! - **Test**: run every block, stopping at the first failure
//! - **Execute**: run every block headless, recording failures
//!
//! ## Quick Start
//!
//! ```bash
//! execdoc interactive tutorial.md
//! execdoc test tutorial.md --var RESOURCE_GROUP=demo
//! execdoc to-bash tutorial.md > tutorial.sh
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::derivable_impls)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::significant_drop_tightening)]

pub mod azure;
pub mod core;
pub mod document;
pub mod engine;
pub mod environment;
pub mod error;
pub mod patterns;
pub mod report;
pub mod scenario;
pub mod status;
pub mod tui;
pub mod verify;

// Re-export commonly used types
pub use core::Config;
pub use engine::{Engine, EngineConfig};
pub use environment::Environment;
pub use error::{EngineError, EngineResult};
pub use report::Report;
pub use scenario::Scenario;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "execdoc";
