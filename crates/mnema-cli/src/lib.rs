//! # mnema-cli
//!
//! Library half of the `mnema` binary: replay scripts, backend selection and
//! logging setup. Kept separate from `main.rs` so replays can be driven from
//! tests.

pub mod backend;
pub mod logging;
pub mod replay;
pub mod script;

pub use backend::{build_system, BackendKind};
pub use replay::{check_graph, GraphReport, Outcome, Replayer};
pub use script::{load_script, parse_script, Op, Step};
