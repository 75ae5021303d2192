//! ppcheck Core - golden-output testing of libc++ GDB pretty-printers
//!
//! Compiles each C++ test case with several clang/libc++ versions, runs it
//! under GDB with the pretty-printers loaded, and compares the `@@@ ` tagged
//! lines the GDB script prints against the case's `expected.txt`.
//!
//! - [`catalog`]: finds test cases on disk
//! - [`engine`]: runs one case in one toolchain environment
//! - [`compare`]: line matching with the `capacity=*` wildcard
//! - [`report`]: drives every cell and tallies the outcome
//! - [`harness`]: wires the above to the environment cache

pub mod catalog;
pub mod command;
pub mod compare;
pub mod config;
pub mod engine;
pub mod error;
pub mod golden;
pub mod harness;
pub mod report;
pub mod telemetry;

pub use catalog::{TestCase, TestCatalog};
pub use compare::{compare, line_matches, Mismatch};
pub use config::HarnessConfig;
pub use engine::{extract_result_lines, EngineSettings, ExecutionEngine, RunOutcome};
pub use error::HarnessError;
pub use harness::{Execution, Harness, RunOptions};
pub use report::{CellReport, CellStatus, DriverOptions, ExitStatus, ReportDriver, RunReport};
pub use telemetry::{init_tracing, level_for};

/// Result type for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;
