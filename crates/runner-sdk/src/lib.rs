// runner-sdk: Foundation layer for the CI runner.
// This crate has ZERO dependencies on other runner crates and provides
// tracing, file persistence and document decoding helpers used by the
// job model and the execution engine.

pub mod build_constants;
pub mod io_util;
pub mod trace;
pub mod yaml_util;

// Re-export commonly used items at crate root
pub use build_constants::RunnerPackage;
pub use io_util::IOUtil;
pub use trace::{CollectingTraceWriter, NullTraceWriter, TraceLevel, TraceWriter, TracingTraceWriter};
pub use yaml_util::{ParseError, YamlUtil};
