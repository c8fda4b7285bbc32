//! abigate-core - ABI compatibility matrix engine
//!
//! Proves two-directional dynamic-linkage compatibility for a
//! versioned shared library:
//! - Forward: a consumer compiled against current headers, run against
//!   every older published release.
//! - Backward: consumers compiled against each older release, run
//!   against the current library.
//! Both directions run for every target architecture, under a memory
//! sanitizer, with a runtime linkage probe confirming each check
//! really exercised the intended library version.

pub mod arch;
pub mod catalog;
pub mod config;
pub mod error;
pub mod fakes;
pub mod invoke;
pub mod isolate;
pub mod probe;
pub mod report;
pub mod runner;
pub mod telemetry;
pub mod version;

// Re-export key types
pub use arch::Architecture;
pub use catalog::VersionCatalog;
pub use config::{HarnessConfig, InstrumentationConfig};
pub use error::{HarnessError, Result};
pub use invoke::{Invocation, InvocationOutput, Invoker, ShellInvoker};
pub use isolate::{BuildArtifact, BuildIsolator};
pub use probe::{LinkageProbe, ProbeResult};
pub use report::RunReport;
pub use runner::{CaseResult, CompatibilityRunner, Direction, FailureKey, RunOutcome};
pub use telemetry::init_tracing;
pub use version::{ReleaseId, ReleaseTag};
