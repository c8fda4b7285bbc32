//! Runtime linkage probing.
//!
//! The consumer binary is deliberately run against a library other
//! than the one it was compiled against; the probe confirms the
//! version the OS loader actually resolved is the *intended* mismatch,
//! not a toolchain accident.

use std::path::Path;

use tracing::debug;

use crate::error::{HarnessError, Result};
use crate::invoke::{Invocation, Invoker};
use crate::version::ReleaseId;

/// Outcome of one probe: did the loader resolve the expected version?
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub matched: bool,
    pub expected: ReleaseId,
    pub detail: String,
}

/// Asks the probe collaborator which library version a binary resolves
/// to at runtime.
pub struct LinkageProbe;

impl LinkageProbe {
    /// Run the probe command from `test_dir` with the runtime search
    /// path pointed at `lib_dir`.
    ///
    /// Probe exit 0 means the resolved version matches; non-zero is a
    /// recorded mismatch. Failure to execute the probe at all is fatal
    /// (the environment is misconfigured, not the library).
    pub async fn verify(
        invoker: &dyn Invoker,
        probe_command: &str,
        test_dir: &Path,
        consumer_binary: &str,
        expected: &ReleaseId,
        lib_dir: &Path,
    ) -> Result<ProbeResult> {
        let inv = Invocation::new(probe_command, test_dir)
            .arg(consumer_binary)
            .env("LD_LIBRARY_PATH", lib_dir.to_string_lossy().to_string())
            .streamed();

        let out = invoker.invoke(&inv).await.map_err(|e| match e {
            HarnessError::Spawn { program, source } => HarnessError::ProbeUnusable(format!(
                "could not execute {program}: {source}"
            )),
            other => other,
        })?;

        debug!(expected = %expected, lib_dir = %lib_dir.display(), exit = out.exit_code, "probe finished");
        Ok(ProbeResult {
            matched: out.success(),
            expected: *expected,
            detail: if out.success() {
                format!("resolved version matches {expected}")
            } else {
                format!(
                    "probe exited with code {} (expected {expected} via {})",
                    out.exit_code,
                    lib_dir.display()
                )
            },
        })
    }
}
