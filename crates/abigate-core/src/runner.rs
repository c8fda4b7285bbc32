//! The compatibility matrix state machine.
//!
//! Per architecture: build every release, then check both linkage
//! directions for every release. Infrastructure errors (a build or
//! spawn failure) abort the whole run immediately; compatibility
//! failures (probe mismatch, round-trip corruption) are recorded and
//! the run continues to later combinations — each subsequent check is
//! on an unrelated release, so continuing maximizes diagnostic yield.

use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::arch::Architecture;
use crate::config::HarnessConfig;
use crate::error::Result;
use crate::invoke::{Invocation, Invoker};
use crate::isolate::BuildIsolator;
use crate::probe::LinkageProbe;
use crate::version::ReleaseId;

/// Which way the ABI skew points in a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Consumer built against HEAD headers, run against an older library.
    ForwardLink,
    /// Consumer built against an older release's headers, run against HEAD.
    BackwardLink,
}

impl Direction {
    pub fn name(&self) -> &'static str {
        match self {
            Direction::ForwardLink => "forward_link",
            Direction::BackwardLink => "backward_link",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of one (release, architecture, direction) check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    pub release: ReleaseId,
    pub arch: Architecture,
    pub direction: Direction,
    pub probe_matched: bool,
    pub round_trip_ok: bool,
    pub detail: String,
    pub duration_ms: u64,
}

impl CaseResult {
    /// Whether both the probe and the round trip passed.
    pub fn passed(&self) -> bool {
        self.probe_matched && self.round_trip_ok
    }
}

/// Identity of the first failing check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureKey {
    pub release: ReleaseId,
    pub arch: Architecture,
    pub direction: Direction,
}

/// Aggregate verdict for a full matrix run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Whether every check passed.
    pub passed: bool,

    /// Every check performed, in execution order.
    pub cases: Vec<CaseResult>,

    /// The first failing check, if any.
    pub first_failure: Option<FailureKey>,

    /// SHA-256 of each reference payload, for the record.
    pub payload_digests: Vec<PayloadDigest>,
}

/// Digest of one reference payload at run start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadDigest {
    pub path: String,
    pub sha256: Option<String>,
}

impl RunOutcome {
    pub fn passed_count(&self) -> usize {
        self.cases.iter().filter(|c| c.passed()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.cases.iter().filter(|c| !c.passed()).count()
    }
}

/// Orchestrates the full (release × architecture × direction) matrix.
pub struct CompatibilityRunner<'a> {
    invoker: &'a dyn Invoker,
    config: &'a HarnessConfig,
}

impl<'a> CompatibilityRunner<'a> {
    pub fn new(invoker: &'a dyn Invoker, config: &'a HarnessConfig) -> Self {
        Self { invoker, config }
    }

    /// Run the whole matrix. `Err` means an infrastructure step broke;
    /// a failed `RunOutcome` means the tooling worked and found an ABI
    /// incompatibility.
    pub async fn run(&self, catalog: &[ReleaseId]) -> Result<RunOutcome> {
        let payload_digests = self.digest_payloads();
        let mut cases = Vec::new();
        let mut first_failure = None;

        for &arch in &self.config.architectures {
            info!(arch = %arch, "testing architecture");
            let isolator = BuildIsolator::new(self.invoker, self.config);

            // Build phase: every release, catalog order, fail-fast.
            // The artifacts are read-only from here on; the check
            // phases consume them rather than re-deriving paths.
            let mut artifacts = Vec::with_capacity(catalog.len());
            for release in catalog {
                artifacts.push(isolator.build(release, arch).await?);
            }
            let head_lib = artifacts
                .iter()
                .find(|a| a.release.is_head())
                .map(|a| a.lib_dir.clone())
                .unwrap_or_else(|| self.config.release_lib_dir(&ReleaseId::Head));

            // ForwardLink: one consumer against HEAD headers, run
            // against every release's library.
            info!(arch = %arch, "forward link: current consumer, older libraries");
            isolator.build_consumer(&ReleaseId::Head, arch).await?;
            for artifact in &artifacts {
                let case = self
                    .check(
                        &artifact.release,
                        arch,
                        Direction::ForwardLink,
                        &artifact.release,
                        &artifact.lib_dir,
                    )
                    .await?;
                Self::record(case, &mut cases, &mut first_failure);
            }

            // BackwardLink: a consumer per release's headers, run
            // against the HEAD library. HEAD is first in catalog order
            // and reuses the consumer the forward phase just built.
            info!(arch = %arch, "backward link: older consumers, current library");
            for artifact in &artifacts {
                if !artifact.release.is_head() {
                    isolator.build_consumer(&artifact.release, arch).await?;
                }
                let case = self
                    .check(
                        &artifact.release,
                        arch,
                        Direction::BackwardLink,
                        &ReleaseId::Head,
                        &head_lib,
                    )
                    .await?;
                Self::record(case, &mut cases, &mut first_failure);
            }
        }

        Ok(RunOutcome {
            passed: first_failure.is_none(),
            cases,
            first_failure,
            payload_digests,
        })
    }

    /// Probe-then-round-trip for one combination.
    async fn check(
        &self,
        release: &ReleaseId,
        arch: Architecture,
        direction: Direction,
        expected: &ReleaseId,
        runtime_lib: &Path,
    ) -> Result<CaseResult> {
        let start = Instant::now();
        let test_dir = self.config.test_dir();
        let consumer = self.config.consumer_path();
        let consumer = consumer.to_string_lossy();

        let probe = LinkageProbe::verify(
            self.invoker,
            &self.config.probe_command,
            &test_dir,
            &consumer,
            expected,
            runtime_lib,
        )
        .await?;

        let mut detail = probe.detail.clone();
        let mut round_trip_ok = false;
        if probe.matched {
            let inv = Invocation::new(consumer.to_string(), &test_dir)
                .args(self.config.payloads.iter().map(|p| p.display().to_string()))
                .env("LD_LIBRARY_PATH", runtime_lib.to_string_lossy().to_string())
                .streamed();
            let out = self.invoker.invoke(&inv).await?;
            round_trip_ok = out.success();
            if !round_trip_ok {
                detail = format!(
                    "round trip failed with exit code {} (corruption or sanitizer report)",
                    out.exit_code
                );
            }
        } else {
            // A wrong resolved library would make the round trip test
            // the wrong pair; skip it and report the probe mismatch.
            detail = format!("skipped round trip: {}", probe.detail);
        }

        let case = CaseResult {
            release: *release,
            arch,
            direction,
            probe_matched: probe.matched,
            round_trip_ok,
            detail,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        if case.passed() {
            info!(release = %release, arch = %arch, direction = %direction, "case passed");
        } else {
            warn!(release = %release, arch = %arch, direction = %direction, detail = %case.detail, "case FAILED");
        }
        Ok(case)
    }

    fn record(case: CaseResult, cases: &mut Vec<CaseResult>, first_failure: &mut Option<FailureKey>) {
        if !case.passed() && first_failure.is_none() {
            *first_failure = Some(FailureKey {
                release: case.release,
                arch: case.arch,
                direction: case.direction,
            });
        }
        cases.push(case);
    }

    fn digest_payloads(&self) -> Vec<PayloadDigest> {
        let test_dir = self.config.test_dir();
        self.config
            .payloads
            .iter()
            .map(|p| {
                let sha256 = std::fs::read(test_dir.join(p))
                    .ok()
                    .map(|bytes| hex::encode(Sha256::digest(&bytes)));
                PayloadDigest {
                    path: p.display().to_string(),
                    sha256,
                }
            })
            .collect()
    }
}
