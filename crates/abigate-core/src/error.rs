//! Error taxonomy for the harness.
//!
//! Every variant here is an *infrastructure* failure: the tooling around
//! the test broke (git, make, the probe executable, the filesystem), so
//! the run cannot produce a meaningful verdict and must abort. A release
//! that fails its linkage probe or round-trip check is not an error — it
//! is a recorded test result, carried in
//! [`CaseResult`](crate::runner::CaseResult).

use crate::arch::Architecture;
use crate::version::ReleaseId;

/// Infrastructure failures. Always fatal; never retried.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// A git invocation failed or produced unusable output.
    #[error("git error: {0}")]
    Git(String),

    /// The build collaborator exited non-zero while building a library.
    #[error("build failed for {release} [{arch}]: {detail}")]
    Build {
        release: ReleaseId,
        arch: Architecture,
        detail: String,
    },

    /// The consumer binary failed to compile or link.
    #[error("consumer build failed against {release} [{arch}]: {detail}")]
    ConsumerBuild {
        release: ReleaseId,
        arch: Architecture,
        detail: String,
    },

    /// The version probe executable could not be run at all.
    #[error("linkage probe unusable: {0}")]
    ProbeUnusable(String),

    /// A subprocess could not be spawned.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A tag did not match the single-digit `vX.Y.Z` release pattern.
    #[error("malformed release tag: {0}")]
    BadTag(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;
