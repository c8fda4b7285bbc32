//! Harness configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::arch::Architecture;
use crate::version::{ReleaseId, ReleaseTag};

/// Default sanitizer handed to every build. ABI skew shows up as
/// out-of-bound reads and writes, which is exactly what this catches.
pub const DEFAULT_SANITIZER: &str = "-fsanitize=address";

/// Instrumentation applied to every library and consumer build.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstrumentationConfig {
    /// Architecture selection flag passed via `CFLAGS`.
    pub arch: Architecture,

    /// Memory-error sanitizer flag passed via `MOREFLAGS`.
    pub sanitizer: String,

    /// Build-internal parallelism (`make -j N`); `None` means
    /// unbounded `-j`. Does not imply release-level parallelism.
    pub jobs: Option<u32>,
}

impl InstrumentationConfig {
    pub fn new(arch: Architecture, sanitizer: impl Into<String>, jobs: Option<u32>) -> Self {
        Self {
            arch,
            sanitizer: sanitizer.into(),
            jobs,
        }
    }

    /// The `-j` argument for make.
    pub fn jobs_flag(&self) -> String {
        match self.jobs {
            Some(n) => format!("-j{n}"),
            None => "-j".to_string(),
        }
    }
}

/// Full harness configuration.
///
/// Everything the run depends on is explicit here — paths, build
/// targets, the probe command, the floor tag — so no step reads
/// ambient process state. Defaults describe the lz4 source layout
/// this harness grew up against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Root of the live source tree (the HEAD side of every check).
    pub source_root: PathBuf,

    /// Scratch area holding the history clone and per-release builds.
    pub scratch_dir: PathBuf,

    /// Remote used to create the full-history clone when absent.
    pub remote_url: String,

    /// Library source subdirectory within a source tree.
    pub lib_subdir: String,

    /// Test subdirectory within the live tree; the consumer binary and
    /// probe script live here.
    pub test_subdir: String,

    /// Make target producing the shared library.
    pub library_target: String,

    /// Make target producing the round-trip consumer binary.
    pub consumer_target: String,

    /// Probe command, run from the test directory with the consumer
    /// binary path as its argument.
    pub probe_command: String,

    /// Linker libs for the consumer build (`LDLIBS`).
    pub link_libs: String,

    /// Oldest release tested; earlier tags predate the stable ABI.
    pub floor: ReleaseTag,

    /// Architectures to cover, processed in this order.
    pub architectures: Vec<Architecture>,

    /// Reference payloads round-tripped through the consumer.
    pub payloads: Vec<PathBuf>,

    /// Sanitizer flag for every build.
    pub sanitizer: String,

    /// Build-internal parallelism.
    pub jobs: Option<u32>,

    /// Leave the scratch tree in place after the run for inspection.
    pub keep_artifacts: bool,
}

impl HarnessConfig {
    /// Configuration for a source tree at `source_root`, with defaults
    /// matching the layout the harness was built for.
    pub fn for_source_root(source_root: impl Into<PathBuf>) -> Self {
        let source_root = source_root.into();
        let scratch_dir = source_root.join("tests/abiTests");
        Self {
            source_root,
            scratch_dir,
            remote_url: "https://github.com/lz4/lz4.git".to_string(),
            lib_subdir: "lib".to_string(),
            test_subdir: "tests".to_string(),
            library_target: "liblz4".to_string(),
            consumer_target: "abiTest".to_string(),
            probe_command: "./check_liblz4_version.sh".to_string(),
            link_libs: "-llz4".to_string(),
            floor: ReleaseTag::new(1, 7, 5),
            architectures: Architecture::ALL.to_vec(),
            payloads: vec![PathBuf::from("README.md")],
            sanitizer: DEFAULT_SANITIZER.to_string(),
            jobs: None,
            keep_artifacts: true,
        }
    }

    /// Directory holding the full-history clone.
    pub fn clone_dir(&self) -> PathBuf {
        self.scratch_dir.join("clone")
    }

    /// Library directory of the live tree.
    pub fn head_lib_dir(&self) -> PathBuf {
        self.source_root.join(&self.lib_subdir)
    }

    /// Test directory of the live tree.
    pub fn test_dir(&self) -> PathBuf {
        self.source_root.join(&self.test_subdir)
    }

    /// Private per-release directory a tag is materialized into.
    pub fn release_dir(&self, tag: &ReleaseTag) -> PathBuf {
        self.scratch_dir.join(tag.to_string())
    }

    /// Library directory for a release: the live tree for HEAD, the
    /// materialized copy for a tag.
    pub fn release_lib_dir(&self, release: &ReleaseId) -> PathBuf {
        match release {
            ReleaseId::Head => self.head_lib_dir(),
            ReleaseId::Tagged(tag) => self.release_dir(tag).join(&self.lib_subdir),
        }
    }

    /// Instrumentation for one architecture.
    pub fn instrumentation(&self, arch: Architecture) -> InstrumentationConfig {
        InstrumentationConfig::new(arch, self.sanitizer.clone(), self.jobs)
    }

    /// Path to the consumer binary inside the test directory.
    pub fn consumer_path(&self) -> PathBuf {
        Path::new(".").join(&self.consumer_target)
    }
}
