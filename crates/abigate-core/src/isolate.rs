//! Isolated per-release library builds.
//!
//! Each tagged release is materialized into its own directory under the
//! scratch area before building, so no two releases ever share mutable
//! build state. Builds are always clean rebuilds: stale object files
//! compiled under different instrumentation flags would invalidate the
//! ABI comparison the run exists to make.

use std::path::PathBuf;

use tracing::info;

use crate::arch::Architecture;
use crate::catalog::VersionCatalog;
use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};
use crate::invoke::{Invocation, Invoker};
use crate::version::ReleaseId;

/// A built library for one (release, architecture) pair.
///
/// Immutable once returned; `lib_dir` is what later phases point the
/// runtime search path at.
#[derive(Debug, Clone)]
pub struct BuildArtifact {
    pub release: ReleaseId,
    pub arch: Architecture,
    pub lib_dir: PathBuf,
}

/// Materializes release sources and drives the build collaborator.
pub struct BuildIsolator<'a> {
    invoker: &'a dyn Invoker,
    config: &'a HarnessConfig,
}

impl<'a> BuildIsolator<'a> {
    pub fn new(invoker: &'a dyn Invoker, config: &'a HarnessConfig) -> Self {
        Self { invoker, config }
    }

    /// Build the library for one (release, architecture) pair.
    ///
    /// HEAD builds in the live tree's library directory; a tag is
    /// first materialized into its private scratch directory. Any
    /// non-zero exit from the build collaborator is fatal.
    pub async fn build(&self, release: &ReleaseId, arch: Architecture) -> Result<BuildArtifact> {
        let lib_dir = self.config.release_lib_dir(release);

        if let ReleaseId::Tagged(tag) = release {
            let dest = self.config.release_dir(tag);
            VersionCatalog::materialize(self.invoker, &self.config.clone_dir(), tag, &dest)
                .await?;
        }

        info!(release = %release, arch = %arch, "building library");
        self.make_clean(&lib_dir, release, arch).await?;

        let instr = self.config.instrumentation(arch);
        let inv = Invocation::new("make", &lib_dir)
            .arg(instr.jobs_flag())
            .arg("V=1")
            .arg(&self.config.library_target)
            .env("CFLAGS", arch.cflag())
            .env("MOREFLAGS", &instr.sanitizer);
        let out = self.invoker.invoke(&inv).await?;
        if !out.success() {
            return Err(HarnessError::Build {
                release: *release,
                arch,
                detail: format!("make exited with code {}: {}", out.exit_code, out.stderr.trim()),
            });
        }

        self.verify_artifact(&lib_dir, release, arch)?;

        Ok(BuildArtifact {
            release: *release,
            arch,
            lib_dir,
        })
    }

    /// Build the round-trip consumer in the test directory, compiled
    /// and linked against `against`'s headers and library. The stale
    /// binary from a previous release's build is removed first.
    pub async fn build_consumer(&self, against: &ReleaseId, arch: Architecture) -> Result<PathBuf> {
        let test_dir = self.config.test_dir();
        let lib_dir = self.config.release_lib_dir(against);

        let binary = test_dir.join(&self.config.consumer_target);
        match std::fs::remove_file(&binary) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        info!(against = %against, arch = %arch, "building consumer");
        let instr = self.config.instrumentation(arch);
        let inv = Invocation::new("make", &test_dir)
            .arg(instr.jobs_flag())
            .arg("V=1")
            .arg(&self.config.consumer_target)
            .env("CFLAGS", arch.cflag())
            .env("CPPFLAGS", format!("-I{}", lib_dir.display()))
            .env("LDFLAGS", format!("-L{}", lib_dir.display()))
            .env("LDLIBS", &self.config.link_libs)
            .env("MOREFLAGS", &instr.sanitizer)
            .streamed();
        let out = self.invoker.invoke(&inv).await?;
        if !out.success() {
            return Err(HarnessError::ConsumerBuild {
                release: *against,
                arch,
                detail: format!("make exited with code {}", out.exit_code),
            });
        }
        Ok(binary)
    }

    async fn make_clean(
        &self,
        lib_dir: &std::path::Path,
        release: &ReleaseId,
        arch: Architecture,
    ) -> Result<()> {
        let inv = Invocation::new("make", lib_dir).arg("clean");
        let out = self.invoker.invoke(&inv).await?;
        if !out.success() {
            return Err(HarnessError::Build {
                release: *release,
                arch,
                detail: format!("make clean exited with code {}", out.exit_code),
            });
        }
        Ok(())
    }

    /// A materialized release directory is full of source files, so
    /// "directory is non-empty" proves nothing about the build. The
    /// artifact itself must exist: a non-empty shared object named
    /// after the library target.
    fn verify_artifact(
        &self,
        lib_dir: &std::path::Path,
        release: &ReleaseId,
        arch: Architecture,
    ) -> Result<()> {
        let target = &self.config.library_target;
        let produced = std::fs::read_dir(lib_dir)
            .map(|entries| {
                entries.flatten().any(|entry| {
                    let name = entry.file_name();
                    let name = name.to_string_lossy();
                    name.starts_with(target.as_str())
                        && name.contains(".so")
                        && entry.metadata().map(|m| m.len() > 0).unwrap_or(false)
                })
            })
            .unwrap_or(false);
        if !produced {
            return Err(HarnessError::Build {
                release: *release,
                arch,
                detail: format!(
                    "build left no {target}.so* artifact in {}",
                    lib_dir.display()
                ),
            });
        }
        Ok(())
    }
}
