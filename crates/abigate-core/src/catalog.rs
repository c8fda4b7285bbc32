//! Release discovery and materialization via git.
//!
//! CI checkouts are usually shallow and carry no tags, so the harness
//! keeps its own full-history clone inside the scratch area and asks
//! that clone for the release list.

use std::path::Path;

use tracing::{debug, info};

use crate::error::{HarnessError, Result};
use crate::invoke::{Invocation, Invoker};
use crate::version::{ReleaseId, ReleaseTag};

/// Git tag glob for published releases: single-digit major.minor.patch.
/// Major starts at 1; the v0.x line predates the stable ABI and is
/// never considered, independent of the floor filter.
pub const TAG_PATTERN: &str = "v[1-9].[0-9].[0-9]";

/// Discovers and orders the releases under test.
pub struct VersionCatalog;

impl VersionCatalog {
    /// List releases at or above `floor`, ascending, with the `HEAD`
    /// sentinel prepended exactly once.
    pub async fn discover(
        invoker: &dyn Invoker,
        clone_dir: &Path,
        floor: ReleaseTag,
    ) -> Result<Vec<ReleaseId>> {
        let inv = Invocation::new("git", clone_dir).args(["tag", "-l", TAG_PATTERN]);
        let out = invoker.invoke(&inv).await?;
        if !out.success() {
            return Err(HarnessError::Git(format!(
                "git tag -l failed in {}: {}",
                clone_dir.display(),
                out.stderr.trim()
            )));
        }

        let mut tags = Vec::new();
        for line in out.stdout.split_whitespace() {
            // The glob already constrains the shape; a parse failure
            // here means the pattern and the parser disagree.
            let tag: ReleaseTag = line.parse()?;
            if tag >= floor {
                tags.push(tag);
            }
        }
        tags.sort();
        debug!(count = tags.len(), floor = %floor, "discovered release tags");

        let mut catalog = vec![ReleaseId::Head];
        catalog.extend(tags.into_iter().map(ReleaseId::Tagged));
        Ok(catalog)
    }

    /// Clone the full history into `clone_dir` if it is not already
    /// there. A shallow clone is insufficient: it has no tags to list
    /// and no tagged trees to materialize.
    pub async fn ensure_full_clone(
        invoker: &dyn Invoker,
        remote_url: &str,
        clone_dir: &Path,
    ) -> Result<()> {
        if clone_dir.is_dir() {
            debug!(dir = %clone_dir.display(), "reusing existing history clone");
            return Ok(());
        }
        let parent = clone_dir
            .parent()
            .ok_or_else(|| HarnessError::Git(format!("clone dir {} has no parent", clone_dir.display())))?;
        std::fs::create_dir_all(parent)?;

        info!(remote = remote_url, dir = %clone_dir.display(), "cloning full history");
        let inv = Invocation::new("git", parent)
            .args(["clone", remote_url])
            .arg(clone_dir.to_string_lossy().to_string());
        let out = invoker.invoke(&inv).await?;
        if !out.success() {
            return Err(HarnessError::Git(format!(
                "git clone {} failed: {}",
                remote_url,
                out.stderr.trim()
            )));
        }
        Ok(())
    }

    /// Check a tag's tree out into `dest` without touching the clone's
    /// own work tree.
    pub async fn materialize(
        invoker: &dyn Invoker,
        clone_dir: &Path,
        tag: &ReleaseTag,
        dest: &Path,
    ) -> Result<()> {
        std::fs::create_dir_all(dest)?;
        let inv = Invocation::new("git", clone_dir)
            .arg(format!("--work-tree={}", dest.display()))
            .args(["checkout", &tag.to_string(), "--", "."]);
        let out = invoker.invoke(&inv).await?;
        if !out.success() {
            return Err(HarnessError::Git(format!(
                "materializing {tag} into {} failed: {}",
                dest.display(),
                out.stderr.trim()
            )));
        }
        Ok(())
    }
}
