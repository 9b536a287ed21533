//! Artifact resolution across explicit paths, the golden store, and legacy
//! run directories.
//!
//! Precedence:
//! 1. an explicit path that exists
//! 2. the golden store baseline (baseline kind only)
//! 3. an explicit legacy run directory (`<kind>.norm.json`, then `<kind>.json`)
//! 4. the most recently modified subdirectory of the legacy runs root
//!    containing a matching file

use crate::error::StoreError;
use crate::golden::{DEFAULT_BASELINE_ID, GoldenLocation};
use parity_kernel::Profile;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    Explicit,
    GoldenStore,
    LegacyRunDir,
    LegacyRunsRoot,
}

impl ResolutionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::GoldenStore => "golden_store",
            Self::LegacyRunDir => "legacy_run_dir",
            Self::LegacyRunsRoot => "legacy_runs_root",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedArtifact {
    pub kind: Profile,
    pub path: PathBuf,
    pub source: ResolutionSource,
}

#[derive(Debug, Clone, Default)]
pub struct ResolveRequest<'a> {
    pub explicit: Option<&'a Path>,
    pub goldens_root: Option<&'a Path>,
    pub baseline_id: Option<&'a str>,
    pub legacy_run_dir: Option<&'a Path>,
    pub legacy_runs_root: Option<&'a Path>,
}

/// File names a legacy run directory may hold for `kind`, in preference order.
pub fn legacy_file_names(kind: Profile) -> [String; 2] {
    [kind.norm_file_name(), format!("{}.json", kind.as_str())]
}

/// Resolve one artifact; `Ok(None)` when nothing matches.
pub fn resolve_artifact(kind: Profile, request: &ResolveRequest<'_>) -> Result<Option<ResolvedArtifact>, StoreError> {
    let found = |path: PathBuf, source: ResolutionSource| -> Result<Option<ResolvedArtifact>, StoreError> {
        debug!(%kind, path = %path.display(), ?source, "artifact resolved");
        Ok(Some(ResolvedArtifact { kind, path, source }))
    };

    if let Some(path) = request.explicit
        && path.is_file()
    {
        return found(path.to_path_buf(), ResolutionSource::Explicit);
    }

    if kind == Profile::Baseline
        && let Some(root) = request.goldens_root
    {
        let location = GoldenLocation::new(root, request.baseline_id.unwrap_or(DEFAULT_BASELINE_ID));
        if location.baseline_path.is_file() {
            return found(location.baseline_path, ResolutionSource::GoldenStore);
        }
    }

    if let Some(dir) = request.legacy_run_dir
        && let Some(path) = find_in_run_dir(dir, kind)?
    {
        return found(path, ResolutionSource::LegacyRunDir);
    }

    if let Some(root) = request.legacy_runs_root
        && let Some(path) = newest_run_with(root, kind)?
    {
        return found(path, ResolutionSource::LegacyRunsRoot);
    }

    Ok(None)
}

/// First legacy file for `kind` in `dir`. Absence is `Ok(None)`; any other
/// I/O failure is an error.
fn find_in_run_dir(dir: &Path, kind: Profile) -> Result<Option<PathBuf>, StoreError> {
    for name in legacy_file_names(kind) {
        let path = dir.join(name);
        match fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => return Ok(Some(path)),
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io(&path, e)),
        }
    }
    Ok(None)
}

/// A subdirectory of a legacy runs root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyRunDir {
    pub dir: PathBuf,
    pub modified: SystemTime,
}

/// Subdirectories of `root`, newest first (ties broken by name, descending).
///
/// A missing root yields an empty list.
pub fn list_run_dirs(root: &Path) -> Result<Vec<LegacyRunDir>, StoreError> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::io(root, e)),
    };

    let mut runs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::io(root, e))?;
        let path = entry.path();
        let metadata = entry.metadata().map_err(|e| StoreError::io(&path, e))?;
        if !metadata.is_dir() {
            continue;
        }
        let modified = metadata.modified().map_err(|e| StoreError::io(&path, e))?;
        runs.push(LegacyRunDir { dir: path, modified });
    }
    runs.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.dir.cmp(&a.dir)));
    Ok(runs)
}

/// Matching file in the newest run directory that has one.
fn newest_run_with(root: &Path, kind: Profile) -> Result<Option<PathBuf>, StoreError> {
    for run in list_run_dirs(root)? {
        if let Some(path) = find_in_run_dir(&run.dir, kind)? {
            return Ok(Some(path));
        }
    }
    Ok(None)
}
