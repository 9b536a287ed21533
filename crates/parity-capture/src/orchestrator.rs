//! Capture orchestration: run every scenario under each profile, normalize,
//! and persist raw envelopes, normalized artifacts, and a manifest.
//!
//! Layout of one run directory:
//!
//! ```text
//! <out_root>/<YYYYMMDDTHHMMSSZ>-<label>/
//!     manifest.json
//!     baseline.raw.jsonl     candidate.raw.jsonl
//!     baseline.norm.json     candidate.norm.json
//! ```

use crate::determinism::{DeterminismConfig, DeterminismSnapshot};
use crate::error::CaptureError;
use crate::identity::{compute_run_id, sanitize_label};
use crate::runner::{RunContext, ScenarioRunner};
use chrono::{SecondsFormat, Utc};
use parity_kernel::scenario::suite_digest;
use parity_kernel::stable_json::{
    canonical_json_bytes, relativize_path, write_stable_json, write_text_atomic,
};
use parity_kernel::trace::ARTIFACT_SCHEMA_VERSION;
use parity_kernel::{
    EventType, NormalizeOptions, Profile, ProfileArtifacts, Scenario, ScenarioRunArtifact,
    TraceEvent, normalize_events,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

/// Settings shared by every capture of one orchestrator.
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    pub out_root: PathBuf,
    /// Root used for path normalization and manifest-relative paths.
    pub workspace_path: Option<PathBuf>,
    pub determinism: DeterminismConfig,
    pub model: Option<String>,
}

impl CaptureOptions {
    pub fn new(out_root: impl Into<PathBuf>) -> Self {
        Self {
            out_root: out_root.into(),
            workspace_path: None,
            determinism: DeterminismConfig::default(),
            model: None,
        }
    }
}

/// One line of a `*.raw.jsonl` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEventEnvelope {
    pub run_id: String,
    pub profile: Profile,
    pub scenario_id: String,
    pub seq: usize,
    pub event: TraceEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestProfileEntry {
    pub profile: Profile,
    pub run_id: String,
    pub raw_path: String,
    pub normalized_path: String,
    pub scenario_count: usize,
    pub successful_scenarios: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: u32,
    pub label: String,
    pub created_at: String,
    pub run_dir: String,
    pub suite_digest: String,
    pub scenario_ids: Vec<String>,
    pub profiles: Vec<ManifestProfileEntry>,
    pub determinism: DeterminismSnapshot,
}

impl RunManifest {
    pub fn profile(&self, profile: Profile) -> Option<&ManifestProfileEntry> {
        self.profiles.iter().find(|p| p.profile == profile)
    }
}

/// Output of a two-profile run.
#[derive(Debug, Clone)]
pub struct CaptureRun {
    pub run_dir: PathBuf,
    pub manifest: RunManifest,
    pub baseline: ProfileArtifacts,
    pub candidate: ProfileArtifacts,
}

/// Output of a single-profile capture.
#[derive(Debug, Clone)]
pub struct ProfileCapture {
    pub run_dir: PathBuf,
    pub manifest: RunManifest,
    pub artifacts: ProfileArtifacts,
}

pub struct Orchestrator<R> {
    runner: R,
    options: CaptureOptions,
}

impl<R: ScenarioRunner> Orchestrator<R> {
    pub fn new(runner: R, options: CaptureOptions) -> Self {
        Self { runner, options }
    }

    pub fn options(&self) -> &CaptureOptions {
        &self.options
    }

    /// Capture baseline then candidate into one fresh run directory.
    pub fn run(&self, scenarios: &[Scenario], label: &str) -> Result<CaptureRun, CaptureError> {
        let run_dir = create_run_dir(&self.options.out_root, label)?;
        info!(label, run_dir = %run_dir.display(), scenarios = scenarios.len(), "capture run started");

        let baseline = self.capture_profile(Profile::Baseline, scenarios, label)?;
        let candidate = self.capture_profile(Profile::Candidate, scenarios, label)?;
        let entries = vec![
            self.write_profile(&run_dir, &baseline)?,
            self.write_profile(&run_dir, &candidate)?,
        ];
        let manifest = self.write_manifest(&run_dir, label, scenarios, entries)?;

        info!(run_dir = %run_dir.display(), "capture run finished");
        Ok(CaptureRun {
            run_dir,
            manifest,
            baseline,
            candidate,
        })
    }

    /// Capture a single profile into its own run directory.
    pub fn capture(
        &self,
        profile: Profile,
        scenarios: &[Scenario],
        label: &str,
    ) -> Result<ProfileCapture, CaptureError> {
        let run_dir = create_run_dir(&self.options.out_root, label)?;
        info!(label, %profile, run_dir = %run_dir.display(), "single-profile capture started");
        let artifacts = self.capture_profile(profile, scenarios, label)?;
        let entry = self.write_profile(&run_dir, &artifacts)?;
        let manifest = self.write_manifest(&run_dir, label, scenarios, vec![entry])?;
        Ok(ProfileCapture {
            run_dir,
            manifest,
            artifacts,
        })
    }

    /// Run and normalize every scenario for one profile, without touching disk.
    ///
    /// A runner failure aborts the whole profile.
    pub fn capture_profile(
        &self,
        profile: Profile,
        scenarios: &[Scenario],
        label: &str,
    ) -> Result<ProfileArtifacts, CaptureError> {
        let run_id = compute_run_id(label, profile, scenarios, &self.options.determinism);
        let workspace = self.workspace_string();
        let ctx = RunContext {
            profile,
            run_id: run_id.clone(),
            workspace_path: workspace.clone(),
            model: self.options.model.clone(),
        };

        let mut captured = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            let raw_events = self
                .runner
                .run_scenario(scenario, &ctx)
                .map_err(|source| CaptureError::Runner {
                    scenario_id: scenario.scenario_id.clone(),
                    profile,
                    source,
                })?;
            let options = NormalizeOptions::new(scenario.normalization, workspace.clone());
            let normalized_events = normalize_events(&raw_events, &options);
            let success = signatures_satisfied(scenario, &normalized_events);
            debug!(
                scenario = %scenario.scenario_id,
                %profile,
                events = raw_events.len(),
                success,
                "scenario captured"
            );
            captured.push(ScenarioRunArtifact {
                scenario_id: scenario.scenario_id.clone(),
                scenario_digest: scenario.scenario_digest.clone(),
                raw_events,
                normalized_events,
                success,
            });
        }

        Ok(ProfileArtifacts {
            schema_version: ARTIFACT_SCHEMA_VERSION,
            profile,
            label: label.to_string(),
            run_id,
            scenarios: captured,
        })
    }

    fn workspace_string(&self) -> Option<String> {
        self.options
            .workspace_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
    }

    fn manifest_root(&self) -> PathBuf {
        self.options
            .workspace_path
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| self.options.out_root.clone())
    }

    fn write_profile(
        &self,
        run_dir: &Path,
        artifacts: &ProfileArtifacts,
    ) -> Result<ManifestProfileEntry, CaptureError> {
        let raw_path = run_dir.join(artifacts.profile.raw_file_name());
        let norm_path = run_dir.join(artifacts.profile.norm_file_name());

        let mut raw = String::new();
        for scenario in &artifacts.scenarios {
            for (seq, event) in scenario.raw_events.iter().enumerate() {
                let envelope = RawEventEnvelope {
                    run_id: artifacts.run_id.clone(),
                    profile: artifacts.profile,
                    scenario_id: scenario.scenario_id.clone(),
                    seq,
                    event: event.clone(),
                };
                let value = serde_json::to_value(&envelope)?;
                raw.push_str(&String::from_utf8_lossy(&canonical_json_bytes(&value)));
                raw.push('\n');
            }
        }
        write_text_atomic(&raw_path, &raw)?;
        write_stable_json(&norm_path, artifacts)?;

        let root = self.manifest_root();
        Ok(ManifestProfileEntry {
            profile: artifacts.profile,
            run_id: artifacts.run_id.clone(),
            raw_path: relativize_path(&root, &raw_path),
            normalized_path: relativize_path(&root, &norm_path),
            scenario_count: artifacts.scenarios.len(),
            successful_scenarios: artifacts.scenarios.iter().filter(|s| s.success).count(),
        })
    }

    fn write_manifest(
        &self,
        run_dir: &Path,
        label: &str,
        scenarios: &[Scenario],
        profiles: Vec<ManifestProfileEntry>,
    ) -> Result<RunManifest, CaptureError> {
        let manifest = RunManifest {
            schema_version: MANIFEST_SCHEMA_VERSION,
            label: label.to_string(),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            run_dir: relativize_path(&self.manifest_root(), run_dir),
            suite_digest: suite_digest(scenarios),
            scenario_ids: scenarios.iter().map(|s| s.scenario_id.clone()).collect(),
            profiles,
            determinism: self.options.determinism.snapshot(),
        };
        write_stable_json(run_dir.join(MANIFEST_FILE), &manifest)?;
        Ok(manifest)
    }
}

/// Create `<out_root>/<UTC stamp>-<label>`, suffixing `-2`, `-3`, ... on collision.
pub fn create_run_dir(out_root: &Path, label: &str) -> Result<PathBuf, CaptureError> {
    let stamp = Utc::now().format("%Y%m%dT%H%M%SZ");
    let base = format!("{stamp}-{}", sanitize_label(label));
    fs::create_dir_all(out_root).map_err(|e| CaptureError::io(out_root, e))?;

    let mut attempt = 1usize;
    loop {
        let name = if attempt == 1 {
            base.clone()
        } else {
            format!("{base}-{attempt}")
        };
        let candidate = out_root.join(name);
        match fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(CaptureError::io(&candidate, e)),
        }
    }
}

/// Every required success signature appears among outcome events.
pub fn signatures_satisfied(scenario: &Scenario, events: &[TraceEvent]) -> bool {
    scenario.expectations.success_signature.iter().all(|required| {
        events.iter().any(|e| {
            e.event_type == EventType::Outcome && e.success_signature.as_deref() == Some(required.as_str())
        })
    })
}
