//! Golden baselines, guarded promotion, and artifact resolution.
//!
//! Baselines live under `<goldens_root>/v1/<baseline_id>/`. They are only
//! written by [`promote_baseline`], and only when the caller both applies and
//! approves the promotion. [`resolve_artifact`] locates comparison inputs
//! across explicit paths, the golden store, and legacy run directories.

pub mod artifacts;
pub mod error;
pub mod golden;
pub mod migration;
pub mod promotion;
pub mod resolver;

pub use artifacts::{read_json_file, read_json_file_if_exists, read_profile_artifacts};
pub use error::{PromotionError, StoreError};
pub use golden::{
    DEFAULT_BASELINE_ID, GoldenBaselineRecord, GoldenLocation, GoldenMetadata,
    read_golden_baseline, sanitize_baseline_id, scenario_signature,
};
pub use migration::{LegacyRunSummary, MigrationReport, migrate_legacy_runs};
pub use promotion::{
    PromotionDiff, PromotionFlags, PromotionOutcome, PromotionReport, promote_baseline,
};
pub use resolver::{
    LegacyRunDir, ResolutionSource, ResolveRequest, ResolvedArtifact, list_run_dirs,
    resolve_artifact,
};
