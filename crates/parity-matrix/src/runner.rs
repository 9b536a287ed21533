//! Sequential execution of every matrix cell through capture, compare, and
//! gate, followed by scoring and report assembly.

use crate::contract::MatrixRunContract;
use crate::error::MatrixError;
use crate::expand::{MatrixCellDefinition, expand_cells};
use crate::report::{
    MATRIX_REPORT_SCHEMA_VERSION, MatrixCellResult, MatrixReport, MatrixReportPaths, axis_rollups,
    is_regression, matrix_drift_fingerprint, risk_tier_summary, stable_matrix_fingerprint,
    write_matrix_report,
};
use crate::score::{is_promotable, policy_violations, score_cell};
use chrono::{SecondsFormat, Utc};
use parity_capture::{CaptureError, CaptureOptions, Orchestrator, ScenarioRunner, create_run_dir};
use parity_kernel::stable_json::relativize_path;
use parity_kernel::{ComparatorProfile, Scenario, compare, evaluate_replay_gate_with_retry};
use parity_report::write_run_reports;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const CELLS_DIR: &str = "cells";

#[derive(Debug, Clone)]
pub struct MatrixOptions {
    pub out_root: PathBuf,
    pub label: String,
    pub workspace_path: Option<PathBuf>,
}

impl MatrixOptions {
    pub fn new(out_root: impl Into<PathBuf>, label: impl Into<String>) -> Self {
        Self {
            out_root: out_root.into(),
            label: label.into(),
            workspace_path: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MatrixRun {
    pub run_dir: PathBuf,
    pub report: MatrixReport,
    pub paths: MatrixReportPaths,
}

pub struct MatrixRunner<R> {
    runner: R,
    contract: MatrixRunContract,
    profiles: BTreeMap<String, ComparatorProfile>,
    options: MatrixOptions,
}

impl<R: ScenarioRunner> MatrixRunner<R> {
    /// `profiles` must hold every comparator profile axis ID, as produced by
    /// [`MatrixRunContract::resolve_profiles`].
    pub fn new(
        runner: R,
        contract: MatrixRunContract,
        profiles: BTreeMap<String, ComparatorProfile>,
        options: MatrixOptions,
    ) -> Result<Self, MatrixError> {
        if let Some(missing) = contract
            .axes
            .comparator_profiles
            .iter()
            .find(|axis| !profiles.contains_key(&axis.id))
        {
            return Err(MatrixError::contract(format!(
                "comparator profile `{}` was not resolved",
                missing.id
            )));
        }
        Ok(Self {
            runner,
            contract,
            profiles,
            options,
        })
    }

    pub fn contract(&self) -> &MatrixRunContract {
        &self.contract
    }

    pub fn run(&self, scenarios: &[Scenario]) -> Result<MatrixRun, MatrixError> {
        let run_dir = create_run_dir(&self.options.out_root, &self.options.label).map_err(MatrixError::Output)?;
        let cells = expand_cells(&self.contract);
        info!(
            contract = %self.contract.contract_id,
            cells = cells.len(),
            run_dir = %run_dir.display(),
            "matrix run started"
        );

        let cells_root = run_dir.join(CELLS_DIR);
        let mut results = Vec::with_capacity(cells.len());
        for cell in &cells {
            results.push(self.run_cell(cell, scenarios, &run_dir, &cells_root)?);
        }

        let drift_fingerprint = if self.contract.determinism.fingerprint_stability_check {
            stable_matrix_fingerprint(&results)?
        } else {
            matrix_drift_fingerprint(&results)
        };
        let report = MatrixReport {
            schema_version: MATRIX_REPORT_SCHEMA_VERSION.to_string(),
            contract_id: self.contract.contract_id.clone(),
            contract_schema_version: self.contract.schema_version.clone(),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            determinism: self.contract.determinism.config().snapshot(),
            total_cells: results.len(),
            promotable_cells: results.iter().filter(|c| c.promotable).count(),
            axis_rollups: axis_rollups(&results),
            risk_tiers: risk_tier_summary(&results),
            cells: results,
            drift_fingerprint,
        };
        let paths = write_matrix_report(&run_dir, &report)?;
        info!(
            promotable = report.promotable_cells,
            total = report.total_cells,
            "matrix run finished"
        );
        Ok(MatrixRun {
            run_dir,
            report,
            paths,
        })
    }

    fn orchestrator(&self, cell: &MatrixCellDefinition, cells_root: &Path) -> Orchestrator<&R> {
        let options = CaptureOptions {
            out_root: cells_root.to_path_buf(),
            workspace_path: self.options.workspace_path.clone(),
            determinism: self.contract.determinism.config(),
            model: Some(cell.model.clone()),
        };
        Orchestrator::new(&self.runner, options)
    }

    /// Capture, compare, gate, and score one cell; retry once when the
    /// contract requires it and the first comparison is blocking.
    pub fn run_cell(
        &self,
        cell: &MatrixCellDefinition,
        scenarios: &[Scenario],
        matrix_dir: &Path,
        cells_root: &Path,
    ) -> Result<MatrixCellResult, MatrixError> {
        let determinism = &self.contract.determinism;
        let selected = cell.select_scenarios(scenarios, determinism.normalization_required);
        let profile = self.profiles.get(&cell.comparator_profile).ok_or_else(|| {
            MatrixError::contract(format!(
                "comparator profile `{}` was not resolved",
                cell.comparator_profile
            ))
        })?;
        let orchestrator = self.orchestrator(cell, cells_root);
        let capture_err = |source: CaptureError| MatrixError::Capture {
            cell_id: cell.cell_id.clone(),
            source,
        };

        let primary_run = orchestrator.run(&selected, &cell.cell_id).map_err(capture_err)?;
        let primary = compare(&selected, &primary_run.baseline, &primary_run.candidate, profile);

        let mut retry_run_dir = None;
        let retry = if determinism.retry_once && primary.is_blocking() {
            let label = format!("{}-retry", cell.cell_id);
            let retry_run = orchestrator.run(&selected, &label).map_err(capture_err)?;
            retry_run_dir = Some(relativize_path(matrix_dir, &retry_run.run_dir));
            Some(compare(&selected, &retry_run.baseline, &retry_run.candidate, profile))
        } else {
            None
        };

        let gate = evaluate_replay_gate_with_retry(&primary, retry.as_ref(), cell.gate_mode);
        write_run_reports(&primary_run.run_dir, &primary, &gate)?;

        let score = score_cell(&primary, &gate);
        let violations = policy_violations(
            self.contract.risk_policy(&cell.risk_tier),
            &primary.summary.drifts_by_severity,
        );
        let promotable = is_promotable(&gate, &violations);
        if is_regression(&gate) {
            warn!(cell = %cell.cell_id, "cell classified as deterministic regression");
        }
        info!(
            cell = %cell.cell_id,
            scenarios = selected.len(),
            status = gate.status.as_str(),
            cms = score.cms,
            promotable,
            "matrix cell scored"
        );

        Ok(MatrixCellResult {
            cell: cell.clone(),
            run_dir: relativize_path(matrix_dir, &primary_run.run_dir),
            retry_run_dir,
            scenario_ids: selected.iter().map(|s| s.scenario_id.clone()).collect(),
            deterministic_regression: is_regression(&gate),
            comparison: primary,
            gate,
            score,
            policy_violations: violations,
            promotable,
        })
    }
}
