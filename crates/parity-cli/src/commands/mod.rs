pub mod capture;
pub mod compare;
pub mod list_scenarios;
pub mod migrate_legacy_runs;
pub mod promote_baseline;
pub mod report;
pub mod run;
pub mod run_matrix;
