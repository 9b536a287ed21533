use crate::cli::SuiteArgs;
use crate::support::{print_json_or_exit, select_scenarios_or_exit};
use serde_json::json;

pub fn run(suite: SuiteArgs, json_output: bool) {
    let scenarios = select_scenarios_or_exit(&suite);

    if json_output {
        let rows: Vec<_> = scenarios
            .iter()
            .map(|s| {
                json!({
                    "scenario_id": s.scenario_id,
                    "title": s.title,
                    "tags": s.tags,
                    "steps": s.steps.len(),
                    "terminal_surface": s.runtime.terminal_surface.as_str(),
                    "scenario_digest": s.scenario_digest,
                })
            })
            .collect();
        print_json_or_exit(&json!({
            "count": scenarios.len(),
            "scenarios": rows,
        }));
        return;
    }

    println!("parity list-scenarios ({} selected)", scenarios.len());
    for scenario in &scenarios {
        let tags = if scenario.tags.is_empty() {
            "-".to_string()
        } else {
            scenario.tags.join(", ")
        };
        println!(
            "  {}  steps={}  tags={}",
            scenario.scenario_id,
            scenario.steps.len(),
            tags
        );
    }
}
