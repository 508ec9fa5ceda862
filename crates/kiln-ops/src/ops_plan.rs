//! Operation: compute the build plan for the project.

use std::path::Path;

use kiln_core::config::BuildPolicy;
use kiln_resolver::planner::{self, BuildPlan, NodeAction};
use kiln_resolver::retry::RetryPolicy;
use kiln_util::errors::KilnError;
use kiln_util::progress::{status, status_info, status_warn};
use serde_json::{json, Value};

use crate::project::{Project, ProjectPaths};

/// Options for `kiln plan`.
#[derive(Debug, Default)]
pub struct PlanOptions {
    /// Print the plan as JSON on stdout.
    pub json: bool,
    /// Overrides `[build] policy` from the config.
    pub policy: Option<BuildPolicy>,
}

/// Resolve (honouring `Kiln.lock`), plan, and print the plan.
pub fn plan(project_root: &Path, paths: &ProjectPaths, opts: &PlanOptions) -> miette::Result<()> {
    let project = Project::load(project_root, paths)?;
    let lockfile = project.read_lockfile()?;
    let result = project.resolve(lockfile.as_ref())?;

    let policy = opts.policy.unwrap_or(project.config.build.policy);
    let retry = RetryPolicy::from(&project.config.retry);
    let plan = planner::plan(&result.graph, Some(&project.cache), policy, &retry)?;

    if opts.json {
        let text = serde_json::to_string_pretty(&plan_to_json(&plan)).map_err(|e| {
            KilnError::Generic {
                message: format!("Failed to serialize plan: {e}"),
            }
        })?;
        println!("{text}");
    } else {
        print!("{plan}");
    }

    let missing = plan.count(NodeAction::Missing);
    let summary = format!(
        "{} packages: {} to build, {} to download, {missing} missing",
        plan.len(),
        plan.count(NodeAction::Build),
        plan.count(NodeAction::Download),
    );
    if missing > 0 {
        status_warn("Planned", &summary);
        return Err(KilnError::Resolution {
            message: format!(
                "{missing} packages have no cached binary and the build policy is `never`"
            ),
        }
        .into());
    }
    if plan.is_empty() {
        status_info("Planned", "nothing to do");
    } else {
        status("Planned", &summary);
    }
    Ok(())
}

/// `{"levels": [[{"ref", "package_id", "action"}, ...], ...]}`
pub fn plan_to_json(plan: &BuildPlan) -> Value {
    let levels: Vec<Value> = plan
        .levels
        .iter()
        .map(|level| {
            Value::Array(
                level
                    .iter()
                    .map(|node| {
                        json!({
                            "ref": node.reference.to_string(),
                            "package_id": node.identity.as_str(),
                            "action": node.action.to_string(),
                        })
                    })
                    .collect(),
            )
        })
        .collect();
    json!({ "levels": levels })
}
