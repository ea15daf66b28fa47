use std::collections::HashMap;

use tracing::{debug, trace};

use super::container::{convert_container, convert_services};
use super::id_builder::IdBuilder;
use super::if_condition::{convert_if_condition, default_if_condition};
use super::runs_on::convert_runs_on;
use super::steps::convert_steps;
use super::{convert_concurrency, report, ConvertError};
use crate::model::types::{BoolOrExpression, Job, ReusableWorkflowJob, WorkflowJob};
use crate::templates::context::TemplateContext;
use crate::templates::tokens::{TemplateToken, TokenValue};

/// Convert the `jobs` mapping and check the dependency graph formed by their
/// `needs`. Returns `None` when no job can start because every job depends
/// on another.
pub fn convert_jobs(context: &mut TemplateContext, token: &TemplateToken) -> Option<Vec<WorkflowJob>> {
    let pairs = match token.assert_mapping("jobs") {
        Ok(pairs) => pairs,
        Err(err) => {
            context.error(token, err.to_string());
            return Some(Vec::new());
        }
    };

    let mut id_builder = IdBuilder::new();
    let mut jobs = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let id = match pair.key.assert_string("job name") {
            Ok(id) => id,
            Err(err) => {
                context.error(&pair.key, err.to_string());
                continue;
            }
        };
        if let Err(message) = id_builder.try_add_known_id(id) {
            context.error(&pair.key, message);
        }

        trace!(job = id, "converting job");
        let converted = convert_job(context, &pair.key, &pair.value);
        if let Some(job) = report(context, &pair.value, converted) {
            jobs.push(job);
        }
    }

    validate_needs(context, token, &jobs).then_some(jobs)
}

fn convert_job(
    context: &mut TemplateContext,
    id: &TemplateToken,
    token: &TemplateToken,
) -> Result<WorkflowJob, ConvertError> {
    let mut name = None;
    let mut needs = None;
    let mut if_condition = None;
    let mut env = None;
    let mut environment = None;
    let mut strategy = None;
    let mut concurrency = None;
    let mut runs_on = None;
    let mut container = None;
    let mut services = None;
    let mut outputs = None;
    let mut timeout_minutes = None;
    let mut continue_on_error = None;
    let mut steps = Vec::new();
    let mut uses = None;
    let mut with = None;
    let mut secrets = None;
    let mut inherit_secrets = false;

    for pair in token.assert_mapping("job")? {
        let value = &pair.value;
        match pair.key.assert_string("job key")? {
            "name" => name = Some(value.clone()),
            "needs" => needs = Some(convert_needs(value)?),
            "if" => if_condition = Some(convert_if_condition(context, value)),
            "env" => env = Some(value.clone()),
            "environment" => environment = Some(value.clone()),
            "strategy" => strategy = Some(value.clone()),
            "concurrency" => {
                convert_concurrency(context, value);
                concurrency = Some(value.clone());
            }
            "runs-on" => runs_on = convert_runs_on(context, value),
            "container" => {
                convert_container(context, value);
                container = Some(value.clone());
            }
            "services" => {
                convert_services(context, value);
                services = Some(value.clone());
            }
            "outputs" => outputs = Some(value.clone()),
            "timeout-minutes" => timeout_minutes = Some(value.clone()),
            "continue-on-error" => {
                continue_on_error = Some(if value.is_expression() {
                    BoolOrExpression::Expression(value.clone())
                } else {
                    BoolOrExpression::Value(value.assert_boolean("continue-on-error")?)
                })
            }
            "steps" => steps = convert_steps(context, value),
            "uses" => uses = Some(value.clone()),
            "with" => with = Some(value.clone()),
            "secrets" => match &value.value {
                TokenValue::String { value: s, .. } if s == "inherit" => inherit_secrets = true,
                _ => secrets = Some(value.clone()),
            },
            _ => {}
        }
    }

    // an empty or missing name shows the id
    let name = match name {
        Some(name) if !matches!(name.assert_string("job name"), Ok("")) => name,
        _ => id.clone(),
    };
    let if_condition = if_condition.unwrap_or_else(|| default_if_condition(token.file));

    if let Some(reference) = uses {
        return Ok(WorkflowJob::ReusableWorkflowJob(ReusableWorkflowJob {
            id: id.clone(),
            name,
            needs,
            if_condition,
            reference,
            strategy,
            concurrency,
            input_values: with,
            secret_values: secrets,
            inherit_secrets,
            workflow_call: None,
            jobs: None,
        }));
    }

    Ok(WorkflowJob::Job(Job {
        id: id.clone(),
        name,
        needs,
        if_condition,
        env,
        environment,
        strategy,
        concurrency,
        runs_on,
        container,
        services,
        outputs,
        timeout_minutes,
        continue_on_error,
        steps,
    }))
}

fn convert_needs(token: &TemplateToken) -> Result<Vec<TemplateToken>, ConvertError> {
    match &token.value {
        TokenValue::String { .. } => Ok(vec![token.clone()]),
        TokenValue::Sequence(items) => {
            for item in items {
                item.assert_string("needs item")?;
            }
            Ok(items.to_vec())
        }
        _ => {
            token.assert_sequence("needs")?;
            Ok(Vec::new())
        }
    }
}

/// Report unknown and cyclic dependencies. Every `needs` entry that cannot
/// be resolved, whether on a cycle or waiting on one, is reported. Returns
/// false when every job depends on another.
fn validate_needs(context: &mut TemplateContext, jobs_token: &TemplateToken, jobs: &[WorkflowJob]) -> bool {
    if jobs.is_empty() {
        return true;
    }

    let index: HashMap<String, usize> = jobs
        .iter()
        .enumerate()
        .map(|(i, job)| (job.id_str().to_lowercase(), i))
        .collect();

    // known dependencies of each job, by index
    let mut edges: Vec<Vec<(usize, &TemplateToken)>> = vec![Vec::new(); jobs.len()];
    for (i, job) in jobs.iter().enumerate() {
        for need in job.needs() {
            let Ok(name) = need.assert_string("needs item") else {
                continue;
            };
            match index.get(&name.to_lowercase()) {
                Some(&target) => edges[i].push((target, need)),
                None => context.error(
                    need,
                    format!("Job '{}' depends on unknown job '{}'.", job.id_str(), name),
                ),
            }
        }
    }

    let has_root = edges.iter().any(|deps| deps.is_empty());
    if !has_root {
        context.error(
            jobs_token,
            "The workflow must contain at least one job with no dependencies.",
        );
    }

    // Kahn: repeatedly resolve jobs whose dependencies are all resolved
    let mut resolved = vec![false; jobs.len()];
    loop {
        let ready: Vec<usize> = (0..jobs.len())
            .filter(|&i| !resolved[i] && edges[i].iter().all(|(dep, _)| resolved[*dep]))
            .collect();
        if ready.is_empty() {
            break;
        }
        for i in ready {
            resolved[i] = true;
        }
    }

    for (i, job) in jobs.iter().enumerate().filter(|(i, _)| !resolved[*i]) {
        for &(target, need) in &edges[i] {
            if !resolved[target] {
                debug!(job = job.id_str(), need = %need, "dependency cycle");
                context.error(
                    need,
                    format!(
                        "Job '{}' depends on job '{}' which creates a cycle in the dependency graph.",
                        job.id_str(),
                        jobs[target].id_str()
                    ),
                );
            }
        }
    }
    has_root
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{messages, read};
    use super::*;
    use assert_matches::assert_matches;

    fn convert(jobs: &str) -> (Vec<WorkflowJob>, Vec<String>) {
        let (jobs, errors) = try_convert(jobs);
        (jobs.unwrap_or_default(), errors)
    }

    fn try_convert(jobs: &str) -> (Option<Vec<WorkflowJob>>, Vec<String>) {
        let (mut context, root) = read(&format!("on: push\njobs:\n{}", jobs));
        let jobs = convert_jobs(&mut context, root.get("jobs").unwrap());
        (jobs, messages(&context))
    }

    fn needs(job: &WorkflowJob) -> Vec<String> {
        job.needs().iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_needs_resolved() {
        let (jobs, errors) = convert(
            "  a:\n    runs-on: x\n  b:\n    needs: a\n    runs-on: x\n  c:\n    needs: [a, b]\n    runs-on: x\n",
        );
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(needs(&jobs[1]), vec!["a"]);
        assert_eq!(needs(&jobs[2]), vec!["a", "b"]);
    }

    #[test]
    fn test_unknown_need() {
        let (_, errors) = convert("  a:\n    runs-on: x\n  b:\n    needs: [a, z]\n    runs-on: x\n");
        assert_eq!(
            errors,
            vec!["ci.yml (Line: 6, Col: 16): Job 'b' depends on unknown job 'z'."]
        );
    }

    #[test]
    fn test_cycle_reported_on_each_needs_token() {
        let (_, errors) = convert(
            "  a:\n    runs-on: x\n  b:\n    needs: c\n    runs-on: x\n  c:\n    needs: b\n    runs-on: x\n  d:\n    needs: b\n    runs-on: x\n",
        );
        assert_eq!(
            errors,
            vec![
                "ci.yml (Line: 6, Col: 12): Job 'b' depends on job 'c' which creates a cycle in the dependency graph.",
                "ci.yml (Line: 9, Col: 12): Job 'c' depends on job 'b' which creates a cycle in the dependency graph.",
                "ci.yml (Line: 12, Col: 12): Job 'd' depends on job 'b' which creates a cycle in the dependency graph.",
            ]
        );
    }

    #[test]
    fn test_no_root_job() {
        let (jobs, errors) =
            try_convert("  b:\n    needs: c\n    runs-on: x\n  c:\n    needs: b\n    runs-on: x\n");
        assert!(jobs.is_none());
        assert_eq!(errors.len(), 3);
        assert_eq!(
            errors[0],
            "ci.yml (Line: 3, Col: 3): The workflow must contain at least one job with no dependencies."
        );
        assert!(errors[1].contains("Job 'b' depends on job 'c' which creates a cycle"));
        assert!(errors[2].contains("Job 'c' depends on job 'b' which creates a cycle"));
    }

    #[test]
    fn test_job_defaults() {
        let (jobs, errors) = convert(
            "  build:\n    name: ''\n    runs-on: [self-hosted, linux]\n    if: github.event_name == 'push'\n  test:\n    name: Unit tests\n    runs-on: x\n",
        );
        assert!(errors.is_empty(), "{:?}", errors);

        let WorkflowJob::Job(build) = &jobs[0] else {
            panic!("job expected");
        };
        assert_eq!(build.name.to_string(), "build");
        assert_eq!(build.runs_on.as_ref().unwrap().labels, vec!["self-hosted", "linux"]);
        assert_eq!(
            build.if_condition.expression_text(),
            Some("success() && (github.event_name == 'push')")
        );

        assert_eq!(jobs[1].name().to_string(), "Unit tests");
        assert_eq!(jobs[1].if_condition().expression_text(), Some("success()"));
    }

    #[test]
    fn test_reusable_job() {
        let (jobs, errors) = convert(
            "  call:\n    uses: ./.github/workflows/build.yml\n    with:\n      target: prod\n    secrets: inherit\n",
        );
        assert!(errors.is_empty(), "{:?}", errors);
        assert_matches!(
            &jobs[0],
            WorkflowJob::ReusableWorkflowJob(job)
                if job.inherit_secrets && job.input_values.is_some() && job.secret_values.is_none()
        );
    }

    #[test]
    fn test_invalid_job_id() {
        let (jobs, errors) = convert("  1build:\n    runs-on: x\n");
        assert_eq!(jobs.len(), 1);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("ci.yml (Line: 3, Col: 3): The identifier '1build' is invalid."));
    }
}
