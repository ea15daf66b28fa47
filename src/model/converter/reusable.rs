//! Loading called workflows for `jobs.<id>.uses`

use std::future::Future;
use std::pin::Pin;

use tracing::{debug, warn};

use super::events::convert_on;
use super::jobs::convert_jobs;
use super::ConvertOptions;
use crate::model::file_provider::FileProvider;
use crate::model::types::{ReusableWorkflowJob, WorkflowCallConfig, WorkflowJob};
use crate::templates::context::TemplateContext;
use crate::templates::tokens::TemplateToken;
use crate::workflows::{parse_workflow_into, FileReference};

type BoxFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Load the workflows called by `jobs`, `depth` levels below the root
/// workflow. Problems are reported on the `uses` token of the calling job.
pub(super) fn load_reusable_workflows<'a>(
    context: &'a mut TemplateContext,
    jobs: &'a mut [WorkflowJob],
    file_provider: Option<&'a dyn FileProvider>,
    options: &'a ConvertOptions,
    depth: usize,
) -> BoxFuture<'a> {
    Box::pin(async move {
        for job in jobs.iter_mut() {
            let WorkflowJob::ReusableWorkflowJob(job) = job else {
                continue;
            };

            if depth >= options.max_reusable_workflow_depth {
                context.error(
                    &job.reference,
                    format!(
                        "Nested reusable workflow depth exceeded {}.",
                        options.max_reusable_workflow_depth
                    ),
                );
                continue;
            }

            let Some(provider) = file_provider else {
                continue;
            };
            if depth >= options.fetch_reusable_workflow_depth {
                continue;
            }

            load_reusable_workflow(context, job, provider, options, depth).await;
        }
    })
}

async fn load_reusable_workflow(
    context: &mut TemplateContext,
    job: &mut ReusableWorkflowJob,
    provider: &dyn FileProvider,
    options: &ConvertOptions,
    depth: usize,
) {
    // references built from expressions can't be resolved statically
    let Ok(reference_text) = job.reference.assert_string("uses").map(str::to_string) else {
        return;
    };
    let reference = match FileReference::parse(&reference_text) {
        Ok(reference) => reference,
        Err(err) => {
            context.error(&job.reference, err.to_string());
            return;
        }
    };

    debug!(reference = %reference, depth, "loading reusable workflow");
    let file = match provider.get_file_content(&reference).await {
        Ok(file) => file,
        Err(err) => {
            warn!(reference = %reference, error = %err, "reusable workflow not found");
            context.error(
                &job.reference,
                format!("Unable to find reusable workflow '{}': {}", reference_text, err),
            );
            return;
        }
    };

    let Some(root) = parse_workflow_into(context, &file) else {
        context.error(
            &job.reference,
            format!("The reusable workflow '{}' is empty or invalid", reference_text),
        );
        return;
    };

    let Some(on) = root.get("on") else {
        return;
    };
    let events = convert_on(context, on);
    let Some(workflow_call) = events.workflow_call().cloned() else {
        context.error(
            &job.reference,
            format!(
                "The workflow '{}' is not reusable as it is missing a 'workflow_call' trigger",
                reference_text
            ),
        );
        return;
    };

    validate_inputs(context, job, &workflow_call);
    if !job.inherit_secrets {
        validate_secrets(context, job, &workflow_call);
    }
    job.workflow_call = Some(workflow_call);

    if let Some(mut nested) = root.get("jobs").and_then(|token| convert_jobs(context, token)) {
        load_reusable_workflows(context, &mut nested, Some(provider), options, depth + 1).await;
        job.jobs = Some(nested);
    }
}

fn validate_inputs(
    context: &mut TemplateContext,
    job: &ReusableWorkflowJob,
    workflow_call: &WorkflowCallConfig,
) {
    let supplied = supplied_keys(job.input_values.as_ref());

    for (name, input) in &workflow_call.inputs {
        let provided = supplied.iter().any(|(key, _)| key.eq_ignore_ascii_case(name));
        if input.required && input.default.is_none() && !provided {
            context.error(
                &job.reference,
                format!("Input {} is required, but not provided while calling.", name),
            );
        }
    }

    for (key, token) in &supplied {
        if !workflow_call
            .inputs
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case(key))
        {
            context.error(
                token,
                format!("Invalid input, {} is not defined in the referenced workflow.", key),
            );
        }
    }
}

fn validate_secrets(
    context: &mut TemplateContext,
    job: &ReusableWorkflowJob,
    workflow_call: &WorkflowCallConfig,
) {
    let supplied = supplied_keys(job.secret_values.as_ref());

    for (name, secret) in &workflow_call.secrets {
        let provided = supplied.iter().any(|(key, _)| key.eq_ignore_ascii_case(name));
        if secret.required && !provided {
            context.error(
                &job.reference,
                format!("Secret {} is required, but not provided while calling.", name),
            );
        }
    }

    for (key, token) in &supplied {
        if !workflow_call
            .secrets
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case(key))
        {
            context.error(
                token,
                format!("Invalid secret, {} is not defined in the referenced workflow.", key),
            );
        }
    }
}

/// The keys of a `with` or `secrets` mapping
fn supplied_keys(token: Option<&TemplateToken>) -> Vec<(String, &TemplateToken)> {
    let Some(Ok(pairs)) = token.map(|t| t.assert_mapping("supplied values")) else {
        return Vec::new();
    };
    pairs
        .iter()
        .filter_map(|pair| {
            pair.key
                .assert_string("key")
                .ok()
                .map(|key| (key.to_string(), &pair.key))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{messages, read};
    use super::super::{convert_workflow_template, ErrorPolicy};
    use super::*;
    use crate::model::file_provider::InMemoryFileProvider;
    use crate::model::types::WorkflowJob;

    const CALLER: &str = "on: push\njobs:\n  call:\n    uses: ./.github/workflows/build.yml\n    with:\n      target: prod\n      extra: 1\n    secrets:\n      deploy-key: ${{ secrets.KEY }}\n";

    const CALLED: &str = "on:\n  workflow_call:\n    inputs:\n      target:\n        type: string\n        required: true\n      level:\n        type: number\n        required: true\n      mode:\n        type: string\n        required: true\n        default: fast\n    secrets:\n      token:\n        required: true\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n      - run: make ${{ inputs.target }}\n";

    fn fetching() -> ConvertOptions {
        ConvertOptions {
            fetch_reusable_workflow_depth: 4,
            error_policy: ErrorPolicy::TryConversion,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_inputs_and_secrets_validated() {
        let (mut context, root) = read(CALLER);
        let provider = InMemoryFileProvider::new().with_file("./.github/workflows/build.yml", CALLED);

        let template =
            convert_workflow_template(&mut context, &root, Some(&provider), &fetching()).await;

        assert_eq!(
            messages(&context),
            vec![
                "ci.yml (Line: 4, Col: 11): Input level is required, but not provided while calling.",
                "ci.yml (Line: 7, Col: 7): Invalid input, extra is not defined in the referenced workflow.",
                "ci.yml (Line: 4, Col: 11): Secret token is required, but not provided while calling.",
                "ci.yml (Line: 9, Col: 7): Invalid secret, deploy-key is not defined in the referenced workflow.",
            ]
        );

        let jobs = template.jobs.unwrap();
        let WorkflowJob::ReusableWorkflowJob(call) = &jobs[0] else {
            panic!("reusable job expected");
        };
        assert_eq!(call.workflow_call.as_ref().unwrap().inputs.len(), 3);
        let nested = call.jobs.as_ref().unwrap();
        assert_eq!(nested[0].id_str(), "build");
    }

    #[tokio::test]
    async fn test_missing_workflow_and_trigger() {
        let (mut context, root) = read(CALLER);
        let provider = InMemoryFileProvider::new();
        convert_workflow_template(&mut context, &root, Some(&provider), &fetching()).await;
        let errors = messages(&context);
        assert_eq!(errors.len(), 1);
        assert!(
            errors[0].starts_with("ci.yml (Line: 4, Col: 11): Unable to find reusable workflow './.github/workflows/build.yml'"),
            "{}",
            errors[0]
        );

        let (mut context, root) = read(CALLER);
        let provider = InMemoryFileProvider::new().with_file(
            "./.github/workflows/build.yml",
            "on: push\njobs:\n  a:\n    runs-on: x\n",
        );
        convert_workflow_template(&mut context, &root, Some(&provider), &fetching()).await;
        assert_eq!(
            messages(&context),
            vec!["ci.yml (Line: 4, Col: 11): The workflow './.github/workflows/build.yml' is not reusable as it is missing a 'workflow_call' trigger"]
        );
    }

    #[tokio::test]
    async fn test_not_fetched_by_default() {
        let (mut context, root) = read(CALLER);
        let provider = InMemoryFileProvider::new();
        let template =
            convert_workflow_template(&mut context, &root, Some(&provider), &ConvertOptions::default())
                .await;
        assert!(template.errors.is_empty());
        let jobs = template.jobs.unwrap();
        assert!(matches!(&jobs[0], WorkflowJob::ReusableWorkflowJob(job) if job.jobs.is_none()));
    }

    #[tokio::test]
    async fn test_nested_depth_exceeded() {
        let looping = "on: workflow_call\njobs:\n  again:\n    uses: ./loop.yml\n";
        let provider = InMemoryFileProvider::new().with_file("./loop.yml", looping);
        let (mut context, root) = read("on: push\njobs:\n  start:\n    uses: ./loop.yml\n");

        let options = ConvertOptions {
            fetch_reusable_workflow_depth: 10,
            max_reusable_workflow_depth: 2,
            error_policy: ErrorPolicy::TryConversion,
        };
        convert_workflow_template(&mut context, &root, Some(&provider), &options).await;

        assert_eq!(
            messages(&context),
            vec!["./loop.yml (Line: 4, Col: 11): Nested reusable workflow depth exceeded 2."]
        );
    }
}
