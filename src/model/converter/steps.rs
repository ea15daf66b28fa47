use tracing::debug;

use super::id_builder::{IdBuilder, GENERATED_ID_PREFIX};
use super::if_condition::{convert_if_condition, default_if_condition};
use super::{report, ConvertError};
use crate::model::types::{ActionStep, BoolOrExpression, RunStep, Step, StepKind};
use crate::templates::context::TemplateContext;
use crate::templates::tokens::TemplateToken;

/// Convert the `steps` of a job. Steps without an `id` get a generated one
/// once every authored id is known.
pub fn convert_steps(context: &mut TemplateContext, token: &TemplateToken) -> Vec<Step> {
    let items = match token.assert_sequence("steps") {
        Ok(items) => items,
        Err(err) => {
            context.error(token, err.to_string());
            return Vec::new();
        }
    };

    let mut id_builder = IdBuilder::new();
    let mut steps = Vec::with_capacity(items.len());
    for item in items {
        let converted = convert_step(context, &mut id_builder, item);
        if let Some(step) = report(context, item, converted).flatten() {
            steps.push(step);
        }
    }

    for step in steps.iter_mut().filter(|step| step.id.is_empty()) {
        let generated = match &step.kind {
            StepKind::Action(action) => action_step_id(&action.uses),
            StepKind::Run(_) => None,
        };
        id_builder.append_segment(&format!(
            "{}{}",
            GENERATED_ID_PREFIX,
            generated.as_deref().unwrap_or("run")
        ));
        match id_builder.build() {
            Ok(id) => step.id = id,
            Err(message) => debug!(%message, "unable to generate step id"),
        }
    }

    steps
}

fn convert_step(
    context: &mut TemplateContext,
    id_builder: &mut IdBuilder,
    token: &TemplateToken,
) -> Result<Option<Step>, ConvertError> {
    let mut id = String::new();
    let mut name = None;
    let mut if_condition = None;
    let mut continue_on_error = None;
    let mut timeout_minutes = None;
    let mut env = None;
    let mut run = None;
    let mut working_directory = None;
    let mut shell = None;
    let mut uses = None;
    let mut with = None;

    for pair in token.assert_mapping("steps item")? {
        let value = &pair.value;
        match pair.key.assert_string("steps item key")? {
            "id" => {
                let value = value.assert_string("step id")?;
                match id_builder.try_add_known_id(value) {
                    Ok(()) => id = value.to_string(),
                    Err(message) => context.error(&pair.value, message),
                }
            }
            "name" => name = Some(value.clone()),
            "if" => if_condition = Some(convert_if_condition(context, value)),
            "continue-on-error" => {
                continue_on_error = Some(if value.is_expression() {
                    BoolOrExpression::Expression(value.clone())
                } else {
                    BoolOrExpression::Value(value.assert_boolean("continue-on-error")?)
                })
            }
            "timeout-minutes" => timeout_minutes = Some(value.clone()),
            "env" => env = Some(value.clone()),
            "run" => run = Some(value.clone()),
            "working-directory" => working_directory = Some(value.clone()),
            "shell" => shell = Some(value.clone()),
            "uses" => uses = Some(value.clone()),
            "with" => with = Some(value.clone()),
            _ => {}
        }
    }

    let kind = match (run, uses) {
        (Some(run), _) => StepKind::Run(RunStep {
            run,
            working_directory,
            shell,
        }),
        (None, Some(uses)) => StepKind::Action(ActionStep { uses, with }),
        (None, None) => {
            context.error(token, "Expected uses or run to be defined");
            return Ok(None);
        }
    };

    Ok(Some(Step {
        id,
        name,
        if_condition: if_condition.unwrap_or_else(|| default_if_condition(token.file)),
        continue_on_error,
        timeout_minutes,
        env,
        kind,
    }))
}

/// The part of `uses` a generated id is built from: the image of a docker
/// action, `self` for actions in the repository, otherwise `owner/repo`.
fn action_step_id(uses: &TemplateToken) -> Option<String> {
    let uses = uses.assert_string("uses").ok()?;

    if let Some(image) = uses.strip_prefix("docker://") {
        return Some(image.to_string());
    }
    if uses.starts_with("./") || uses.starts_with(".\\") {
        return Some("self".to_string());
    }

    let (path, version) = uses.split_once('@')?;
    let segments: Vec<&str> = path.split(['/', '\\']).filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        [owner, repository, ..] if !version.is_empty() => Some(format!("{}/{}", owner, repository)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{messages, read};
    use super::*;
    use assert_matches::assert_matches;

    fn convert(steps: &str) -> (Vec<Step>, Vec<String>) {
        let (mut context, root) = read(&format!(
            "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n{}",
            steps
        ));
        let token = root.get("jobs").unwrap().get("build").unwrap().get("steps").unwrap();
        let steps = convert_steps(&mut context, token);
        (steps, messages(&context))
    }

    #[test]
    fn test_generated_ids() {
        let (steps, errors) = convert(
            "      - uses: actions/checkout@v4\n      - uses: actions/checkout@v4\n      - uses: ./local/action\n      - uses: docker://alpine:3\n      - run: make\n      - id: build\n        run: make build\n",
        );
        assert!(errors.is_empty(), "{:?}", errors);
        let ids: Vec<&str> = steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "__actions_checkout",
                "__actions_checkout_2",
                "__self",
                "__alpine_3",
                "__run",
                "build",
            ]
        );
        assert!(steps[0].is_generated_id());
        assert!(!steps[5].is_generated_id());
    }

    #[test]
    fn test_step_kinds_and_defaults() {
        let (steps, _) = convert(
            "      - name: Checkout\n        uses: actions/checkout@v4\n        with:\n          fetch-depth: 0\n      - run: make\n        shell: bash\n        if: github.ref == 'refs/heads/main'\n        continue-on-error: true\n",
        );

        assert_matches!(&steps[0].kind, StepKind::Action(action) if action.with.is_some());
        assert_eq!(steps[0].if_condition.expression_text(), Some("success()"));

        assert_matches!(&steps[1].kind, StepKind::Run(run) if run.shell.is_some());
        assert_eq!(
            steps[1].if_condition.expression_text(),
            Some("success() && (github.ref == 'refs/heads/main')")
        );
        assert_matches!(steps[1].continue_on_error, Some(BoolOrExpression::Value(true)));
    }

    #[test]
    fn test_duplicate_step_ids() {
        let (steps, errors) = convert(
            "      - id: build\n        run: a\n      - id: BUILD\n        run: b\n",
        );
        assert_eq!(steps.len(), 2);
        assert_eq!(
            errors,
            vec!["ci.yml (Line: 8, Col: 13): The identifier 'BUILD' may not be used more than once within the same scope."]
        );
        // the rejected id is replaced by a generated one
        assert_eq!(steps[1].id, "__run");
    }

    #[test]
    fn test_action_step_id() {
        let token = |s: &str| TemplateToken::string(None, None, s);
        assert_eq!(action_step_id(&token("octo/tools/sub@main")).as_deref(), Some("octo/tools"));
        assert_eq!(action_step_id(&token("octo@main")), None);
        assert_eq!(action_step_id(&token("octo/tools")), None);
    }
}
