use tracing::trace;

use super::cron::is_valid_cron;
use super::{optional_boolean, report, string_list, ConvertError};
use crate::model::types::{
    EventConfig, EventFilters, EventsConfig, InputConfig, InputDefault, InputType, OutputConfig,
    ScheduleConfig, SecretConfig, WorkflowCallConfig, WorkflowDispatchConfig,
};
use crate::templates::context::TemplateContext;
use crate::templates::tokens::{TemplateToken, TokenValue};

const KNOWN_EVENTS: &[&str] = &[
    "branch_protection_rule",
    "check_run",
    "check_suite",
    "create",
    "delete",
    "deployment",
    "deployment_status",
    "discussion",
    "discussion_comment",
    "fork",
    "gollum",
    "issue_comment",
    "issues",
    "label",
    "merge_group",
    "milestone",
    "page_build",
    "project",
    "project_card",
    "project_column",
    "public",
    "pull_request",
    "pull_request_review",
    "pull_request_review_comment",
    "pull_request_target",
    "push",
    "registry_package",
    "release",
    "repository_dispatch",
    "schedule",
    "status",
    "watch",
    "workflow_call",
    "workflow_dispatch",
    "workflow_run",
];

/// Convert the `on` section: an event name, a list of names, or a mapping of
/// events to their configuration.
pub fn convert_on(context: &mut TemplateContext, token: &TemplateToken) -> EventsConfig {
    let mut events = EventsConfig::default();

    match &token.value {
        TokenValue::String { value, .. } => add_named_event(context, &mut events, token, value),
        TokenValue::Sequence(items) => {
            for item in items {
                match item.assert_string("on item") {
                    Ok(name) => add_named_event(context, &mut events, item, name),
                    Err(err) => context.error(item, err.to_string()),
                }
            }
        }
        TokenValue::Mapping(pairs) => {
            for pair in pairs {
                let name = match pair.key.assert_string("event name") {
                    Ok(name) => name,
                    Err(err) => {
                        context.error(&pair.key, err.to_string());
                        continue;
                    }
                };
                trace!(event = name, "converting trigger");

                let config = match name {
                    "schedule" => EventConfig::Schedule(convert_schedule(context, &pair.value)),
                    "workflow_dispatch" => {
                        EventConfig::WorkflowDispatch(convert_workflow_dispatch(context, &pair.value))
                    }
                    "workflow_call" => {
                        EventConfig::WorkflowCall(convert_workflow_call(context, &pair.value))
                    }
                    _ => {
                        let filters = report(context, &pair.value, convert_filters(&pair.value));
                        EventConfig::Filters(filters.unwrap_or_default())
                    }
                };
                events.insert(name, config);
            }
        }
        _ => context.error(token, format!("Unexpected value '{}'", token)),
    }

    events
}

fn add_named_event(
    context: &mut TemplateContext,
    events: &mut EventsConfig,
    token: &TemplateToken,
    name: &str,
) {
    if !KNOWN_EVENTS.contains(&name) {
        context.error(token, format!("Unexpected value '{}'", name));
        return;
    }

    let config = match name {
        "workflow_dispatch" => EventConfig::WorkflowDispatch(WorkflowDispatchConfig::default()),
        "workflow_call" => EventConfig::WorkflowCall(WorkflowCallConfig::default()),
        "schedule" => EventConfig::Schedule(Vec::new()),
        _ => EventConfig::Filters(EventFilters::default()),
    };
    events.insert(name, config);
}

fn convert_filters(token: &TemplateToken) -> Result<EventFilters, ConvertError> {
    let mut filters = EventFilters::default();
    if let TokenValue::Null = token.value {
        return Ok(filters);
    }

    for pair in token.assert_mapping("event filters")? {
        let key = pair.key.assert_string("event filter")?;
        let values = string_list(&pair.value, key)?;
        match key {
            "branches" => filters.branches = values,
            "branches-ignore" => filters.branches_ignore = values,
            "tags" => filters.tags = values,
            "tags-ignore" => filters.tags_ignore = values,
            "paths" => filters.paths = values,
            "paths-ignore" => filters.paths_ignore = values,
            "types" => filters.types = values,
            "workflows" => filters.workflows = values,
            _ => {}
        }
    }
    Ok(filters)
}

fn convert_schedule(context: &mut TemplateContext, token: &TemplateToken) -> Vec<ScheduleConfig> {
    let Ok(items) = token.assert_sequence("schedule") else {
        context.error(token, "Invalid format for 'schedule'");
        return Vec::new();
    };

    let mut schedule = Vec::new();
    for item in items {
        let Ok(pairs) = item.assert_mapping("schedule item") else {
            context.error(item, "Invalid format for 'schedule'");
            continue;
        };

        for pair in pairs {
            if !matches!(pair.key.assert_string("schedule key"), Ok("cron")) {
                context.error(&pair.key, "Invalid schedule key");
                continue;
            }

            match pair.value.assert_string("cron") {
                Ok(cron) if is_valid_cron(cron) => schedule.push(ScheduleConfig {
                    cron: cron.to_string(),
                }),
                _ => context.error(&pair.value, "Invalid cron string"),
            }
        }
    }
    schedule
}

fn convert_workflow_dispatch(
    context: &mut TemplateContext,
    token: &TemplateToken,
) -> WorkflowDispatchConfig {
    let mut config = WorkflowDispatchConfig::default();
    let Some(inputs) = token.get("inputs") else {
        return config;
    };
    let Ok(pairs) = inputs.assert_mapping("workflow dispatch inputs") else {
        return config;
    };

    for pair in pairs {
        let Some(name) = report(context, &pair.key, key_string(&pair.key, "input name")) else {
            continue;
        };
        let Some(input) = report(context, &pair.value, convert_input(&pair.value)) else {
            continue;
        };
        validate_choice_input(context, &pair.value, &input);
        config.inputs.push((name, input));
    }
    config
}

fn validate_choice_input(context: &mut TemplateContext, token: &TemplateToken, input: &InputConfig) {
    let options_token = token.get("options").unwrap_or(token);
    match (input.input_type, &input.options) {
        (InputType::Choice, None) => context.error(token, "Missing 'options' for choice input"),
        (InputType::Choice, Some(options)) => {
            if let Some(InputDefault::String(default)) = &input.default {
                if !options.contains(default) {
                    let default_token = token.get("default").unwrap_or(token);
                    context.error(
                        default_token,
                        format!(
                            "Default value '{}' must be one of the options for choice input",
                            default
                        ),
                    );
                }
            }
        }
        (_, Some(_)) => context.error(
            options_token,
            "Input type is not 'choice', but 'options' is defined",
        ),
        (_, None) => {}
    }
}

fn convert_workflow_call(context: &mut TemplateContext, token: &TemplateToken) -> WorkflowCallConfig {
    let mut config = WorkflowCallConfig::default();

    if let Some(Ok(pairs)) = token.get("inputs").map(|t| t.assert_mapping("workflow call inputs")) {
        for pair in pairs {
            let Some(name) = report(context, &pair.key, key_string(&pair.key, "input name")) else {
                continue;
            };
            if let Some(input) = report(context, &pair.value, convert_input(&pair.value)) {
                config.inputs.push((name, input));
            }
        }
    }

    if let Some(Ok(pairs)) = token.get("secrets").map(|t| t.assert_mapping("workflow call secrets")) {
        for pair in pairs {
            let Some(name) = report(context, &pair.key, key_string(&pair.key, "secret name")) else {
                continue;
            };
            if let Some(secret) = report(context, &pair.value, convert_secret(&pair.value)) {
                config.secrets.push((name, secret));
            }
        }
    }

    if let Some(Ok(pairs)) = token.get("outputs").map(|t| t.assert_mapping("workflow call outputs")) {
        for pair in pairs {
            let Some(name) = report(context, &pair.key, key_string(&pair.key, "output name")) else {
                continue;
            };
            let Some(value) = pair.value.get("value") else {
                continue;
            };
            let description = pair
                .value
                .get("description")
                .and_then(|t| t.assert_string("output description").ok())
                .map(str::to_string);
            config.outputs.push((
                name,
                OutputConfig {
                    description,
                    value: value.clone(),
                },
            ));
        }
    }

    config
}

fn key_string(token: &TemplateToken, what: &str) -> Result<String, ConvertError> {
    Ok(token.assert_string(what)?.to_string())
}

fn convert_input(token: &TemplateToken) -> Result<InputConfig, ConvertError> {
    let mut input = InputConfig::default();
    if let TokenValue::Null = token.value {
        return Ok(input);
    }

    for pair in token.assert_mapping("input")? {
        let value = &pair.value;
        match pair.key.assert_string("input key")? {
            "description" => input.description = Some(value.assert_string("description")?.to_string()),
            "required" => input.required = optional_boolean(value, "required")?.unwrap_or(false),
            "type" => {
                let name = value.assert_string("type")?;
                input.input_type = InputType::parse(name)
                    .ok_or_else(|| ConvertError::Invalid(format!("Unexpected value '{}'", name)))?;
            }
            "default" => {
                input.default = Some(match &value.value {
                    TokenValue::String { value, .. } => InputDefault::String(value.clone()),
                    TokenValue::Boolean(b) => InputDefault::Boolean(*b),
                    TokenValue::Number(n) => InputDefault::Number(*n),
                    TokenValue::BasicExpression { expression, .. } => {
                        InputDefault::Expression(expression.clone())
                    }
                    _ => {
                        return Err(ConvertError::Invalid(format!("Unexpected value '{}'", value)))
                    }
                });
            }
            "options" => input.options = string_list(value, "options")?,
            _ => {}
        }
    }
    Ok(input)
}

fn convert_secret(token: &TemplateToken) -> Result<SecretConfig, ConvertError> {
    let mut secret = SecretConfig::default();
    if let TokenValue::Null = token.value {
        return Ok(secret);
    }

    for pair in token.assert_mapping("secret")? {
        match pair.key.assert_string("secret key")? {
            "description" => {
                secret.description = Some(pair.value.assert_string("description")?.to_string())
            }
            "required" => secret.required = optional_boolean(&pair.value, "required")?.unwrap_or(false),
            _ => {}
        }
    }
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{messages, read};
    use super::*;

    fn convert(content: &str) -> (EventsConfig, Vec<String>) {
        let (mut context, root) = read(content);
        let events = convert_on(&mut context, root.get("on").unwrap());
        (events, messages(&context))
    }

    const JOBS: &str = "jobs:\n  a:\n    runs-on: ubuntu-latest\n";

    #[test]
    fn test_string_and_sequence_forms() {
        let (events, errors) = convert(&format!("on: push\n{}", JOBS));
        assert!(errors.is_empty());
        assert!(events.contains("push"));

        let (events, errors) = convert(&format!("on: [push, workflow_dispatch]\n{}", JOBS));
        assert!(errors.is_empty());
        let names: Vec<&str> = events.events.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["push", "workflow_dispatch"]);
        assert!(events.workflow_dispatch().is_some());
    }

    #[test]
    fn test_unknown_event_name() {
        let (events, errors) = convert(&format!("on: [push, pushed]\n{}", JOBS));
        assert!(events.contains("push"));
        assert_eq!(errors, vec!["ci.yml (Line: 1, Col: 12): Unexpected value 'pushed'"]);
    }

    #[test]
    fn test_filters() {
        let (events, errors) = convert(&format!(
            "on:\n  push:\n    branches: [main, 'releases/**']\n    paths-ignore: docs/**\n  pull_request:\n    types: [opened]\n{}",
            JOBS
        ));
        assert!(errors.is_empty(), "{:?}", errors);

        let Some(EventConfig::Filters(push)) = events.get("push") else {
            panic!("push filters expected");
        };
        assert_eq!(
            push.branches,
            Some(vec!["main".to_string(), "releases/**".to_string()])
        );
        assert_eq!(push.paths_ignore, Some(vec!["docs/**".to_string()]));
        assert_eq!(push.tags, None);

        let Some(EventConfig::Filters(pr)) = events.get("pull_request") else {
            panic!("pull_request filters expected");
        };
        assert_eq!(pr.types, Some(vec!["opened".to_string()]));
    }

    #[test]
    fn test_schedule() {
        let (events, errors) = convert(&format!(
            "on:\n  schedule:\n    - cron: '0 4 * * 1-5'\n    - cron: '61 * * * *'\n{}",
            JOBS
        ));
        assert_eq!(
            events.schedule().unwrap(),
            &[ScheduleConfig {
                cron: "0 4 * * 1-5".to_string()
            }]
        );
        assert_eq!(errors, vec!["ci.yml (Line: 4, Col: 13): Invalid cron string"]);
    }

    #[test]
    fn test_workflow_dispatch_inputs() {
        let (events, errors) = convert(&format!(
            "on:\n  workflow_dispatch:\n    inputs:\n      level:\n        type: choice\n        options: [info, debug]\n        default: trace\n      plain:\n        type: string\n        options: [a]\n      missing:\n        type: choice\n      flag:\n        type: boolean\n        required: true\n        default: false\n{}",
            JOBS
        ));
        assert_eq!(
            errors,
            vec![
                "ci.yml (Line: 7, Col: 18): Default value 'trace' must be one of the options for choice input",
                "ci.yml (Line: 10, Col: 18): Input type is not 'choice', but 'options' is defined",
                "ci.yml (Line: 12, Col: 9): Missing 'options' for choice input",
            ]
        );

        let dispatch = events.workflow_dispatch().unwrap();
        assert_eq!(dispatch.inputs.len(), 4);
        let (name, flag) = &dispatch.inputs[3];
        assert_eq!(name, "flag");
        assert_eq!(flag.input_type, InputType::Boolean);
        assert!(flag.required);
        assert_eq!(flag.default, Some(InputDefault::Boolean(false)));
    }

    #[test]
    fn test_workflow_call() {
        let (events, errors) = convert(&format!(
            "on:\n  workflow_call:\n    inputs:\n      target:\n        type: string\n        required: true\n    secrets:\n      token:\n        required: true\n      optional:\n    outputs:\n      result:\n        value: ${{{{ jobs.a.outputs.result }}}}\n{}",
            JOBS
        ));
        assert!(errors.is_empty(), "{:?}", errors);

        let call = events.workflow_call().unwrap();
        assert_eq!(call.inputs[0].0, "target");
        assert!(call.inputs[0].1.required);
        assert_eq!(call.secrets.len(), 2);
        assert!(call.secrets[0].1.required);
        assert!(!call.secrets[1].1.required);
        assert_eq!(
            call.outputs[0].1.value.expression_text(),
            Some("jobs.a.outputs.result")
        );
    }
}
