use super::{report, string_list, ConvertError};
use crate::model::types::RunsOn;
use crate::templates::context::TemplateContext;
use crate::templates::tokens::{TemplateToken, TokenValue};

const GROUP_PREFIXES: &[&str] = &["org", "organization", "ent", "enterprise"];

/// Convert `runs-on`: a label, a list of labels, or `{group, labels}`.
/// Returns `None` when any part is an expression.
pub fn convert_runs_on(context: &mut TemplateContext, token: &TemplateToken) -> Option<RunsOn> {
    match &token.value {
        TokenValue::Mapping(pairs) => {
            let mut runs_on = RunsOn::default();
            for pair in pairs {
                let Ok(key) = pair.key.assert_string("runs-on key") else {
                    continue;
                };
                match key {
                    "group" => {
                        if pair.value.is_expression() {
                            return None;
                        }
                        let group = report(context, &pair.value, group_name(&pair.value))?;
                        runs_on.group = Some(group);
                    }
                    "labels" => {
                        runs_on.labels = report(context, &pair.value, string_list(&pair.value, "labels"))??;
                    }
                    _ => {}
                }
            }
            Some(runs_on)
        }
        _ => {
            let labels = report(context, token, string_list(token, "runs-on"))??;
            Some(RunsOn { labels, group: None })
        }
    }
}

/// A runner group, optionally qualified as `org/<name>` or `enterprise/<name>`
fn group_name(token: &TemplateToken) -> Result<String, ConvertError> {
    let group = token.assert_string("runs-on group")?;
    let parts: Vec<&str> = group.split('/').collect();
    let valid = match parts.as_slice() {
        [_] => true,
        [prefix, name] => !name.is_empty() && GROUP_PREFIXES.contains(prefix),
        _ => false,
    };

    if !valid {
        return Err(ConvertError::Invalid(format!(
            "Invalid runs-on group name '{}'. Please use 'organization/' or 'enterprise/' prefix to target a single runner group.",
            group
        )));
    }
    Ok(group.to_string())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{messages, read};
    use super::*;

    fn convert(runs_on: &str) -> (Option<RunsOn>, Vec<String>) {
        let (mut context, root) = read(&format!(
            "on: push\njobs:\n  build:\n    runs-on: {}\n",
            runs_on
        ));
        let token = root.get("jobs").unwrap().get("build").unwrap().get("runs-on").unwrap();
        let result = convert_runs_on(&mut context, token);
        (result, messages(&context))
    }

    #[test]
    fn test_labels() {
        let (runs_on, errors) = convert("ubuntu-latest");
        assert!(errors.is_empty());
        assert_eq!(runs_on.unwrap().labels, vec!["ubuntu-latest"]);

        let (runs_on, _) = convert("[self-hosted, linux]");
        assert_eq!(runs_on.unwrap().labels, vec!["self-hosted", "linux"]);

        let (runs_on, errors) = convert("${{ matrix.os }}");
        assert!(runs_on.is_none());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_groups() {
        let (runs_on, errors) = convert("{ group: org/linux, labels: gpu }");
        assert!(errors.is_empty(), "{:?}", errors);
        let runs_on = runs_on.unwrap();
        assert_eq!(runs_on.group.as_deref(), Some("org/linux"));
        assert_eq!(runs_on.labels, vec!["gpu"]);

        let (runs_on, errors) = convert("{ group: team/linux }");
        assert!(runs_on.is_none());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Invalid runs-on group name 'team/linux'"), "{}", errors[0]);

        let (_, errors) = convert("{ group: org/a/b }");
        assert_eq!(errors.len(), 1);
    }
}
