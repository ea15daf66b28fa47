//! The typed workflow produced by the converter
//!
//! Values that are only meaningful at run time (expressions, matrices,
//! environment maps) stay as template tokens.

use crate::templates::context::TemplateValidationError;
use crate::templates::tokens::TemplateToken;

#[derive(Debug, Clone, Default)]
pub struct WorkflowTemplate {
    pub events: EventsConfig,
    /// `None` when conversion did not run
    pub jobs: Option<Vec<WorkflowJob>>,
    pub concurrency: Option<TemplateToken>,
    pub env: Option<TemplateToken>,
    pub errors: Vec<TemplateValidationError>,
}

/// Triggers, in document order
#[derive(Debug, Clone, Default)]
pub struct EventsConfig {
    pub events: Vec<(String, EventConfig)>,
}

impl EventsConfig {
    pub fn get(&self, name: &str) -> Option<&EventConfig> {
        self.events.iter().find(|(n, _)| n == name).map(|(_, e)| e)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn insert(&mut self, name: impl Into<String>, config: EventConfig) {
        let name = name.into();
        match self.events.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = config,
            None => self.events.push((name, config)),
        }
    }

    pub fn schedule(&self) -> Option<&[ScheduleConfig]> {
        match self.get("schedule") {
            Some(EventConfig::Schedule(schedule)) => Some(schedule),
            _ => None,
        }
    }

    pub fn workflow_dispatch(&self) -> Option<&WorkflowDispatchConfig> {
        match self.get("workflow_dispatch") {
            Some(EventConfig::WorkflowDispatch(config)) => Some(config),
            _ => None,
        }
    }

    pub fn workflow_call(&self) -> Option<&WorkflowCallConfig> {
        match self.get("workflow_call") {
            Some(EventConfig::WorkflowCall(config)) => Some(config),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum EventConfig {
    Filters(EventFilters),
    Schedule(Vec<ScheduleConfig>),
    WorkflowDispatch(WorkflowDispatchConfig),
    WorkflowCall(WorkflowCallConfig),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilters {
    pub branches: Option<Vec<String>>,
    pub branches_ignore: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub tags_ignore: Option<Vec<String>>,
    pub paths: Option<Vec<String>>,
    pub paths_ignore: Option<Vec<String>>,
    pub types: Option<Vec<String>>,
    pub workflows: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub cron: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputType {
    #[default]
    String,
    Boolean,
    Number,
    Environment,
    Choice,
}

impl InputType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "string" => Some(InputType::String),
            "boolean" => Some(InputType::Boolean),
            "number" => Some(InputType::Number),
            "environment" => Some(InputType::Environment),
            "choice" => Some(InputType::Choice),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputDefault {
    String(String),
    Boolean(bool),
    Number(f64),
    /// Only allowed for called workflows
    Expression(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputConfig {
    pub input_type: InputType,
    pub description: Option<String>,
    pub required: bool,
    pub default: Option<InputDefault>,
    pub options: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowDispatchConfig {
    pub inputs: Vec<(String, InputConfig)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecretConfig {
    pub description: Option<String>,
    pub required: bool,
}

#[derive(Debug, Clone, Default)]
pub struct WorkflowCallConfig {
    pub inputs: Vec<(String, InputConfig)>,
    pub secrets: Vec<(String, SecretConfig)>,
    pub outputs: Vec<(String, OutputConfig)>,
}

#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub description: Option<String>,
    pub value: TemplateToken,
}

#[derive(Debug, Clone)]
pub enum WorkflowJob {
    Job(Job),
    ReusableWorkflowJob(ReusableWorkflowJob),
}

impl WorkflowJob {
    /// The job key token
    pub fn id(&self) -> &TemplateToken {
        match self {
            WorkflowJob::Job(job) => &job.id,
            WorkflowJob::ReusableWorkflowJob(job) => &job.id,
        }
    }

    pub fn id_str(&self) -> &str {
        self.id().assert_string("job id").unwrap_or_default()
    }

    pub fn needs(&self) -> &[TemplateToken] {
        let needs = match self {
            WorkflowJob::Job(job) => &job.needs,
            WorkflowJob::ReusableWorkflowJob(job) => &job.needs,
        };
        needs.as_deref().unwrap_or_default()
    }

    pub fn if_condition(&self) -> &TemplateToken {
        match self {
            WorkflowJob::Job(job) => &job.if_condition,
            WorkflowJob::ReusableWorkflowJob(job) => &job.if_condition,
        }
    }

    pub fn name(&self) -> &TemplateToken {
        match self {
            WorkflowJob::Job(job) => &job.name,
            WorkflowJob::ReusableWorkflowJob(job) => &job.name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: TemplateToken,
    /// The `name` property, or the id when it is missing or empty
    pub name: TemplateToken,
    pub needs: Option<Vec<TemplateToken>>,
    pub if_condition: TemplateToken,
    pub env: Option<TemplateToken>,
    pub environment: Option<TemplateToken>,
    pub strategy: Option<TemplateToken>,
    pub concurrency: Option<TemplateToken>,
    pub runs_on: Option<RunsOn>,
    pub container: Option<TemplateToken>,
    pub services: Option<TemplateToken>,
    pub outputs: Option<TemplateToken>,
    pub timeout_minutes: Option<TemplateToken>,
    pub continue_on_error: Option<BoolOrExpression>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone)]
pub struct ReusableWorkflowJob {
    pub id: TemplateToken,
    pub name: TemplateToken,
    pub needs: Option<Vec<TemplateToken>>,
    pub if_condition: TemplateToken,
    /// The `uses` value
    pub reference: TemplateToken,
    pub strategy: Option<TemplateToken>,
    pub concurrency: Option<TemplateToken>,
    pub input_values: Option<TemplateToken>,
    pub secret_values: Option<TemplateToken>,
    pub inherit_secrets: bool,
    /// The called workflow's `on.workflow_call`, once it is loaded
    pub workflow_call: Option<WorkflowCallConfig>,
    pub jobs: Option<Vec<WorkflowJob>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunsOn {
    pub labels: Vec<String>,
    pub group: Option<String>,
}

#[derive(Debug, Clone)]
pub enum BoolOrExpression {
    Value(bool),
    Expression(TemplateToken),
}

#[derive(Debug, Clone)]
pub struct Step {
    /// Authored or generated; generated ids start with `__`
    pub id: String,
    pub name: Option<TemplateToken>,
    pub if_condition: TemplateToken,
    pub continue_on_error: Option<BoolOrExpression>,
    pub timeout_minutes: Option<TemplateToken>,
    pub env: Option<TemplateToken>,
    pub kind: StepKind,
}

#[derive(Debug, Clone)]
pub enum StepKind {
    Run(RunStep),
    Action(ActionStep),
}

#[derive(Debug, Clone)]
pub struct RunStep {
    pub run: TemplateToken,
    pub working_directory: Option<TemplateToken>,
    pub shell: Option<TemplateToken>,
}

#[derive(Debug, Clone)]
pub struct ActionStep {
    pub uses: TemplateToken,
    pub with: Option<TemplateToken>,
}

impl Step {
    pub fn is_generated_id(&self) -> bool {
        self.id.starts_with("__")
    }
}
