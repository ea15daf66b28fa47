//! The workflow model: typed jobs, steps and triggers built from a workflow
//! token tree.

pub mod converter;
pub mod file_provider;
pub mod types;

pub use converter::{convert_workflow_template, ConvertError, ConvertOptions, ErrorPolicy};
pub use file_provider::{DirectoryFileProvider, FileProvider, FileProviderError, InMemoryFileProvider};
pub use types::{
    ActionStep, BoolOrExpression, EventConfig, EventFilters, EventsConfig, InputConfig,
    InputDefault, InputType, Job, OutputConfig, ReusableWorkflowJob, RunStep, RunsOn,
    ScheduleConfig, SecretConfig, Step, StepKind, WorkflowCallConfig, WorkflowDispatchConfig,
    WorkflowJob, WorkflowTemplate,
};
