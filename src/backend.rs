//! LSP Backend implementation

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::RwLock;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

use crate::diagnostics::{analyze_workflow, DiagnosticCollector};
use crate::document::Document;
use crate::model::{ConvertOptions, DirectoryFileProvider, ErrorPolicy, FileProvider};
use crate::workflows::{File, WorkflowTemplateCache};

/// Settings read from the client's `initializationOptions`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Levels of called workflows to load from the workspace
    pub fetch_reusable_workflow_depth: usize,
    pub max_reusable_workflow_depth: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        let options = ConvertOptions::default();
        Self {
            fetch_reusable_workflow_depth: 1,
            max_reusable_workflow_depth: options.max_reusable_workflow_depth,
        }
    }
}

impl ServerSettings {
    pub fn from_initialization_options(value: Option<serde_json::Value>) -> Self {
        match value.map(serde_json::from_value::<ServerSettings>) {
            Some(Ok(settings)) => settings,
            Some(Err(err)) => {
                tracing::warn!("Ignoring invalid initialization options: {}", err);
                Self::default()
            }
            None => Self::default(),
        }
    }

    pub fn convert_options(&self) -> ConvertOptions {
        ConvertOptions {
            fetch_reusable_workflow_depth: self.fetch_reusable_workflow_depth,
            max_reusable_workflow_depth: self.max_reusable_workflow_depth,
            error_policy: ErrorPolicy::ReturnErrorsOnly,
        }
    }
}

/// The LSP backend that handles all language server requests
pub struct Backend {
    /// The LSP client for sending notifications
    client: Client,
    /// Map of document URIs to their state
    documents: Arc<RwLock<HashMap<Url, Document>>>,
    /// Last converted template per document
    templates: Arc<RwLock<WorkflowTemplateCache>>,
    settings: Arc<RwLock<ServerSettings>>,
    /// Called workflows are resolved against this directory
    workspace_root: Arc<RwLock<Option<PathBuf>>>,
}

impl Backend {
    /// Create a new backend instance
    pub fn new(client: Client) -> Self {
        Self {
            client,
            documents: Arc::new(RwLock::new(HashMap::new())),
            templates: Arc::new(RwLock::new(WorkflowTemplateCache::new())),
            settings: Arc::new(RwLock::new(ServerSettings::default())),
            workspace_root: Arc::new(RwLock::new(None)),
        }
    }

    /// Validate a document and publish diagnostics
    async fn validate_document(&self, uri: &Url, document: &Document) {
        let diagnostics = self.compute_diagnostics(uri, &document.file).await;

        self.client
            .publish_diagnostics(uri.clone(), diagnostics, Some(document.version))
            .await;
    }

    /// Run the workflow pipeline and cache the converted template
    async fn compute_diagnostics(&self, uri: &Url, file: &File) -> Vec<Diagnostic> {
        let options = self.settings.read().await.convert_options();
        let provider = self
            .workspace_root
            .read()
            .await
            .clone()
            .map(DirectoryFileProvider::new);

        let mut collector = DiagnosticCollector::new();
        let analyzed = analyze_workflow(
            file,
            provider.as_ref().map(|p| p as &dyn FileProvider),
            &options,
        )
        .await;

        match analyzed {
            Ok(Some(template)) => {
                collector.add_validation_errors(&template.errors, &file.name);
                self.templates.write().await.insert(uri.as_str(), template);
            }
            Ok(None) => self.templates.write().await.clear_entry(uri.as_str()),
            Err(err) => {
                tracing::error!("Workflow schema failed to load: {}", err);
                collector.add_error(err.to_string(), None);
            }
        }

        collector.into_diagnostics()
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let settings = ServerSettings::from_initialization_options(params.initialization_options);
        tracing::debug!("Settings: {:?}", settings);
        *self.settings.write().await = settings;

        #[allow(deprecated)]
        let root = params
            .workspace_folders
            .as_ref()
            .and_then(|folders| folders.first())
            .map(|folder| &folder.uri)
            .or(params.root_uri.as_ref())
            .and_then(|uri| uri.to_file_path().ok());
        *self.workspace_root.write().await = root;

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "actions-workflow-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        tracing::info!("Server initialized");
    }

    async fn shutdown(&self) -> Result<()> {
        tracing::info!("Server shutting down");
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        let document = Document::new(
            &uri,
            params.text_document.text,
            params.text_document.version,
        );

        tracing::debug!("Document opened: {}", uri);

        {
            let mut docs = self.documents.write().await;
            docs.insert(uri.clone(), document.clone());
        }

        self.validate_document(&uri, &document).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;

        // FULL sync: the first change holds the whole text
        if let Some(change) = params.content_changes.into_iter().next() {
            tracing::debug!("Document changed: {}", uri);
            let document = Document::new(&uri, change.text, version);

            {
                let mut docs = self.documents.write().await;
                docs.insert(uri.clone(), document.clone());
            }

            self.validate_document(&uri, &document).await;
        }
    }

    /// Called workflows may have changed on disk, so saving revalidates
    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::debug!("Document saved: {}", uri);

        let document = self.documents.read().await.get(&uri).cloned();
        if let Some(document) = document {
            self.validate_document(&uri, &document).await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::debug!("Document closed: {}", uri);

        {
            let mut docs = self.documents.write().await;
            docs.remove(&uri);
        }
        self.templates.write().await.clear_entry(uri.as_str());

        self.client.publish_diagnostics(uri, vec![], None).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_initialization_options() {
        let settings = ServerSettings::from_initialization_options(Some(serde_json::json!({
            "maxReusableWorkflowDepth": 2,
        })));
        assert_eq!(settings.max_reusable_workflow_depth, 2);
        assert_eq!(settings.fetch_reusable_workflow_depth, 1);

        let options = settings.convert_options();
        assert_eq!(options.max_reusable_workflow_depth, 2);
        assert_eq!(options.error_policy, ErrorPolicy::ReturnErrorsOnly);
    }

    #[test]
    fn test_invalid_settings_fall_back_to_defaults() {
        let settings = ServerSettings::from_initialization_options(Some(serde_json::json!({
            "maxReusableWorkflowDepth": "deep",
        })));
        assert_eq!(settings, ServerSettings::default());
        assert_eq!(
            ServerSettings::from_initialization_options(None).max_reusable_workflow_depth,
            4
        );
    }
}
