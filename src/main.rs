//! actions-workflow-lsp: LSP server for GitHub Actions workflow files

use tower_lsp::{LspService, Server};
use tracing_subscriber::EnvFilter;

use actions_workflow_lsp::Backend;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if std::env::args().skip(1).any(|arg| arg == "--version" || arg == "-V") {
        println!("actions-workflow-lsp {}", VERSION);
        return;
    }

    // stdout carries the protocol, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!(version = VERSION, "Starting actions-workflow-lsp server");

    let (service, socket) = LspService::new(Backend::new);
    Server::new(tokio::io::stdin(), tokio::io::stdout(), socket)
        .serve(service)
        .await;
}
