//! Open workflow documents

use tower_lsp::lsp_types::Url;

use crate::workflows::File;

/// An open document: its text under the name errors are reported against
#[derive(Debug, Clone)]
pub struct Document {
    pub file: File,
    pub version: i32,
}

impl Document {
    pub fn new(uri: &Url, text: String, version: i32) -> Self {
        Self {
            file: File::new(document_name(uri), text),
            version,
        }
    }

    pub fn text(&self) -> &str {
        &self.file.content
    }
}

/// The file name of the URI, or the whole URI when it has none
fn document_name(uri: &Url) -> String {
    uri.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uri.to_string())
}
