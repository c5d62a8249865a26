use anyhow::Result;
use rmcp::{
    ServerHandler, ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::classify::{ClassifierConfig, PageClassifier};
use crate::commands::scan::scan_markers;
use crate::commands::split::split_file;
use crate::marker::DEFAULT_SEPARATOR;
use crate::preprocess::Brightness;
use crate::split::SplitOptions;

// Request structs for tools

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ScanMarkersRequest {
    #[schemars(description = "Path to the PDF file")]
    pub path: String,
    #[schemars(description = "Barcode content prefix marking separator pages (default: 'RPSEQ:')")]
    #[serde(default = "default_separator")]
    pub separator: String,
    #[schemars(description = "Brightness threshold for barcode preparation, 0-255 (default: 128)")]
    #[serde(default = "default_brightness")]
    pub brightness: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SplitMarkersRequest {
    #[schemars(description = "Path to the PDF file")]
    pub path: String,
    #[schemars(description = "Directory to write the split files to")]
    pub output_dir: String,
    #[schemars(description = "Barcode content prefix marking separator pages (default: 'RPSEQ:')")]
    #[serde(default = "default_separator")]
    pub separator: String,
    #[schemars(description = "Brightness threshold for barcode preparation, 0-255 (default: 128)")]
    #[serde(default = "default_brightness")]
    pub brightness: i64,
    #[schemars(description = "Keep separator page in previous document (default: false)")]
    #[serde(default)]
    pub keep_page: bool,
    #[schemars(description = "Keep separator page in next document (default: false)")]
    #[serde(default)]
    pub keep_page_next: bool,
}

fn default_separator() -> String {
    DEFAULT_SEPARATOR.to_string()
}

fn default_brightness() -> i64 {
    i64::from(Brightness::DEFAULT.value())
}

fn classifier_config(separator: String, brightness: i64) -> ClassifierConfig {
    ClassifierConfig {
        brightness: Brightness::clamped(brightness),
        separator,
    }
}

#[derive(Debug, Clone)]
pub struct SplitServer {
    tool_router: ToolRouter<Self>,
}

impl SplitServer {
    pub fn new() -> Self {
        Self {
            tool_router: Self::tool_router(),
        }
    }
}

impl Default for SplitServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_router]
impl SplitServer {
    #[tool(description = "List the separator pages of a PDF with the label and secondary id encoded in their QR codes")]
    fn pdf_scan_markers(&self, Parameters(req): Parameters<ScanMarkersRequest>) -> String {
        let classifier = PageClassifier::qr(classifier_config(req.separator, req.brightness));

        match scan_markers(Path::new(&req.path), &classifier) {
            Ok(separators) => {
                let result: Vec<SeparatorResult> = separators
                    .into_iter()
                    .map(|s| SeparatorResult {
                        page: s.page,
                        label: s.label,
                        secondary_id: s.secondary_id,
                    })
                    .collect();
                serde_json::to_string_pretty(&result).unwrap_or_else(|e| format!("Error: {}", e))
            }
            Err(e) => format!("Error: {:#}", e),
        }
    }

    #[tool(description = "Split a PDF into separate files at QR-code separator pages, naming each file after the preceding separator's label")]
    fn pdf_split_markers(&self, Parameters(req): Parameters<SplitMarkersRequest>) -> String {
        let output_dir = PathBuf::from(&req.output_dir);
        if let Err(e) = std::fs::create_dir_all(&output_dir) {
            return format!("Error: Failed to create directory {}: {}", req.output_dir, e);
        }

        let classifier = PageClassifier::qr(classifier_config(req.separator, req.brightness));
        let options = SplitOptions {
            keep_page: req.keep_page,
            keep_page_next: req.keep_page_next,
            output_dir,
        };

        match split_file(Path::new(&req.path), &classifier, &options) {
            Ok(files_written) => {
                let result = SplitResult {
                    input: req.path,
                    output_dir: req.output_dir,
                    files_written,
                };
                serde_json::to_string_pretty(&result).unwrap_or_else(|e| format!("Error: {}", e))
            }
            Err(e) => format!("Error: {:#}", e),
        }
    }
}

// Result types for MCP tools

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SeparatorResult {
    pub page: u32,
    pub label: String,
    pub secondary_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SplitResult {
    pub input: String,
    pub output_dir: String,
    pub files_written: usize,
}

#[tool_handler]
impl ServerHandler for SplitServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Tools for splitting scanned PDF batches at QR-code separator sheets. Use \
                 pdf_scan_markers to preview which pages are separators and what they are \
                 labelled, and pdf_split_markers to write one PDF per labelled segment."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

pub async fn run_server() -> Result<()> {
    let server = SplitServer::new();

    // Serve using stdin/stdout as a tuple
    let service = server.serve((tokio::io::stdin(), tokio::io::stdout())).await?;

    service.waiting().await?;

    Ok(())
}
