//! Attachment download and upload

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use super::{args, Gateway};
use crate::error::{GatewayError, Result};
use crate::kintone::download::{content_type_from_extension, is_textual, sanitize_filename};
use crate::kintone::DownloadedFile;
use crate::mcp::{ResourceContent, ToolCallResult};

/// Files up to this size are also returned inline as a resource item
const INLINE_LIMIT: u64 = 1024 * 1024;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadArgs {
    #[serde(default)]
    file_key: String,
    #[serde(default)]
    directory: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadArgs {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    base64: bool,
}

/// What to send in the multipart file part
#[derive(Debug, PartialEq)]
struct Upload {
    filename: String,
    content_type: &'static str,
    bytes: Vec<u8>,
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

fn extension(name: &str) -> &str {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
}

impl UploadArgs {
    /// Resolve the arguments into the bytes to upload
    fn into_upload(self) -> Result<Upload> {
        let path = self.path.filter(|p| !p.is_empty());
        let filename = self
            .filename
            .map(|f| sanitize_filename(&f))
            .filter(|f| !f.is_empty());

        let (filename, bytes) = match (path, self.content) {
            (Some(_), Some(_)) | (None, None) => {
                return Err(GatewayError::params(
                    "Exactly one of 'path' or 'content' must be given",
                ))
            }
            (Some(path), None) => {
                let path = expand(&path);
                let filename = filename
                    .or_else(|| {
                        path.file_name()
                            .and_then(|n| n.to_str())
                            .map(str::to_string)
                    })
                    .ok_or_else(|| {
                        GatewayError::params(format!("'{}' is not a file path", path.display()))
                    })?;
                let bytes = std::fs::read(&path)
                    .map_err(|e| GatewayError::io(path.display().to_string(), e))?;
                (filename, bytes)
            }
            (None, Some(content)) => {
                let filename = filename.ok_or_else(|| {
                    GatewayError::params("Argument 'filename' is required with 'content'")
                })?;
                let bytes = if self.base64 {
                    BASE64.decode(content.trim()).map_err(|e| {
                        GatewayError::params(format!("Failed to decode base64 content: {}", e))
                    })?
                } else {
                    content.into_bytes()
                };
                (filename, bytes)
            }
        };

        Ok(Upload {
            content_type: content_type_from_extension(extension(&filename)),
            filename,
            bytes,
        })
    }
}

/// Inline copy of a small downloaded file
fn resource_item(file: &DownloadedFile, mime_type: &str) -> Result<Option<ResourceContent>> {
    if file.size > INLINE_LIMIT {
        return Ok(None);
    }
    let bytes =
        std::fs::read(&file.path).map_err(|e| GatewayError::io(file.path.display().to_string(), e))?;
    let uri = Url::from_file_path(&file.path)
        .map(String::from)
        .unwrap_or_else(|_| format!("file://{}", file.path.display()));

    let (text, blob) = if is_textual(mime_type) {
        match String::from_utf8(bytes) {
            Ok(text) => (Some(text), None),
            Err(e) => (None, Some(BASE64.encode(e.into_bytes()))),
        }
    } else {
        (None, Some(BASE64.encode(bytes)))
    };

    Ok(Some(ResourceContent {
        uri,
        mime_type: Some(mime_type.to_string()),
        text,
        blob,
    }))
}

impl Gateway {
    pub(super) fn download_attachment_file(&self, arguments: Value) -> Result<ToolCallResult> {
        let args: DownloadArgs = args::parse(arguments)?;
        args::require(&[&args.file_key], "Argument 'fileKey' is required")?;

        let dir = match args.directory.as_deref().filter(|d| !d.is_empty()) {
            Some(dir) => expand(dir),
            None => self.download_dir.clone(),
        };
        std::fs::create_dir_all(&dir).map_err(|e| GatewayError::io(dir.display().to_string(), e))?;
        let dir = std::fs::canonicalize(&dir).unwrap_or(dir);

        let file = self.client.download_file(&args.file_key, &dir)?;
        tracing::info!(path = %file.path.display(), size = file.size, "attachment downloaded");

        let mime_type = file
            .content_type
            .clone()
            .unwrap_or_else(|| {
                let name = file.path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                content_type_from_extension(extension(name)).to_string()
            });

        let mut result = ToolCallResult::json(&json!({
            "success": true,
            "path": file.path.display().to_string(),
            "size": file.size,
            "contentType": mime_type,
        }))?;
        if let Some(resource) = resource_item(&file, &mime_type)? {
            result = result.with_resource(resource);
        }
        Ok(result)
    }

    pub(super) fn upload_attachment_file(&self, arguments: Value) -> Result<ToolCallResult> {
        let args: UploadArgs = args::parse(arguments)?;
        let upload = args.into_upload()?;
        let size = upload.bytes.len();

        let file_key =
            self.client
                .upload_file(&upload.filename, upload.content_type, upload.bytes)?;
        tracing::info!(filename = %upload.filename, size, "attachment uploaded");

        ToolCallResult::json(&json!({
            "success": true,
            "fileKey": file_key,
        }))
    }
}
