//! kintone REST API client
//!
//! Requests are issued one at a time on a private current-thread runtime,
//! so callers stay synchronous and each call blocks until kintone answers.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::download::{fallback_filename, filename_from_content_disposition, unique_path};
use super::query::Query;
use super::types::UploadedFile;
use crate::error::{GatewayError, Result};

/// Header carrying `base64(username:password)`
pub const PASSWORD_AUTH_HEADER: &str = "X-Cybozu-Authorization";
/// Header carrying one or more API tokens
pub const API_TOKEN_HEADER: &str = "X-Cybozu-API-Token";

/// Credentials attached to every request
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    password_auth: Option<String>,
    api_token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("password_auth", &self.password_auth.as_ref().map(|_| "***"))
            .field("api_token", &self.api_token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Credentials {
    /// Build credentials; a username/password pair only counts when both
    /// halves are non-empty
    pub fn new(username: Option<&str>, password: Option<&str>, api_token: Option<&str>) -> Self {
        let password_auth = match (username, password) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => {
                Some(BASE64.encode(format!("{}:{}", u, p)))
            }
            _ => None,
        };
        Self {
            password_auth,
            api_token: api_token.filter(|t| !t.is_empty()).map(str::to_string),
        }
    }

    pub fn is_usable(&self) -> bool {
        self.password_auth.is_some() || self.api_token.is_some()
    }

    /// Headers for these credentials
    pub fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(auth) = &self.password_auth {
            headers.insert(PASSWORD_AUTH_HEADER, header_value(auth)?);
        }
        if let Some(token) = &self.api_token {
            headers.insert(API_TOKEN_HEADER, header_value(token)?);
        }
        Ok(headers)
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| GatewayError::Config(format!("credential is not a valid header value: {}", e)))
}

/// A file saved by [`KintoneClient::download_file`]
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadedFile {
    pub path: PathBuf,
    pub size: u64,
    pub content_type: Option<String>,
}

/// kintone API client
pub struct KintoneClient {
    http: reqwest::Client,
    runtime: tokio::runtime::Runtime,
    base_url: Url,
    credentials: HeaderMap,
}

impl KintoneClient {
    /// Create a new client for the kintone at `base_url`
    pub fn new(base_url: Url, credentials: &Credentials) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("kintone-mcp/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| GatewayError::Internal(format!("Failed to start HTTP runtime: {}", e)))?;

        Ok(Self {
            http,
            runtime,
            base_url,
            credentials: credentials.headers()?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        tracing::debug!(%method, path, "kintone request");
        self.http
            .request(method, self.endpoint(path))
            .headers(self.credentials.clone())
    }

    /// `GET` with query-string parameters
    pub fn get<T: DeserializeOwned>(&self, path: &str, query: &Query) -> Result<T> {
        let builder = self.request(Method::GET, path).query(query.pairs());
        self.execute(builder)
    }

    /// `POST`/`PUT`/`DELETE` with a JSON body
    pub fn send_json<T, B>(&self, method: Method, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(body)?;
        let builder = self
            .request(method, path)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        self.execute(builder)
    }

    /// Upload one file as multipart form data; returns the file key
    pub fn upload_file(&self, filename: &str, content_type: &str, bytes: Vec<u8>) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(content_type)?;
        let form = reqwest::multipart::Form::new().part("file", part);
        let builder = self.request(Method::POST, "/k/v1/file.json").multipart(form);
        let uploaded: UploadedFile = self.execute(builder)?;
        Ok(uploaded.file_key)
    }

    /// Stream an attachment into `dir` without overwriting existing files
    pub fn download_file(&self, file_key: &str, dir: &Path) -> Result<DownloadedFile> {
        let builder = self
            .request(Method::GET, "/k/v1/file.json")
            .query(&[("fileKey", file_key)]);

        self.runtime.block_on(async {
            let mut response = check_status(builder.send().await?).await?;

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let filename = response
                .headers()
                .get(CONTENT_DISPOSITION)
                .and_then(|v| v.to_str().ok())
                .and_then(filename_from_content_disposition)
                .unwrap_or_else(|| fallback_filename(file_key, content_type.as_deref()));

            let path = unique_path(dir, &filename);
            let shown_path = path.display().to_string();
            let mut file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .map_err(|e| GatewayError::io(shown_path.clone(), e))?;

            let mut size = 0u64;
            loop {
                let chunk = match response.chunk().await {
                    Ok(Some(chunk)) => chunk,
                    Ok(None) => break,
                    Err(e) => {
                        drop(file);
                        let _ = std::fs::remove_file(&path);
                        return Err(e.into());
                    }
                };
                if let Err(e) = file.write_all(&chunk) {
                    drop(file);
                    let _ = std::fs::remove_file(&path);
                    return Err(GatewayError::io(shown_path, e));
                }
                size += chunk.len() as u64;
            }
            file.flush().map_err(|e| GatewayError::io(shown_path.clone(), e))?;

            tracing::debug!(path = %shown_path, size, "attachment saved");
            Ok(DownloadedFile {
                path,
                size,
                content_type,
            })
        })
    }

    fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        self.runtime.block_on(async {
            let response = check_status(builder.send().await?).await?;
            let bytes = response.bytes().await?;
            serde_json::from_slice(&bytes).map_err(|e| {
                GatewayError::Internal(format!("Failed to parse kintone server's response: {}", e))
            })
        })
    }
}

/// Turn any non-2xx response into a backend error carrying the raw body
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::debug!(status = status.as_u16(), "kintone returned an error");
    Err(GatewayError::Backend {
        status: status.as_u16(),
        body,
    })
}
