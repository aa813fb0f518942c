//! Transport layer for tool-provider communication.

use std::collections::HashMap;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::debug;

use crate::protocol::{RpcRequest, RpcResponse};

/// Transport trait for provider communication.
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    /// Send a request and receive the matching response.
    async fn request(&self, request: RpcRequest) -> Result<RpcResponse, TransportError>;

    /// Close the transport.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Transport errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Process error: {0}")]
    Process(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Connection closed")]
    Closed,
}

/// Stdio transport for subprocess providers (line-delimited JSON).
pub struct StdioTransport {
    child: Mutex<Option<Child>>,
    stdin: Mutex<Option<tokio::process::ChildStdin>>,
    stdout: Mutex<Option<BufReader<tokio::process::ChildStdout>>>,
}

impl StdioTransport {
    /// Spawn the provider process and capture its pipes.
    pub async fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> Result<Self, TransportError> {
        let mut child = Command::new(command)
            .args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Process("Failed to capture stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Process("Failed to capture stdout".to_string()))?;

        debug!("Spawned provider process: {command}");

        Ok(Self {
            child: Mutex::new(Some(child)),
            stdin: Mutex::new(Some(stdin)),
            stdout: Mutex::new(Some(BufReader::new(stdout))),
        })
    }
}

#[async_trait]
impl ProviderTransport for StdioTransport {
    async fn request(&self, request: RpcRequest) -> Result<RpcResponse, TransportError> {
        let mut stdin_guard = self.stdin.lock().await;
        let stdin = stdin_guard.as_mut().ok_or(TransportError::Closed)?;

        let mut stdout_guard = self.stdout.lock().await;
        let stdout = stdout_guard.as_mut().ok_or(TransportError::Closed)?;

        let json = serde_json::to_string(&request)?;
        stdin.write_all(json.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;

        let mut line = String::new();
        let read = stdout.read_line(&mut line).await?;
        if read == 0 {
            return Err(TransportError::Closed);
        }

        let response: RpcResponse = serde_json::from_str(&line)?;
        Ok(response)
    }

    async fn close(&self) -> Result<(), TransportError> {
        *self.stdin.lock().await = None;
        *self.stdout.lock().await = None;

        if let Some(mut child) = self.child.lock().await.take() {
            child.kill().await?;
        }
        Ok(())
    }
}

/// HTTP transport: each request is a JSON POST to the provider endpoint.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    headers: HashMap<String, String>,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, headers: HashMap<String, String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            headers,
        }
    }
}

#[async_trait]
impl ProviderTransport for HttpTransport {
    async fn request(&self, request: RpcRequest) -> Result<RpcResponse, TransportError> {
        let mut builder = self.client.post(&self.url).json(&request);
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Http(format!(
                "provider returned HTTP {status}"
            )));
        }

        response
            .json::<RpcResponse>()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))
    }

    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}
