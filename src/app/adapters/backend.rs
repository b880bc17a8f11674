//! Per-slot compute backends
//!
//! A backend receives one fully resolved map algebra expression per slot and
//! writes the result map. [`CommandBackend`] runs the configured mapcalc
//! module as an external process; [`RecordingBackend`] records requests in
//! memory and is used by tests and dry runs of the execution machinery.

use crate::app::models::MapType;
use crate::config::ComputeConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// One backend computation
#[derive(Debug, Clone, PartialEq)]
pub struct BackendRequest {
    pub slot: usize,
    /// Slot extent, for diagnostics
    pub extent: String,
    pub map_type: MapType,
    /// Right-hand side with every operand resolved to a map id or literal
    pub expression: String,
    /// Name of the map to write, without mapset
    pub output_name: String,
    pub overwrite: bool,
}

impl BackendRequest {
    /// `output = expression`, the form mapcalc modules accept
    pub fn statement(&self) -> String {
        format!("{} = {}", self.output_name, self.expression)
    }

    pub fn failure(&self, message: impl Into<String>) -> Error {
        Error::backend(self.slot, self.extent.clone(), message)
    }
}

#[async_trait]
pub trait ComputeBackend: Send + Sync {
    /// Blocks until the result map is written; fails with [`Error::Backend`]
    async fn evaluate(&self, request: &BackendRequest) -> Result<()>;
}

/// Runs `r.mapcalc`-style modules, one process per slot
#[derive(Debug, Clone)]
pub struct CommandBackend {
    raster_module: String,
    raster3d_module: String,
    vector_module: String,
    timeout: Option<Duration>,
}

impl CommandBackend {
    pub fn new(config: &ComputeConfig) -> Self {
        Self {
            raster_module: config.raster_module.clone(),
            raster3d_module: config.raster3d_module.clone(),
            vector_module: config.vector_module.clone(),
            timeout: config.timeout_secs.map(Duration::from_secs),
        }
    }

    fn module(&self, map_type: MapType) -> &str {
        match map_type {
            MapType::Raster => &self.raster_module,
            MapType::Raster3d => &self.raster3d_module,
            MapType::Vector => &self.vector_module,
        }
    }
}

#[async_trait]
impl ComputeBackend for CommandBackend {
    async fn evaluate(&self, request: &BackendRequest) -> Result<()> {
        let module = self.module(request.map_type);
        let mut command = Command::new(module);
        command
            .arg(format!("expression={}", request.statement()))
            .arg("--quiet")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if request.overwrite {
            command.arg("--overwrite");
        }

        debug!("Slot {}: {} expression=\"{}\"", request.slot, module, request.statement());
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, command.output())
                .await
                .map_err(|_| {
                    request.failure(format!("{} timed out after {}s", module, limit.as_secs()))
                })?,
            None => command.output().await,
        }
        .map_err(|e| request.failure(format!("Failed to run {}: {}", module, e)))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(request.failure(format!(
                "{} exited with {}: {}",
                module,
                output.status.code().map_or_else(|| "signal".to_string(), |c| c.to_string()),
                stderr.trim()
            )))
        }
    }
}

/// Backend that only records the requests it receives
#[derive(Debug, Default)]
pub struct RecordingBackend {
    requests: Mutex<Vec<BackendRequest>>,
    failing_outputs: HashSet<String>,
    delay: Option<Duration>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every request writing one of `outputs`
    pub fn failing_on<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing_outputs = outputs.into_iter().map(Into::into).collect();
        self
    }

    /// Sleep before answering; later slots sleep less so they finish first
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far, in arrival order
    pub fn requests(&self) -> Vec<BackendRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ComputeBackend for RecordingBackend {
    async fn evaluate(&self, request: &BackendRequest) -> Result<()> {
        if let Some(delay) = self.delay {
            let factor = 1.0 / (request.slot as f64 + 1.0);
            tokio::time::sleep(delay.mul_f64(factor)).await;
        }
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if self.failing_outputs.contains(&request.output_name) {
            return Err(request.failure("simulated failure"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(slot: usize, output: &str) -> BackendRequest {
        BackendRequest {
            slot,
            extent: "1 - 2".to_string(),
            map_type: MapType::Raster,
            expression: "a1@PERMANENT + 1".to_string(),
            output_name: output.to_string(),
            overwrite: false,
        }
    }

    #[test]
    fn test_statement() {
        assert_eq!(request(0, "d_0").statement(), "d_0 = a1@PERMANENT + 1");
    }

    #[tokio::test]
    async fn test_recording_backend() {
        let backend = RecordingBackend::new().failing_on(["d_1"]);
        backend.evaluate(&request(0, "d_0")).await.unwrap();
        let failure = backend.evaluate(&request(1, "d_1")).await;
        assert!(matches!(failure, Err(Error::Backend { slot: 1, .. })));
        assert_eq!(backend.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_command_backend_reports_missing_module() {
        let config = ComputeConfig {
            raster_module: "tgis-test-no-such-module".to_string(),
            ..ComputeConfig::default()
        };
        let backend = CommandBackend::new(&config);
        let result = backend.evaluate(&request(3, "d_3")).await;
        assert!(matches!(result, Err(Error::Backend { slot: 3, .. })));
    }
}
