//! Device query seam and the `nvidia-smi` implementation.

use std::process::Command;

use super::TelemetryError;

/// Source of the raw tabular memory report: one `index, used, total` line
/// per accelerator, in MiB, no header, no units.
///
/// Injected so the collector's parsing and rendering are testable without a
/// physical accelerator.
pub trait DeviceQuery: Send + Sync {
    fn query_memory(&self) -> Result<String, TelemetryError>;
}

/// Queries GPU memory occupancy through the `nvidia-smi` management CLI.
pub struct NvidiaSmi;

impl DeviceQuery for NvidiaSmi {
    fn query_memory(&self) -> Result<String, TelemetryError> {
        let output = Command::new("nvidia-smi")
            .arg("--query-gpu=index,memory.used,memory.total")
            .arg("--format=csv,noheader,nounits")
            .output()
            .map_err(|e| TelemetryError::Unavailable(e.to_string()))?;

        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(TelemetryError::QueryFailed {
                status: output.status.to_string(),
                output: combined.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
