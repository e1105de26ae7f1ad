//! GPU memory telemetry: query, tolerant parsing, and rendering.
//!
//! Samples are recomputed on every request and never cached. A malformed
//! line is dropped; a field that fails numeric parsing degrades to its raw
//! text instead of failing the whole sample.

pub mod metrics;
pub mod query;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("device query unavailable: {0}")]
    Unavailable(String),

    #[error("device query failed with {status}: {output}")]
    QueryFailed { status: String, output: String },
}

/// One memory field: MiB when it parses, otherwise the raw text preserved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MemoryReading {
    Mib(u64),
    Raw(String),
}

impl MemoryReading {
    fn parse(field: &str) -> Self {
        let field = field.trim();
        field
            .parse()
            .map(MemoryReading::Mib)
            .unwrap_or_else(|_| MemoryReading::Raw(field.to_string()))
    }

    /// Numeric view for gauge rendering; `None` when the raw text is not a
    /// number either.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MemoryReading::Mib(v) => Some(*v as f64),
            MemoryReading::Raw(s) => s.parse().ok(),
        }
    }
}

impl std::fmt::Display for MemoryReading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryReading::Mib(v) => write!(f, "{v}"),
            MemoryReading::Raw(s) => write!(f, "{s}"),
        }
    }
}

/// One accelerator's memory occupancy at sample time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpuMemorySample {
    pub gpu: String,
    #[serde(rename = "memory_used_MB")]
    pub memory_used_mb: MemoryReading,
    #[serde(rename = "memory_total_MB")]
    pub memory_total_mb: MemoryReading,
}

/// Parse `index, memory.used, memory.total` CSV lines, one per accelerator.
pub fn parse_samples(output: &str) -> Vec<GpuMemorySample> {
    let mut samples = Vec::new();
    for line in output.trim().lines() {
        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        if parts.len() < 3 {
            tracing::debug!(%line, "skipping malformed telemetry line");
            continue;
        }
        samples.push(GpuMemorySample {
            gpu: parts[0].to_string(),
            memory_used_mb: MemoryReading::parse(parts[1]),
            memory_total_mb: MemoryReading::parse(parts[2]),
        });
    }
    samples
}

/// Run the device query once and parse its report.
pub fn sample(query: &dyn query::DeviceQuery) -> Result<Vec<GpuMemorySample>, TelemetryError> {
    Ok(parse_samples(&query.query_memory()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_two_gpus() {
        let samples = parse_samples("0, 312, 4096\n1, 10, 8192");
        assert_eq!(
            samples,
            vec![
                GpuMemorySample {
                    gpu: "0".to_string(),
                    memory_used_mb: MemoryReading::Mib(312),
                    memory_total_mb: MemoryReading::Mib(4096),
                },
                GpuMemorySample {
                    gpu: "1".to_string(),
                    memory_used_mb: MemoryReading::Mib(10),
                    memory_total_mb: MemoryReading::Mib(8192),
                },
            ]
        );
    }

    #[test]
    fn test_short_line_is_skipped_without_aborting() {
        let samples = parse_samples("0, 312, 4096\nbogus line\n1, 10, 8192");
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].gpu, "1");
    }

    #[test]
    fn test_non_numeric_field_preserves_raw_text() {
        let samples = parse_samples("0, [N/A], 4096");
        assert_eq!(samples.len(), 1);
        assert_eq!(
            samples[0].memory_used_mb,
            MemoryReading::Raw("[N/A]".to_string())
        );
        assert_eq!(samples[0].memory_total_mb, MemoryReading::Mib(4096));
    }

    #[test]
    fn test_sample_json_shape() {
        let samples = parse_samples("0, 312, 4096\n1, oops, 8192");
        let json = serde_json::to_value(&samples).expect("serialize");
        assert_eq!(json[0]["memory_used_MB"], 312);
        assert_eq!(json[1]["memory_used_MB"], "oops");
        assert_eq!(json[1]["memory_total_MB"], 8192);
        assert_eq!(json[0]["gpu"], "0");
    }

    #[test]
    fn test_empty_output_yields_no_samples() {
        assert!(parse_samples("").is_empty());
        assert!(parse_samples("\n\n").is_empty());
    }
}
