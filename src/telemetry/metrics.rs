//! Prometheus text exposition for the GPU memory gauges.
//!
//! The body is rebuilt from a fresh sample set on every call; no metric
//! state persists between scrapes.

use std::fmt::Write;

use super::GpuMemorySample;

/// Exposition content type, version 0.0.4 of the text format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Render `gpu_memory_used_mb` and `gpu_memory_total_mb` gauges, one labeled
/// series per accelerator. Samples whose readings are non-numeric are left
/// out of the exposition (they still appear in the JSON summary).
pub fn render(samples: &[GpuMemorySample]) -> String {
    let mut used_lines = String::new();
    let mut total_lines = String::new();

    for sample in samples {
        let (Some(used), Some(total)) = (
            sample.memory_used_mb.as_f64(),
            sample.memory_total_mb.as_f64(),
        ) else {
            tracing::debug!(gpu = %sample.gpu, "skipping non-numeric sample in exposition");
            continue;
        };
        let _ = writeln!(used_lines, "gpu_memory_used_mb{{gpu=\"{}\"}} {used}", sample.gpu);
        let _ = writeln!(
            total_lines,
            "gpu_memory_total_mb{{gpu=\"{}\"}} {total}",
            sample.gpu
        );
    }

    format!(
        "# HELP gpu_memory_used_mb GPU memory used (MB)\n\
         # TYPE gpu_memory_used_mb gauge\n\
         {used_lines}\
         # HELP gpu_memory_total_mb GPU memory total (MB)\n\
         # TYPE gpu_memory_total_mb gauge\n\
         {total_lines}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::parse_samples;

    #[test]
    fn test_render_labeled_gauges() {
        let body = render(&parse_samples("0, 312, 4096\n1, 10, 8192"));
        assert!(body.contains("# TYPE gpu_memory_used_mb gauge"));
        assert!(body.contains("gpu_memory_used_mb{gpu=\"0\"} 312"));
        assert!(body.contains("gpu_memory_used_mb{gpu=\"1\"} 10"));
        assert!(body.contains("gpu_memory_total_mb{gpu=\"0\"} 4096"));
        assert!(body.contains("gpu_memory_total_mb{gpu=\"1\"} 8192"));
    }

    #[test]
    fn test_non_numeric_sample_is_skipped() {
        let body = render(&parse_samples("0, [N/A], 4096\n1, 10, 8192"));
        assert!(!body.contains("gpu=\"0\""));
        assert!(body.contains("gpu_memory_used_mb{gpu=\"1\"} 10"));
    }

    #[test]
    fn test_empty_sample_set_keeps_headers() {
        let body = render(&[]);
        assert!(body.contains("# HELP gpu_memory_used_mb"));
        assert!(body.contains("# HELP gpu_memory_total_mb"));
        assert!(!body.contains("{gpu="));
    }
}
