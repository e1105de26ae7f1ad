use anyhow::Result;
use clap::{Parser, Subcommand};

use mataccel::accel::{AddExecutor, GpuExecutor};
use mataccel::matrix::Matrix;
use mataccel::telemetry;

#[derive(Parser)]
#[command(
    name = "mataccel",
    about = "GPU-accelerated matrix addition service with device telemetry",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service (matrix add + device telemetry)
    Serve {
        /// Listening port
        #[arg(long, env = "MATACCEL_PORT", default_value_t = 8009)]
        port: u16,
    },

    /// Query GPU memory occupancy once and print it
    DeviceInfo {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Add two matrices from local .npz files on the GPU
    Add {
        /// Container holding the left operand
        #[arg(long)]
        file_a: std::path::PathBuf,

        /// Container holding the right operand
        #[arg(long)]
        file_b: std::path::PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => {
            tracing::info!(%port, "starting mataccel daemon");
            mataccel::serve(port).await?;
        }
        Commands::DeviceInfo { json } => {
            let samples = telemetry::sample(&telemetry::query::NvidiaSmi)?;
            if json {
                let body = serde_json::json!({ "gpus": samples });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else if samples.is_empty() {
                println!("No GPUs reported.");
            } else {
                println!("{:<5} | {:>12} | {:>13}", "GPU", "Used (MB)", "Total (MB)");
                println!("{:-<5}-|-{:-<12}-|-{:-<13}", "", "", "");
                for sample in &samples {
                    println!(
                        "{:<5} | {:>12} | {:>13}",
                        sample.gpu, sample.memory_used_mb, sample.memory_total_mb
                    );
                }
            }
        }
        Commands::Add { file_a, file_b } => {
            let a = Matrix::from_npz_bytes(&std::fs::read(&file_a)?)?;
            let b = Matrix::from_npz_bytes(&std::fs::read(&file_b)?)?;
            tracing::info!(
                shape_a = ?a.shape(),
                shape_b = ?b.shape(),
                "running GPU addition"
            );

            let executor = GpuExecutor::new();
            let report = tokio::task::spawn_blocking(move || executor.add(a, b)).await??;

            println!("matrix_shape: [{}, {}]", report.rows, report.cols);
            println!("elapsed_time: {:.6} s", report.elapsed_seconds);
            println!("device:       GPU");
        }
    }

    Ok(())
}
