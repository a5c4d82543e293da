use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use kokoro_web::config::ServerConfigBuilder;
use kokoro_web::engines::kokoro::{EspeakConfig, KokoroFactory, KokoroModelParams};
use kokoro_web::server::{self, AppState};
use kokoro_web::store::{AudioStore, RetentionPolicy};
use kokoro_web::{SynthesisService, VoiceCatalog};

/// Serve Kokoro text-to-speech over HTTP.
#[derive(Parser, Debug)]
#[command(name = "kokoro-web")]
#[command(version)]
struct Args {
    /// Address to bind
    #[arg(long, env = "KOKORO_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "KOKORO_PORT", default_value = "5000")]
    port: u16,

    /// Directory generated WAV files are written to
    #[arg(short, long, env = "KOKORO_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Directory holding the Kokoro ONNX model and voices-v1.0.bin
    #[arg(short, long, env = "KOKORO_MODEL_DIR", default_value = "models/kokoro")]
    model_dir: PathBuf,

    /// Inference threads per language pipeline
    #[arg(long, env = "KOKORO_THREADS")]
    threads: Option<usize>,

    /// Where to cache the optimized ONNX graph between runs
    #[arg(long, env = "KOKORO_GRAPH_CACHE")]
    graph_cache: Option<PathBuf>,

    /// Speech speed multiplier (0.5 to 2.0)
    #[arg(short, long, env = "KOKORO_SPEED", default_value = "1.0")]
    speed: f32,

    /// espeak-ng binary (defaults to espeak-ng from PATH)
    #[arg(long, env = "KOKORO_ESPEAK_BIN")]
    espeak_bin: Option<PathBuf>,

    /// espeak-ng data directory
    #[arg(long, env = "KOKORO_ESPEAK_DATA")]
    espeak_data: Option<PathBuf>,

    /// Delete generated files older than this many seconds
    #[arg(long, env = "KOKORO_MAX_AGE_SECS")]
    max_age_secs: Option<u64>,

    /// Keep at most this many generated files
    #[arg(long, env = "KOKORO_MAX_FILES")]
    max_files: Option<usize>,

    /// Seconds between retention sweeps
    #[arg(long, env = "KOKORO_SWEEP_INTERVAL_SECS", default_value = "60")]
    sweep_interval_secs: u64,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if !(0.5..=2.0).contains(&args.speed) {
        return Err(format!("speed must be between 0.5 and 2.0, got {}", args.speed).into());
    }

    let config = ServerConfigBuilder::default()
        .host(args.host)
        .port(args.port)
        .output_dir(args.output_dir)
        .model_dir(args.model_dir)
        .retention(RetentionPolicy {
            max_age: args.max_age_secs.map(Duration::from_secs),
            max_files: args.max_files,
        })
        .sweep_interval(Duration::from_secs(args.sweep_interval_secs))
        .build()?;

    let factory = KokoroFactory::new(&config.model_dir)
        .with_params(KokoroModelParams {
            num_threads: args.threads,
            optimized_model_cache_path: args.graph_cache,
            speed: args.speed,
        })
        .with_espeak(EspeakConfig {
            bin_path: args.espeak_bin,
            data_path: args.espeak_data,
        });

    let store = AudioStore::open(&config.output_dir, config.retention)?;
    let catalog = VoiceCatalog::kokoro();
    log::info!(
        "Loaded {} voices in {} languages; models load on first use from {}",
        catalog.len(),
        catalog.languages().count(),
        factory.model_dir().display()
    );

    let service = SynthesisService::new(Arc::new(factory), store);
    server::serve(&config, AppState::new(service, catalog)).await
}
