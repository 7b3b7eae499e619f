mod config;
mod decode;
mod engine;
mod worker;

use anyhow::Result;
use clap::Parser;
use speech_jobs::QueueClient;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use engine::WhisperSession;
use worker::Worker;

const REDIS_MAX_RETRIES: u32 = 5;
const REDIS_INITIAL_BACKOFF_MS: u64 = 500;

#[tokio::main]
async fn main() -> Result<()> {
	// Load environment variables
	dotenvy::dotenv().ok();

	// Parse CLI arguments
	let config = Config::parse();
	config.validate().map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

	init_tracing();

	info!(
		model = %config.model_path,
		queue = %config.queue_key,
		language = %config.language,
		threads = config.whisper_threads,
		"🎯 Starting transcription worker"
	);

	// Connect to Redis with retry
	let queue = connect_with_retry(&config).await?;

	let session = WhisperSession::new(
		&config.model_path,
		config.whisper_threads,
		&config.language,
		config.beam_size,
		&config.initial_prompt,
	);

	// Cancellation token for cooperative shutdown
	let cancellation_token = CancellationToken::new();
	let shutdown_token = cancellation_token.clone();
	tokio::spawn(async move {
		wait_for_shutdown_signal().await;
		info!("🛑 Shutdown signal received (SIGTERM/SIGINT)");
		shutdown_token.cancel();
	});

	let mut worker = Worker::new(config, queue, session, cancellation_token);

	// Load the model up front so the first job doesn't pay the warm-up cost
	worker.warm()?;

	// The loop exits within one fetch timeout of cancellation; in-flight
	// jobs finish first.
	worker.run().await
}

fn init_tracing() {
	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,stt_worker=debug"));

	tracing_subscriber::registry()
		.with(env_filter)
		.with(tracing_subscriber::fmt::layer().with_target(true))
		.init();
}

async fn connect_with_retry(config: &Config) -> Result<QueueClient> {
	for attempt in 1..=REDIS_MAX_RETRIES {
		match QueueClient::connect(&config.redis_host, config.redis_port, &config.queue_key, &config.namespace) {
			Ok(queue) => {
				info!(host = %config.redis_host, port = config.redis_port, "✅ Connected to Redis");
				return Ok(queue);
			}
			Err(e) => {
				if attempt == REDIS_MAX_RETRIES {
					error!(
						error = %e,
						host = %config.redis_host,
						"❌ Failed to connect to Redis after {} attempts - worker cannot continue",
						REDIS_MAX_RETRIES
					);
					return Err(e.into());
				}

				let backoff = REDIS_INITIAL_BACKOFF_MS * 2_u64.pow(attempt - 1);
				warn!(
					attempt,
					max_retries = REDIS_MAX_RETRIES,
					backoff_ms = backoff,
					error = %e,
					"⚠️ Redis connection failed, retrying..."
				);

				tokio::time::sleep(std::time::Duration::from_millis(backoff)).await;
			}
		}
	}

	unreachable!()
}

async fn wait_for_shutdown_signal() {
	let ctrl_c = async {
		signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
	};

	#[cfg(unix)]
	let terminate = async {
		signal::unix::signal(signal::unix::SignalKind::terminate())
			.expect("failed to install SIGTERM handler")
			.recv()
			.await;
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}
