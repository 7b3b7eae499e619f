use std::time::Duration;

use anyhow::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use speech_jobs::{JobEnvelope, JobError, QueueClient};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::engine::PiperSession;
use crate::text::split_sentences;
use crate::wav::{duration_ms, write_wav, PcmFormat};

const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);
const ERROR_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct TtsJob {
	text: String,
	#[serde(default)]
	streaming: bool,
}

#[derive(Debug, Serialize)]
struct TtsOutput {
	audio_base64: String,
	duration_ms: u64,
}

/// Sequential worker loop: pop one job, synthesize, publish, repeat.
pub struct Worker {
	config: Config,
	queue: QueueClient,
	session: PiperSession,
	cancellation_token: CancellationToken,
}

impl Worker {
	pub fn new(config: Config, queue: QueueClient, session: PiperSession, cancellation_token: CancellationToken) -> Self {
		Self {
			config,
			queue,
			session,
			cancellation_token,
		}
	}

	/// Start the engine before the first job so callers don't pay the
	/// model-load cost on their request.
	pub async fn warm(&mut self) -> Result<()> {
		self.session.ensure_ready().await
	}

	pub async fn run(mut self) -> Result<()> {
		info!(queue = %self.config.queue_key, "🎧 Waiting for synthesis jobs");

		loop {
			tokio::select! {
				_ = self.cancellation_token.cancelled() => {
					info!("🛑 Worker loop cancelled");
					break;
				}
				fetched = self.queue.fetch(self.config.fetch_timeout()) => {
					match fetched {
						Ok(Some(raw)) => self.handle_item(&raw).await,
						Ok(None) => {} // fetch timeout; loop for interrupt checks
						Err(e) if e.is_transport() => self.reconnect().await,
						Err(e) => {
							error!(error = %e, "Unexpected queue failure");
							tokio::time::sleep(ERROR_PAUSE).await;
						}
					}
				}
			}
		}

		self.session.release().await;
		Ok(())
	}

	/// Fixed-backoff reconnect. Repeats until the backend answers or
	/// shutdown is requested; never crashes the process.
	async fn reconnect(&mut self) {
		loop {
			warn!(backoff_secs = RECONNECT_BACKOFF.as_secs(), "Redis connection lost, reconnecting");
			tokio::select! {
				_ = self.cancellation_token.cancelled() => return,
				() = tokio::time::sleep(RECONNECT_BACKOFF) => {}
			}

			match self.queue.reconnect().await {
				Ok(()) => {
					info!("✅ Reconnected to Redis");
					return;
				}
				Err(e) => warn!(error = %e, "Reconnect failed"),
			}
		}
	}

	/// The job boundary: every failure past envelope parsing becomes an
	/// error result under the same key/TTL contract as success.
	async fn handle_item(&mut self, raw: &str) {
		let envelope = match JobEnvelope::parse(raw) {
			Ok(envelope) => envelope,
			Err(e) => {
				// No job_id to answer under; log and move on.
				warn!(error = %e, "Skipping unaddressable queue item");
				return;
			}
		};

		let job_id = envelope.job_id().to_string();
		let outcome = process(&self.config, &mut self.session, &envelope).await;
		let ttl = self.config.result_ttl();

		let published = match &outcome {
			Ok(output) => self.queue.publish_ok(&job_id, output, ttl).await,
			Err(e) => {
				warn!(job_id = %job_id, error = %e, "❌ Synthesis job failed");
				self.queue.publish_error(&job_id, &e.to_string(), ttl).await
			}
		};

		if let Err(e) = published {
			// The result is lost; the caller's TTL window runs out silently.
			error!(job_id = %job_id, error = %e, "Failed to publish result");
			if e.is_transport() {
				self.reconnect().await;
			}
		}
	}
}

/// One decoded envelope through the synthesis pipeline. Payload validation
/// happens first, so a rejected job never touches the engine; split from
/// the loop so it can run against an engine session alone.
async fn process(config: &Config, session: &mut PiperSession, envelope: &JobEnvelope) -> Result<TtsOutput, JobError> {
	let job: TtsJob = envelope.decode().map_err(|e| JobError::Decode(e.to_string()))?;
	if job.text.trim().is_empty() {
		return Err(JobError::Decode("empty text".to_string()));
	}

	info!(job_id = %envelope.job_id(), chars = job.text.len(), streaming = job.streaming, "🔊 Synthesizing");

	let samples = if job.streaming {
		// Sentence-by-sentence synthesis; chunks are concatenated into
		// one payload before wrapping.
		let mut samples = Vec::new();
		for sentence in split_sentences(&job.text) {
			let chunk = session.synthesize(&sentence).await.map_err(|e| JobError::Engine(e.to_string()))?;
			samples.extend_from_slice(&chunk);
		}
		samples
	} else {
		session.synthesize(&job.text).await.map_err(|e| JobError::Engine(e.to_string()))?
	};

	let format = PcmFormat {
		sample_rate: config.sample_rate,
		channels: 1,
		bits_per_sample: 16,
	};
	let duration_ms = duration_ms(samples.len(), format);
	let container = write_wav(&samples, format);

	info!(
		job_id = %envelope.job_id(),
		payload_bytes = container.len(),
		duration_ms,
		"✅ Synthesis complete"
	);

	Ok(TtsOutput {
		audio_base64: STANDARD.encode(&container),
		duration_ms,
	})
}
