use std::time::{Duration, Instant};

use anyhow::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use speech_jobs::{JobEnvelope, JobError, QueueClient};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::decode::decode_audio;
use crate::engine::WhisperSession;

const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);
const ERROR_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct SttJob {
	audio_base64: String,
}

#[derive(Debug, Serialize)]
struct SttOutput {
	text: String,
	language: String,
	duration_ms: u64,
}

/// Sequential worker loop: pop one job, transcribe, publish, repeat.
pub struct Worker {
	config: Config,
	queue: QueueClient,
	session: WhisperSession,
	cancellation_token: CancellationToken,
}

impl Worker {
	pub fn new(config: Config, queue: QueueClient, session: WhisperSession, cancellation_token: CancellationToken) -> Self {
		Self {
			config,
			queue,
			session,
			cancellation_token,
		}
	}

	/// Load the model before the first job so callers don't pay the
	/// warm-up cost on their request.
	pub fn warm(&mut self) -> Result<()> {
		self.session.ensure_ready()
	}

	pub async fn run(mut self) -> Result<()> {
		info!(queue = %self.config.queue_key, "🎧 Waiting for transcription jobs");

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
				warn!(job_id = %job_id, error = %e, "❌ Transcription job failed");
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

/// One decoded envelope through the transcription pipeline. Payload
/// validation happens first, so a rejected job never touches the engine;
/// split from the loop so it can run against an engine session alone.
async fn process(config: &Config, session: &mut WhisperSession, envelope: &JobEnvelope) -> Result<SttOutput, JobError> {
	let job: SttJob = envelope.decode().map_err(|e| JobError::Decode(e.to_string()))?;

	let bytes = STANDARD.decode(&job.audio_base64).map_err(|e| JobError::Decode(e.to_string()))?;
	if bytes.is_empty() {
		return Err(JobError::Decode("empty audio payload".to_string()));
	}

	let samples = decode_audio(&bytes, config.target_sample_rate, config.decode_timeout())
		.await
		.map_err(|e| JobError::Decode(e.to_string()))?;

	info!(job_id = %envelope.job_id(), audio_bytes = bytes.len(), samples = samples.len(), "🎤 Transcribing");

	let started = Instant::now();
	let text = session.transcribe(&samples).map_err(|e| JobError::Engine(e.to_string()))?;
	let duration_ms = started.elapsed().as_millis() as u64;

	info!(
		job_id = %envelope.job_id(),
		duration_ms,
		text_length = text.len(),
		"✅ Transcription complete"
	);

	Ok(SttOutput {
		text,
		language: session.language().to_string(),
		duration_ms,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::Parser;

	fn test_config() -> Config {
		Config::try_parse_from(["stt-worker", "--model-path", "no-such-model.bin"]).unwrap()
	}

	// The model path is bogus, so any call reaching the engine would fail
	// its load with an engine error; a decode classification proves the
	// payload was rejected before that point.
	#[tokio::test]
	async fn bad_base64_is_rejected_before_the_engine_is_touched() {
		let config = test_config();
		let mut session = WhisperSession::new(&config.model_path, 1, &config.language, 1, "");

		let envelope = JobEnvelope::parse(r#"{"job_id":"s1","audio_base64":"%%%"}"#).unwrap();
		let err = process(&config, &mut session, &envelope).await.unwrap_err();
		assert!(matches!(err, JobError::Decode(_)));
		assert!(!err.to_string().is_empty());
	}

	#[tokio::test]
	async fn missing_payload_field_is_rejected_before_the_engine_is_touched() {
		let config = test_config();
		let mut session = WhisperSession::new(&config.model_path, 1, &config.language, 1, "");

		let envelope = JobEnvelope::parse(r#"{"job_id":"s2","text":"not audio"}"#).unwrap();
		let err = process(&config, &mut session, &envelope).await.unwrap_err();
		assert!(matches!(err, JobError::Decode(_)));
	}

	#[tokio::test]
	async fn empty_audio_payload_is_rejected() {
		let config = test_config();
		let mut session = WhisperSession::new(&config.model_path, 1, &config.language, 1, "");

		let envelope = JobEnvelope::parse(r#"{"job_id":"s3","audio_base64":""}"#).unwrap();
		let err = process(&config, &mut session, &envelope).await.unwrap_err();
		assert!(matches!(err, JobError::Decode(_)));
		assert!(err.to_string().contains("empty audio payload"));
	}
}
