use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "stt-worker")]
#[command(about = "Speech-to-text queue worker (Whisper)", long_about = None)]
pub struct Config {
	/// Redis host
	#[arg(long, env = "REDIS_HOST", default_value = "localhost")]
	pub redis_host: String,

	/// Redis port
	#[arg(long, env = "REDIS_PORT", default_value = "6379")]
	pub redis_port: u16,

	/// Whisper model path
	#[arg(long, env = "WHISPER_MODEL_PATH")]
	pub model_path: String,

	/// Number of threads for Whisper processing
	#[arg(long, env = "WHISPER_THREADS", default_value = "4")]
	pub whisper_threads: i32,

	/// Beam size for decoding
	#[arg(long, env = "WHISPER_BEAM_SIZE", default_value = "3")]
	pub beam_size: i32,

	/// Transcription language
	#[arg(long, env = "WHISPER_LANGUAGE", default_value = "fr")]
	pub language: String,

	/// Initial prompt to bias the decoder (empty = none)
	#[arg(long, env = "WHISPER_INITIAL_PROMPT", default_value = "")]
	pub initial_prompt: String,

	/// Sample rate the model expects
	#[arg(long, env = "TARGET_SAMPLE_RATE", default_value = "16000")]
	pub target_sample_rate: u32,

	/// ffmpeg decode timeout (secs)
	#[arg(long, env = "DECODE_TIMEOUT_SECS", default_value = "10")]
	pub decode_timeout_secs: u64,

	/// Queue fetch timeout (secs)
	#[arg(long, env = "FETCH_TIMEOUT_SECS", default_value = "5")]
	pub fetch_timeout_secs: u64,

	/// Result record expiry (secs)
	#[arg(long, env = "RESULT_TTL_SECS", default_value = "60")]
	pub result_ttl_secs: u64,

	/// Key namespace for result records
	#[arg(long, env = "RESULT_NAMESPACE", default_value = "speech")]
	pub namespace: String,

	/// Queue list key
	#[arg(long, env = "STT_QUEUE_KEY", default_value = "stt:jobs")]
	pub queue_key: String,
}

impl Config {
	/// Validate configuration values
	pub fn validate(&self) -> Result<(), String> {
		if self.model_path.is_empty() {
			return Err("model_path must not be empty".to_string());
		}

		if self.whisper_threads < 1 {
			return Err("whisper_threads must be at least 1".to_string());
		}

		if self.beam_size < 1 {
			return Err("beam_size must be at least 1".to_string());
		}

		if self.language.is_empty() {
			return Err("language must not be empty".to_string());
		}

		if self.target_sample_rate == 0 {
			return Err("target_sample_rate must be greater than 0".to_string());
		}

		if self.decode_timeout_secs == 0 {
			return Err("decode_timeout_secs must be greater than 0".to_string());
		}

		if self.fetch_timeout_secs == 0 {
			return Err("fetch_timeout_secs must be greater than 0".to_string());
		}

		if self.result_ttl_secs == 0 {
			return Err("result_ttl_secs must be greater than 0".to_string());
		}

		Ok(())
	}

	pub fn decode_timeout(&self) -> Duration {
		Duration::from_secs(self.decode_timeout_secs)
	}

	pub fn fetch_timeout(&self) -> Duration {
		Duration::from_secs(self.fetch_timeout_secs)
	}

	pub fn result_ttl(&self) -> Duration {
		Duration::from_secs(self.result_ttl_secs)
	}
}
