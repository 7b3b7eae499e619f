use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "tts-worker")]
#[command(about = "Text-to-speech queue worker (Piper)", long_about = None)]
pub struct Config {
	/// Redis host
	#[arg(long, env = "REDIS_HOST", default_value = "localhost")]
	pub redis_host: String,

	/// Redis port
	#[arg(long, env = "REDIS_PORT", default_value = "6379")]
	pub redis_port: u16,

	/// Piper executable
	#[arg(long, env = "PIPER_BIN", default_value = "piper")]
	pub piper_bin: String,

	/// Piper voice model path
	#[arg(long, env = "PIPER_MODEL_PATH")]
	pub model_path: String,

	/// Sample rate of the voice model's raw output
	#[arg(long, env = "SAMPLE_RATE", default_value = "22050")]
	pub sample_rate: u32,

	/// Inactivity interval that marks a streamed response complete (ms)
	#[arg(long, env = "POLL_INTERVAL_MS", default_value = "300")]
	pub poll_interval_ms: u64,

	/// Hard deadline for capturing one synthesis response (secs)
	#[arg(long, env = "SYNTH_DEADLINE_SECS", default_value = "15")]
	pub synth_deadline_secs: u64,

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
	#[arg(long, env = "TTS_QUEUE_KEY", default_value = "tts:jobs")]
	pub queue_key: String,
}

impl Config {
	/// Validate configuration values
	pub fn validate(&self) -> Result<(), String> {
		if self.model_path.is_empty() {
			return Err("model_path must not be empty".to_string());
		}

		if self.sample_rate == 0 {
			return Err("sample_rate must be greater than 0".to_string());
		}

		if self.poll_interval_ms == 0 {
			return Err("poll_interval_ms must be greater than 0".to_string());
		}

		if self.synth_deadline_secs == 0 {
			return Err("synth_deadline_secs must be greater than 0".to_string());
		}

		if Duration::from_millis(self.poll_interval_ms) >= self.synth_deadline() {
			return Err("poll_interval_ms must be shorter than synth_deadline_secs".to_string());
		}

		if self.fetch_timeout_secs == 0 {
			return Err("fetch_timeout_secs must be greater than 0".to_string());
		}

		if self.result_ttl_secs == 0 {
			return Err("result_ttl_secs must be greater than 0".to_string());
		}

		Ok(())
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}

	pub fn synth_deadline(&self) -> Duration {
		Duration::from_secs(self.synth_deadline_secs)
	}

	pub fn fetch_timeout(&self) -> Duration {
		Duration::from_secs(self.fetch_timeout_secs)
	}

	pub fn result_ttl(&self) -> Duration {
		Duration::from_secs(self.result_ttl_secs)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn base_args() -> Vec<&'static str> {
		vec!["tts-worker", "--model-path", "/models/fr_FR-siwis-medium.onnx"]
	}

	#[test]
	fn parses_defaults() {
		let config = Config::try_parse_from(base_args()).unwrap();
		assert_eq!(config.sample_rate, 22050);
		assert_eq!(config.poll_interval(), Duration::from_millis(300));
		assert_eq!(config.synth_deadline(), Duration::from_secs(15));
		assert_eq!(config.result_ttl(), Duration::from_secs(60));
		assert_eq!(config.queue_key, "tts:jobs");
		assert!(config.validate().is_ok());
	}

	#[test]
	fn rejects_zero_sample_rate() {
		let mut args = base_args();
		args.extend(["--sample-rate", "0"]);
		let config = Config::try_parse_from(args).unwrap();
		assert!(config.validate().is_err());
	}

	#[test]
	fn rejects_poll_interval_longer_than_deadline() {
		let mut args = base_args();
		args.extend(["--poll-interval-ms", "20000", "--synth-deadline-secs", "15"]);
		let config = Config::try_parse_from(args).unwrap();
		assert!(config.validate().is_err());
	}
}
