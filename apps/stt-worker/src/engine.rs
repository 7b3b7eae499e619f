use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

/// Owns the in-process Whisper model.
///
/// Loading takes seconds, so the context is created once and reused for
/// every job. An in-process model has no exit status to watch; failures
/// surface per call and leave the context usable, so no restart path is
/// needed.
pub struct WhisperSession {
	model_path: String,
	threads: i32,
	language: String,
	beam_size: i32,
	initial_prompt: String,
	ctx: Option<WhisperContext>,
}

impl WhisperSession {
	pub fn new(model_path: &str, threads: i32, language: &str, beam_size: i32, initial_prompt: &str) -> Self {
		Self {
			model_path: model_path.to_string(),
			threads,
			language: language.to_string(),
			beam_size,
			initial_prompt: initial_prompt.to_string(),
			ctx: None,
		}
	}

	/// Load the model unless a live context already exists.
	///
	/// # Errors
	/// Returns an error if the model file cannot be loaded; fatal to the
	/// current job, not to the worker.
	pub fn ensure_ready(&mut self) -> Result<()> {
		if self.ctx.is_some() {
			return Ok(());
		}

		info!(model = %self.model_path, "🔄 Loading Whisper model");
		let started = Instant::now();

		let ctx = WhisperContext::new_with_params(&self.model_path, WhisperContextParameters::default())
			.with_context(|| format!("failed to load model '{}'", self.model_path))?;

		info!(load_time_ms = started.elapsed().as_millis() as u64, "✅ Whisper model loaded");
		self.ctx = Some(ctx);
		Ok(())
	}

	/// Run one transcription against the warm model; blocking FFI.
	///
	/// # Errors
	/// Returns an error when whisper state creation or decoding fails.
	pub fn transcribe(&mut self, samples: &[f32]) -> Result<String> {
		self.ensure_ready()?;
		let ctx = self.ctx.as_ref().context("whisper context missing")?;

		let mut params = FullParams::new(SamplingStrategy::BeamSearch {
			beam_size: self.beam_size,
			patience: -1.0,
		});
		params.set_language(Some(self.language.as_str()));
		params.set_n_threads(self.threads);
		if !self.initial_prompt.is_empty() {
			params.set_initial_prompt(&self.initial_prompt);
		}
		params.set_translate(false);
		params.set_print_special(false);
		params.set_print_progress(false);
		params.set_print_realtime(false);
		params.set_print_timestamps(false);

		let mut state = ctx.create_state().context("failed to create whisper state")?;
		state.full(params, samples).context("transcription failed")?;

		let num_segments = state.full_n_segments();
		let mut text = String::new();
		for i in 0..num_segments {
			if let Some(segment) = state.get_segment(i) {
				if let Ok(segment_text) = segment.to_str() {
					let trimmed = segment_text.trim();
					if !trimmed.is_empty() {
						if !text.is_empty() {
							text.push(' ');
						}
						text.push_str(trimmed);
					}
				}
			}
		}

		Ok(text)
	}

	#[must_use]
	pub fn language(&self) -> &str {
		&self.language
	}
}
