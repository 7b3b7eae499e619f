use std::process::Stdio;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Convert any container format to mono f32 samples at the target rate
/// via an ffmpeg pipe (no temp files).
///
/// # Errors
/// Returns an error if ffmpeg is missing, exits nonzero, produces no
/// samples, or overruns the timeout. All of these are job-scoped decode
/// failures; the engine is untouched.
pub async fn decode_audio(bytes: &[u8], target_sample_rate: u32, timeout: Duration) -> Result<Vec<f32>> {
	let mut child = Command::new("ffmpeg")
		.args(["-i", "pipe:0", "-ar", &target_sample_rate.to_string(), "-ac", "1", "-f", "s16le", "pipe:1"])
		.stdin(Stdio::piped())
		.stdout(Stdio::piped())
		.stderr(Stdio::null())
		.kill_on_drop(true)
		.spawn()
		.context("failed to spawn ffmpeg")?;

	let mut stdin = child.stdin.take().context("ffmpeg stdin unavailable")?;
	let input = bytes.to_vec();
	let writer = tokio::spawn(async move {
		// A decode error can close the pipe early; that surfaces through
		// the exit status, not this write.
		let _ = stdin.write_all(&input).await;
		drop(stdin);
	});

	let output = tokio::time::timeout(timeout, child.wait_with_output())
		.await
		.context("ffmpeg timed out")?
		.context("ffmpeg failed")?;
	let _ = writer.await;

	if !output.status.success() {
		bail!("ffmpeg exited with {}", output.status);
	}
	if output.stdout.is_empty() {
		bail!("ffmpeg produced no samples");
	}

	debug!(bytes_in = bytes.len(), bytes_out = output.stdout.len(), "audio decoded");
	Ok(samples_from_s16le(&output.stdout))
}

/// Reinterpret little-endian s16 PCM as normalized f32 samples.
pub fn samples_from_s16le(bytes: &[u8]) -> Vec<f32> {
	bytes
		.chunks_exact(2)
		.map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0)
		.collect()
}
