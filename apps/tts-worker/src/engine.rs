use std::process::Stdio;

use anyhow::{Context, Result};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::framer::Framer;

const STDOUT_CHANNEL_CAPACITY: usize = 64;
const READ_CHUNK_BYTES: usize = 8192;

/// Owns the long-lived Piper child process.
///
/// The engine is slow to start (it loads the voice model), so one process
/// is spawned at warm-up and kept across jobs. A new process is spawned
/// only when the current one is detected dead via its exit status, never
/// per job. Requests go in as one JSON line on stdin; raw unframed s16le
/// samples come back on stdout and are segmented by the [`Framer`].
pub struct PiperSession {
	bin: String,
	model_path: String,
	framer: Framer,
	child: Option<Child>,
	stdin: Option<ChildStdin>,
	output: Option<mpsc::Receiver<Vec<u8>>>,
	restarts: u64,
}

impl PiperSession {
	pub fn new(bin: &str, model_path: &str, framer: Framer) -> Self {
		Self {
			bin: bin.to_string(),
			model_path: model_path.to_string(),
			framer,
			child: None,
			stdin: None,
			output: None,
			restarts: 0,
		}
	}

	/// Spawn the engine if there is none, or if the current one has died.
	///
	/// Discards the old handle before creating a new one, so at most one
	/// engine process is live per worker at any time.
	///
	/// # Errors
	/// Returns an error if the process cannot be spawned; fatal to the
	/// current job, not to the worker.
	pub async fn ensure_ready(&mut self) -> Result<()> {
		if let Some(child) = self.child.as_mut() {
			match child.try_wait() {
				Ok(None) => return Ok(()),
				Ok(Some(status)) => warn!(%status, "Engine process died, respawning"),
				Err(e) => warn!(error = %e, "Engine liveness check failed, respawning"),
			}
			self.discard_current().await;
			self.restarts += 1;
		}

		self.spawn().await
	}

	/// Send one request line and capture the raw sample response.
	///
	/// An empty capture is not an error here: the framer's deadline policy
	/// returns whatever arrived, and callers surface truncation through the
	/// payload length.
	///
	/// # Errors
	/// Returns an error if the engine cannot be (re)started or its stdin
	/// pipe is broken. The next call restarts the engine via liveness
	/// detection.
	pub async fn synthesize(&mut self, text: &str) -> Result<Vec<u8>> {
		self.ensure_ready().await?;
		self.discard_stale_output();

		let request = json!({ "text": text }).to_string();
		let stdin = self.stdin.as_mut().context("engine stdin closed")?;
		stdin.write_all(request.as_bytes()).await.context("engine rejected request")?;
		stdin.write_all(b"\n").await.context("engine rejected request")?;
		stdin.flush().await.context("engine rejected request")?;

		let framer = self.framer;
		let output = self.output.as_mut().context("engine stdout closed")?;
		Ok(framer.collect(output).await)
	}

	#[must_use]
	pub fn restarts(&self) -> u64 {
		self.restarts
	}

	/// Terminate and reap the engine process on shutdown.
	pub async fn release(&mut self) {
		if self.child.is_some() {
			info!("Terminating synthesis engine");
		}
		self.discard_current().await;
	}

	// Anything still buffered in the channel is the tail of an earlier
	// response the framer already cut. It must not open the next capture.
	fn discard_stale_output(&mut self) {
		let Some(output) = self.output.as_mut() else {
			return;
		};

		let mut stale = 0usize;
		while let Ok(chunk) = output.try_recv() {
			stale += chunk.len();
		}
		if stale > 0 {
			debug!(stale_bytes = stale, "Discarded late samples from a previous request");
		}
	}

	async fn discard_current(&mut self) {
		self.stdin.take();
		self.output.take();
		if let Some(mut child) = self.child.take() {
			child.start_kill().ok();
			child.wait().await.ok();
		}
	}

	async fn spawn(&mut self) -> Result<()> {
		info!(bin = %self.bin, model = %self.model_path, "🔄 Starting synthesis engine");

		let mut child = Command::new(&self.bin)
			.arg("--model")
			.arg(&self.model_path)
			.arg("--output-raw")
			.arg("--json-input")
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true)
			.spawn()
			.with_context(|| format!("failed to spawn engine '{}'", self.bin))?;

		let stdin = child.stdin.take().context("engine stdin unavailable")?;
		let mut stdout = child.stdout.take().context("engine stdout unavailable")?;
		let stderr = child.stderr.take().context("engine stderr unavailable")?;

		// Forward raw stdout chunks to the framer's channel. The task ends
		// on EOF or when this generation's receiver is dropped.
		let (tx, rx) = mpsc::channel(STDOUT_CHANNEL_CAPACITY);
		tokio::spawn(async move {
			let mut chunk = vec![0u8; READ_CHUNK_BYTES];
			loop {
				match stdout.read(&mut chunk).await {
					Ok(0) | Err(_) => break,
					Ok(n) => {
						if tx.send(chunk[..n].to_vec()).await.is_err() {
							break;
						}
					}
				}
			}
		});

		// Piper logs progress to stderr; keep it out of the response path.
		tokio::spawn(async move {
			let mut lines = BufReader::new(stderr).lines();
			while let Ok(Some(line)) = lines.next_line().await {
				debug!(target: "engine", "{line}");
			}
		});

		self.child = Some(child);
		self.stdin = Some(stdin);
		self.output = Some(rx);

		info!("✅ Synthesis engine ready");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;
	use std::os::unix::fs::PermissionsExt;
	use std::path::PathBuf;
	use std::time::Duration;

	fn fast_framer() -> Framer {
		Framer {
			poll_interval: Duration::from_millis(20),
			deadline: Duration::from_millis(200),
		}
	}

	// Stand-in engine: a shell script spawned with the same argument list
	// as the real binary, which it ignores.
	fn fake_engine(name: &str, body: &str) -> PathBuf {
		let path = std::env::temp_dir().join(format!("fake-engine-{}-{name}.sh", std::process::id()));
		let mut file = std::fs::File::create(&path).unwrap();
		writeln!(file, "#!/bin/sh\n{body}").unwrap();
		file.set_permissions(std::fs::Permissions::from_mode(0o755)).unwrap();
		path
	}

	// `true` ignores its arguments and exits immediately, standing in for
	// an engine that dies right after startup.
	#[tokio::test]
	async fn dead_engine_is_respawned_exactly_once_per_detection() {
		let mut session = PiperSession::new("true", "unused.onnx", fast_framer());

		session.ensure_ready().await.unwrap();
		tokio::time::sleep(Duration::from_millis(100)).await;

		session.ensure_ready().await.unwrap();
		assert_eq!(session.restarts(), 1);

		session.release().await;
	}

	#[tokio::test]
	async fn repeated_death_does_not_leak_children() {
		let mut session = PiperSession::new("true", "unused.onnx", fast_framer());

		for _ in 0..3 {
			session.ensure_ready().await.unwrap();
			tokio::time::sleep(Duration::from_millis(100)).await;
		}

		// Each dead generation was reaped before the next spawn.
		assert!(session.restarts() >= 2);
		session.release().await;
	}

	// A response tail arriving after the inactivity cut stays with the
	// request that produced it; it never leaks into the next capture.
	#[tokio::test]
	async fn late_samples_from_a_cut_response_never_reach_the_next_request() {
		let script = fake_engine("late-tail", "printf FIRST\nsleep 1\nprintf LATE\nsleep 60");
		let framer = Framer {
			poll_interval: Duration::from_millis(50),
			deadline: Duration::from_millis(500),
		};
		let mut session = PiperSession::new(script.to_str().unwrap(), "unused.onnx", framer);

		let first = session.synthesize("one").await.unwrap();
		assert_eq!(first, b"FIRST");

		// Let the late tail land in the channel before the next request.
		tokio::time::sleep(Duration::from_millis(1200)).await;

		let second = session.synthesize("two").await.unwrap();
		assert!(second.is_empty());

		session.release().await;
		std::fs::remove_file(script).ok();
	}

	#[tokio::test]
	async fn release_discards_the_handle() {
		let mut session = PiperSession::new("true", "unused.onnx", fast_framer());
		session.ensure_ready().await.unwrap();
		session.release().await;
		assert!(session.child.is_none());
		assert!(session.stdin.is_none());
	}

	#[tokio::test]
	async fn missing_binary_fails_without_killing_the_session() {
		let mut session = PiperSession::new("definitely-not-a-real-engine", "unused.onnx", fast_framer());
		assert!(session.ensure_ready().await.is_err());
		// The session stays usable for the next attempt.
		assert!(session.ensure_ready().await.is_err());
	}
}
