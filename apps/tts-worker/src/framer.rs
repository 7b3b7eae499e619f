use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};

/// Segments an unframed byte stream into one bounded response.
///
/// The engine emits raw samples with no end marker, so completion is
/// inferred from inactivity: once at least one byte has arrived, a poll
/// interval with no new bytes ends the response. The hard deadline caps
/// the whole capture regardless of activity; whatever was accumulated by
/// then is returned, partial or empty.
///
/// Inactivity framing is racy under scheduler jitter (a slow flush can be
/// mistaken for completion); the deadline bounds the damage.
#[derive(Debug, Clone, Copy)]
pub struct Framer {
	pub poll_interval: Duration,
	pub deadline: Duration,
}

impl Framer {
	/// Accumulate chunks from the engine's output channel until the
	/// response is complete.
	pub async fn collect(&self, rx: &mut mpsc::Receiver<Vec<u8>>) -> Vec<u8> {
		let started = Instant::now();
		let mut buf = Vec::new();

		loop {
			let remaining = match self.deadline.checked_sub(started.elapsed()) {
				Some(remaining) if !remaining.is_zero() => remaining,
				_ => break,
			};
			let wait = self.poll_interval.min(remaining);

			match timeout(wait, rx.recv()).await {
				Ok(Some(chunk)) => buf.extend_from_slice(&chunk),
				// Engine closed its output stream; nothing more will come.
				Ok(None) => break,
				// Inactivity after data = completion.
				Err(_) if !buf.is_empty() => break,
				// Nothing yet; keep waiting for the first byte.
				Err(_) => {}
			}
		}

		buf
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn framer(poll_ms: u64, deadline_ms: u64) -> Framer {
		Framer {
			poll_interval: Duration::from_millis(poll_ms),
			deadline: Duration::from_millis(deadline_ms),
		}
	}

	#[tokio::test]
	async fn returns_bytes_on_inactivity_without_waiting_for_deadline() {
		let (tx, mut rx) = mpsc::channel(8);
		tokio::spawn(async move {
			tx.send(vec![1, 2, 3]).await.unwrap();
			tx.send(vec![4, 5]).await.unwrap();
			// Pause "indefinitely" relative to the deadline.
			tokio::time::sleep(Duration::from_secs(60)).await;
			drop(tx);
		});

		let started = Instant::now();
		let collected = framer(50, 10_000).collect(&mut rx).await;

		assert_eq!(collected, vec![1, 2, 3, 4, 5]);
		assert!(started.elapsed() < Duration::from_secs(2), "must not wait for the hard deadline");
	}

	#[tokio::test]
	async fn silent_engine_yields_empty_buffer_at_deadline() {
		let (tx, mut rx) = mpsc::channel::<Vec<u8>>(8);

		let started = Instant::now();
		let collected = framer(20, 150).collect(&mut rx).await;

		assert!(collected.is_empty());
		assert!(started.elapsed() >= Duration::from_millis(150));
		drop(tx);
	}

	#[tokio::test]
	async fn continuous_stream_is_cut_at_deadline() {
		let (tx, mut rx) = mpsc::channel(64);
		tokio::spawn(async move {
			loop {
				if tx.send(vec![0u8; 16]).await.is_err() {
					break;
				}
				tokio::time::sleep(Duration::from_millis(10)).await;
			}
		});

		let started = Instant::now();
		let collected = framer(100, 200).collect(&mut rx).await;

		assert!(!collected.is_empty());
		assert!(started.elapsed() >= Duration::from_millis(200));
		assert!(started.elapsed() < Duration::from_secs(5));
	}

	#[tokio::test]
	async fn closed_stream_ends_the_response_immediately() {
		let (tx, mut rx) = mpsc::channel(8);
		tx.send(vec![9, 9]).await.unwrap();
		drop(tx);

		let started = Instant::now();
		let collected = framer(300, 15_000).collect(&mut rx).await;

		assert_eq!(collected, vec![9, 9]);
		assert!(started.elapsed() < Duration::from_secs(2));
	}
}
