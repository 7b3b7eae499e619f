use std::sync::Arc;
use std::time::Duration;

use redis::{Client, Commands, Connection};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::QueueError;
use crate::job::{error_record, ok_record};

/// Thin wrapper over the blocking-pop / publish-with-expiry primitives.
///
/// Holds one connection per worker process. On transport failure the worker
/// loop calls [`QueueClient::reconnect`] after its backoff interval; this
/// client never sleeps or retries on its own.
pub struct QueueClient {
	client: Client,
	conn: Arc<Mutex<Connection>>,
	queue_key: String,
	result_prefix: String,
}

impl QueueClient {
	/// Open a connection and verify it with a ping.
	///
	/// # Errors
	/// Returns an error if the Redis URL is invalid or the server is
	/// unreachable.
	pub fn connect(host: &str, port: u16, queue_key: &str, namespace: &str) -> Result<Self, QueueError> {
		let client = Client::open(format!("redis://{host}:{port}/"))?;
		let mut conn = client.get_connection()?;
		let _: String = redis::cmd("PING").query(&mut conn)?;

		Ok(Self {
			client,
			conn: Arc::new(Mutex::new(conn)),
			queue_key: queue_key.to_string(),
			result_prefix: format!("{namespace}:result:"),
		})
	}

	/// Blocking pop with a bounded wait.
	///
	/// Returns `Ok(None)` on timeout (not an error) so the worker loop can
	/// run its interrupt checks between waits.
	///
	/// # Errors
	/// Returns an error on Redis transport failure.
	pub async fn fetch(&self, timeout: Duration) -> Result<Option<String>, QueueError> {
		let mut conn = self.conn.lock().await;
		let popped: Option<(String, String)> = conn.brpop(&self.queue_key, timeout.as_secs_f64())?;
		drop(conn);
		Ok(popped.map(|(_, raw)| raw))
	}

	/// Publish a success record under the derived result key.
	///
	/// # Errors
	/// Returns an error if the output does not serialize to a JSON object
	/// or the write fails.
	pub async fn publish_ok<T: Serialize>(&self, job_id: &str, output: &T, ttl: Duration) -> Result<(), QueueError> {
		self.set_record(job_id, ok_record(output)?, ttl).await
	}

	/// Publish a failure record under the same key/TTL contract as success.
	///
	/// # Errors
	/// Returns an error if the write fails.
	pub async fn publish_error(&self, job_id: &str, message: &str, ttl: Duration) -> Result<(), QueueError> {
		self.set_record(job_id, error_record(message), ttl).await
	}

	async fn set_record(&self, job_id: &str, record: String, ttl: Duration) -> Result<(), QueueError> {
		let key = self.result_key(job_id);
		let mut conn = self.conn.lock().await;
		let _: () = conn.set_ex(&key, record, ttl.as_secs())?;
		drop(conn);
		debug!(key = %key, "result stored");
		Ok(())
	}

	/// Rebuild the connection after a transport failure. The caller owns
	/// the backoff policy.
	///
	/// # Errors
	/// Returns an error if the server is still unreachable.
	pub async fn reconnect(&self) -> Result<(), QueueError> {
		let mut fresh = self.client.get_connection()?;
		let _: String = redis::cmd("PING").query(&mut fresh)?;
		*self.conn.lock().await = fresh;
		Ok(())
	}

	#[must_use]
	pub fn result_key(&self, job_id: &str) -> String {
		format!("{}{}", self.result_prefix, job_id)
	}
}
