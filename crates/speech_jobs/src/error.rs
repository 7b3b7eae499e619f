use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
	#[error("Redis error: {0}")]
	Redis(#[from] redis::RedisError),
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
	#[error("Malformed job envelope: {0}")]
	Envelope(String),
	#[error("Unpublishable result: {0}")]
	Record(String),
}

impl QueueError {
	/// Transport-level failures are recovered by the worker loop with
	/// backoff-and-reconnect; everything else stays job-scoped.
	#[must_use]
	pub fn is_transport(&self) -> bool {
		match self {
			Self::Redis(e) => e.is_connection_refusal() || e.is_connection_dropped() || e.is_io_error() || e.is_timeout(),
			_ => false,
		}
	}
}

/// Failure of a single job, caught at the job boundary and published as an
/// error result under the same key/TTL contract as success.
#[derive(Error, Debug)]
pub enum JobError {
	#[error("invalid payload: {0}")]
	Decode(String),
	#[error("engine failure: {0}")]
	Engine(String),
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn envelope_errors_are_not_transport() {
		let err = QueueError::Envelope("missing job_id".to_string());
		assert!(!err.is_transport());
	}

	#[test]
	fn json_errors_are_not_transport() {
		let err = QueueError::from(serde_json::from_str::<serde_json::Value>("{").unwrap_err());
		assert!(!err.is_transport());
	}

	#[test]
	fn io_redis_errors_are_transport() {
		let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
		let err = QueueError::from(redis::RedisError::from(io));
		assert!(err.is_transport());
	}

	#[test]
	fn job_error_messages_are_non_empty() {
		assert!(!JobError::Decode("bad base64".to_string()).to_string().is_empty());
		assert!(!JobError::Engine("process exited".to_string()).to_string().is_empty());
	}
}
