use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::QueueError;

/// One unit of work pulled off the queue.
///
/// The envelope only commits to the `job_id` field; the remaining payload
/// fields are worker-specific and decoded on demand. Immutable once read.
#[derive(Debug, Clone)]
pub struct JobEnvelope {
	job_id: String,
	value: Value,
}

impl JobEnvelope {
	/// Parse a raw queue item.
	///
	/// # Errors
	/// Returns an error if the item is not a JSON object or carries no
	/// usable `job_id`. Such items cannot be answered at all (there is no
	/// key to publish a result under), so callers log and skip them.
	pub fn parse(raw: &str) -> Result<Self, QueueError> {
		let value: Value = serde_json::from_str(raw)?;
		let job_id = value
			.get("job_id")
			.and_then(Value::as_str)
			.filter(|id| !id.is_empty())
			.ok_or_else(|| QueueError::Envelope("missing or empty job_id".to_string()))?
			.to_string();
		Ok(Self { job_id, value })
	}

	#[must_use]
	pub fn job_id(&self) -> &str {
		&self.job_id
	}

	/// Decode the payload into a worker-specific type.
	///
	/// # Errors
	/// Returns an error when required payload fields are missing or of the
	/// wrong type; the worker publishes this as a job error result.
	pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
		serde_json::from_value(self.value.clone())
	}
}

/// Serialize a success record: the output's own fields plus `status: "ok"`.
pub(crate) fn ok_record<T: Serialize>(output: &T) -> Result<String, QueueError> {
	let mut value = serde_json::to_value(output).map_err(QueueError::Json)?;
	let Some(fields) = value.as_object_mut() else {
		return Err(QueueError::Record("result output must serialize to a JSON object".to_string()));
	};
	fields.insert("status".to_string(), Value::String("ok".to_string()));
	Ok(value.to_string())
}

/// Serialize a failure record. The message is the caller's only signal, so
/// an empty one is replaced with a generic marker.
pub(crate) fn error_record(message: &str) -> String {
	let message = if message.is_empty() { "unknown error" } else { message };
	json!({ "status": "error", "error": message }).to_string()
}
