/// Sample-format descriptor for the engine's raw output.
#[derive(Debug, Clone, Copy)]
pub struct PcmFormat {
	pub sample_rate: u32,
	pub channels: u16,
	pub bits_per_sample: u16,
}

impl PcmFormat {
	pub fn block_align(&self) -> u16 {
		self.channels * (self.bits_per_sample / 8)
	}

	pub fn byte_rate(&self) -> u32 {
		self.sample_rate * u32::from(self.block_align())
	}
}

/// Wrap raw little-endian PCM samples in a minimal self-describing WAV
/// container: the fixed 44-byte preamble followed by the data bytes.
/// Every length field is computed from the actual payload size.
pub fn write_wav(samples: &[u8], format: PcmFormat) -> Vec<u8> {
	let data_len = samples.len() as u32;
	let mut buf = Vec::with_capacity(44 + samples.len());

	// RIFF header
	buf.extend_from_slice(b"RIFF");
	buf.extend_from_slice(&(36 + data_len).to_le_bytes());
	buf.extend_from_slice(b"WAVE");

	// fmt subchunk
	buf.extend_from_slice(b"fmt ");
	buf.extend_from_slice(&16u32.to_le_bytes());
	buf.extend_from_slice(&1u16.to_le_bytes()); // linear PCM
	buf.extend_from_slice(&format.channels.to_le_bytes());
	buf.extend_from_slice(&format.sample_rate.to_le_bytes());
	buf.extend_from_slice(&format.byte_rate().to_le_bytes());
	buf.extend_from_slice(&format.block_align().to_le_bytes());
	buf.extend_from_slice(&format.bits_per_sample.to_le_bytes());

	// data subchunk
	buf.extend_from_slice(b"data");
	buf.extend_from_slice(&data_len.to_le_bytes());
	buf.extend_from_slice(samples);

	buf
}

/// Estimated playback duration of a raw PCM payload.
pub fn duration_ms(data_len: usize, format: PcmFormat) -> u64 {
	let byte_rate = u64::from(format.byte_rate());
	if byte_rate == 0 {
		return 0;
	}
	(data_len as u64) * 1000 / byte_rate
}

#[cfg(test)]
mod tests {
	use super::*;

	fn u16_at(buf: &[u8], offset: usize) -> u16 {
		u16::from_le_bytes([buf[offset], buf[offset + 1]])
	}

	fn u32_at(buf: &[u8], offset: usize) -> u32 {
		u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
	}

	/// Decode the fixed 44-byte preamble back into (rate, channels, bits,
	/// data length).
	fn parse_header(buf: &[u8]) -> (u32, u16, u16, u32) {
		assert!(buf.len() >= 44);
		assert_eq!(&buf[0..4], b"RIFF");
		assert_eq!(&buf[8..12], b"WAVE");
		assert_eq!(&buf[12..16], b"fmt ");
		assert_eq!(u32_at(buf, 16), 16, "fmt chunk size");
		assert_eq!(u16_at(buf, 20), 1, "PCM format tag");
		assert_eq!(&buf[36..40], b"data");

		(u32_at(buf, 24), u16_at(buf, 22), u16_at(buf, 34), u32_at(buf, 40))
	}

	const VOICE_FORMAT: PcmFormat = PcmFormat {
		sample_rate: 22050,
		channels: 1,
		bits_per_sample: 16,
	};

	#[test]
	fn round_trips_header_fields() {
		let samples = vec![0u8; 4410];
		let container = write_wav(&samples, VOICE_FORMAT);

		let (rate, channels, bits, data_len) = parse_header(&container);
		assert_eq!(rate, 22050);
		assert_eq!(channels, 1);
		assert_eq!(bits, 16);
		assert_eq!(data_len as usize, samples.len());
		assert_eq!(container.len(), 44 + samples.len());
	}

	#[test]
	fn round_trips_empty_payload() {
		let container = write_wav(&[], VOICE_FORMAT);

		let (rate, channels, bits, data_len) = parse_header(&container);
		assert_eq!((rate, channels, bits, data_len), (22050, 1, 16, 0));
		assert_eq!(container.len(), 44);
		assert_eq!(u32_at(&container, 4), 36, "RIFF size counts header remainder only");
	}

	#[test]
	fn derived_fields_follow_the_format() {
		let stereo = PcmFormat {
			sample_rate: 16000,
			channels: 2,
			bits_per_sample: 16,
		};
		let container = write_wav(&[0u8; 8], stereo);

		assert_eq!(u32_at(&container, 28), 64000, "byte rate");
		assert_eq!(u16_at(&container, 32), 4, "block align");
	}

	#[test]
	fn duration_estimate_matches_byte_rate() {
		// One second of 22.05kHz mono s16le.
		assert_eq!(duration_ms(44100, VOICE_FORMAT), 1000);
		assert_eq!(duration_ms(0, VOICE_FORMAT), 0);
		assert_eq!(duration_ms(22050, VOICE_FORMAT), 500);
	}
}
