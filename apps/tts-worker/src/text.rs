/// Split text into sentence-sized chunks for streaming synthesis.
///
/// A sentence ends after `.`, `!`, `?` or `:` when the next character is
/// whitespace (or the end of input), so decimals like `3.14` stay intact.
/// Empty fragments are dropped.
pub fn split_sentences(text: &str) -> Vec<String> {
	let mut sentences = Vec::new();
	let mut start = 0;

	let mut chars = text.char_indices().peekable();
	while let Some((i, c)) = chars.next() {
		if matches!(c, '.' | '!' | '?' | ':') && chars.peek().is_none_or(|&(_, next)| next.is_whitespace()) {
			let end = i + c.len_utf8();
			let sentence = text[start..end].trim();
			if !sentence.is_empty() {
				sentences.push(sentence.to_string());
			}
			start = end;
		}
	}

	let tail = text[start..].trim();
	if !tail.is_empty() {
		sentences.push(tail.to_string());
	}

	sentences
}
