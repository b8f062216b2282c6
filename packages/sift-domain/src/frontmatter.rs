/// Strip a leading YAML front matter block.
///
/// Returns the note body and the byte length of the stripped prefix. A block
/// is only recognized when the document starts with a `---` line and a
/// closing `---` (or `...`) line exists; otherwise the text is returned
/// unchanged.
pub fn strip(text: &str) -> (&str, usize) {
	let rest = match text.strip_prefix("---") {
		Some(rest) => rest,
		None => return (text, 0),
	};

	// The opening fence must be a whole line.
	let after_open = match rest.strip_prefix('\n') {
		Some(after) => after,
		None => match rest.strip_prefix("\r\n") {
			Some(after) => after,
			None => return (text, 0),
		},
	};

	let mut offset = text.len() - after_open.len();

	for line in after_open.split_inclusive('\n') {
		let trimmed = line.trim_end();

		if trimmed == "---" || trimmed == "..." {
			let end = offset + line.len();

			return (&text[end..], end);
		}

		offset += line.len();
	}

	(text, 0)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn strips_a_front_matter_block() {
		let note = "---\ntitle: Plan\ntags: [a]\n---\n# Heading\nBody.";
		let (body, skipped) = strip(note);

		assert_eq!(body, "# Heading\nBody.");
		assert_eq!(skipped, note.len() - body.len());
	}

	#[test]
	fn leaves_unfenced_text_alone() {
		let note = "# Heading\n---\nnot front matter";

		assert_eq!(strip(note), (note, 0));
	}

	#[test]
	fn unterminated_block_is_not_stripped() {
		let note = "---\ntitle: Plan\nno closing fence";

		assert_eq!(strip(note), (note, 0));
	}

	#[test]
	fn dash_prefix_without_newline_is_content() {
		let note = "--- dashes in prose ---";

		assert_eq!(strip(note), (note, 0));
	}
}
