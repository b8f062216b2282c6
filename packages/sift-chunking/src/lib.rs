use sift_domain::frontmatter;

/// Separator cascade for sections that exceed the size budget, coarsest
/// first. The empty separator is the terminal per-character split.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

#[derive(Clone, Debug)]
pub struct ChunkingConfig {
	pub max_chars: usize,
	pub overlap: usize,
}

impl Default for ChunkingConfig {
	fn default() -> Self {
		Self { max_chars: 4_000, overlap: 0 }
	}
}

/// A heading offset pair as reported by the document store, byte offsets
/// relative to the full document text.
#[derive(Clone, Debug)]
pub struct HeadingMark {
	pub offset: usize,
	pub text: String,
}

#[derive(Clone, Debug)]
pub struct Fragment {
	pub chunk_index: u32,
	pub heading: String,
	pub text: String,
	pub content_hash: String,
}

/// Split one note into size-bounded fragments.
///
/// Front matter is stripped first. A note that fits the budget whole (with
/// its synthetic title header) becomes a single fragment; anything larger is
/// split by heading section, oversized sections go through the separator
/// cascade, and tiny structural fragments are coalesced so no fragment is a
/// bare heading with no retrievable body. For a fixed input the fragment list
/// is deterministic and order-stable.
pub fn split_note(
	title: &str,
	text: &str,
	headings: &[HeadingMark],
	cfg: &ChunkingConfig,
) -> Vec<Fragment> {
	let (body, skipped) = frontmatter::strip(text);

	if body.trim().is_empty() {
		return Vec::new();
	}

	let wrapped = format!("NOTE TITLE: [[{title}]]\n\nNOTE BLOCK CONTENT: {}", body.trim_end());

	if char_len(&wrapped) <= cfg.max_chars {
		return finalize(vec![(String::new(), wrapped)]);
	}

	let mut pieces: Vec<(String, String)> = Vec::new();

	for section in sections(body, headings, skipped) {
		if char_len(&section.text) <= cfg.max_chars {
			pieces.push((section.heading.clone(), section.text));

			continue;
		}

		let mut parts = Vec::new();

		split_recursive(&section.text, cfg.max_chars, SEPARATORS, &mut parts);

		if cfg.overlap > 0 {
			apply_overlap(&mut parts, cfg.overlap);
		}

		for part in parts {
			pieces.push((section.heading.clone(), part));
		}
	}

	coalesce(&mut pieces, cfg.max_chars);

	finalize(pieces)
}

/// Lightweight integrity hash: character count plus a normalized sample of
/// the fragment's head and tail. Not a cryptographic digest.
pub fn content_hash(text: &str) -> String {
	let normalized: String = text
		.split_whitespace()
		.collect::<Vec<_>>()
		.join(" ")
		.chars()
		.flat_map(char::to_lowercase)
		.collect();
	let chars: Vec<char> = normalized.chars().collect();
	let head: String = chars.iter().take(16).collect();
	let tail: String = if chars.len() > 16 {
		chars[chars.len().saturating_sub(16)..].iter().collect()
	} else {
		String::new()
	};

	format!("{}:{head}{tail}", chars.len())
}

struct Section {
	heading: String,
	text: String,
}

fn sections(body: &str, headings: &[HeadingMark], skipped: usize) -> Vec<Section> {
	// Heading offsets are relative to the original document; shift them past
	// the stripped front matter and drop any that fell inside it.
	let mut marks: Vec<(usize, &str)> = headings
		.iter()
		.filter(|mark| mark.offset >= skipped)
		.map(|mark| (mark.offset - skipped, mark.text.as_str()))
		.filter(|(offset, _)| *offset <= body.len() && body.is_char_boundary(*offset))
		.collect();

	marks.sort_by_key(|(offset, _)| *offset);

	if marks.is_empty() {
		return vec![Section { heading: String::new(), text: body.trim_end().to_string() }];
	}

	let mut out = Vec::new();
	let preamble = &body[..marks[0].0];

	if !preamble.trim().is_empty() {
		out.push(Section { heading: String::new(), text: preamble.trim_end().to_string() });
	}

	for (idx, (offset, heading)) in marks.iter().enumerate() {
		let end = marks.get(idx + 1).map(|(next, _)| *next).unwrap_or(body.len());
		let text = body[*offset..end].trim_end();

		if text.is_empty() {
			continue;
		}

		out.push(Section { heading: (*heading).to_string(), text: text.to_string() });
	}

	out
}

fn split_recursive(text: &str, max_chars: usize, separators: &[&str], out: &mut Vec<String>) {
	if char_len(text) <= max_chars {
		if !text.trim().is_empty() {
			out.push(text.to_string());
		}

		return;
	}

	let Some((separator, rest)) = separators.split_first() else {
		// Splitting itself failed; emit the oversized text as a single
		// fragment rather than dropping content.
		tracing::warn!(len = text.len(), "Separator cascade exhausted; emitting oversized fragment.");
		out.push(text.to_string());

		return;
	};

	if separator.is_empty() {
		let chars: Vec<char> = text.chars().collect();

		for window in chars.chunks(max_chars.max(1)) {
			out.push(window.iter().collect());
		}

		return;
	}

	let mut buffer = String::new();

	for piece in split_keeping_separator(text, separator) {
		if char_len(piece) > max_chars {
			if !buffer.trim().is_empty() {
				out.push(std::mem::take(&mut buffer));
			} else {
				buffer.clear();
			}

			split_recursive(piece, max_chars, rest, out);

			continue;
		}
		if char_len(&buffer) + char_len(piece) > max_chars && !buffer.trim().is_empty() {
			out.push(std::mem::take(&mut buffer));
		}

		buffer.push_str(piece);
	}

	if !buffer.trim().is_empty() {
		out.push(buffer);
	}
}

fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
	let mut out = Vec::new();
	let mut start = 0;

	while let Some(found) = text[start..].find(separator) {
		let end = start + found + separator.len();

		out.push(&text[start..end]);

		start = end;
	}

	if start < text.len() {
		out.push(&text[start..]);
	}

	out
}

fn apply_overlap(parts: &mut Vec<String>, overlap: usize) {
	if parts.len() < 2 {
		return;
	}

	let mut tails: Vec<String> = Vec::with_capacity(parts.len());

	for part in parts.iter() {
		let chars: Vec<char> = part.chars().collect();
		let start = chars.len().saturating_sub(overlap);

		tails.push(chars[start..].iter().collect());
	}

	for idx in (1..parts.len()).rev() {
		let tail = tails[idx - 1].clone();

		parts[idx] = format!("{tail}{}", parts[idx]);
	}
}

fn coalesce(pieces: &mut Vec<(String, String)>, max_chars: usize) {
	// Merge heading-only fragments forward into their successor.
	let mut idx = 0;

	while idx + 1 < pieces.len() {
		if is_heading_only(&pieces[idx].1)
			&& char_len(&pieces[idx].1) + 1 + char_len(&pieces[idx + 1].1) <= max_chars
		{
			let (heading, text) = pieces.remove(idx);
			let next = &mut pieces[idx];

			next.1 = format!("{text}\n{}", next.1);

			if next.0.is_empty() {
				next.0 = heading;
			}

			continue;
		}

		idx += 1;
	}

	// Merge a lone trailing tiny fragment backward.
	if pieces.len() >= 2 {
		let last_len = char_len(&pieces[pieces.len() - 1].1);
		let prev_len = char_len(&pieces[pieces.len() - 2].1);

		if last_len * 8 < max_chars
			&& prev_len + 1 + last_len <= max_chars
			&& let Some((_, text)) = pieces.pop()
			&& let Some(prev) = pieces.last_mut()
		{
			prev.1 = format!("{}\n{text}", prev.1);
		}
	}
}

fn is_heading_only(text: &str) -> bool {
	let trimmed = text.trim();

	!trimmed.is_empty() && !trimmed.contains('\n') && trimmed.starts_with('#')
}

fn finalize(pieces: Vec<(String, String)>) -> Vec<Fragment> {
	pieces
		.into_iter()
		.enumerate()
		.map(|(idx, (heading, text))| Fragment {
			chunk_index: idx as u32,
			heading,
			content_hash: content_hash(&text),
			text,
		})
		.collect()
}

fn char_len(text: &str) -> usize {
	text.chars().count()
}
