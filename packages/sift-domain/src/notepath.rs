/// Whether a vault-relative path is safe to hand to the document store.
///
/// Rejects empty paths, absolute paths, Windows drive prefixes, traversal
/// segments, and anything that is not a markdown note. Callers filter rather
/// than error on invalid paths.
pub fn is_valid_note_path(path: &str) -> bool {
	if path.is_empty() || path.len() > 4_096 {
		return false;
	}
	if path.starts_with('/') || path.starts_with('\\') {
		return false;
	}
	if path.len() >= 2 && path.as_bytes()[1] == b':' {
		return false;
	}
	if path.split(['/', '\\']).any(|segment| segment == "..") {
		return false;
	}

	path.ends_with(".md") || path.ends_with(".markdown")
}

/// Parent folder of a vault-relative path, empty for root-level notes.
pub fn parent_folder(path: &str) -> &str {
	match path.rfind('/') {
		Some(idx) => &path[..idx],
		None => "",
	}
}

/// The note title: file stem without folders or extension.
pub fn note_title(path: &str) -> &str {
	let name = path.rsplit('/').next().unwrap_or(path);

	name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name)
}
