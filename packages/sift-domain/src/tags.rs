use std::{collections::HashSet, sync::LazyLock};

use regex::Regex;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"#[\p{L}\p{N}_][\p{L}\p{N}_/-]*").expect("Tag pattern must compile.")
});

/// Recall terms derived from the hashtags in a query.
///
/// Every `#Tag/Sub` token expands into the lowercased full tag, the tag path
/// without its `#`, and each path segment on its own, in that order:
/// `#Project/Alpha` yields `#project/alpha`, `project/alpha`, `project`,
/// `alpha`. Output is deduplicated and order-stable.
pub fn expand_tags(query: &str) -> Vec<String> {
	let mut out = Vec::new();
	let mut seen = HashSet::new();

	for found in TAG_RE.find_iter(query) {
		let tag = found.as_str().to_lowercase();
		let path = tag.trim_start_matches('#').trim_matches('/').to_string();

		if path.is_empty() {
			continue;
		}

		push_term(&mut out, &mut seen, &tag);
		push_term(&mut out, &mut seen, &path);

		if path.contains('/') {
			for segment in path.split('/') {
				if !segment.is_empty() {
					push_term(&mut out, &mut seen, segment);
				}
			}
		}
	}

	out
}

/// The query with hashtag markers removed, for engines that treat `#` as
/// punctuation.
pub fn strip_tag_markers(query: &str) -> String {
	query.replace('#', " ")
}

fn push_term(out: &mut Vec<String>, seen: &mut HashSet<String>, term: &str) {
	if seen.insert(term.to_string()) {
		out.push(term.to_string());
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn expands_hierarchical_tag_into_path_and_segments() {
		let terms = expand_tags("#Project/Alpha update");

		assert_eq!(terms, vec!["#project/alpha", "project/alpha", "project", "alpha"]);
	}

	#[test]
	fn flat_tag_yields_tag_and_bare_form() {
		let terms = expand_tags("notes about #Rust");

		assert_eq!(terms, vec!["#rust", "rust"]);
	}

	#[test]
	fn deduplicates_repeated_tags() {
		let terms = expand_tags("#a/b and #A/B again");

		assert_eq!(terms, vec!["#a/b", "a/b", "a", "b"]);
	}

	#[test]
	fn query_without_tags_expands_to_nothing() {
		assert!(expand_tags("plain query with no tags").is_empty());
	}
}
