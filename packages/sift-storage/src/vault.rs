use std::{
	collections::HashMap,
	path::{Path, PathBuf},
	sync::LazyLock,
	time::UNIX_EPOCH,
};

use regex::Regex;
use walkdir::WalkDir;

use crate::{
	BoxFuture, Error, Result,
	models::{DocumentMeta, Heading},
};

static WIKI_LINK_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\[\[([^\[\]]+)\]\]").expect("Wiki link pattern must compile."));

/// The host document store. The vault is always the source of truth for note
/// content; everything sift persists is derived from it.
pub trait Vault
where
	Self: Send + Sync,
{
	fn list_documents(&self) -> BoxFuture<'_, Result<Vec<DocumentMeta>>>;
	fn read_document<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<String>>;
	fn headings<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Vec<Heading>>>;
	fn outgoing_links<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Vec<String>>>;
	fn backlinks<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Vec<String>>>;
	/// Bounded keyword candidate scan: documents whose content or path
	/// contains any of the given lowercased terms, in listing order, capped
	/// at `limit`.
	fn scan<'a>(&'a self, terms: &'a [String], limit: usize)
	-> BoxFuture<'a, Result<Vec<String>>>;
}

/// Filesystem vault: a directory tree of markdown notes addressed by
/// forward-slash relative paths.
pub struct FsVault {
	root: PathBuf,
}

impl FsVault {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	fn absolute(&self, path: &str) -> Result<PathBuf> {
		if !sift_domain::notepath::is_valid_note_path(path) {
			return Err(Error::InvalidArgument { message: format!("Invalid note path: {path}") });
		}

		Ok(self.root.join(path))
	}

	fn walk(&self) -> Vec<DocumentMeta> {
		let mut out = Vec::new();

		for entry in WalkDir::new(&self.root).follow_links(false).into_iter().filter_map(|entry| entry.ok())
		{
			if !entry.file_type().is_file() {
				continue;
			}

			let Ok(relative) = entry.path().strip_prefix(&self.root) else {
				continue;
			};
			let path = relative.to_string_lossy().replace('\\', "/");

			if !sift_domain::notepath::is_valid_note_path(&path) {
				continue;
			}

			let mtime_ms = entry
				.metadata()
				.ok()
				.and_then(|meta| meta.modified().ok())
				.and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
				.map(|duration| duration.as_millis() as i64)
				.unwrap_or(0);

			out.push(DocumentMeta { path, mtime_ms });
		}

		out.sort_by(|lhs, rhs| lhs.path.cmp(&rhs.path));

		out
	}
}

impl Vault for FsVault {
	fn list_documents(&self) -> BoxFuture<'_, Result<Vec<DocumentMeta>>> {
		Box::pin(async move { Ok(self.walk()) })
	}

	fn read_document<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move {
			let absolute = self.absolute(path)?;

			Ok(tokio::fs::read_to_string(absolute).await?)
		})
	}

	fn headings<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Vec<Heading>>> {
		Box::pin(async move {
			let text = self.read_document(path).await?;

			Ok(parse_headings(&text))
		})
	}

	fn outgoing_links<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Vec<String>>> {
		Box::pin(async move {
			let text = self.read_document(path).await?;
			let documents = self.walk();

			Ok(resolve_links(&parse_wiki_links(&text), &documents))
		})
	}

	fn backlinks<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Vec<String>>> {
		Box::pin(async move {
			let documents = self.walk();
			let mut out = Vec::new();

			for document in &documents {
				if document.path == path {
					continue;
				}

				let Ok(text) = self.read_document(&document.path).await else {
					continue;
				};
				let links = resolve_links(&parse_wiki_links(&text), &documents);

				if links.iter().any(|link| link == path) {
					out.push(document.path.clone());
				}
			}

			Ok(out)
		})
	}

	fn scan<'a>(
		&'a self,
		terms: &'a [String],
		limit: usize,
	) -> BoxFuture<'a, Result<Vec<String>>> {
		Box::pin(async move {
			if terms.is_empty() || limit == 0 {
				return Ok(Vec::new());
			}

			let lowered: Vec<String> = terms.iter().map(|term| term.to_lowercase()).collect();
			let mut out = Vec::new();

			for document in self.walk() {
				let path_lower = document.path.to_lowercase();

				let matched = if lowered.iter().any(|term| path_lower.contains(term.as_str())) {
					true
				} else {
					match self.read_document(&document.path).await {
						Ok(text) => {
							let content = text.to_lowercase();

							lowered.iter().any(|term| content.contains(term.as_str()))
						},
						Err(_) => false,
					}
				};

				if matched {
					out.push(document.path);

					if out.len() >= limit {
						break;
					}
				}
			}

			Ok(out)
		})
	}
}

/// ATX headings with their byte offsets, skipping fenced code blocks.
pub fn parse_headings(text: &str) -> Vec<Heading> {
	let mut out = Vec::new();
	let mut offset = 0_usize;
	let mut in_fence = false;

	for line in text.split_inclusive('\n') {
		let trimmed = line.trim();

		if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
			in_fence = !in_fence;
		} else if !in_fence && line.starts_with('#') {
			let level = line.chars().take_while(|ch| *ch == '#').count();

			if level <= 6
				&& let Some(rest) = line.get(level..)
				&& rest.starts_with(' ')
			{
				out.push(Heading { text: rest.trim().to_string(), offset });
			}
		}

		offset += line.len();
	}

	out
}

/// Raw `[[wiki]]` link targets with aliases and heading anchors stripped.
pub fn parse_wiki_links(text: &str) -> Vec<String> {
	let mut out = Vec::new();

	for capture in WIKI_LINK_RE.captures_iter(text) {
		let raw = capture[1].trim();
		let target = raw.split('|').next().unwrap_or(raw);
		let target = target.split('#').next().unwrap_or(target).trim();

		if !target.is_empty() {
			out.push(target.to_string());
		}
	}

	out
}

/// Resolve link targets against the document listing: an exact path match
/// first, then a unique title match.
pub fn resolve_links(targets: &[String], documents: &[DocumentMeta]) -> Vec<String> {
	let mut by_title: HashMap<&str, Vec<&str>> = HashMap::new();

	for document in documents {
		by_title
			.entry(sift_domain::notepath::note_title(&document.path))
			.or_default()
			.push(document.path.as_str());
	}

	let mut out = Vec::new();

	for target in targets {
		let with_ext = if target.ends_with(".md") {
			target.clone()
		} else {
			format!("{target}.md")
		};

		if documents.iter().any(|document| document.path == with_ext) {
			if !out.contains(&with_ext) {
				out.push(with_ext);
			}

			continue;
		}

		if let Some(paths) = by_title.get(target.as_str())
			&& paths.len() == 1
		{
			let path = paths[0].to_string();

			if !out.contains(&path) {
				out.push(path);
			}
		}
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_atx_headings_with_offsets() {
		let text = "intro\n# One\nbody\n## Two\n";
		let headings = parse_headings(text);

		assert_eq!(headings.len(), 2);
		assert_eq!(headings[0], Heading { text: "One".to_string(), offset: 6 });
		assert_eq!(headings[1], Heading { text: "Two".to_string(), offset: 17 });
	}

	#[test]
	fn skips_headings_inside_code_fences() {
		let text = "```\n# not a heading\n```\n# Real\n";
		let headings = parse_headings(text);

		assert_eq!(headings.len(), 1);
		assert_eq!(headings[0].text, "Real");
	}

	#[test]
	fn hash_without_space_is_not_a_heading() {
		assert!(parse_headings("#tag line\n").is_empty());
	}

	#[test]
	fn wiki_links_strip_aliases_and_anchors() {
		let links = parse_wiki_links("see [[Target|alias]] and [[Other#Section]]");

		assert_eq!(links, vec!["Target", "Other"]);
	}

	#[test]
	fn resolves_links_by_path_then_unique_title() {
		let documents = vec![
			DocumentMeta { path: "a/plan.md".to_string(), mtime_ms: 0 },
			DocumentMeta { path: "b/notes.md".to_string(), mtime_ms: 0 },
		];
		let targets = vec!["a/plan".to_string(), "notes".to_string(), "missing".to_string()];

		assert_eq!(resolve_links(&targets, &documents), vec!["a/plan.md", "b/notes.md"]);
	}
}
