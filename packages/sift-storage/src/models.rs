/// A bounded fragment of a note, the atomic unit of indexing and retrieval.
#[derive(Clone, Debug, PartialEq)]
pub struct Chunk {
	pub id: String,
	pub path: String,
	pub chunk_index: u32,
	pub content: String,
	pub content_hash: String,
	pub title: String,
	pub heading: String,
	pub mtime_ms: i64,
}

/// One persisted line of the semantic index.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChunkRecord {
	pub id: String,
	pub path: String,
	pub title: String,
	pub mtime: i64,
	pub ctime: i64,
	pub embedding: Vec<f32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentMeta {
	pub path: String,
	pub mtime_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Heading {
	pub text: String,
	pub offset: usize,
}

/// Chunk identity: the vault-relative path plus a non-padded document-order
/// index, `notes/plan.md#3`.
pub fn chunk_id(path: &str, chunk_index: u32) -> String {
	format!("{path}#{chunk_index}")
}

/// The document path component of a chunk id.
pub fn chunk_id_path(id: &str) -> &str {
	id.rsplit_once('#').map(|(path, _)| path).unwrap_or(id)
}
