use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::{Result, models::ChunkRecord};

/// Newline-delimited JSON persistence for the semantic index: one
/// `ChunkRecord` object per line, UTF-8, no header or trailer.
pub struct RecordStore {
	path: PathBuf,
}

impl RecordStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Read every persisted record. A missing or unreadable file reads as an
	/// empty index; unparseable lines are skipped. Neither is an error for
	/// the caller.
	pub async fn load(&self) -> Vec<ChunkRecord> {
		let raw = match tokio::fs::read_to_string(&self.path).await {
			Ok(raw) => raw,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
			Err(err) => {
				tracing::warn!(
					path = %self.path.display(),
					error = %err,
					"Failed to read index records; treating index as empty."
				);

				return Vec::new();
			},
		};
		let mut out = Vec::new();
		let mut skipped = 0_usize;

		for line in raw.lines() {
			if line.trim().is_empty() {
				continue;
			}

			match serde_json::from_str::<ChunkRecord>(line) {
				Ok(record) => out.push(record),
				Err(_) => skipped += 1,
			}
		}

		if skipped > 0 {
			tracing::warn!(
				path = %self.path.display(),
				skipped,
				"Skipped unparseable index record lines."
			);
		}

		out
	}

	/// Replace the whole record set (last-writer-wins).
	pub async fn replace_all(&self, records: &[ChunkRecord]) -> Result<()> {
		self.ensure_parent().await?;

		let mut buffer = String::new();

		for record in records {
			buffer.push_str(&serde_json::to_string(record)?);
			buffer.push('\n');
		}

		tokio::fs::write(&self.path, buffer).await?;

		Ok(())
	}

	/// Append a batch of records. Used during a full rebuild so each
	/// completed batch is durable even if a later one fails.
	pub async fn append(&self, records: &[ChunkRecord]) -> Result<()> {
		if records.is_empty() {
			return Ok(());
		}

		self.ensure_parent().await?;

		let mut buffer = String::new();

		for record in records {
			buffer.push_str(&serde_json::to_string(record)?);
			buffer.push('\n');
		}

		let mut file = tokio::fs::OpenOptions::new()
			.create(true)
			.append(true)
			.open(&self.path)
			.await?;

		file.write_all(buffer.as_bytes()).await?;
		file.flush().await?;

		Ok(())
	}

	/// Truncate the record file, the first step of a full rebuild.
	pub async fn truncate(&self) -> Result<()> {
		self.ensure_parent().await?;

		tokio::fs::write(&self.path, b"").await?;

		Ok(())
	}

	async fn ensure_parent(&self) -> Result<()> {
		if let Some(parent) = self.path.parent()
			&& !parent.as_os_str().is_empty()
		{
			tokio::fs::create_dir_all(parent).await?;
		}

		Ok(())
	}
}
