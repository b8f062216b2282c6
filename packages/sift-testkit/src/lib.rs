mod error;

pub use error::{Error, Result};

use std::{
	fs,
	path::{Path, PathBuf},
};

use tempfile::TempDir;

use sift_storage::vault::FsVault;

/// A throwaway on-disk vault for integration tests. The directory is removed
/// when the fixture drops.
pub struct TempVault {
	dir: TempDir,
}

impl TempVault {
	pub fn new() -> Result<Self> {
		Ok(Self { dir: tempfile::tempdir()? })
	}

	pub fn root(&self) -> &Path {
		self.dir.path()
	}

	/// A record-file path outside the markdown listing.
	pub fn index_path(&self) -> PathBuf {
		self.dir.path().join(".sift").join("index.jsonl")
	}

	pub fn vault(&self) -> FsVault {
		FsVault::new(self.dir.path())
	}

	/// Create or overwrite a note, creating parent folders as needed.
	pub fn note(&self, path: &str, text: &str) -> Result<()> {
		let absolute = self.absolute(path)?;

		if let Some(parent) = absolute.parent() {
			fs::create_dir_all(parent)?;
		}

		fs::write(absolute, text)?;

		Ok(())
	}

	pub fn remove(&self, path: &str) -> Result<()> {
		fs::remove_file(self.absolute(path)?)?;

		Ok(())
	}

	fn absolute(&self, path: &str) -> Result<PathBuf> {
		if path.is_empty() || path.starts_with('/') || path.contains("..") {
			return Err(Error::Message(format!("Refusing fixture path: {path}")));
		}

		Ok(self.dir.path().join(path))
	}
}
