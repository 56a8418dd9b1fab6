//! Simple file-backed [`SessionStore`] for desktop and CLI embedders.

// std
use std::{
	collections::BTreeMap,
	fs::{self, OpenOptions},
	io::{self, Write},
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	store::{SessionStore, StoreError, StoreFuture},
};

type Entries = BTreeMap<String, String>;

/// Persists the key-value map to a JSON object file after each mutation.
///
/// Keys are written in sorted order. A mutation is visible to readers only after the new file
/// has been synced and renamed over the old one.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	entries: Arc<RwLock<Entries>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	///
	/// A missing or blank file is an empty store; anything else must be a JSON object of
	/// strings.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
			fs::create_dir_all(dir).map_err(io_error("create directory", dir))?;
		}

		let entries = read_entries(&path)?;

		Ok(Self { path, entries: Arc::new(RwLock::new(entries)) })
	}

	/// Location of the backing file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn mutate<F>(&self, f: F) -> Result<(), StoreError>
	where
		F: FnOnce(&mut Entries) -> bool,
	{
		let mut entries = self.entries.write();
		let mut next = entries.clone();

		if !f(&mut next) {
			return Ok(());
		}

		write_entries(&self.path, &next)?;
		*entries = next;

		Ok(())
	}
}
impl SessionStore for FileStore {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		Box::pin(async move { Ok(self.entries.read().get(key).cloned()) })
	}

	fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.mutate(|entries| entries.insert(key.to_owned(), value.clone()) != Some(value))
		})
	}

	fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(async move { self.mutate(|entries| entries.remove(key).is_some()) })
	}
}

fn read_entries(path: &Path) -> Result<Entries, StoreError> {
	let bytes = match fs::read(path) {
		Ok(bytes) => bytes,
		Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Entries::new()),
		Err(e) => return Err(io_error("read", path)(e)),
	};

	if bytes.iter().all(u8::is_ascii_whitespace) {
		return Ok(Entries::new());
	}

	serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
		message: format!("Failed to parse {}: {e}", path.display()),
	})
}

fn write_entries(path: &Path, entries: &Entries) -> Result<(), StoreError> {
	let json = serde_json::to_vec_pretty(entries).map_err(|e| StoreError::Serialization {
		message: format!("Failed to serialize session entries: {e}"),
	})?;
	let staging = path.with_extension("tmp");
	let mut file = OpenOptions::new()
		.write(true)
		.create(true)
		.truncate(true)
		.open(&staging)
		.map_err(io_error("open", &staging))?;

	file.write_all(&json).map_err(io_error("write", &staging))?;
	file.sync_all().map_err(io_error("sync", &staging))?;
	drop(file);

	fs::rename(&staging, path).map_err(io_error("replace", path))
}

fn io_error<'a>(
	action: &'static str,
	path: &'a Path,
) -> impl FnOnce(io::Error) -> StoreError + 'a {
	move |e| StoreError::Backend { message: format!("Failed to {action} {}: {e}", path.display()) }
}
