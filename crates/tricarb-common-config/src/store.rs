// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Persisted daemon state addressed by dotted keys (`default.cidr`, `wg.peers`).
//!
//! The whole document is loaded once when the store is opened and rewritten
//! after every mutation. Writes go to a sibling temp file that is renamed into
//! place, with mode 0600 since the document holds the access code and the
//! tunnel private key.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use toml::{Table, Value};
use tracing::{debug, instrument};

use crate::error::ConfigError;

#[derive(Clone)]
pub struct StateStore {
	inner: Arc<StoreInner>,
}

struct StoreInner {
	path: Option<PathBuf>,
	doc: Mutex<Table>,
}

impl std::fmt::Debug for StateStore {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("StateStore")
			.field("path", &self.inner.path)
			.finish_non_exhaustive()
	}
}

impl StateStore {
	/// Opens the store at `path`, starting empty if the file does not exist.
	#[instrument(skip_all, fields(path = %path.as_ref().display()))]
	pub fn open(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref().to_path_buf();
		let doc = if path.exists() {
			let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileRead {
				path: path.clone(),
				source: e,
			})?;
			toml::from_str::<Table>(&content).map_err(|e| ConfigError::TomlParse {
				path: path.clone(),
				source: e,
			})?
		} else {
			debug!("state file not found, starting empty");
			Table::new()
		};

		Ok(Self {
			inner: Arc::new(StoreInner {
				path: Some(path),
				doc: Mutex::new(doc),
			}),
		})
	}

	/// A store that is never written to disk.
	pub fn in_memory() -> Self {
		Self {
			inner: Arc::new(StoreInner {
				path: None,
				doc: Mutex::new(Table::new()),
			}),
		}
	}

	pub fn path(&self) -> Option<&Path> {
		self.inner.path.as_deref()
	}

	fn doc(&self) -> MutexGuard<'_, Table> {
		self.inner.doc.lock().unwrap_or_else(|e| e.into_inner())
	}

	pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
		let doc = self.doc();
		let Some(value) = lookup(&doc, key) else {
			return Ok(None);
		};
		value
			.clone()
			.try_into()
			.map(Some)
			.map_err(|e: toml::de::Error| ConfigError::Decode {
				key: key.to_string(),
				message: e.to_string(),
			})
	}

	/// Convenience for string keys; non-string or empty values read as absent.
	pub fn get_string(&self, key: &str) -> Option<String> {
		let doc = self.doc();
		lookup(&doc, key)
			.and_then(Value::as_str)
			.filter(|s| !s.is_empty())
			.map(str::to_string)
	}

	pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), ConfigError> {
		let encoded = Value::try_from(value).map_err(|e| ConfigError::Encode {
			key: key.to_string(),
			message: e.to_string(),
		})?;
		let mut doc = self.doc();
		insert(&mut doc, key, encoded)?;
		self.persist(&doc)
	}

	pub fn remove(&self, key: &str) -> Result<(), ConfigError> {
		let mut doc = self.doc();
		let (parents, leaf) = split_key(key);
		let mut table = &mut *doc;
		for part in parents {
			match table.get_mut(part).and_then(Value::as_table_mut) {
				Some(next) => table = next,
				None => return Ok(()),
			}
		}
		if table.remove(leaf).is_some() {
			self.persist(&doc)?;
		}
		Ok(())
	}

	fn persist(&self, doc: &Table) -> Result<(), ConfigError> {
		let Some(path) = self.inner.path.as_deref() else {
			return Ok(());
		};

		let content = toml::to_string(doc).map_err(|e| ConfigError::Encode {
			key: path.display().to_string(),
			message: e.to_string(),
		})?;
		write_private(path, content.as_bytes()).map_err(|e| ConfigError::FileWrite {
			path: path.to_path_buf(),
			source: e,
		})?;
		debug!(path = %path.display(), "state persisted");
		Ok(())
	}
}

fn split_key(key: &str) -> (Vec<&str>, &str) {
	let mut parts: Vec<&str> = key.split('.').collect();
	let leaf = parts.pop().unwrap_or(key);
	(parts, leaf)
}

fn lookup<'a>(doc: &'a Table, key: &str) -> Option<&'a Value> {
	let (parents, leaf) = split_key(key);
	let mut table = doc;
	for part in parents {
		table = table.get(part)?.as_table()?;
	}
	table.get(leaf)
}

fn insert(doc: &mut Table, key: &str, value: Value) -> Result<(), ConfigError> {
	let (parents, leaf) = split_key(key);
	let mut table = doc;
	for part in parents {
		let entry = table
			.entry(part.to_string())
			.or_insert_with(|| Value::Table(Table::new()));
		table = entry.as_table_mut().ok_or_else(|| ConfigError::Encode {
			key: key.to_string(),
			message: format!("'{part}' is not a table"),
		})?;
	}
	table.insert(leaf.to_string(), value);
	Ok(())
}

fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
	use std::io::Write;

	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent)?;
	}
	let tmp = path.with_extension("toml.tmp");

	let mut options = std::fs::OpenOptions::new();
	options.write(true).create(true).truncate(true);
	#[cfg(unix)]
	{
		use std::os::unix::fs::OpenOptionsExt;
		options.mode(0o600);
	}
	let mut file = options.open(&tmp)?;
	file.write_all(content)?;
	file.sync_all()?;
	std::fs::rename(&tmp, path)
}
