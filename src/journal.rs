//! The stage journal.
//!
//! A stable-storage record of which stages have completed and what they
//! produced, rewritten after every stage. Nothing reads it back yet (resume
//! is out of scope); it exists so a resume mode can be added without
//! changing how runs are recorded, and so a human picking up the pieces of
//! a failed run can see exactly how far it got.

use std::{fs, io::Write, path::Path};

use anyhow::{Context, Result};
use chrono::Utc;
use log::debug;
use serde::Serialize;

#[derive(Serialize)]
struct JournalRecord<'a, T: Serialize> {
	updated_at: String,
	#[serde(flatten)]
	state: &'a T,
}

pub fn checkpoint<T: Serialize>(path: &Path, state: &T) -> Result<()> {
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent)
			.context(format!("Unable to create {}", parent.display()))?;
	}
	let record = JournalRecord {
		updated_at: Utc::now().to_rfc3339(),
		state,
	};
	let content = serde_json::to_vec_pretty(&record)?;
	debug!("Writing stage journal to {}", path.display());
	let mut fd = fs::File::options()
		.create(true)
		.write(true)
		.truncate(true)
		.open(path)
		.context(format!("Unable to open journal at {}", path.display()))?;
	fd.write_all(&content)?;
	fd.flush()?;
	fd.sync_all()?;
	Ok(())
}
