//! Per-file conversion and the directory walk that drives it.

use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};
use walkdir::WalkDir;

use crate::error::Result;
use crate::links::update_images;
use crate::notebook::Notebook;
use crate::setup_cell::add_setup_block;

pub const NOTEBOOK_EXTENSION: &str = "ipynb";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Updated,
    Unchanged,
}

/// What happened to one file, as reported on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Updated,
    Unchanged,
    Failed,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl Summary {
    fn record(&mut self, status: Status) {
        match status {
            Status::Updated => self.updated += 1,
            Status::Unchanged => self.unchanged += 1,
            Status::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.updated + self.unchanged + self.failed
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} notebooks: {} updated, {} unchanged, {} failed",
            self.total(),
            self.updated,
            self.unchanged,
            self.failed
        )
    }
}

/// Load, fix and, only if something changed, overwrite one notebook.
pub fn convert_notebook(path: &Path) -> Result<Outcome> {
    let mut nb = Notebook::load(path)?;

    let changed_imgs = update_images(&mut nb);
    let added_setup = add_setup_block(&mut nb);

    if changed_imgs || added_setup {
        nb.save(path)?;
        Ok(Outcome::Updated)
    } else {
        Ok(Outcome::Unchanged)
    }
}

/// Convert one notebook and print its status line. Conversion errors are
/// reported, not returned; only a failure to write to `out` is an error.
pub fn process_notebook<W: Write>(path: &Path, out: &mut W) -> io::Result<Status> {
    match convert_notebook(path) {
        Ok(Outcome::Updated) => {
            writeln!(out, "✅ Updated: {}", path.display())?;
            Ok(Status::Updated)
        }
        Ok(Outcome::Unchanged) => {
            writeln!(out, "✔ No changes needed: {}", path.display())?;
            Ok(Status::Unchanged)
        }
        Err(e) => {
            writeln!(out, "❌ Error processing {}: {}", path.display(), e)?;
            Ok(Status::Failed)
        }
    }
}

/// Every `.ipynb` file under `root`, at any depth, in file-name order within
/// each directory. Symlinked directories are not descended into; a symlink
/// to a notebook file is included and converting it rewrites the target.
pub fn find_notebooks(root: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("skipping unreadable entry: {e}");
                None
            }
        })
        .filter(|entry| entry.path().is_file())
        .filter(|entry| {
            entry.path().extension().and_then(|s| s.to_str()) == Some(NOTEBOOK_EXTENSION)
        })
        .map(|entry| entry.into_path())
}

/// Run the conversion over every notebook below `root`, one at a time.
pub fn process_all_notebooks<W: Write>(root: &Path, out: &mut W) -> io::Result<Summary> {
    info!("scanning {} for notebooks", root.display());
    let mut summary = Summary::default();
    for path in find_notebooks(root) {
        summary.record(process_notebook(&path, out)?);
    }
    info!("{summary}");
    Ok(summary)
}
