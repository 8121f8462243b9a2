use crate::error::BatchError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One video-to-frames unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoJob {
    pub source_path: PathBuf,
    pub output_dir: PathBuf,
}

/// Lists `source_dir` once (non-recursive) and derives one job per entry.
///
/// Entries are ordered by file name so dispatch order is reproducible.
/// Entries the directory iterator cannot read are skipped; anything else is
/// kept, even if it later turns out not to be a decodable video.
pub fn enumerate(source_dir: &Path, output_root: &Path) -> Result<Vec<VideoJob>, BatchError> {
    let entries = std::fs::read_dir(source_dir).map_err(|source| BatchError::Enumeration {
        path: source_dir.to_path_buf(),
        source,
    })?;

    let mut names: Vec<OsString> = Vec::new();
    for entry in entries {
        match entry {
            Ok(e) => names.push(e.file_name()),
            Err(err) => debug!("skipping unreadable entry in {}: {err}", source_dir.display()),
        }
    }
    names.sort();

    let mut taken: HashSet<OsString> = HashSet::new();
    let mut jobs = Vec::with_capacity(names.len());
    for name in names {
        let source_path = source_dir.join(&name);
        let Some(leaf) = output_leaf(&source_path, &taken) else {
            debug!("skipping entry without a usable stem: {}", source_path.display());
            continue;
        };
        taken.insert(leaf.clone());
        jobs.push(VideoJob {
            output_dir: output_root.join(&leaf),
            source_path,
        });
    }

    Ok(jobs)
}

/// `<stem>` for the first file with a given stem, `<stem>_<ext>` for later ones.
fn output_leaf(source: &Path, taken: &HashSet<OsString>) -> Option<OsString> {
    let stem = source.file_stem()?.to_os_string();
    if !taken.contains(&stem) {
        return Some(stem);
    }

    let mut alt = stem.clone();
    alt.push("_");
    alt.push(source.extension().unwrap_or_default());
    let mut n = 2;
    let base = alt.clone();
    while taken.contains(&alt) {
        alt = base.clone();
        alt.push(format!("_{n}"));
        n += 1;
    }
    warn!(
        "output directory {:?} already claimed; using {:?} for {}",
        stem,
        alt,
        source.display()
    );
    Some(alt)
}
