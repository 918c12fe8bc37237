//! Frame image listing.
//!
//! Processed frames live in one directory with file names such as
//! `capture-0012_visualized.png`.  The listing maps each frame id to its file
//! and also returns a dense list indexed by frame id with `null` for gaps.

use std::collections::BTreeMap;
use std::path::Path;

use rigpose_types::RigError;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Frame ids above this are left out of the dense list.
pub const MAX_LISTED_FRAME_ID: u64 = 1_000_000;

/// File-name pattern `<prefix><digits><suffix>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePattern {
    pub prefix: String,
    pub suffix: String,
}

impl Default for ImagePattern {
    fn default() -> Self {
        Self {
            prefix: "capture-".to_string(),
            suffix: "_visualized.png".to_string(),
        }
    }
}

impl ImagePattern {
    /// Frame id encoded in `file_name`, if it matches.
    ///
    /// The name must end with the suffix, be preceded by a run of digits, and
    /// that run must be preceded by the prefix.  Anything before the prefix is
    /// allowed.
    pub fn frame_id(&self, file_name: &str) -> Option<u64> {
        let stem = file_name.strip_suffix(self.suffix.as_str())?;
        let digits_start = stem
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_ascii_digit())
            .last()
            .map(|(i, _)| i)?;
        let (head, digits) = stem.split_at(digits_start);
        if !head.ends_with(self.prefix.as_str()) {
            return None;
        }
        digits.parse().ok()
    }
}

/// Result of `GET /api/images`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageListing {
    /// Index `i` holds the file for frame `i`, or `None`.
    pub images: Vec<Option<String>>,
    pub images_dict: BTreeMap<u64, String>,
}

/// Build the listing from bare file names.
///
/// Names are processed in sorted order, so when two files map to the same
/// frame id the lexicographically last one wins.
pub fn build_listing<I>(names: I, pattern: &ImagePattern) -> ImageListing
where
    I: IntoIterator<Item = String>,
{
    let mut names: Vec<String> = names.into_iter().collect();
    names.sort();

    let mut images_dict = BTreeMap::new();
    for name in names {
        match pattern.frame_id(&name) {
            Some(id) if id > MAX_LISTED_FRAME_ID => {
                warn!(file = %name, frame_id = id, "image frame id out of range; skipped");
            }
            Some(id) => {
                images_dict.insert(id, name);
            }
            None => {}
        }
    }

    let max_id = images_dict.keys().next_back().copied().unwrap_or(0);
    let images = (0..=max_id).map(|id| images_dict.get(&id).cloned()).collect();

    ImageListing {
        images,
        images_dict,
    }
}

/// List matching images in `dir`.  A missing directory yields an empty
/// listing.
pub fn list_images(dir: &Path, pattern: &ImagePattern) -> Result<ImageListing, RigError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(dir = %dir.display(), "image directory not found");
            return Ok(build_listing(Vec::new(), pattern));
        }
        Err(e) => {
            return Err(RigError::Io(format!(
                "failed to read image directory {}: {}",
                dir.display(),
                e
            )));
        }
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|e| RigError::Io(format!("failed to read directory entry: {e}")))?;
        if entry.file_type().map(|t| t.is_file()).unwrap_or(false)
            && let Some(name) = entry.file_name().to_str()
        {
            names.push(name.to_string());
        }
    }
    Ok(build_listing(names, pattern))
}
