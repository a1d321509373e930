//! Media asset lookup.
//!
//! Each id needs `<dir>/<NNN>.jpg` and `<dir>/<NNN>.mp3`, both non-empty.
//! Lookups are plain queries: a missing file is an expected answer, not an
//! error.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use selpanel_frame::{Catalog, MediaId};
use serde::Serialize;
use tracing::{info, warn};

/// Missing entries listed in logs and the status endpoint.
pub const MISSING_PREVIEW_LEN: usize = 10;

const EXTENSIONS: [&str; 2] = ["jpg", "mp3"];

/// State of one asset file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetState {
    Present,
    Empty,
    Missing,
}

/// Assets of one media id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MediaStatus {
    pub image: AssetState,
    pub audio: AssetState,
}

impl MediaStatus {
    pub fn is_complete(&self) -> bool {
        self.image == AssetState::Present && self.audio == AssetState::Present
    }
}

/// Result of validating a whole catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MediaReport {
    pub complete: usize,
    pub total: usize,
    /// Entries like `003.mp3` or `003.jpg (empty)`.
    pub missing: Vec<String>,
    /// Ids with at least one missing or empty asset.
    #[serde(skip)]
    pub incomplete: BTreeMap<MediaId, MediaStatus>,
}

impl MediaReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// Asset status of `id` as of validation, if it was incomplete.
    pub fn incomplete_status(&self, id: MediaId) -> Option<MediaStatus> {
        self.incomplete.get(&id).copied()
    }

    /// At most [`MISSING_PREVIEW_LEN`] missing entries.
    pub fn missing_preview(&self) -> &[String] {
        &self.missing[..self.missing.len().min(MISSING_PREVIEW_LEN)]
    }
}

/// Directory holding the media assets.
#[derive(Debug, Clone)]
pub struct MediaLibrary {
    dir: PathBuf,
}

impl MediaLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn image_path(&self, id: MediaId) -> PathBuf {
        self.dir.join(format!("{id}.jpg"))
    }

    pub fn audio_path(&self, id: MediaId) -> PathBuf {
        self.dir.join(format!("{id}.mp3"))
    }

    pub fn status(&self, id: MediaId) -> MediaStatus {
        MediaStatus {
            image: asset_state(&self.image_path(id)),
            audio: asset_state(&self.audio_path(id)),
        }
    }

    /// Check every id of `catalog`.
    pub fn validate(&self, catalog: Catalog) -> MediaReport {
        let mut report = MediaReport {
            total: usize::from(catalog.size()),
            ..MediaReport::default()
        };

        for id in catalog.ids() {
            let status = self.status(id);
            if status.is_complete() {
                report.complete += 1;
                continue;
            }
            report.incomplete.insert(id, status);
            for (ext, state) in EXTENSIONS.iter().zip([status.image, status.audio]) {
                match state {
                    AssetState::Present => {}
                    AssetState::Missing => report.missing.push(format!("{id}.{ext}")),
                    AssetState::Empty => report.missing.push(format!("{id}.{ext} (empty)")),
                }
            }
        }

        report
    }

    /// Validate and log the result.
    pub fn validate_and_log(&self, catalog: Catalog) -> MediaReport {
        if !self.dir.is_dir() {
            warn!(dir = %self.dir.display(), "media directory does not exist");
        }
        let report = self.validate(catalog);
        if report.is_complete() {
            info!(total = report.total, "all media present");
        } else {
            warn!(
                complete = report.complete,
                total = report.total,
                missing = report.missing.len(),
                "media incomplete"
            );
            for entry in report.missing_preview() {
                warn!(file = %entry, "missing media file");
            }
            if report.missing.len() > MISSING_PREVIEW_LEN {
                warn!(more = report.missing.len() - MISSING_PREVIEW_LEN, "further media files missing");
            }
        }
        report
    }
}

fn asset_state(path: &Path) -> AssetState {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => AssetState::Present,
        Ok(meta) if meta.is_file() => AssetState::Empty,
        _ => AssetState::Missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("selpanel-media-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write(dir: &Path, name: &str, content: &[u8]) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn complete_media_for_id() {
        let dir = temp_dir("complete");
        write(&dir, "001.jpg", b"jpg");
        write(&dir, "001.mp3", b"mp3");

        let library = MediaLibrary::new(&dir);
        let id = Catalog::default().media_id(1).unwrap();
        assert!(library.status(id).is_complete());
        assert_eq!(library.image_path(id), dir.join("001.jpg"));

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn empty_and_missing_files_are_reported() {
        let dir = temp_dir("report");
        write(&dir, "001.jpg", b"jpg");
        write(&dir, "001.mp3", b"mp3");
        write(&dir, "002.jpg", b"");
        write(&dir, "002.mp3", b"mp3");

        let library = MediaLibrary::new(&dir);
        let report = library.validate(Catalog::new(3).unwrap());
        assert_eq!(report.complete, 1);
        assert_eq!(report.total, 3);
        assert_eq!(
            report.missing,
            vec!["002.jpg (empty)", "003.jpg", "003.mp3"]
        );
        assert!(!report.is_complete());

        let id = Catalog::default().media_id(2).unwrap();
        assert_eq!(report.incomplete.len(), 2);
        assert_eq!(
            report.incomplete_status(id).map(|status| status.image),
            Some(AssetState::Empty)
        );
        assert_eq!(
            report.incomplete_status(Catalog::default().media_id(1).unwrap()),
            None
        );
        assert_eq!(
            library.status(id),
            MediaStatus {
                image: AssetState::Empty,
                audio: AssetState::Present
            }
        );

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn missing_directory_reports_everything() {
        let library = MediaLibrary::new("/nonexistent/selpanel/media");
        let report = library.validate_and_log(Catalog::new(12).unwrap());
        assert_eq!(report.complete, 0);
        assert_eq!(report.missing.len(), 24);
        assert_eq!(report.missing_preview().len(), MISSING_PREVIEW_LEN);
    }

    #[test]
    fn directory_named_like_asset_is_missing() {
        let dir = temp_dir("dir-asset");
        std::fs::create_dir_all(dir.join("001.jpg")).unwrap();
        write(&dir, "001.mp3", b"mp3");

        let library = MediaLibrary::new(&dir);
        let id = Catalog::default().media_id(1).unwrap();
        assert_eq!(library.status(id).image, AssetState::Missing);

        std::fs::remove_dir_all(dir).unwrap();
    }
}
