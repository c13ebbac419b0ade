//! Filesystem-backed camera image store.
//!
//! Images live under a root directory, one subdirectory per device named
//! `camera_<device id>`. File names are the capture second in the display
//! offset (`YYYYMMDD_HHMMSS.jpg`), so two uploads for the same device within
//! one second overwrite each other. Only files with an allowed image
//! extension take part in listing, serving and export.

use std::collections::BTreeMap;
use std::fs::{self, Metadata};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use time::{OffsetDateTime, UtcOffset};
use tracing::{debug, info, warn};

use envcam_types::{DeviceId, ImageInfo, ImageKind, ValidationError};

use crate::clock::compact_stamp;
use crate::error::{Error, Result};

/// Extension given to every uploaded image.
pub const UPLOAD_EXTENSION: &str = "jpg";

/// Raw image content ready to be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub kind: ImageKind,
    pub content: Vec<u8>,
}

/// Per-device image directories under a single root.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
    offset: UtcOffset,
}

impl ImageStore {
    /// Create a store rooted at `root`.
    ///
    /// `offset` is the local time used to name uploaded files. The root is
    /// created lazily on first upload.
    pub fn new(root: impl Into<PathBuf>, offset: UtcOffset) -> Self {
        Self {
            root: root.into(),
            offset,
        }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Offset used for file names.
    pub fn offset(&self) -> UtcOffset {
        self.offset
    }

    /// Directory holding one device's images.
    pub fn device_dir(&self, device: &DeviceId) -> PathBuf {
        self.root.join(device.dir_name())
    }

    /// Store an image for `device_id`, named after the current second.
    ///
    /// Returns the file name written.
    pub fn put(&self, device_id: &str, content: &[u8]) -> Result<String> {
        self.put_at(device_id, content, OffsetDateTime::now_utc())
    }

    /// Store an image as if it had been uploaded at `at`.
    pub fn put_at(&self, device_id: &str, content: &[u8], at: OffsetDateTime) -> Result<String> {
        let device = DeviceId::parse(device_id)?;
        if content.is_empty() {
            return Err(ValidationError::EmptyImage.into());
        }

        let filename = format!("{}.{}", compact_stamp(at, self.offset)?, UPLOAD_EXTENSION);
        let dir = self.device_dir(&device);
        // Concurrent uploads may race here; create_dir_all treats an existing
        // directory as success. It is never removed once created.
        fs::create_dir_all(&dir).map_err(|e| Error::CreateDirectory {
            path: dir.clone(),
            source: e,
        })?;

        let path = dir.join(&filename);
        write_atomically(&dir, &path, content)?;

        info!(
            device = %device,
            file = %filename,
            bytes = content.len(),
            "Stored image"
        );
        Ok(filename)
    }

    /// Most recent image of one device, or `None` if it has none.
    pub fn latest(&self, device_id: &str) -> Result<Option<ImageInfo>> {
        let device = DeviceId::parse(device_id)?;
        self.latest_for(&device)
    }

    /// Most recent image of every device that has at least one.
    pub fn latest_all(&self) -> Result<BTreeMap<DeviceId, ImageInfo>> {
        let mut latest = BTreeMap::new();
        for (device, _) in self.device_dirs()? {
            if let Some(info) = self.latest_for(&device)? {
                latest.insert(device, info);
            }
        }
        Ok(latest)
    }

    /// Read one image for serving.
    ///
    /// Anything that does not resolve to an allowed image file inside the
    /// device's directory is reported as [`Error::NotFound`].
    pub fn read(&self, device_id: &str, filename: &str) -> Result<StoredImage> {
        let not_found = || Error::NotFound(format!("image {}/{}", device_id, filename));

        let device = DeviceId::parse(device_id).map_err(|_| not_found())?;
        if filename.is_empty() || filename.contains(['/', '\\', '\0']) || filename.contains("..")
        {
            return Err(not_found());
        }
        let kind = ImageKind::from_file_name(filename).ok_or_else(not_found)?;

        let dir = self.device_dir(&device).canonicalize().map_err(|_| not_found())?;
        let path = dir.join(filename).canonicalize().map_err(|_| not_found())?;
        if !path.starts_with(&dir) || !path.is_file() {
            warn!("Refusing to serve {} outside {}", path.display(), dir.display());
            return Err(not_found());
        }

        let content = fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => not_found(),
            _ => Error::Io(e),
        })?;
        Ok(StoredImage { kind, content })
    }

    /// Device directories under the root, ordered by device identifier.
    ///
    /// A missing root yields an empty list. Entries that are not directories
    /// or do not follow the `camera_<id>` convention are ignored.
    pub fn device_dirs(&self) -> Result<Vec<(DeviceId, PathBuf)>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if let Some(device) = DeviceId::from_dir_name(&name) {
                dirs.push((device, entry.path()));
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    fn latest_for(&self, device: &DeviceId) -> Result<Option<ImageInfo>> {
        let dir = self.device_dir(device);
        if !dir.is_dir() {
            return Ok(None);
        }

        let mut best: Option<(OffsetDateTime, String)> = None;
        for (name, path) in image_files(&dir)? {
            let captured_at = match fs::metadata(&path).and_then(|m| capture_time(&m)) {
                Ok(t) => t,
                Err(e) => {
                    debug!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };
            // Ties on timestamp resolve to the later file name.
            let candidate = (captured_at, name);
            if best.as_ref().is_none_or(|b| candidate > *b) {
                best = Some(candidate);
            }
        }

        Ok(best.map(|(captured_at, filename)| ImageInfo {
            device_id: device.clone(),
            filename,
            captured_at,
        }))
    }
}

/// Regular files in `dir` with an allowed image extension, sorted by name.
///
/// Symlinks and subdirectories are skipped, as are names that are not UTF-8.
pub(crate) fn image_files(dir: &Path) -> io::Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if ImageKind::from_file_name(&name).is_some() {
            files.push((name, entry.path()));
        }
    }
    files.sort();
    Ok(files)
}

/// Filesystem creation time, or modification time where creation time is
/// not recorded.
fn capture_time(meta: &Metadata) -> io::Result<OffsetDateTime> {
    meta.created()
        .or_else(|_| meta.modified())
        .map(OffsetDateTime::from)
}

/// Write `content` to a temporary file in `dir`, then rename it onto `path`.
fn write_atomically(dir: &Path, path: &Path, content: &[u8]) -> io::Result<()> {
    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(content)?;
    staged.as_file().sync_all()?;

    if path.exists() {
        warn!("Overwriting {} (same-second upload)", path.display());
    }
    staged.persist(path).map_err(|e| e.error)?;
    Ok(())
}
