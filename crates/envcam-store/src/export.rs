//! CSV and ZIP export of stored data.
//!
//! Exports are generated on demand and never persisted. The CSV snapshot is
//! built in memory. The ZIP archive is staged in a temporary file that is
//! owned by the returned [`ImageArchive`]: dropping the archive deletes the
//! file, whether the export failed, was discarded, or was fully delivered.
//!
//! Failures are logged here with their full cause and reported upward as
//! [`Error::ExportFailed`] or [`Error::NotFound`] only.

use std::fs::{self, File};
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;
use time::{OffsetDateTime, UtcOffset};
use tracing::{error, info, warn};
use zip::CompressionMethod;
use zip::write::{FileOptions, ZipWriter};

use envcam_types::{DeviceId, Reading};

use crate::clock::{compact_stamp, display_stamp};
use crate::error::{Error, Result};
use crate::images::{ImageStore, image_files};
use crate::store::ReadingStore;

/// Column names of the readings CSV, in order.
pub const CSV_HEADER: [&str; 7] = [
    "id",
    "timestamp",
    "temperature",
    "humidity",
    "pressure",
    "gas_resistance",
    "iaq",
];

/// Settings shared by all exports.
#[derive(Debug, Clone)]
pub struct ExportSettings {
    /// Offset in which timestamps and file names are presented.
    pub offset: UtcOffset,
    /// Directory in which archives are staged before delivery.
    pub staging_dir: PathBuf,
}

/// A finished readings CSV.
#[derive(Debug, Clone)]
pub struct CsvExport {
    pub filename: String,
    pub content: Vec<u8>,
    pub rows: usize,
}

/// A finished image archive staged on disk.
///
/// The staged file is removed when this value is dropped.
#[derive(Debug)]
pub struct ImageArchive {
    file: NamedTempFile,
    filename: String,
    entries: usize,
    skipped: usize,
    size: u64,
}

impl ImageArchive {
    /// Download name of the archive.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Number of images in the archive.
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Number of files that were left out.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Archive size in bytes.
    pub fn len(&self) -> u64 {
        self.size
    }

    /// Whether the archive has no bytes. Never true for a finished archive.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Location of the staged file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Open a fresh read handle positioned at the start of the archive.
    ///
    /// The handle does not keep the file alive; hold on to `self` until
    /// reading is finished.
    pub fn open(&self) -> io::Result<File> {
        self.file.reopen()
    }

    /// Read the whole archive into memory, deleting the staged file.
    pub fn into_bytes(self) -> io::Result<Vec<u8>> {
        fs::read(self.file.path())
    }
}

#[derive(Serialize)]
struct CsvRow {
    id: i64,
    timestamp: String,
    temperature: Option<f64>,
    humidity: Option<f64>,
    pressure: Option<f64>,
    gas_resistance: Option<f64>,
    iaq: Option<f64>,
}

impl CsvRow {
    fn from_reading(reading: &Reading, offset: UtcOffset) -> Result<Self> {
        Ok(Self {
            id: reading.id,
            timestamp: display_stamp(reading.timestamp, offset)?,
            temperature: reading.temperature.map(round2),
            humidity: reading.humidity.map(round2),
            pressure: reading.pressure.map(round2),
            gas_resistance: reading.gas_resistance.map(round2),
            iaq: reading.iaq.map(round2),
        })
    }
}

/// Round to two decimal places.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Produces export artifacts from the reading and image stores.
#[derive(Debug, Clone)]
pub struct Exporter {
    settings: ExportSettings,
}

impl Exporter {
    pub fn new(settings: ExportSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Export every reading as CSV.
    pub fn readings_csv(&self, store: &ReadingStore) -> Result<CsvExport> {
        self.readings_csv_at(store, OffsetDateTime::now_utc())
    }

    /// Export every reading as CSV, stamping the file name with `now`.
    pub fn readings_csv_at(&self, store: &ReadingStore, now: OffsetDateTime) -> Result<CsvExport> {
        let offset = self.settings.offset;
        let failed = |stage: &str, cause: &dyn std::fmt::Display| {
            error!("Readings export failed while {}: {}", stage, cause);
            Error::ExportFailed("could not export readings".to_string())
        };

        let filename = compact_stamp(now, offset)
            .map(|stamp| format!("sensor_data_{}.csv", stamp))
            .map_err(|e| failed("naming the file", &e))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer
            .write_record(CSV_HEADER)
            .map_err(|e| failed("writing the header", &e))?;

        let rows = store
            .for_each(|reading| {
                let row = CsvRow::from_reading(&reading, offset)?;
                writer
                    .serialize(row)
                    .map_err(|e| Error::ExportFailed(e.to_string()))
            })
            .map_err(|e| failed("writing rows", &e))?;

        let content = writer
            .into_inner()
            .map_err(|e| failed("flushing", &e.error()))?;

        info!("Exported {} readings to {}", rows, filename);
        Ok(CsvExport {
            filename,
            content,
            rows,
        })
    }

    /// Archive every valid image of every device as ZIP.
    pub fn images_zip(&self, images: &ImageStore) -> Result<ImageArchive> {
        self.images_zip_at(images, OffsetDateTime::now_utc())
    }

    /// Archive every valid image, stamping the file name with `now`.
    ///
    /// Fails with [`Error::NotFound`] when there are no device directories or
    /// no file qualified, and with [`Error::ExportFailed`] on archive I/O
    /// errors. In every failure case the staged file is already gone.
    pub fn images_zip_at(&self, images: &ImageStore, now: OffsetDateTime) -> Result<ImageArchive> {
        self.build_archive(images, now, |zip, devices| write_entries(zip, devices))
    }

    /// Stage an archive whose entries are written by `fill`.
    fn build_archive<F>(
        &self,
        images: &ImageStore,
        now: OffsetDateTime,
        fill: F,
    ) -> Result<ImageArchive>
    where
        F: FnOnce(&mut ZipWriter<&mut File>, &[(DeviceId, PathBuf)]) -> Result<(usize, usize)>,
    {
        let failed = |stage: &str, cause: &dyn std::fmt::Display| {
            error!("Image export failed while {}: {}", stage, cause);
            Error::ExportFailed("could not export images".to_string())
        };

        let devices = images
            .device_dirs()
            .map_err(|e| failed("listing devices", &e))?;
        if devices.is_empty() {
            return Err(Error::NotFound("no image directories".to_string()));
        }

        let filename = compact_stamp(now, self.settings.offset)
            .map(|stamp| format!("camera_images_{}.zip", stamp))
            .map_err(|e| failed("naming the file", &e))?;

        fs::create_dir_all(&self.settings.staging_dir)
            .map_err(|e| failed("creating the staging directory", &e))?;
        let mut staged = tempfile::Builder::new()
            .prefix("camera_images_")
            .suffix(".zip.part")
            .tempfile_in(&self.settings.staging_dir)
            .map_err(|e| failed("staging the archive", &e))?;

        let (entries, skipped) = {
            let mut zip = ZipWriter::new(staged.as_file_mut());
            let counts = fill(&mut zip, &devices)?;
            zip.finish().map_err(|e| failed("finalizing", &e))?;
            counts
        };

        if entries == 0 {
            // `staged` drops here and takes the partial archive with it.
            return Err(Error::NotFound("no valid images".to_string()));
        }

        let size = staged
            .as_file_mut()
            .stream_position()
            .map_err(|e| failed("measuring", &e))?;

        info!(
            "Exported {} images ({} skipped, {} bytes) to {}",
            entries, skipped, size, filename
        );
        Ok(ImageArchive {
            file: staged,
            filename,
            entries,
            skipped,
            size,
        })
    }
}

/// Add every qualifying image to `zip`. Returns `(written, skipped)`.
fn write_entries<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    devices: &[(DeviceId, PathBuf)],
) -> Result<(usize, usize)> {
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);
    let mut written = 0;
    let mut skipped = 0;

    for (device, dir) in devices {
        let files = match image_files(dir) {
            Ok(files) => files,
            Err(e) => {
                warn!("Skipping device {}: cannot list {}: {}", device, dir.display(), e);
                continue;
            }
        };

        for (name, path) in files {
            let Some(content) = read_qualifying(&path) else {
                skipped += 1;
                continue;
            };

            let entry = format!("{}/{}", device.dir_name(), name);
            zip.start_file(entry.as_str(), options)
                .and_then(|()| zip.write_all(&content).map_err(Into::into))
                .map_err(|e| {
                    error!("Image export failed while adding {}: {}", entry, e);
                    Error::ExportFailed("could not export images".to_string())
                })?;
            written += 1;
        }
    }

    Ok((written, skipped))
}

/// Content of `path` if it still exists, is a readable regular file and is
/// not empty.
fn read_qualifying(path: &Path) -> Option<Vec<u8>> {
    match fs::metadata(path) {
        Ok(meta) if !meta.is_file() => {
            warn!("Skipping {}: not a regular file", path.display());
            return None;
        }
        Ok(meta) if meta.len() == 0 => {
            warn!("Skipping {}: empty file", path.display());
            return None;
        }
        Ok(_) => {}
        Err(e) => {
            warn!("Skipping {}: {}", path.display(), e);
            return None;
        }
    }

    match fs::read(path) {
        Ok(content) if content.is_empty() => {
            warn!("Skipping {}: emptied while exporting", path.display());
            None
        }
        Ok(content) => Some(content),
        Err(e) => {
            warn!("Skipping {}: unreadable: {}", path.display(), e);
            None
        }
    }
}
