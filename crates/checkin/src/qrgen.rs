//! Batch generation of one QR code image per roster name.
//!
//! Each name is encoded at error-correction level L and written as
//! `<output_dir>/<sanitized name>.png`. Re-running on an unchanged roster
//! produces byte-identical files; files whose content would not change are
//! left untouched.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Error-correction level used for every generated code.
pub const ERROR_CORRECTION: EcLevel = EcLevel::L;

/// Image file extension of generated codes.
pub const IMAGE_EXTENSION: &str = "png";

/// Strip every character that is not alphanumeric, space, hyphen or
/// underscore, then trim trailing whitespace.
///
/// ```
/// assert_eq!(checkin::qrgen::sanitize_file_stem("Bob O'Neil"), "Bob ONeil");
/// ```
#[must_use]
pub fn sanitize_file_stem(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    kept.trim_end().to_string()
}

/// What happened to one output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// The file was created or its content changed.
    Written,
    /// The file already held identical content.
    Unchanged,
}

/// One generated QR image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedCode {
    /// The encoded name.
    pub name: String,
    /// Where the image was written.
    pub path: PathBuf,
    /// Whether the file was rewritten.
    pub status: FileStatus,
}

/// Two or more names whose files overwrite each other.
///
/// File names that differ only in letter case count as the same file, since
/// they do on case-insensitive file systems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collision {
    /// Output path of the first name.
    pub path: PathBuf,
    /// Names in roster order; the last one's image is kept.
    pub names: Vec<String>,
}

/// Summary of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    /// Files produced, in roster order.
    pub generated: Vec<GeneratedCode>,
    /// Names skipped because nothing of them survives sanitizing.
    pub skipped: Vec<String>,
    /// Output paths claimed by more than one name.
    pub collisions: Vec<Collision>,
}

impl GenerationReport {
    /// Number of files actually written this run.
    #[must_use]
    pub fn written(&self) -> usize {
        self.generated
            .iter()
            .filter(|code| code.status == FileStatus::Written)
            .count()
    }
}

/// Renders roster names as QR code images.
#[derive(Debug, Clone)]
pub struct QrGenerator {
    output_dir: PathBuf,
    module_size: u32,
}

impl QrGenerator {
    /// Create a generator writing into `output_dir`.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>, module_size: u32) -> Self {
        Self {
            output_dir: output_dir.into(),
            module_size,
        }
    }

    /// The directory images are written to.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Output path for `name`, or `None` if its sanitized stem is empty.
    #[must_use]
    pub fn path_for(&self, name: &str) -> Option<PathBuf> {
        let stem = sanitize_file_stem(name);
        if stem.is_empty() {
            return None;
        }
        Some(self.output_dir.join(format!("{stem}.{IMAGE_EXTENSION}")))
    }

    /// Encode `name` as a PNG image.
    ///
    /// # Errors
    ///
    /// Returns an error if the name does not fit in a QR symbol or the image
    /// cannot be encoded.
    pub fn render_png(&self, name: &str) -> Result<Vec<u8>> {
        let code = QrCode::with_error_correction_level(name.as_bytes(), ERROR_CORRECTION)
            .map_err(|e| Error::QrEncode {
                name: name.to_string(),
                message: e.to_string(),
            })?;

        let img = code
            .render::<Luma<u8>>()
            .dark_color(Luma([0]))
            .light_color(Luma([255]))
            .quiet_zone(true)
            .module_dimensions(self.module_size, self.module_size)
            .build();

        let mut png = Vec::new();
        DynamicImage::ImageLuma8(img).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        Ok(png)
    }

    /// Generate one image per name, in the order given.
    ///
    /// Creates the output directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error on the first name that cannot be encoded or written.
    pub fn generate_all(&self, names: &[String]) -> Result<GenerationReport> {
        self.ensure_output_dir()?;

        let mut report = GenerationReport::default();
        let mut claimed: HashMap<String, usize> = HashMap::new();

        for name in names {
            let Some(path) = self.path_for(name) else {
                warn!(name = %name, "Name has no usable file name characters, skipping");
                report.skipped.push(name.clone());
                continue;
            };

            let key = path.to_string_lossy().to_lowercase();
            if let Some(&first) = claimed.get(&key) {
                let previous = report.generated[first].clone();
                warn!(
                    name = %name,
                    previous = %previous.name,
                    "Overwriting QR image {}",
                    previous.path.display()
                );
                record_collision(&mut report, &previous.path, &previous.name, name);
            } else {
                claimed.insert(key, report.generated.len());
            }

            let status = write_if_changed(&path, &self.render_png(name)?)?;
            debug!(name = %name, ?status, "Generated QR image {}", path.display());
            report.generated.push(GeneratedCode {
                name: name.clone(),
                path,
                status,
            });
        }

        info!(
            files = report.generated.len(),
            written = report.written(),
            "Generated QR images in {}",
            self.output_dir.display()
        );
        Ok(report)
    }

    fn ensure_output_dir(&self) -> Result<()> {
        if !self.output_dir.exists() {
            std::fs::create_dir_all(&self.output_dir).map_err(|source| Error::DirectoryCreate {
                path: self.output_dir.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

fn record_collision(report: &mut GenerationReport, path: &Path, first: &str, name: &str) {
    if let Some(existing) = report.collisions.iter_mut().find(|c| c.path == path) {
        existing.names.push(name.to_string());
    } else {
        report.collisions.push(Collision {
            path: path.to_path_buf(),
            names: vec![first.to_string(), name.to_string()],
        });
    }
}

fn write_if_changed(path: &Path, png: &[u8]) -> Result<FileStatus> {
    if path.exists() {
        let on_disk = std::fs::read(path)?;
        if blake3::hash(&on_disk) == blake3::hash(png) {
            return Ok(FileStatus::Unchanged);
        }
    }
    std::fs::write(path, png)?;
    Ok(FileStatus::Written)
}
