//! Camera abstraction.
//!
//! A [`CameraProvider`] opens a [`Camera`] handle; dropping the handle
//! releases the device. [`FrameDirectory`] is the bundled provider: it reads
//! frames from image files dropped into a directory by an external capture
//! tool, each file consumed once in name order. Files already in the directory
//! when the handle opens are stale and never delivered.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Image extensions accepted as frames.
const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// An open camera.
pub trait Camera: Debug + Send {
    /// Read the next frame, or `None` if no frame is ready this cycle.
    ///
    /// # Errors
    ///
    /// Returns an error if the device fails while capturing.
    fn read_frame(&mut self) -> Result<Option<DynamicImage>>;
}

/// Opens cameras on demand.
pub trait CameraProvider: Debug + Send {
    /// Acquire the camera.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CameraUnavailable`] if the device cannot be opened.
    fn open(&self) -> Result<Box<dyn Camera>>;
}

/// A directory of frame images acting as a camera device.
#[derive(Debug, Clone)]
pub struct FrameDirectory {
    dir: PathBuf,
}

impl FrameDirectory {
    /// Create a provider reading from `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory frames are read from.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl CameraProvider for FrameDirectory {
    fn open(&self) -> Result<Box<dyn Camera>> {
        let metadata = std::fs::metadata(&self.dir)
            .map_err(|e| Error::camera_unavailable(&self.dir, e.to_string()))?;
        if !metadata.is_dir() {
            return Err(Error::camera_unavailable(&self.dir, "not a directory"));
        }
        let stale: HashSet<PathBuf> = list_frames(&self.dir)
            .map_err(|e| Error::camera_unavailable(&self.dir, e.to_string()))?
            .into_iter()
            .collect();

        debug!(
            stale = stale.len(),
            "Opened camera at {}",
            self.dir.display()
        );
        Ok(Box::new(FrameDirectoryCamera {
            dir: self.dir.clone(),
            seen: stale,
            unreadable: HashMap::new(),
        }))
    }
}

/// Open handle on a [`FrameDirectory`].
#[derive(Debug)]
pub struct FrameDirectoryCamera {
    dir: PathBuf,
    /// Frames already delivered, or present before the handle opened.
    seen: HashSet<PathBuf>,
    /// Frames that failed to parse, with their size at the time.
    unreadable: HashMap<PathBuf, u64>,
}

impl FrameDirectoryCamera {
    fn next_unseen(&self) -> Result<Option<PathBuf>> {
        let frames = list_frames(&self.dir)
            .map_err(|e| Error::frame_capture(format!("{}: {e}", self.dir.display())))?;

        Ok(frames
            .into_iter()
            .filter(|path| !self.seen.contains(path))
            .find(|path| match self.unreadable.get(path) {
                Some(&size) => file_size(path) != Some(size),
                None => true,
            }))
    }
}

impl Camera for FrameDirectoryCamera {
    fn read_frame(&mut self) -> Result<Option<DynamicImage>> {
        let Some(path) = self.next_unseen()? else {
            return Ok(None);
        };

        trace!("Reading frame {}", path.display());
        match image::open(&path) {
            Ok(frame) => {
                self.unreadable.remove(&path);
                self.seen.insert(path);
                Ok(Some(frame))
            }
            Err(e) => {
                // Retried once the writer has changed the file
                debug!(error = %e, "Skipping unreadable frame {}", path.display());
                if let Some(size) = file_size(&path) {
                    self.unreadable.insert(path, size);
                } else {
                    self.seen.insert(path);
                }
                Ok(None)
            }
        }
    }
}

impl Drop for FrameDirectoryCamera {
    fn drop(&mut self) {
        debug!("Released camera at {}", self.dir.display());
    }
}

/// Frame files in `dir`, sorted by name.
fn list_frames(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut frames: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| is_frame_file(path))
        .collect();
    frames.sort();
    Ok(frames)
}

fn file_size(path: &Path) -> Option<u64> {
    std::fs::metadata(path).ok().map(|m| m.len())
}

fn is_frame_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::init_test_logging;
    use image::{GrayImage, Luma};

    fn write_frame(dir: &Path, name: &str, shade: u8) {
        GrayImage::from_pixel(4, 4, Luma([shade]))
            .save(dir.join(name))
            .unwrap();
    }

    fn shade_of(frame: &DynamicImage) -> u8 {
        frame.to_luma8().get_pixel(0, 0).0[0]
    }

    #[test]
    fn test_open_missing_directory_is_unavailable() {
        let provider = FrameDirectory::new("/nonexistent/frames");
        let err = provider.open().unwrap_err();
        assert!(err.is_camera_unavailable());
    }

    #[test]
    fn test_open_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("frame.png");
        write_frame(dir.path(), "frame.png", 0);

        let err = FrameDirectory::new(&file).open().unwrap_err();
        assert!(err.is_camera_unavailable());
    }

    #[test]
    fn test_frames_read_in_name_order_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut camera = FrameDirectory::new(dir.path()).open().unwrap();

        write_frame(dir.path(), "002.png", 20);
        write_frame(dir.path(), "001.png", 10);
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        assert_eq!(shade_of(&camera.read_frame().unwrap().unwrap()), 10);
        assert_eq!(shade_of(&camera.read_frame().unwrap().unwrap()), 20);
        assert!(camera.read_frame().unwrap().is_none());
    }

    #[test]
    fn test_frames_present_at_open_are_stale() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "001.png", 10);
        let provider = FrameDirectory::new(dir.path());

        let mut camera = provider.open().unwrap();
        assert!(camera.read_frame().unwrap().is_none());

        write_frame(dir.path(), "002.png", 20);
        assert_eq!(shade_of(&camera.read_frame().unwrap().unwrap()), 20);
        drop(camera);

        write_frame(dir.path(), "003.png", 30);
        let mut reopened = provider.open().unwrap();
        assert!(reopened.read_frame().unwrap().is_none());
        write_frame(dir.path(), "004.png", 40);
        assert_eq!(shade_of(&reopened.read_frame().unwrap().unwrap()), 40);
    }

    #[test]
    fn test_truncated_frame_is_skipped_then_retried() {
        init_test_logging();
        let dir = tempfile::tempdir().unwrap();
        let mut camera = FrameDirectory::new(dir.path()).open().unwrap();

        let mut png = Vec::new();
        DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([77])))
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let path = dir.path().join("001.png");
        std::fs::write(&path, &png[..png.len() / 2]).unwrap();
        write_frame(dir.path(), "002.png", 20);

        assert!(camera.read_frame().unwrap().is_none());
        assert_eq!(shade_of(&camera.read_frame().unwrap().unwrap()), 20);
        assert!(camera.read_frame().unwrap().is_none());

        std::fs::write(&path, &png).unwrap();
        assert_eq!(shade_of(&camera.read_frame().unwrap().unwrap()), 77);
    }

    #[test]
    fn test_removed_directory_is_capture_error() {
        let dir = tempfile::tempdir().unwrap();
        let frames = dir.path().join("frames");
        std::fs::create_dir(&frames).unwrap();
        let mut camera = FrameDirectory::new(&frames).open().unwrap();

        std::fs::remove_dir(&frames).unwrap();
        let err = camera.read_frame().unwrap_err();
        assert!(matches!(err, Error::FrameCapture { .. }));
    }

    #[test]
    fn test_is_frame_file_extension_case() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("A.JPG"), b"x").unwrap();
        assert!(is_frame_file(&dir.path().join("A.JPG")));
        assert!(!is_frame_file(&dir.path().join("missing.png")));
    }
}
