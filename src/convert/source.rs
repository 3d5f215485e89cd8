//! DICOM source access
//!
//! Thin wrapper over `dicom-object`/`dicom-pixeldata`: opens a file once,
//! exposes the first 2D sample plane and the optional display window, and
//! provides the tolerant decode probe used to filter batch candidates.

use std::path::Path;

use dicom_dictionary_std::tags;
use dicom_object::DefaultDicomObject;
use dicom_pixeldata::PixelDecoder;

use super::normalize::Window;
use super::ConvertError;

/// A single 2D plane of raw samples, row-major.
///
/// Multi-frame objects are reduced to frame 0; color images to the first
/// sample plane. Anything beyond a single 2D grayscale plane is out of
/// scope for this pipeline.
#[derive(Debug, Clone)]
pub struct PixelPlane {
    pub rows: u32,
    pub columns: u32,
    pub samples: Vec<f32>,
}

/// An opened DICOM file, read once per conversion attempt.
pub struct DicomSource {
    obj: DefaultDicomObject,
}

impl DicomSource {
    pub fn open(path: &Path) -> Result<Self, ConvertError> {
        let obj = dicom_object::open_file(path).map_err(|e| ConvertError::Read(e.to_string()))?;
        Ok(Self { obj })
    }

    /// The display window, if the object carries one.
    ///
    /// WindowCenter/WindowWidth may each be scalar or multi-valued; the
    /// first value is authoritative. Absent or unparseable attributes mean
    /// no window; normalization then falls back to plain min-max scaling.
    pub fn window(&self) -> Option<Window> {
        let centers = self
            .obj
            .element(tags::WINDOW_CENTER)
            .ok()?
            .to_multi_float64()
            .ok()?;
        let widths = self
            .obj
            .element(tags::WINDOW_WIDTH)
            .ok()?
            .to_multi_float64()
            .ok()?;
        Window::from_values(&centers, &widths)
    }

    /// Decode the pixel data and extract the first 2D sample plane.
    pub fn pixel_plane(&self) -> Result<PixelPlane, ConvertError> {
        let decoded = self
            .obj
            .decode_pixel_data()
            .map_err(|e| ConvertError::Pixels(e.to_string()))?;

        let rows = decoded.rows();
        let columns = decoded.columns();
        let samples_per_pixel = decoded.samples_per_pixel() as usize;

        let all: Vec<f32> = decoded
            .to_vec()
            .map_err(|e| ConvertError::Pixels(e.to_string()))?;

        let frame_len = rows as usize * columns as usize * samples_per_pixel;
        if frame_len == 0 || all.len() < frame_len {
            return Err(ConvertError::Pixels(format!(
                "pixel data too short: {} samples for a {}x{}x{} frame",
                all.len(),
                rows,
                columns,
                samples_per_pixel
            )));
        }

        let samples = if samples_per_pixel <= 1 {
            all[..frame_len].to_vec()
        } else {
            // interleaved color samples: keep the first channel only
            all[..frame_len]
                .iter()
                .step_by(samples_per_pixel)
                .copied()
                .collect()
        };

        Ok(PixelPlane {
            rows,
            columns,
            samples,
        })
    }
}

/// Best-effort decode probe.
///
/// True only when the file parses as DICOM *and* its pixel data decodes.
/// Malformed headers, unsupported transfer syntaxes and missing pixel data
/// all yield false. The goal is "don't crash the batch", not full
/// structural validation, so the two failure kinds are not distinguished.
pub fn is_valid_source(path: &Path) -> bool {
    match DicomSource::open(path) {
        Ok(source) => source.pixel_plane().is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn nonexistent_file_is_invalid() {
        assert!(!is_valid_source(Path::new("/no/such/file.dcm")));
    }

    #[test]
    fn garbage_file_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.dcm");
        fs::write(&path, b"definitely not a DICOM file").unwrap();
        assert!(!is_valid_source(&path));
    }

    #[test]
    fn empty_file_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.dcm");
        fs::write(&path, b"").unwrap();
        assert!(!is_valid_source(&path));
    }

    #[test]
    fn png_file_is_invalid() {
        // a decodable image that is not a DICOM container
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.png");
        image::GrayImage::from_pixel(4, 4, image::Luma([128u8]))
            .save(&path)
            .unwrap();
        assert!(!is_valid_source(&path));
    }
}
