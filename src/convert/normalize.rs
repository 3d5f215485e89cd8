//! Pixel intensity normalization
//!
//! Reduces raw DICOM sample values to the 8-bit range expected by PNG:
//! an optional window clip (center/width, as set by the modality or the
//! operator) followed by a linear min-max rescale to [0, 255].

/// A resolved display window.
///
/// DICOM stores WindowCenter/WindowWidth as one-or-many decimal values; the
/// ambiguity is resolved here, before normalization, so the normalizer only
/// ever sees a single center/width pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub center: f64,
    pub width: f64,
}

impl Window {
    /// Build a window from raw attribute values. The first value is
    /// authoritative when the attribute is multi-valued.
    pub fn from_values(centers: &[f64], widths: &[f64]) -> Option<Self> {
        let center = *centers.first()?;
        let width = *widths.first()?;
        Some(Self { center, width })
    }

    /// Clip bounds: `[center - width/2, center + width/2]`, with the
    /// half-width floored as in conventional DICOM windowing.
    fn bounds(self) -> (f32, f32) {
        let half = (self.width / 2.0).floor();
        ((self.center - half) as f32, (self.center + half) as f32)
    }
}

/// Normalize a sample plane to 8-bit intensities.
///
/// The output has the same length (and therefore shape) as the input. A
/// flat input (every sample equal) maps to all zeros rather than dividing
/// by zero. The cast truncates, so the global minimum maps to 0 and the
/// global maximum to 255.
pub fn normalize_pixels(samples: &[f32], window: Option<Window>) -> Vec<u8> {
    let clipped: Vec<f32> = match window {
        // max-then-min matches clamp-to-range even for degenerate windows
        Some(w) => {
            let (lo, hi) = w.bounds();
            samples.iter().map(|&v| v.max(lo).min(hi)).collect()
        }
        None => samples.to_vec(),
    };

    let Some(&first) = clipped.first() else {
        return Vec::new();
    };
    let (min, max) = clipped
        .iter()
        .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v)));

    if max == min {
        return vec![0u8; clipped.len()];
    }

    let range = max - min;
    clipped
        .iter()
        .map(|&v| ((v - min) / range * 255.0) as u8)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_input_maps_to_zeros() {
        let samples = vec![42.0f32; 12];
        let out = normalize_pixels(&samples, None);
        assert_eq!(out, vec![0u8; 12]);
    }

    #[test]
    fn empty_input_maps_to_empty() {
        assert!(normalize_pixels(&[], None).is_empty());
    }

    #[test]
    fn full_range_is_used() {
        let samples = [0.0, 1.0, 2.0, 3.0];
        let out = normalize_pixels(&samples, None);
        assert_eq!(out, vec![0, 85, 170, 255]);
    }

    #[test]
    fn output_is_bounded_and_endpoints_map_to_extremes() {
        let samples = [-1000.0, -3.5, 0.0, 77.7, 4096.0];
        let out = normalize_pixels(&samples, None);
        assert_eq!(out[0], 0);
        assert_eq!(out[4], 255);
        // u8 output is bounded by construction; make sure the middle is
        // strictly inside the range
        assert!(out[1] > 0 && out[3] < 255);
    }

    #[test]
    fn window_clips_before_scaling() {
        // center=100 width=50 -> clip to [75, 125]
        let window = Some(Window {
            center: 100.0,
            width: 50.0,
        });
        let samples = [50.0, 75.0, 100.0, 125.0, 150.0];
        let out = normalize_pixels(&samples, window);
        // 50 clamps onto 75 (the new minimum), 150 onto 125 (the maximum)
        assert_eq!(out, vec![0, 0, 127, 255, 255]);
    }

    #[test]
    fn window_half_width_is_floored() {
        let even = Window {
            center: 100.0,
            width: 50.0,
        };
        let odd = Window {
            center: 100.0,
            width: 51.0,
        };
        assert_eq!(even.bounds(), (75.0, 125.0));
        assert_eq!(odd.bounds(), (75.0, 125.0));
    }

    #[test]
    fn windowed_flat_result_maps_to_zeros() {
        // every sample clips onto the same bound -> flat -> zeros
        let window = Some(Window {
            center: 100.0,
            width: 10.0,
        });
        let samples = [500.0, 600.0, 700.0];
        assert_eq!(normalize_pixels(&samples, window), vec![0, 0, 0]);
    }

    #[test]
    fn first_value_of_multivalued_window_wins() {
        let w = Window::from_values(&[40.0, 700.0], &[400.0, 1500.0]).unwrap();
        assert_eq!(w.center, 40.0);
        assert_eq!(w.width, 400.0);
    }

    #[test]
    fn missing_values_yield_no_window() {
        assert!(Window::from_values(&[], &[400.0]).is_none());
        assert!(Window::from_values(&[40.0], &[]).is_none());
    }
}
