use crate::error::{Result, TextureError};
use image::{imageops::FilterType, GrayImage, ImageBuffer, Luma, RgbImage};

// ── Luminance weights ─────────────────────────────────────────────────────

/// ITU-R BT.601 luma weights, applied to 8-bit sRGB channels.
const LUMA_R: f32 = 0.299;
const LUMA_G: f32 = 0.587;
const LUMA_B: f32 = 0.114;

/// 16-bit grayscale buffer (height maps at `bit_depth = 16`).
pub type Gray16Image = ImageBuffer<Luma<u16>, Vec<u16>>;

// ── Plane ─────────────────────────────────────────────────────────────────

/// Single-channel planar f32 buffer.
///
/// Image content lives in `[0,1]`; kernel intermediates (gradients, FFT
/// residues) may exceed that range and are clamped before quantization.
/// Invariant: `data.len() == width * height`, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl Plane {
    /// Zero-filled plane. Zero-area dimensions are rejected.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        Self::filled(width, height, 0.0)
    }

    /// Constant-valued plane.
    pub fn filled(width: u32, height: u32, value: f32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(TextureError::InvalidShape(format!(
                "zero-area plane {width}x{height}"
            )));
        }
        Ok(Plane {
            width,
            height,
            data: vec![value; width as usize * height as usize],
        })
    }

    /// Build a plane by evaluating `f(x, y)` at every pixel.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> f32) -> Result<Self> {
        let mut plane = Plane::new(width, height)?;
        for y in 0..height {
            for x in 0..width {
                plane.set(x, y, f(x, y));
            }
        }
        Ok(plane)
    }

    /// Wrap an existing buffer. Length must match the dimensions exactly.
    pub fn from_vec(width: u32, height: u32, data: Vec<f32>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if width == 0 || height == 0 {
            return Err(TextureError::InvalidShape(format!(
                "zero-area plane {width}x{height}"
            )));
        }
        if data.len() != expected {
            return Err(TextureError::InvalidShape(format!(
                "buffer length {} does not match {width}x{height} (expected {expected})",
                data.len()
            )));
        }
        Ok(Plane { width, height, data })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, v: f32) {
        self.data[y as usize * self.width as usize + x as usize] = v;
    }

    /// Sample with edge replication: out-of-range coordinates clamp to the
    /// nearest edge pixel.
    #[inline]
    pub fn sample_clamped(&self, x: i64, y: i64) -> f32 {
        let cx = x.clamp(0, self.width as i64 - 1) as u32;
        let cy = y.clamp(0, self.height as i64 - 1) as u32;
        self.get(cx, cy)
    }

    /// Sample with toroidal wrap-around.
    #[inline]
    pub fn sample_wrapped(&self, x: i64, y: i64) -> f32 {
        let wx = x.rem_euclid(self.width as i64) as u32;
        let wy = y.rem_euclid(self.height as i64) as u32;
        self.get(wx, wy)
    }

    pub fn mean(&self) -> f32 {
        let sum: f64 = self.data.iter().map(|&v| v as f64).sum();
        (sum / self.data.len() as f64) as f32
    }

    pub fn max_value(&self) -> f32 {
        self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    /// Apply `f` to every sample in place.
    pub fn map_in_place(&mut self, f: impl Fn(f32) -> f32) {
        for v in &mut self.data {
            *v = f(*v);
        }
    }

    /// Clamp every sample to `[0,1]`.
    pub fn clamp01(&mut self) {
        self.map_in_place(|v| v.clamp(0.0, 1.0));
    }

    /// Reject planes carrying NaN or infinity. Kernels call this on entry
    /// so a poisoned buffer fails loudly instead of propagating garbage.
    pub fn ensure_finite(&self) -> Result<()> {
        if self.data.iter().all(|v| v.is_finite()) {
            Ok(())
        } else {
            Err(TextureError::Numeric(format!(
                "non-finite sample in {}x{} plane",
                self.width, self.height
            )))
        }
    }

    /// Mismatched dimensions between two planes → `InvalidShape`.
    pub fn ensure_same_shape(&self, other: &Plane) -> Result<()> {
        if self.width == other.width && self.height == other.height {
            Ok(())
        } else {
            Err(TextureError::InvalidShape(format!(
                "plane shapes differ: {}x{} vs {}x{}",
                self.width, self.height, other.width, other.height
            )))
        }
    }

    /// Quantize to an 8-bit grayscale image, round-to-nearest.
    pub fn to_gray8(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([(self.get(x, y).clamp(0.0, 1.0) * 255.0).round() as u8])
        })
    }

    /// Quantize to a 16-bit grayscale image, linear `[0,1] → [0,65535]`.
    pub fn to_gray16(&self) -> Gray16Image {
        Gray16Image::from_fn(self.width, self.height, |x, y| {
            Luma([(self.get(x, y).clamp(0.0, 1.0) * 65535.0).round() as u16])
        })
    }

    /// Lift an 8-bit grayscale image onto the f32 grid.
    pub fn from_gray8(gray: &GrayImage) -> Result<Self> {
        Plane::from_fn(gray.width(), gray.height(), |x, y| {
            gray.get_pixel(x, y)[0] as f32 / 255.0
        })
    }
}

// ── RGB conversions ───────────────────────────────────────────────────────

/// Linear luminance of an 8-bit RGB image, `Y = 0.299R + 0.587G + 0.114B`,
/// output in `[0,1]`.
pub fn luminance(rgb: &RgbImage) -> Result<Plane> {
    Plane::from_fn(rgb.width(), rgb.height(), |x, y| {
        let p = rgb.get_pixel(x, y);
        (LUMA_R * p[0] as f32 + LUMA_G * p[1] as f32 + LUMA_B * p[2] as f32) / 255.0
    })
}

/// Split an RGB image into three f32 planes (R, G, B).
pub fn rgb_to_planes(rgb: &RgbImage) -> Result<[Plane; 3]> {
    let (w, h) = rgb.dimensions();
    let mut planes = [Plane::new(w, h)?, Plane::new(w, h)?, Plane::new(w, h)?];
    for (x, y, p) in rgb.enumerate_pixels() {
        for c in 0..3 {
            planes[c].set(x, y, p[c] as f32 / 255.0);
        }
    }
    Ok(planes)
}

/// Recombine three planes into an 8-bit RGB image, round-to-nearest.
/// All planes must share one shape.
pub fn planes_to_rgb(planes: &[Plane; 3]) -> Result<RgbImage> {
    planes[0].ensure_same_shape(&planes[1])?;
    planes[0].ensure_same_shape(&planes[2])?;
    let (w, h) = (planes[0].width(), planes[0].height());
    Ok(RgbImage::from_fn(w, h, |x, y| {
        let q = |c: usize| (planes[c].get(x, y).clamp(0.0, 1.0) * 255.0).round() as u8;
        image::Rgb([q(0), q(1), q(2)])
    }))
}

// ── Resampling ────────────────────────────────────────────────────────────

/// Lanczos-3 resize, both directions. Fails only on a zero-area target.
pub fn resize_rgb(rgb: &RgbImage, width: u32, height: u32) -> Result<RgbImage> {
    if width == 0 || height == 0 {
        return Err(TextureError::InvalidShape(format!(
            "zero-area resize target {width}x{height}"
        )));
    }
    if rgb.dimensions() == (width, height) {
        return Ok(rgb.clone());
    }
    Ok(image::imageops::resize(rgb, width, height, FilterType::Lanczos3))
}

/// Rotate a plane about its center by `angle_deg` (counter-clockwise),
/// bilinear resample with edge replication. Output keeps the input shape.
pub fn rotate(plane: &Plane, angle_deg: f32) -> Result<Plane> {
    plane.ensure_finite()?;
    let (w, h) = (plane.width(), plane.height());
    let theta = -angle_deg.to_radians(); // inverse mapping
    let (sin_t, cos_t) = theta.sin_cos();
    let cx = (w as f32 - 1.0) / 2.0;
    let cy = (h as f32 - 1.0) / 2.0;

    Plane::from_fn(w, h, |x, y| {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        let sx = cos_t * dx - sin_t * dy + cx;
        let sy = sin_t * dx + cos_t * dy + cy;
        bilinear(plane, sx, sy)
    })
}

/// Bilinear sample at fractional coordinates with edge replication.
fn bilinear(plane: &Plane, x: f32, y: f32) -> f32 {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let v00 = plane.sample_clamped(x0, y0);
    let v10 = plane.sample_clamped(x0 + 1, y0);
    let v01 = plane.sample_clamped(x0, y0 + 1);
    let v11 = plane.sample_clamped(x0 + 1, y0 + 1);

    let top = v00 + (v10 - v00) * fx;
    let bot = v01 + (v11 - v01) * fx;
    top + (bot - top) * fy
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn from_vec_rejects_bad_length() {
        assert!(Plane::from_vec(4, 4, vec![0.0; 15]).is_err());
        assert!(Plane::from_vec(0, 4, vec![]).is_err());
        assert!(Plane::from_vec(4, 4, vec![0.5; 16]).is_ok());
    }

    #[test]
    fn luminance_of_primaries() {
        let mut rgb = RgbImage::new(3, 1);
        rgb.put_pixel(0, 0, image::Rgb([255, 0, 0]));
        rgb.put_pixel(1, 0, image::Rgb([0, 255, 0]));
        rgb.put_pixel(2, 0, image::Rgb([0, 0, 255]));
        let y = luminance(&rgb).unwrap();
        assert_abs_diff_eq!(y.get(0, 0), 0.299, epsilon = 1e-6);
        assert_abs_diff_eq!(y.get(1, 0), 0.587, epsilon = 1e-6);
        assert_abs_diff_eq!(y.get(2, 0), 0.114, epsilon = 1e-6);
    }

    #[test]
    fn rgb_round_trip_is_lossless_on_the_8bit_grid() {
        let rgb = RgbImage::from_fn(16, 16, |x, y| {
            image::Rgb([(x * 16) as u8, (y * 16) as u8, ((x + y) * 8) as u8])
        });
        let planes = rgb_to_planes(&rgb).unwrap();
        let back = planes_to_rgb(&planes).unwrap();
        assert_eq!(rgb, back);
    }

    #[test]
    fn quantize_round_trip_contracts_to_grid() {
        // 8-bit → f32 → 8-bit must be the identity on the 8-bit grid.
        let gray = GrayImage::from_fn(16, 1, |x, _| Luma([(x * 17) as u8]));
        let plane = Plane::from_gray8(&gray).unwrap();
        assert_eq!(plane.to_gray8(), gray);
    }

    #[test]
    fn ensure_finite_rejects_nan() {
        let mut p = Plane::new(4, 4).unwrap();
        p.set(2, 2, f32::NAN);
        assert!(p.ensure_finite().is_err());
    }

    #[test]
    fn rotate_by_zero_is_identity() {
        let p = Plane::from_fn(8, 8, |x, y| (x + y) as f32 / 14.0).unwrap();
        let r = rotate(&p, 0.0).unwrap();
        for y in 0..8 {
            for x in 0..8 {
                assert_abs_diff_eq!(r.get(x, y), p.get(x, y), epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn rotate_by_180_flips_both_axes() {
        let p = Plane::from_fn(9, 9, |x, y| (x as f32) + 10.0 * (y as f32)).unwrap();
        let r = rotate(&p, 180.0).unwrap();
        assert_abs_diff_eq!(r.get(0, 0), p.get(8, 8), epsilon = 1e-3);
        assert_abs_diff_eq!(r.get(8, 0), p.get(0, 8), epsilon = 1e-3);
    }

    #[test]
    fn resize_rejects_zero_area() {
        let rgb = RgbImage::new(8, 8);
        assert!(resize_rgb(&rgb, 0, 4).is_err());
        let out = resize_rgb(&rgb, 4, 4).unwrap();
        assert_eq!(out.dimensions(), (4, 4));
    }

    #[test]
    fn gray16_maps_linearly() {
        let mut p = Plane::new(2, 1).unwrap();
        p.set(0, 0, 0.0);
        p.set(1, 0, 1.0);
        let g = p.to_gray16();
        assert_eq!(g.get_pixel(0, 0)[0], 0);
        assert_eq!(g.get_pixel(1, 0)[0], 65535);
    }
}
