use crate::buffer::Plane;
use crate::error::{Result, TextureError};
use rustfft::{num_complex::Complex, FftPlanner};

// ── Boundary policy ───────────────────────────────────────────────────────

/// How a kernel samples past the image border.
///
/// `Replicate` is the default; `Periodic` wraps toroidally and is the
/// seamless-preserving variant used on tessellated inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    Replicate,
    Periodic,
}

impl Boundary {
    #[inline]
    fn sample(self, plane: &Plane, x: i64, y: i64) -> f32 {
        match self {
            Boundary::Replicate => plane.sample_clamped(x, y),
            Boundary::Periodic => plane.sample_wrapped(x, y),
        }
    }
}

/// Axis selector for 1-D directional blurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

// ── Gaussian blur ─────────────────────────────────────────────────────────

/// Normalized 1-D Gaussian taps for `sigma`, radius `ceil(3σ)`.
fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (3.0 * sigma).ceil() as i64;
    let denom = 2.0 * sigma * sigma;
    let mut taps: Vec<f32> = (-radius..=radius)
        .map(|i| (-(i * i) as f32 / denom).exp())
        .collect();
    let sum: f32 = taps.iter().sum();
    for t in &mut taps {
        *t /= sum;
    }
    taps
}

/// Separable Gaussian blur. `sigma <= 0` is the identity.
pub fn gaussian_blur(plane: &Plane, sigma: f32, boundary: Boundary) -> Result<Plane> {
    plane.ensure_finite()?;
    if sigma <= 0.0 {
        return Ok(plane.clone());
    }
    let taps = gaussian_kernel(sigma);
    let horizontal = convolve_1d(plane, &taps, Axis::Horizontal, boundary)?;
    convolve_1d(&horizontal, &taps, Axis::Vertical, boundary)
}

/// 1-D Gaussian blur along a single axis (wood grain, metal streaks).
pub fn blur_axis(plane: &Plane, sigma: f32, axis: Axis, boundary: Boundary) -> Result<Plane> {
    plane.ensure_finite()?;
    if sigma <= 0.0 {
        return Ok(plane.clone());
    }
    convolve_1d(plane, &gaussian_kernel(sigma), axis, boundary)
}

fn convolve_1d(plane: &Plane, taps: &[f32], axis: Axis, boundary: Boundary) -> Result<Plane> {
    let radius = (taps.len() / 2) as i64;
    let (w, h) = (plane.width(), plane.height());
    Plane::from_fn(w, h, |x, y| {
        let mut acc = 0.0;
        for (i, &t) in taps.iter().enumerate() {
            let off = i as i64 - radius;
            let v = match axis {
                Axis::Horizontal => boundary.sample(plane, x as i64 + off, y as i64),
                Axis::Vertical => boundary.sample(plane, x as i64, y as i64 + off),
            };
            acc += t * v;
        }
        acc
    })
}

// ── Sobel ─────────────────────────────────────────────────────────────────

/// Sobel gradient pair `(gx, gy)`.
///
/// Raw 3×3 Sobel sums, no normalization: on `[0,1]` input each component
/// lies in `[-4, 4]`. y grows downward, so `gy` is positive where the
/// image brightens toward the bottom. The boundary policy is always edge
/// replication; on an image whose opposite edges already match exactly,
/// replicated border samples equal the wrapped ones, so gradients line up
/// across the wrap without a periodic variant.
pub fn sobel_xy(plane: &Plane) -> Result<(Plane, Plane)> {
    plane.ensure_finite()?;
    let (w, h) = (plane.width(), plane.height());
    let mut gx = Plane::new(w, h)?;
    let mut gy = Plane::new(w, h)?;

    for y in 0..h {
        for x in 0..w {
            let s = |dx: i64, dy: i64| plane.sample_clamped(x as i64 + dx, y as i64 + dy);
            let dx = (s(1, -1) - s(-1, -1)) + 2.0 * (s(1, 0) - s(-1, 0)) + (s(1, 1) - s(-1, 1));
            let dy = (s(-1, 1) - s(-1, -1)) + 2.0 * (s(0, 1) - s(0, -1)) + (s(1, 1) - s(1, -1));
            gx.set(x, y, dx);
            gy.set(x, y, dy);
        }
    }
    Ok((gx, gy))
}

// ── 2-D FFT ───────────────────────────────────────────────────────────────

/// Frequency-domain image. Carries the padded transform grid plus the
/// original crop so `ifft2` can restore the input shape.
pub struct Spectrum {
    padded_w: usize,
    padded_h: usize,
    orig_w: u32,
    orig_h: u32,
    data: Vec<Complex<f32>>,
}

impl Spectrum {
    pub fn padded_width(&self) -> usize {
        self.padded_w
    }

    pub fn padded_height(&self) -> usize {
        self.padded_h
    }

    #[inline]
    pub fn get(&self, kx: usize, ky: usize) -> Complex<f32> {
        self.data[ky * self.padded_w + kx]
    }

    #[inline]
    pub fn set(&mut self, kx: usize, ky: usize, v: Complex<f32>) {
        self.data[ky * self.padded_w + kx] = v;
    }

    /// Scale every bin by a real factor computed from its coordinates.
    /// Used for radial masks in the frequency tessellation.
    pub fn apply_radial(&mut self, f: impl Fn(usize, usize) -> f32) {
        for ky in 0..self.padded_h {
            for kx in 0..self.padded_w {
                let g = f(kx, ky);
                let v = self.data[ky * self.padded_w + kx];
                self.data[ky * self.padded_w + kx] = v * g;
            }
        }
    }
}

fn next_pow2(n: usize) -> usize {
    n.next_power_of_two()
}

/// Forward 2-D FFT. Rectangular input is zero-padded to the next power of
/// two per axis; `ifft2` crops back. Row transforms first, then columns.
pub fn fft2(plane: &Plane) -> Result<Spectrum> {
    plane.ensure_finite()?;
    let (w, h) = (plane.width() as usize, plane.height() as usize);
    let pw = next_pow2(w);
    let ph = next_pow2(h);

    let mut data = vec![Complex::new(0.0f32, 0.0); pw * ph];
    for y in 0..h {
        for x in 0..w {
            data[y * pw + x] = Complex::new(plane.get(x as u32, y as u32), 0.0);
        }
    }

    let mut planner = FftPlanner::<f32>::new();
    let row_fft = planner.plan_fft_forward(pw);
    let col_fft = planner.plan_fft_forward(ph);

    for row in data.chunks_exact_mut(pw) {
        row_fft.process(row);
    }
    transform_columns(&mut data, pw, ph, |col| col_fft.process(col));

    Ok(Spectrum {
        padded_w: pw,
        padded_h: ph,
        orig_w: plane.width(),
        orig_h: plane.height(),
        data,
    })
}

/// Inverse 2-D FFT: real part of the inverse transform, scaled by
/// `1/(pw·ph)` so `ifft2(fft2(p)) == p` within float error, cropped to the
/// original shape.
pub fn ifft2(spectrum: Spectrum) -> Result<Plane> {
    let Spectrum {
        padded_w: pw,
        padded_h: ph,
        orig_w,
        orig_h,
        mut data,
    } = spectrum;

    let mut planner = FftPlanner::<f32>::new();
    let row_fft = planner.plan_fft_inverse(pw);
    let col_fft = planner.plan_fft_inverse(ph);

    for row in data.chunks_exact_mut(pw) {
        row_fft.process(row);
    }
    transform_columns(&mut data, pw, ph, |col| col_fft.process(col));

    let scale = 1.0 / (pw * ph) as f32;
    let plane = Plane::from_fn(orig_w, orig_h, |x, y| {
        data[y as usize * pw + x as usize].re * scale
    })?;
    plane.ensure_finite().map_err(|_| {
        TextureError::Numeric("inverse FFT produced non-finite samples".into())
    })?;
    Ok(plane)
}

/// Run a length-`ph` transform over every column of a `pw`×`ph` grid.
/// Columns are gathered into a scratch buffer since rustfft wants
/// contiguous input.
fn transform_columns(
    data: &mut [Complex<f32>],
    pw: usize,
    ph: usize,
    transform: impl Fn(&mut [Complex<f32>]),
) {
    let mut column = vec![Complex::new(0.0f32, 0.0); ph];
    for x in 0..pw {
        for y in 0..ph {
            column[y] = data[y * pw + x];
        }
        transform(&mut column);
        for y in 0..ph {
            data[y * pw + x] = column[y];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ramp(w: u32, h: u32) -> Plane {
        Plane::from_fn(w, h, |x, _| x as f32 / (w - 1) as f32).unwrap()
    }

    #[test]
    fn gaussian_kernel_is_normalized() {
        for sigma in [0.5, 1.0, 2.5, 8.0] {
            let taps = gaussian_kernel(sigma);
            let sum: f32 = taps.iter().sum();
            assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-5);
            assert_eq!(taps.len(), 2 * (3.0f32 * sigma).ceil() as usize + 1);
        }
    }

    #[test]
    fn blur_of_constant_plane_is_constant() {
        let p = Plane::filled(16, 16, 0.42).unwrap();
        for boundary in [Boundary::Replicate, Boundary::Periodic] {
            let b = gaussian_blur(&p, 2.0, boundary).unwrap();
            for &v in b.data() {
                assert_abs_diff_eq!(v, 0.42, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn periodic_blur_preserves_mean() {
        let p = Plane::from_fn(32, 32, |x, y| ((x * 7 + y * 13) % 32) as f32 / 31.0).unwrap();
        let b = gaussian_blur(&p, 3.0, Boundary::Periodic).unwrap();
        assert_abs_diff_eq!(b.mean(), p.mean(), epsilon = 1e-4);
    }

    #[test]
    fn sobel_of_constant_is_zero() {
        let p = Plane::filled(8, 8, 0.5).unwrap();
        let (gx, gy) = sobel_xy(&p).unwrap();
        for y in 0..8 {
            for x in 0..8 {
                assert_abs_diff_eq!(gx.get(x, y), 0.0, epsilon = 1e-6);
                assert_abs_diff_eq!(gy.get(x, y), 0.0, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn sobel_of_horizontal_ramp_points_along_x() {
        let p = ramp(16, 16);
        let (gx, gy) = sobel_xy(&p).unwrap();
        // Interior gradient of a unit ramp: 4 taps × step 1/(w-1).
        let expected = 8.0 / 15.0;
        assert_abs_diff_eq!(gx.get(8, 8), expected, epsilon = 1e-4);
        assert_abs_diff_eq!(gy.get(8, 8), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn blur_axis_only_touches_one_axis() {
        // A vertical stripe blurred vertically stays identical.
        let p = Plane::from_fn(16, 16, |x, _| if x == 8 { 1.0 } else { 0.0 }).unwrap();
        let b = blur_axis(&p, 2.0, Axis::Vertical, Boundary::Periodic).unwrap();
        for y in 0..16 {
            assert_abs_diff_eq!(b.get(8, y), 1.0, epsilon = 1e-5);
            assert_abs_diff_eq!(b.get(0, y), 0.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn fft_round_trip_recovers_input() {
        // 24×17 exercises the pad-to-pow2-and-crop path.
        let p = Plane::from_fn(24, 17, |x, y| ((x * 3 + y * 5) % 11) as f32 / 10.0).unwrap();
        let back = ifft2(fft2(&p).unwrap()).unwrap();
        for y in 0..17 {
            for x in 0..24 {
                assert_abs_diff_eq!(back.get(x, y), p.get(x, y), epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn fft_preserves_energy() {
        let p = Plane::from_fn(32, 32, |x, y| ((x ^ y) & 7) as f32 / 7.0).unwrap();
        let spatial: f64 = p.data().iter().map(|&v| (v as f64) * v as f64).sum();
        let spectrum = fft2(&p).unwrap();
        let n = (spectrum.padded_width() * spectrum.padded_height()) as f64;
        let freq: f64 =
            spectrum.data.iter().map(|c| c.norm_sqr() as f64).sum::<f64>() / n;
        // Parseval on the padded grid; padding is zeros so spatial energy is unchanged.
        assert!((spatial - freq).abs() / spatial.max(1e-12) < 1e-6);
    }
}
