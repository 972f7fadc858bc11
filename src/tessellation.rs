use crate::buffer::{luminance, planes_to_rgb, rgb_to_planes, Plane};
use crate::diag::Diagnostics;
use crate::error::{Result, TextureError};
use crate::filters::{fft2, gaussian_blur, ifft2, Boundary};
use image::RgbImage;
use serde::Deserialize;

// ── Parameters ────────────────────────────────────────────────────────────

/// Seam-removal algorithm. `Offset` suits geometric patterns with
/// repeatable cells, `Mirror` symmetric organic textures, `Frequency`
/// anything where spectral seam removal is acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TessAlgorithm {
    Offset,
    Mirror,
    Frequency,
}

impl TessAlgorithm {
    /// Exact lowercase name lookup (CLI `--method` values).
    pub fn from_name(name: &str) -> Option<TessAlgorithm> {
        match name.trim().to_ascii_lowercase().as_str() {
            "offset" => Some(TessAlgorithm::Offset),
            "mirror" => Some(TessAlgorithm::Mirror),
            "frequency" => Some(TessAlgorithm::Frequency),
            _ => None,
        }
    }
}

/// Minimum useful blend band; anything narrower leaves a visible seam.
const MIN_BLEND_WIDTH: u32 = 8;

/// 8-bit seam tolerance: one quantization step.
const SEAM_EPSILON: f32 = 1.0 / 255.0;

#[derive(Debug, Clone, Copy)]
pub struct TessellationParams {
    pub algorithm: TessAlgorithm,
    /// Blend band width in pixels. 0 selects the default rule
    /// `max(16, min(w,h)/32)`.
    pub blend_width: u32,
    /// Extra radial blend over the point where the four original corners
    /// meet (offset algorithm only; mirror and frequency corners are exact
    /// by construction).
    pub corner_blend: bool,
}

impl Default for TessellationParams {
    fn default() -> Self {
        TessellationParams {
            algorithm: TessAlgorithm::Mirror,
            blend_width: 0,
            corner_blend: true,
        }
    }
}

/// Default blend band for a given image size.
pub fn default_blend_width(width: u32, height: u32) -> u32 {
    (width.min(height) / 32).max(16)
}

impl TessellationParams {
    /// Clamp `blend_width` into `[8, min(w,h)/2]`, warning on excursions.
    /// 0 silently resolves to the size-derived default.
    fn resolve_blend_width(&self, width: u32, height: u32, diag: &mut Diagnostics) -> u32 {
        let max_band = (width.min(height) / 2).max(MIN_BLEND_WIDTH);
        let requested = if self.blend_width == 0 {
            default_blend_width(width, height)
        } else {
            self.blend_width
        };
        if requested < MIN_BLEND_WIDTH {
            diag.warn(format!(
                "blend_width {requested} below minimum, clamped to {MIN_BLEND_WIDTH}"
            ));
            MIN_BLEND_WIDTH
        } else if requested > max_band {
            diag.warn(format!(
                "blend_width {requested} exceeds half the image, clamped to {max_band}"
            ));
            max_band
        } else {
            requested
        }
    }
}

// ── Seam validator ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct SeamReport {
    pub is_seamless: bool,
    /// Maximum of horizontal, vertical, and 4-corner cross deltas in
    /// linear luminance.
    pub max_edge_delta: f32,
}

/// Measure how far an image is from tiling cleanly.
pub fn validate_tiling(plane: &Plane) -> Result<SeamReport> {
    plane.ensure_finite()?;
    let (w, h) = (plane.width(), plane.height());
    let mut max_delta = 0.0f32;

    for y in 0..h {
        max_delta = max_delta.max((plane.get(0, y) - plane.get(w - 1, y)).abs());
    }
    for x in 0..w {
        max_delta = max_delta.max((plane.get(x, 0) - plane.get(x, h - 1)).abs());
    }

    // 4-corner cross-delta: under toroidal tiling all four corners meet at
    // one point, so every pair must agree.
    let corners = [
        plane.get(0, 0),
        plane.get(w - 1, 0),
        plane.get(0, h - 1),
        plane.get(w - 1, h - 1),
    ];
    for i in 0..4 {
        for j in i + 1..4 {
            max_delta = max_delta.max((corners[i] - corners[j]).abs());
        }
    }

    Ok(SeamReport {
        is_seamless: max_delta <= SEAM_EPSILON,
        max_edge_delta: max_delta,
    })
}

/// RGB variant: the report is computed in linear luminance.
pub fn validate_tiling_rgb(rgb: &RgbImage) -> Result<SeamReport> {
    validate_tiling(&luminance(rgb)?)
}

// ── Entry points ──────────────────────────────────────────────────────────

/// Make an RGB image seamlessly tileable. All three channels run through
/// the same algorithm with identical masks so chroma stays aligned.
///
/// An input that already validates as seamless is returned unchanged,
/// which makes the engine idempotent.
pub fn make_seamless_rgb(
    rgb: &RgbImage,
    params: &TessellationParams,
    diag: &mut Diagnostics,
) -> Result<RgbImage> {
    if validate_tiling_rgb(rgb)?.is_seamless {
        log::debug!("input already seamless, tessellation skipped");
        return Ok(rgb.clone());
    }
    check_shape(rgb.width(), rgb.height())?;
    let bw = params.resolve_blend_width(rgb.width(), rgb.height(), diag);
    let [r, g, b] = rgb_to_planes(rgb)?;
    let out = [
        apply_algorithm(&r, params, bw)?,
        apply_algorithm(&g, params, bw)?,
        apply_algorithm(&b, params, bw)?,
    ];
    planes_to_rgb(&out)
}

/// Make a single plane seamlessly tileable; same fast path as the RGB
/// variant.
pub fn make_seamless_plane(
    plane: &Plane,
    params: &TessellationParams,
    diag: &mut Diagnostics,
) -> Result<Plane> {
    if validate_tiling(plane)?.is_seamless {
        return Ok(plane.clone());
    }
    check_shape(plane.width(), plane.height())?;
    let bw = params.resolve_blend_width(plane.width(), plane.height(), diag);
    apply_algorithm(plane, params, bw)
}

fn check_shape(w: u32, h: u32) -> Result<()> {
    if w < 2 || h < 2 {
        return Err(TextureError::InvalidShape(format!(
            "image {w}x{h} too small to tessellate"
        )));
    }
    Ok(())
}

fn apply_algorithm(plane: &Plane, params: &TessellationParams, bw: u32) -> Result<Plane> {
    plane.ensure_finite()?;
    match params.algorithm {
        TessAlgorithm::Offset => offset_plane(plane, bw, params.corner_blend),
        TessAlgorithm::Mirror => mirror_plane(plane, bw),
        TessAlgorithm::Frequency => frequency_plane(plane),
    }
}

/// The S-curve used by every blend mask: `3t² − 2t³` on `[0,1]`.
#[inline]
fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

// ── Offset algorithm ──────────────────────────────────────────────────────

/// Quadrant swap plus center-cross blending.
///
/// 1. Wrap-shift by half the image so the original edges cross the center.
/// 2. Cross-fade back to the original over a band on the seam cross
///    (S-curve mask), widening to a disc at the center when `corner_blend`.
/// 3. Gaussian smoothing `σ = bw/6` confined to the blend band.
/// 4. A narrow wrap-equalization feather pins opposite edges to the exact
///    same values so the validator sees zero delta.
fn offset_plane(plane: &Plane, bw: u32, corner_blend: bool) -> Result<Plane> {
    let (w, h) = (plane.width(), plane.height());
    let (shift_x, shift_y) = (w / 2, h / 2);

    // Step 1 — diagonal quadrant swap via toroidal shift
    let swapped = Plane::from_fn(w, h, |x, y| {
        plane.get((x + shift_x) % w, (y + shift_y) % h)
    })?;

    // Step 2 — S-curve mask: 1 on the interior seam cross, 0 at the edges
    let seam_x = shift_x as f32;
    let seam_y = shift_y as f32;
    let half_band = bw as f32 / 2.0;
    let mask = Plane::from_fn(w, h, |x, y| {
        let dx = (x as f32 + 0.5 - seam_x).abs();
        let dy = (y as f32 + 0.5 - seam_y).abs();
        let mut m = smoothstep(1.0 - dx / half_band).max(smoothstep(1.0 - dy / half_band));
        if corner_blend {
            let r = (dx * dx + dy * dy).sqrt();
            m = m.max(smoothstep(1.0 - r / bw as f32));
        }
        m
    })?;

    let blended = Plane::from_fn(w, h, |x, y| {
        let m = mask.get(x, y);
        m * plane.get(x, y) + (1.0 - m) * swapped.get(x, y)
    })?;

    // Step 3 — band-confined smoothing
    let sigma = bw as f32 / 6.0;
    let smoothed = gaussian_blur(&blended, sigma, Boundary::Replicate)?;
    let banded = Plane::from_fn(w, h, |x, y| {
        let m = mask.get(x, y);
        m * smoothed.get(x, y) + (1.0 - m) * blended.get(x, y)
    })?;

    // Step 4 — the swap leaves opposite edges on adjacent source columns;
    // a short feather collapses that residue below the seam tolerance.
    mirror_plane(&banded, (bw / 8).max(2))
}

// ── Mirror algorithm ──────────────────────────────────────────────────────

/// Per-axis blend toward the reflected image, quadratic easing `t²(3−2t)`,
/// weight 0.5 at the very edge so opposite edges land on the exact same
/// average. Horizontal pass then vertical pass; corners converge to the
/// average of the four original corners.
fn mirror_plane(plane: &Plane, bw: u32) -> Result<Plane> {
    let pass_h = mirror_pass_horizontal(plane, bw)?;
    mirror_pass_vertical(&pass_h, bw)
}

fn mirror_weight(dist: u32, bw: u32) -> f32 {
    if dist >= bw {
        0.0
    } else {
        0.5 * (1.0 - smoothstep(dist as f32 / bw as f32))
    }
}

fn mirror_pass_horizontal(plane: &Plane, bw: u32) -> Result<Plane> {
    let (w, h) = (plane.width(), plane.height());
    Plane::from_fn(w, h, |x, y| {
        let wgt = mirror_weight(x.min(w - 1 - x), bw);
        (1.0 - wgt) * plane.get(x, y) + wgt * plane.get(w - 1 - x, y)
    })
}

fn mirror_pass_vertical(plane: &Plane, bw: u32) -> Result<Plane> {
    let (w, h) = (plane.width(), plane.height());
    Plane::from_fn(w, h, |x, y| {
        let wgt = mirror_weight(y.min(h - 1 - y), bw);
        (1.0 - wgt) * plane.get(x, y) + wgt * plane.get(x, h - 1 - y)
    })
}

// ── Frequency algorithm ───────────────────────────────────────────────────

/// Spectral seam removal.
///
/// 1. Multiply by a 2-D Hann window.
/// 2. `fft2`.
/// 3. Soft high-pass `H(r) = 1 − exp(−(r/r₀)²)`, `r₀ = 0.01·min(W,H)`;
///    the DC bin is zeroed by the mask and the image mean re-added after
///    inversion.
/// 4. `ifft2`, real part, add mean, clamp.
///
/// The DFT reconstruction is periodic on the transform grid; a one-pixel
/// wrap ring then makes opposite borders exactly equal after cropping.
fn frequency_plane(plane: &Plane) -> Result<Plane> {
    let (w, h) = (plane.width(), plane.height());
    let mean = plane.mean();

    // Step 1 — Hann window
    let windowed = Plane::from_fn(w, h, |x, y| {
        plane.get(x, y) * hann(x, w) * hann(y, h)
    })?;

    // Steps 2–3 — forward transform, radial high-pass
    let mut spectrum = fft2(&windowed)?;
    let r0 = 0.01 * w.min(h) as f32;
    let (pw, ph) = (spectrum.padded_width(), spectrum.padded_height());
    spectrum.apply_radial(|kx, ky| {
        let fx = kx.min(pw - kx) as f32;
        let fy = ky.min(ph - ky) as f32;
        let r2 = fx * fx + fy * fy;
        1.0 - (-r2 / (r0 * r0)).exp()
    });

    // Step 4 — invert, restore the mean carried around the high-pass
    let mut out = ifft2(spectrum)?;
    out.map_in_place(|v| (v + mean).clamp(0.0, 1.0));

    mirror_plane(&out, 1)
}

/// Hann tap at position `i` of an `n`-wide axis.
fn hann(i: u32, n: u32) -> f32 {
    if n < 2 {
        return 1.0;
    }
    let phase = std::f32::consts::TAU * i as f32 / (n - 1) as f32;
    0.5 * (1.0 - phase.cos())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn noisy_plane(w: u32, h: u32) -> Plane {
        // Deterministic mid-frequency content with strongly mismatched edges.
        Plane::from_fn(w, h, |x, y| {
            let fx = x as f32 / w as f32;
            let fy = y as f32 / h as f32;
            (0.5 + 0.4 * fx - 0.3 * fy + 0.1 * (fx * 37.0).sin() * (fy * 29.0).cos())
                .clamp(0.0, 1.0)
        })
        .unwrap()
    }

    fn assert_seamless(plane: &Plane, tol: f32) {
        let report = validate_tiling(plane).unwrap();
        assert!(
            report.max_edge_delta <= tol,
            "max_edge_delta {} exceeds {}",
            report.max_edge_delta,
            tol
        );
    }

    #[test]
    fn validator_flags_a_ramp() {
        let ramp = Plane::from_fn(32, 32, |x, _| x as f32 / 31.0).unwrap();
        let report = validate_tiling(&ramp).unwrap();
        assert!(!report.is_seamless);
        assert_abs_diff_eq!(report.max_edge_delta, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn validator_accepts_constant() {
        let flat = Plane::filled(32, 32, 0.5).unwrap();
        let report = validate_tiling(&flat).unwrap();
        assert!(report.is_seamless);
        assert_abs_diff_eq!(report.max_edge_delta, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn mirror_produces_exactly_matching_edges() {
        let p = noisy_plane(64, 64);
        let mut diag = Diagnostics::new();
        let params = TessellationParams {
            algorithm: TessAlgorithm::Mirror,
            blend_width: 16,
            corner_blend: false,
        };
        let out = make_seamless_plane(&p, &params, &mut diag).unwrap();
        assert_seamless(&out, 1e-6);
    }

    #[test]
    fn offset_edges_fall_under_seam_tolerance() {
        let p = noisy_plane(64, 64);
        let mut diag = Diagnostics::new();
        let params = TessellationParams {
            algorithm: TessAlgorithm::Offset,
            blend_width: 16,
            corner_blend: true,
        };
        let out = make_seamless_plane(&p, &params, &mut diag).unwrap();
        assert_seamless(&out, 1.0 / 255.0);
    }

    #[test]
    fn frequency_reaches_exact_equality() {
        let p = noisy_plane(64, 64);
        let mut diag = Diagnostics::new();
        let params = TessellationParams {
            algorithm: TessAlgorithm::Frequency,
            blend_width: 0,
            corner_blend: false,
        };
        let out = make_seamless_plane(&p, &params, &mut diag).unwrap();
        assert_seamless(&out, 1e-5);
    }

    #[test]
    fn already_seamless_input_is_returned_unchanged() {
        let flat = Plane::filled(32, 32, 0.25).unwrap();
        let mut diag = Diagnostics::new();
        let out = make_seamless_plane(&flat, &TessellationParams::default(), &mut diag).unwrap();
        assert_eq!(out, flat);
    }

    #[test]
    fn engine_is_idempotent_on_its_own_output() {
        // A second application must detect the seamless result and no-op.
        let p = noisy_plane(64, 64);
        let mut diag = Diagnostics::new();
        for algorithm in [
            TessAlgorithm::Offset,
            TessAlgorithm::Mirror,
            TessAlgorithm::Frequency,
        ] {
            let params = TessellationParams {
                algorithm,
                blend_width: 16,
                corner_blend: false,
            };
            let once = make_seamless_plane(&p, &params, &mut diag).unwrap();
            let twice = make_seamless_plane(&once, &params, &mut diag).unwrap();
            assert_eq!(once, twice, "{algorithm:?} not idempotent");
        }
    }

    #[test]
    fn oversized_blend_width_clamps_with_warning() {
        let p = noisy_plane(32, 32);
        let mut diag = Diagnostics::new();
        let params = TessellationParams {
            algorithm: TessAlgorithm::Mirror,
            blend_width: 400,
            corner_blend: false,
        };
        let out = make_seamless_plane(&p, &params, &mut diag).unwrap();
        assert_eq!(diag.warnings().len(), 1);
        // Degenerate full-image blend must still produce a valid image.
        assert_seamless(&out, 1e-6);
        out.ensure_finite().unwrap();
    }

    #[test]
    fn checkerboard_mirror_scenario() {
        // 64×64 checkerboard, 8px cells, Mirror with blend_width 16.
        let p = Plane::from_fn(64, 64, |x, y| {
            if ((x / 8) + (y / 8)) % 2 == 0 {
                1.0
            } else {
                0.0
            }
        })
        .unwrap();
        let mut diag = Diagnostics::new();
        let params = TessellationParams {
            algorithm: TessAlgorithm::Mirror,
            blend_width: 16,
            corner_blend: false,
        };
        let out = make_seamless_plane(&p, &params, &mut diag).unwrap();
        assert_seamless(&out, 2.0 / 255.0);
    }

    #[test]
    fn rgb_channels_stay_aligned() {
        let rgb = RgbImage::from_fn(48, 48, |x, y| {
            let v = ((x * 5 + y * 3) % 256) as u8;
            image::Rgb([v, v, v])
        });
        let mut diag = Diagnostics::new();
        let out = make_seamless_rgb(&rgb, &TessellationParams::default(), &mut diag).unwrap();
        // Grayscale input must stay grayscale: identical masks per channel.
        for p in out.pixels() {
            assert_eq!(p[0], p[1]);
            assert_eq!(p[1], p[2]);
        }
        let report = validate_tiling_rgb(&out).unwrap();
        assert!(report.is_seamless, "delta {}", report.max_edge_delta);
    }
}
