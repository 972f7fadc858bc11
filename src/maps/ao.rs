use super::{DeriveContext, MapDeriver, MapKind, TextureData, TextureMap};
use crate::buffer::Plane;
use crate::diag::Diagnostics;
use crate::error::{Result, TextureError};
use crate::filters::{blur_axis, gaussian_blur, sobel_xy, Axis, Boundary};
use crate::material::MaterialClass;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Sub-signal weights: cavity, global, gradient.
const CAVITY_WEIGHT: f32 = 0.4;
const GLOBAL_WEIGHT: f32 = 0.3;
const GRADIENT_WEIGHT: f32 = 0.3;

/// Cavity depth gain: the blur-minus-height residue is small, so it is
/// amplified tenfold before clamping.
const CAVITY_GAIN: f32 = 10.0;

/// Neutral AO level emitted when no height plane is available.
const FALLBACK_AO: f32 = 0.9;
/// Sigma of the Gaussian noise dithered over the fallback plane.
const FALLBACK_NOISE_SIGMA: f32 = 0.01;

/// Fixed noise seed for the fallback plane.
const NOISE_SEED: u64 = 0x616f5f6e65757472;

#[derive(Debug, Clone)]
pub struct AoParams {
    /// Blur sigma for cavity detection (small concavities).
    pub cavity_scale: f32,
    /// Base sigma of the multi-scale global occlusion passes.
    pub global_scale: f32,
    /// Floor: no pixel goes darker than this.
    pub min_ao: f32,
    /// Occlusion depth gain; 1.0 is neutral.
    pub intensity: f32,
}

impl AoParams {
    pub fn for_material(material: MaterialClass) -> Self {
        let preset = material.ao_preset();
        AoParams {
            cavity_scale: preset.cavity_scale,
            global_scale: preset.global_scale,
            min_ao: preset.min_ao,
            intensity: preset.intensity,
        }
    }
}

/// Multi-scale ambient occlusion from the shared height plane.
///
/// 1 = fully lit, 0 = fully occluded. Three sub-signals combine:
/// cavity (blur-minus-height), global (three blur-and-blend octaves),
/// and gradient (slope attenuation).
pub struct AoDeriver {
    pub params: AoParams,
}

impl MapDeriver for AoDeriver {
    fn kind(&self) -> MapKind {
        MapKind::Ao
    }

    fn derive(&self, ctx: &DeriveContext<'_>, diag: &mut Diagnostics) -> Result<TextureMap> {
        if ctx.cancel.is_cancelled() {
            return Err(TextureError::Cancelled);
        }
        let p = &self.params;

        let Some(height) = ctx.height else {
            diag.warn("no height plane available, emitting neutral AO");
            let (w, h) = ctx.diffuse.dimensions();
            return Ok(TextureMap {
                kind: MapKind::Ao,
                data: TextureData::Gray8(neutral_fallback(w, h)?.to_gray8()),
            });
        };
        let boundary = ctx.boundary();

        // Cavity — darkening inside small concavities
        let blurred = gaussian_blur(height, p.cavity_scale, boundary)?;
        let mut cavity = Plane::from_fn(height.width(), height.height(), |x, y| {
            let c = (blurred.get(x, y) - height.get(x, y)).max(0.0);
            (1.0 - CAVITY_GAIN * c).clamp(0.0, 1.0)
        })?;

        // Global — successive blur-and-blend octaves, then a gamma lift
        let mut global = height.clone();
        for octave in 0..3u32 {
            if ctx.cancel.is_cancelled() {
                return Err(TextureError::Cancelled);
            }
            let sigma = p.global_scale * (1 << octave) as f32;
            let pass = gaussian_blur(&global, sigma, boundary)?;
            for (g, b) in global.data_mut().iter_mut().zip(pass.data().iter()) {
                *g = 0.5 * *g + 0.5 * *b;
            }
        }
        global.map_in_place(|v| v.max(0.0).powf(1.5));

        // Gradient — steep slopes read as self-shadowing. Sobel is always
        // edge-replicated; matching opposite edges keep it seamless.
        if ctx.cancel.is_cancelled() {
            return Err(TextureError::Cancelled);
        }
        let (gx, gy) = sobel_xy(height)?;
        let mut magnitude = Plane::from_fn(height.width(), height.height(), |x, y| {
            let (dx, dy) = (gx.get(x, y), gy.get(x, y));
            (dx * dx + dy * dy).sqrt()
        })?;
        let peak = magnitude.max_value() + f32::EPSILON;
        magnitude.map_in_place(|m| 1.0 - 0.5 * (m / peak));
        let gradient = gaussian_blur(&magnitude, 1.0, boundary)?;

        // Combine and shape per material
        for ((c, g), s) in cavity
            .data_mut()
            .iter_mut()
            .zip(global.data().iter())
            .zip(gradient.data().iter())
        {
            *c = CAVITY_WEIGHT * *c + GLOBAL_WEIGHT * *g + GRADIENT_WEIGHT * *s;
        }
        let mut ao = cavity;
        apply_material_shaping(&mut ao, ctx, boundary)?;

        // Depth gain, then the material floor
        let intensity = p.intensity;
        let min_ao = p.min_ao.clamp(0.0, 1.0);
        ao.map_in_place(|v| {
            let deepened = (1.0 - intensity * (1.0 - v)).clamp(0.0, 1.0);
            deepened * (1.0 - min_ao) + min_ao
        });

        Ok(TextureMap {
            kind: MapKind::Ao,
            data: TextureData::Gray8(ao.to_gray8()),
        })
    }
}

fn apply_material_shaping(
    ao: &mut Plane,
    ctx: &DeriveContext<'_>,
    boundary: Boundary,
) -> Result<()> {
    match ctx.material {
        // Deepen crevices: masonry reads better with darker pits.
        MaterialClass::Stone | MaterialClass::Brick => {
            ao.map_in_place(|v| if v < 0.3 { v * 0.8 } else { v });
        }
        // Soften across the grain like the roughness pass does.
        MaterialClass::Wood => {
            let soft = blur_axis(ao, 2.0, Axis::Horizontal, boundary)?;
            for (a, s) in ao.data_mut().iter_mut().zip(soft.data().iter()) {
                *a = 0.7 * *a + 0.3 * *s;
            }
        }
        // Low-amplitude weave overlay.
        MaterialClass::Fabric => {
            let (w, h) = (ao.width(), ao.height());
            for y in 0..h {
                for x in 0..w {
                    let weave = 0.05
                        * ((std::f32::consts::PI * x as f32 / 4.0).sin()
                            + (std::f32::consts::PI * y as f32 / 4.0).sin());
                    ao.set(x, y, (ao.get(x, y) + weave).clamp(0.0, 1.0));
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// Neutral plane with light Gaussian dither so the map does not band when
/// compressed. The 12-uniform sum approximates a unit normal.
fn neutral_fallback(w: u32, h: u32) -> Result<Plane> {
    let mut rng = StdRng::seed_from_u64(NOISE_SEED);
    let mut plane = Plane::filled(w, h, FALLBACK_AO)?;
    for v in plane.data_mut() {
        let unit: f32 = (0..12).map(|_| rng.random_range(0.0f32..1.0)).sum::<f32>() - 6.0;
        *v = (*v + FALLBACK_NOISE_SIGMA * unit).clamp(0.0, 1.0);
    }
    Ok(plane)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::luminance;
    use crate::pipeline::CancelFlag;
    use image::{Rgb, RgbImage};

    fn derive(
        diffuse: &RgbImage,
        height: Option<&Plane>,
        material: MaterialClass,
    ) -> (Plane, Vec<String>) {
        let cancel = CancelFlag::default();
        let ctx = DeriveContext {
            diffuse,
            height,
            material,
            seamless: true,
            cancel: &cancel,
        };
        let mut diag = Diagnostics::new();
        let map = AoDeriver {
            params: AoParams::for_material(material),
        }
        .derive(&ctx, &mut diag)
        .unwrap();
        let TextureData::Gray8(img) = map.data else {
            panic!("AO must be grayscale");
        };
        (Plane::from_gray8(&img).unwrap(), diag.into_warnings())
    }

    #[test]
    fn flat_surface_is_nearly_unoccluded() {
        let diffuse = RgbImage::from_pixel(32, 32, Rgb([128, 128, 128]));
        let height = luminance(&diffuse).unwrap();
        let (ao, warnings) = derive(&diffuse, Some(&height), MaterialClass::Generic);
        assert!(warnings.is_empty());
        for &v in ao.data() {
            assert!(v >= 0.85, "flat AO sample {v} too dark");
        }
    }

    #[test]
    fn cavities_darken_relative_to_flats() {
        // A dark pit in a bright field: the pit center must occlude more
        // than the far field.
        let diffuse = RgbImage::from_fn(64, 64, |x, y| {
            let dx = x as f32 - 32.0;
            let dy = y as f32 - 32.0;
            if (dx * dx + dy * dy).sqrt() < 6.0 {
                Rgb([40, 40, 40])
            } else {
                Rgb([200, 200, 200])
            }
        });
        let height = luminance(&diffuse).unwrap();
        let (ao, _) = derive(&diffuse, Some(&height), MaterialClass::Generic);
        assert!(ao.get(32, 32) < ao.get(4, 4));
    }

    #[test]
    fn missing_height_degrades_to_neutral_plane_with_warning() {
        let diffuse = RgbImage::from_pixel(16, 16, Rgb([90, 90, 90]));
        let (ao, warnings) = derive(&diffuse, None, MaterialClass::Generic);
        assert_eq!(warnings.len(), 1);
        // Irwin–Hall noise is bounded by ±6σ around the neutral level.
        for &v in ao.data() {
            assert!((v - FALLBACK_AO).abs() <= 0.061, "fallback sample {v}");
        }
    }

    #[test]
    fn range_stays_within_unit_interval_and_floor() {
        let diffuse = RgbImage::from_fn(48, 48, |x, y| {
            let v = (((x * 13) ^ (y * 7)) % 256) as u8;
            Rgb([v, v, v])
        });
        let height = luminance(&diffuse).unwrap();
        for material in MaterialClass::ALL {
            let (ao, _) = derive(&diffuse, Some(&height), material);
            let floor = AoParams::for_material(material).min_ao;
            for &v in ao.data() {
                assert!((0.0..=1.0).contains(&v));
                assert!(
                    v >= floor - 0.5 / 255.0,
                    "{material}: sample {v} under floor {floor}"
                );
            }
        }
    }
}
