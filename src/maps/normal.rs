use super::{DeriveContext, MapDeriver, MapKind, TextureData, TextureMap};
use crate::buffer::luminance;
use crate::diag::Diagnostics;
use crate::error::{Result, TextureError};
use crate::filters::{gaussian_blur, sobel_xy};
use crate::material::MaterialClass;
use image::{Rgb, RgbImage};

/// Valid strength range; values outside clamp with a warning.
const STRENGTH_MIN: f32 = 0.1;
const STRENGTH_MAX: f32 = 5.0;

/// Tangent-space normal derivation parameters.
#[derive(Debug, Clone)]
pub struct NormalParams {
    /// Gradient gain. Higher values exaggerate surface relief.
    pub strength: f32,
    /// Pre-Sobel smoothing sigma in pixels; 0 disables.
    pub blur_radius: u32,
    /// Flip the height convention (bright = low instead of bright = high).
    pub invert_height: bool,
}

impl NormalParams {
    pub fn for_material(material: MaterialClass) -> Self {
        NormalParams {
            strength: material.normal_strength(),
            blur_radius: 0,
            invert_height: false,
        }
    }
}

/// Height → tangent-space normal via Sobel gradients.
///
/// Output encodes `normalize((−gx·s, −gy·s, 1))` per channel as
/// `(N+1)/2`, the OpenGL +Y-up convention. Edge-replicated Sobel on a
/// seamless height plane yields a seamless normal, so the orchestrator
/// never re-tessellates normals.
pub struct NormalDeriver {
    pub params: NormalParams,
}

impl MapDeriver for NormalDeriver {
    fn kind(&self) -> MapKind {
        MapKind::Normal
    }

    fn derive(&self, ctx: &DeriveContext<'_>, diag: &mut Diagnostics) -> Result<TextureMap> {
        if ctx.cancel.is_cancelled() {
            return Err(TextureError::Cancelled);
        }

        let strength = clamp_strength(self.params.strength, diag);

        // Height plane: the shared cache, or recomputed from the diffuse
        // when the cache is unavailable.
        let base = match ctx.height {
            Some(h) => h.clone(),
            None => luminance(ctx.diffuse)?,
        };
        let smoothed = if self.params.blur_radius > 0 {
            gaussian_blur(&base, self.params.blur_radius as f32, ctx.boundary())?
        } else {
            base
        };

        // Sobel always runs edge-replicated. A tessellated height plane
        // has exactly matching opposite edges, so the replicated border
        // samples equal the wrapped ones and the gradients stay seamless.
        let (mut gx, mut gy) = sobel_xy(&smoothed)?;
        if self.params.invert_height {
            gx.map_in_place(|v| -v);
            gy.map_in_place(|v| -v);
        }

        let (w, h) = (smoothed.width(), smoothed.height());
        let mut out = RgbImage::new(w, h);
        for y in 0..h {
            for x in 0..w {
                let nx = -gx.get(x, y) * strength;
                let ny = -gy.get(x, y) * strength;
                let len = (nx * nx + ny * ny + 1.0).sqrt();
                let encode = |v: f32| ((v / len + 1.0) / 2.0 * 255.0).round() as u8;
                out.put_pixel(x, y, Rgb([encode(nx), encode(ny), encode(1.0)]));
            }
        }

        Ok(TextureMap {
            kind: MapKind::Normal,
            data: TextureData::Rgb8(out),
        })
    }
}

fn clamp_strength(strength: f32, diag: &mut Diagnostics) -> f32 {
    if (STRENGTH_MIN..=STRENGTH_MAX).contains(&strength) {
        strength
    } else {
        let clamped = strength.clamp(STRENGTH_MIN, STRENGTH_MAX);
        diag.warn(format!(
            "normal strength {strength} outside [{STRENGTH_MIN}, {STRENGTH_MAX}], clamped to {clamped}"
        ));
        clamped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Plane;
    use crate::pipeline::CancelFlag;

    fn derive_on(height: &Plane, params: NormalParams) -> TextureMap {
        let diffuse = RgbImage::from_pixel(height.width(), height.height(), Rgb([128, 128, 128]));
        let cancel = CancelFlag::default();
        let ctx = DeriveContext {
            diffuse: &diffuse,
            height: Some(height),
            material: MaterialClass::Generic,
            seamless: true,
            cancel: &cancel,
        };
        let mut diag = Diagnostics::new();
        NormalDeriver { params }.derive(&ctx, &mut diag).unwrap()
    }

    #[test]
    fn flat_height_yields_straight_up_normals() {
        let flat = Plane::filled(16, 16, 0.5).unwrap();
        let map = derive_on(&flat, NormalParams::for_material(MaterialClass::Generic));
        let TextureData::Rgb8(img) = &map.data else {
            panic!("normal map must be RGB");
        };
        for p in img.pixels() {
            assert_eq!(p.0, [128, 128, 255]);
        }
    }

    #[test]
    fn encoded_normals_are_unit_length() {
        // Gentle relief keeps the decoded quantization error comfortably
        // inside the 5e-3 unit-length tolerance.
        let bumpy = Plane::from_fn(32, 32, |x, y| {
            0.5 + 0.05 * ((x as f32 / 6.0).sin() * (y as f32 / 7.0).cos())
        })
        .unwrap();
        let map = derive_on(
            &bumpy,
            NormalParams {
                strength: 1.0,
                blur_radius: 0,
                invert_height: false,
            },
        );
        let TextureData::Rgb8(img) = &map.data else {
            panic!("normal map must be RGB");
        };
        for p in img.pixels() {
            let decode = |c: u8| c as f32 / 255.0 * 2.0 - 1.0;
            let (nx, ny, nz) = (decode(p[0]), decode(p[1]), decode(p[2]));
            let len = (nx * nx + ny * ny + nz * nz).sqrt();
            assert!((len - 1.0).abs() < 5e-3, "|N| = {len}");
        }
    }

    #[test]
    fn out_of_range_strength_clamps_with_warning() {
        let flat = Plane::filled(16, 16, 0.5).unwrap();
        let diffuse = RgbImage::from_pixel(16, 16, Rgb([128, 128, 128]));
        let cancel = CancelFlag::default();
        let ctx = DeriveContext {
            diffuse: &diffuse,
            height: Some(&flat),
            material: MaterialClass::Generic,
            seamless: false,
            cancel: &cancel,
        };
        let mut diag = Diagnostics::new();
        let deriver = NormalDeriver {
            params: NormalParams {
                strength: 12.0,
                blur_radius: 0,
                invert_height: false,
            },
        };
        deriver.derive(&ctx, &mut diag).unwrap();
        assert_eq!(diag.warnings().len(), 1);
    }

    #[test]
    fn invert_height_mirrors_the_gradient() {
        let ramp = Plane::from_fn(16, 16, |x, _| x as f32 / 15.0).unwrap();
        let plain = derive_on(
            &ramp,
            NormalParams {
                strength: 1.0,
                blur_radius: 0,
                invert_height: false,
            },
        );
        let flipped = derive_on(
            &ramp,
            NormalParams {
                strength: 1.0,
                blur_radius: 0,
                invert_height: true,
            },
        );
        let (TextureData::Rgb8(a), TextureData::Rgb8(b)) = (&plain.data, &flipped.data) else {
            panic!("normal maps must be RGB");
        };
        // Red channel (x slope) reflects around 127.5 when inverted.
        let pa = a.get_pixel(8, 8)[0] as i32;
        let pb = b.get_pixel(8, 8)[0] as i32;
        assert!((pa + pb - 255).abs() <= 1, "{pa} vs {pb}");
        assert!(pa < 128, "ramp rising in +x encodes below midpoint");
    }
}
