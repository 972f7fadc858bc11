use crate::error::{Result, TextureError};
use base64::Engine;
use image::RgbImage;
use serde::Deserialize;
use std::time::Duration;

/// Default wall-clock budget for one image-generation call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

const OPENAI_IMAGES_URL: &str = "https://api.openai.com/v1/images/generations";

// ── Provider capability ───────────────────────────────────────────────────

/// Source of the base diffuse bitmap.
///
/// Implementations MAY return an image of non-exact dimensions; the
/// pipeline resizes. Retry policy is the implementation's concern — the
/// core issues exactly one `generate` per run.
pub trait TextureProvider: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, prompt: &str, width: u32, height: u32) -> Result<RgbImage>;
}

// ── OpenAI provider ───────────────────────────────────────────────────────

/// Image generation over the OpenAI images endpoint.
///
/// The endpoint only offers a fixed set of canvas sizes, so the request
/// snaps to the nearest supported aspect and the pipeline's normalize
/// stage resamples to the exact target.
pub struct OpenAiProvider {
    api_key: String,
    model: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct ImagesResponse {
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    b64_json: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        OpenAiProvider {
            api_key: api_key.into(),
            model: model.into(),
            timeout,
        }
    }

    /// Supported canvas closest to the requested aspect ratio.
    fn canvas_for(&self, width: u32, height: u32) -> &'static str {
        if self.model.starts_with("dall-e-2") {
            // Square sizes only; pick the smallest that covers the target.
            return match width.max(height) {
                0..=256 => "256x256",
                257..=512 => "512x512",
                _ => "1024x1024",
            };
        }
        if width > height {
            "1792x1024"
        } else if height > width {
            "1024x1792"
        } else {
            "1024x1024"
        }
    }
}

impl TextureProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn generate(&self, prompt: &str, width: u32, height: u32) -> Result<RgbImage> {
        let size = self.canvas_for(width, height);
        let agent = ureq::AgentBuilder::new().timeout(self.timeout).build();

        let response = agent
            .post(OPENAI_IMAGES_URL)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(serde_json::json!({
                "model": self.model,
                "prompt": prompt,
                "n": 1,
                "size": size,
                "response_format": "b64_json",
            }))
            .map_err(|e| TextureError::UpstreamImage(format!("image request failed: {e}")))?;

        let parsed: ImagesResponse = response
            .into_json()
            .map_err(|e| TextureError::UpstreamImage(format!("malformed response: {e}")))?;
        let datum = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| TextureError::UpstreamImage("response carried no image".into()))?;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(datum.b64_json)
            .map_err(|e| TextureError::UpstreamImage(format!("base64 decode: {e}")))?;
        let decoded = image::load_from_memory(&bytes)
            .map_err(|e| TextureError::UpstreamImage(format!("image decode: {e}")))?;
        Ok(decoded.to_rgb8())
    }
}

// ── Synthetic providers ───────────────────────────────────────────────────

/// Solid-color provider for offline runs and tests.
pub struct FlatProvider {
    pub color: [u8; 3],
}

impl FlatProvider {
    pub fn mid_gray() -> Self {
        FlatProvider {
            color: [128, 128, 128],
        }
    }
}

impl TextureProvider for FlatProvider {
    fn name(&self) -> &str {
        "flat"
    }

    fn generate(&self, _prompt: &str, width: u32, height: u32) -> Result<RgbImage> {
        if width == 0 || height == 0 {
            return Err(TextureError::UpstreamImage(format!(
                "zero-area request {width}x{height}"
            )));
        }
        Ok(RgbImage::from_pixel(width, height, image::Rgb(self.color)))
    }
}

/// Checkerboard provider exercising seam-heavy content in tests.
pub struct CheckerProvider {
    pub cell: u32,
    pub light: [u8; 3],
    pub dark: [u8; 3],
}

impl Default for CheckerProvider {
    fn default() -> Self {
        CheckerProvider {
            cell: 8,
            light: [220, 210, 190],
            dark: [60, 55, 50],
        }
    }
}

impl TextureProvider for CheckerProvider {
    fn name(&self) -> &str {
        "checker"
    }

    fn generate(&self, _prompt: &str, width: u32, height: u32) -> Result<RgbImage> {
        if width == 0 || height == 0 {
            return Err(TextureError::UpstreamImage(format!(
                "zero-area request {width}x{height}"
            )));
        }
        let cell = self.cell.max(1);
        Ok(RgbImage::from_fn(width, height, |x, y| {
            if ((x / cell) + (y / cell)) % 2 == 0 {
                image::Rgb(self.light)
            } else {
                image::Rgb(self.dark)
            }
        }))
    }
}
