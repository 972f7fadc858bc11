//! Seamlessly tileable PBR texture sets from a single text prompt.
//!
//! One AI image call produces the base diffuse; everything else — normal,
//! roughness, metallic, ambient occlusion, height — is derived from it by
//! deterministic image-processing kernels. A tessellation stage makes the
//! diffuse tileable before derivation, so every derived map inherits the
//! seamless edges.

pub mod buffer;
pub mod config;
pub mod diag;
pub mod error;
pub mod filters;
pub mod intake;
pub mod maps;
pub mod material;
pub mod output;
pub mod pipeline;
pub mod tessellation;

pub use error::{Result, TextureError};
pub use intake::{CheckerProvider, FlatProvider, OpenAiProvider, TextureProvider};
pub use maps::{DerivationParams, MapKind, TextureData, TextureMap};
pub use material::MaterialClass;
pub use pipeline::{CancelFlag, PipelineRequest, PipelineResult, PipelineStatus, Resolution};
pub use tessellation::{TessAlgorithm, TessellationParams};
