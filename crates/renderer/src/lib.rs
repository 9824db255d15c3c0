//! Multi-pass GLSL demo renderer.
//!
//! The pipeline owns five shader programs (effect, post, bloom-pre and the
//! two blur directions), a ping-pong pair of full-resolution framebuffers
//! plus a scratch target and two quarter-resolution bloom buffers, and a
//! per-frame noise texture. Shader sources are preprocessed (`#define`
//! injection, `#include` resolution), compiled and linked at runtime, and
//! their active uniforms are reflected so that `r_`-prefixed uniforms can be
//! driven from timeline tracks.
//!
//! The crate never creates a GL context; the embedding shell hands one in
//! and every call that touches the driver must happen on the thread that
//! owns it.

mod assets;
mod fbo;
mod layout;
mod noise;
mod pipeline;
mod preprocess;
mod reflect;
mod shader;

pub use assets::{AssetSource, DirSource, MemorySource};
pub use layout::{letterbox, OutputRect};
pub use noise::{NoiseTexture, Xoshiro256, NOISE_SIZE};
pub use pipeline::{DemoRenderer, PipelineConfig, ReloadPolicy};
pub use preprocess::{preprocess, Define, GLSL_VERSION, MAX_SOURCE_FRAGMENTS};
pub use reflect::{UniformBinding, UniformBlock, UniformStorage, UniformType};
pub use shader::{
    compile_shader, compile_shader_file, link_program, replace_program, LinkedProgram, ShaderKind,
};

#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error("failed to allocate GL object: {0}")]
    Allocate(String),
    #[error("framebuffer incomplete (status {status:#x})")]
    FramebufferIncomplete { status: u32 },
    #[error("shader programs are unusable after reload")]
    ProgramsUnusable,
}
