//! The per-frame render pipeline.
//!
//! One frame is a fixed sequence over full-screen-quad passes:
//!
//! 1. effect -> full-res target A or B (sampling the other for feedback)
//! 2. bloom-pre -> quarter-res A (threshold/downsample of the effect)
//! 3. blur horizontal -> quarter-res B
//! 4. blur vertical -> quarter-res A
//! 5. post -> full-res scratch (effect + bloom + noise)
//! 6. letterboxed blit of the scratch target to the window surface
//!
//! The full-res A/B pair ping-pongs every frame so the effect pass can
//! sample its own previous output. Pass ordering is the only
//! synchronization; everything runs on the one thread owning the context.

use std::sync::Arc;
use std::time::{Duration, Instant};

use glow::HasContext;
use timeline::TrackSource;
use tracing::{info, warn};

use crate::assets::AssetSource;
use crate::fbo::Framebuffer;
use crate::layout::{letterbox, OutputRect};
use crate::noise::{NoiseTexture, Xoshiro256, NOISE_SIZE};
use crate::preprocess::Define;
use crate::reflect::{UniformStorage, UniformType};
use crate::shader::{
    compile_shader, compile_shader_file, link_program, replace_program, LinkedProgram, ShaderKind,
};
use crate::RendererError;

const FULL_RES_TARGETS: usize = 3;
const QUARTER_RES_TARGETS: usize = 2;

/// How long the output rectangle grows in after a reload (editor feedback).
const RELOAD_GROW: Duration = Duration::from_millis(100);

// The screen-filling quad comes entirely out of gl_VertexID; no vertex
// buffer exists, only the VAO that core profile requires for the draw.
const VERTEX_SHADER_SRC: &str = "\
out vec2 FragCoord;
void main() {
    vec2 c = vec2(-1, 1);
    vec4 coords[4] = vec4[4](c.xxyy, c.yxyy, c.xyyy, c.yyyy);
    FragCoord = coords[gl_VertexID].xy;
    gl_Position = coords[gl_VertexID];
}
";

/// What a failed batch reload means for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadPolicy {
    /// Keep the previous programs, clear the usable flag and render a
    /// diagnostic fill until the next successful reload. For interactive
    /// editing sessions.
    Degrade,
    /// Report the failure as an error so the process can terminate instead
    /// of running with incomplete state. For release/batch playback.
    Abort,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Internal render resolution; also fixes the output aspect ratio.
    pub width: i32,
    pub height: i32,
    /// Directory (asset-source name prefix) holding the pass shaders and
    /// their includes.
    pub shader_dir: String,
    pub policy: ReloadPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 720,
            shader_dir: "shaders".into(),
            policy: ReloadPolicy::Degrade,
        }
    }
}

pub struct DemoRenderer {
    gl: Arc<glow::Context>,
    assets: Box<dyn AssetSource>,
    shader_dir: String,
    policy: ReloadPolicy,
    aspect_ratio: f64,
    output: OutputRect,
    reloaded_at: Instant,
    vao: glow::VertexArray,
    effect: LinkedProgram,
    post: LinkedProgram,
    bloom_pre: LinkedProgram,
    bloom_x: LinkedProgram,
    bloom_y: LinkedProgram,
    programs_ok: bool,
    noise: NoiseTexture,
    full: Vec<Framebuffer>,
    quarter: Vec<Framebuffer>,
    firstpass_index: usize,
}

impl DemoRenderer {
    /// Builds the whole pipeline: compiles all five programs, then the
    /// render targets and the noise texture. Framebuffer failure fails
    /// initialization outright; shader failure follows the reload policy.
    pub fn new(
        gl: Arc<glow::Context>,
        assets: Box<dyn AssetSource>,
        config: PipelineConfig,
    ) -> Result<Self, RendererError> {
        let aspect_ratio = f64::from(config.width) / f64::from(config.height);
        let vao = unsafe { gl.create_vertex_array() }.map_err(RendererError::Allocate)?;
        let noise = NoiseTexture::new(&gl, NOISE_SIZE, Xoshiro256::default())?;

        let mut renderer = Self {
            gl,
            assets,
            shader_dir: config.shader_dir,
            policy: config.policy,
            aspect_ratio,
            output: letterbox(aspect_ratio, config.width, config.height),
            reloaded_at: Instant::now(),
            vao,
            effect: LinkedProgram::unusable(),
            post: LinkedProgram::unusable(),
            bloom_pre: LinkedProgram::unusable(),
            bloom_x: LinkedProgram::unusable(),
            bloom_y: LinkedProgram::unusable(),
            programs_ok: false,
            noise,
            full: Vec::new(),
            quarter: Vec::new(),
            firstpass_index: 0,
        };

        renderer.reload()?;

        let gl = Arc::clone(&renderer.gl);
        for _ in 0..FULL_RES_TARGETS {
            renderer
                .full
                .push(Framebuffer::new(&gl, config.width, config.height, glow::NEAREST)?);
        }
        for _ in 0..QUARTER_RES_TARGETS {
            renderer.quarter.push(Framebuffer::new(
                &gl,
                config.width / 2,
                config.height / 2,
                glow::LINEAR,
            )?);
        }

        Ok(renderer)
    }

    /// Recompiles every program as one batch. Each usable candidate is
    /// swapped in individually; `programs_ok` ends up set only when all
    /// five made it. Under [`ReloadPolicy::Abort`] a failed batch is
    /// returned as an error instead of a degraded pipeline.
    pub fn reload(&mut self) -> Result<(), RendererError> {
        let gl = Arc::clone(&self.gl);
        let dir = self.shader_dir.clone();
        let assets = &*self.assets;

        let vertex = compile_shader(
            &gl,
            assets,
            &dir,
            VERTEX_SHADER_SRC,
            ShaderKind::Vertex,
            &[],
        );
        let fragment = compile_shader_file(&gl, assets, &dir, &format!("{dir}/shader.frag"), &[]);
        let post = compile_shader_file(&gl, assets, &dir, &format!("{dir}/post.frag"), &[]);
        let bloom_pre =
            compile_shader_file(&gl, assets, &dir, &format!("{dir}/bloom_pre.frag"), &[]);
        let bloom_x = compile_shader_file(
            &gl,
            assets,
            &dir,
            &format!("{dir}/blur.frag"),
            &[Define::new("HORIZONTAL", "1")],
        );
        let bloom_y = compile_shader_file(&gl, assets, &dir, &format!("{dir}/blur.frag"), &[]);

        let mut ok = true;
        ok &= replace_program(&gl, &mut self.effect, link_program(&gl, &[vertex, fragment]));
        ok &= replace_program(&gl, &mut self.post, link_program(&gl, &[vertex, post]));
        ok &= replace_program(
            &gl,
            &mut self.bloom_pre,
            link_program(&gl, &[vertex, bloom_pre]),
        );
        ok &= replace_program(&gl, &mut self.bloom_x, link_program(&gl, &[vertex, bloom_x]));
        ok &= replace_program(&gl, &mut self.bloom_y, link_program(&gl, &[vertex, bloom_y]));

        // Shader objects are only needed for linking.
        for shader in [vertex, fragment, post, bloom_pre, bloom_x, bloom_y]
            .into_iter()
            .flatten()
        {
            unsafe { gl.delete_shader(shader) };
        }

        self.programs_ok = ok;
        self.reloaded_at = Instant::now();

        if !ok {
            match self.policy {
                ReloadPolicy::Degrade => {
                    warn!("shader reload failed; previous programs stay active");
                }
                ReloadPolicy::Abort => return Err(RendererError::ProgramsUnusable),
            }
        } else {
            info!("shader programs ready");
        }

        Ok(())
    }

    /// Recomputes the letterbox rectangle for a new output surface size.
    pub fn resize(&mut self, width: i32, height: i32) {
        self.output = letterbox(self.aspect_ratio, width.max(1), height.max(1));
    }

    /// Index of the full-res target receiving this frame's first pass.
    pub fn firstpass_index(&self) -> usize {
        self.firstpass_index
    }

    pub fn programs_ok(&self) -> bool {
        self.programs_ok
    }

    /// Renders one frame at the given timeline row.
    pub fn render(&mut self, tracks: &dyn TrackSource, row: f64) {
        let gl = Arc::clone(&self.gl);
        let cur = self.firstpass_index;
        let alt = cur ^ 1;

        if !self.programs_ok {
            // Unusable programs: paint the window a diagnostic red and skip
            // the frame. Only reachable under the Degrade policy.
            unsafe {
                gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, None);
                gl.clear_color(0.3, 0.0, 0.0, 1.0);
                gl.clear(glow::COLOR_BUFFER_BIT);
            }
            return;
        }

        unsafe { gl.clear_color(0.0, 0.0, 0.0, 1.0) };

        self.noise.update(&gl);

        self.render_pass(
            &self.full[cur],
            &self.effect,
            tracks,
            row,
            &[
                (self.full[alt].texture(), "u_FeedbackSampler"),
                (self.noise.texture(), "u_NoiseSampler"),
            ],
        );

        self.render_pass(
            &self.quarter[0],
            &self.bloom_pre,
            tracks,
            row,
            &[(self.full[cur].texture(), "u_InputSampler")],
        );

        self.render_pass(
            &self.quarter[1],
            &self.bloom_x,
            tracks,
            row,
            &[(self.quarter[0].texture(), "u_InputSampler")],
        );

        self.render_pass(
            &self.quarter[0],
            &self.bloom_y,
            tracks,
            row,
            &[(self.quarter[1].texture(), "u_InputSampler")],
        );

        self.render_pass(
            &self.full[2],
            &self.post,
            tracks,
            row,
            &[
                (self.full[cur].texture(), "u_InputSampler"),
                (self.quarter[0].texture(), "u_BloomSampler"),
                (self.noise.texture(), "u_NoiseSampler"),
            ],
        );

        self.blit_output(&gl);

        self.firstpass_index = alt;
    }

    /// One pass: bind target and program, feed uniforms, draw the quad.
    fn render_pass(
        &self,
        target: &Framebuffer,
        program: &LinkedProgram,
        tracks: &dyn TrackSource,
        row: f64,
        textures: &[(glow::Texture, &str)],
    ) {
        let gl = &self.gl;
        let Some(handle) = program.handle() else {
            return;
        };

        unsafe {
            gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, Some(target.framebuffer()));
            gl.clear(glow::COLOR_BUFFER_BIT);
            gl.viewport(0, 0, target.width(), target.height());
            gl.use_program(Some(handle));
        }

        self.apply_track_uniforms(program, tracks, row);

        // System uniforms go after the track loop so a track of the same
        // name can never shadow them.
        unsafe {
            if let Some(loc) = gl.get_uniform_location(handle, "u_RocketRow") {
                gl.uniform_1_f32(Some(&loc), row as f32);
            }
            if let Some(loc) = gl.get_uniform_location(handle, "u_Resolution") {
                gl.uniform_2_f32(Some(&loc), target.width() as f32, target.height() as f32);
            }
            if let Some(loc) = gl.get_uniform_location(handle, "u_NoiseSize") {
                gl.uniform_1_i32(Some(&loc), self.noise.size());
            }
        }

        for (slot, block) in program.blocks().iter().enumerate() {
            unsafe {
                gl.uniform_block_binding(handle, block.gl_index, slot as u32);
                gl.bind_buffer_base(glow::UNIFORM_BUFFER, slot as u32, Some(block.buffer));
            }
        }

        for (unit, (texture, sampler)) in textures.iter().enumerate() {
            unsafe {
                gl.active_texture(glow::TEXTURE0 + unit as u32);
                gl.bind_texture(glow::TEXTURE_2D, Some(*texture));
                if let Some(loc) = gl.get_uniform_location(handle, sampler) {
                    gl.uniform_1_i32(Some(&loc), unit as i32);
                }
            }
        }

        unsafe {
            gl.bind_vertex_array(Some(self.vao));
            gl.draw_arrays(glow::TRIANGLE_STRIP, 0, 4);
            gl.bind_vertex_array(None);
        }
    }

    /// Samples every timeline-driven uniform of the program at `row` and
    /// writes the values to their storage.
    fn apply_track_uniforms(&self, program: &LinkedProgram, tracks: &dyn TrackSource, row: f64) {
        let gl = &self.gl;

        for uniform in program.uniforms() {
            if uniform.tracks.is_empty() {
                continue;
            }

            let mut staging = [0.0f32; 4];
            for (slot, track) in uniform.tracks.iter().enumerate() {
                staging[slot] = tracks.value(track, row);
            }

            match &uniform.storage {
                UniformStorage::Default { location } => unsafe {
                    match uniform.ty {
                        UniformType::Float => gl.uniform_1_f32(Some(location), staging[0]),
                        UniformType::Vec2 => {
                            gl.uniform_2_f32(Some(location), staging[0], staging[1]);
                        }
                        UniformType::Vec3 => {
                            gl.uniform_3_f32(Some(location), staging[0], staging[1], staging[2]);
                        }
                        UniformType::Vec4 => {
                            gl.uniform_4_f32(
                                Some(location),
                                staging[0],
                                staging[1],
                                staging[2],
                                staging[3],
                            );
                        }
                        UniformType::Int | UniformType::Sampler2D => {
                            gl.uniform_1_i32(Some(location), staging[0] as i32);
                        }
                    }
                },
                UniformStorage::Block { block, offset } => {
                    let buffer = program.blocks()[*block].buffer;
                    unsafe {
                        gl.bind_buffer(glow::UNIFORM_BUFFER, Some(buffer));
                        match uniform.ty {
                            UniformType::Float
                            | UniformType::Vec2
                            | UniformType::Vec3
                            | UniformType::Vec4 => {
                                let floats = &staging[..uniform.ty.components()];
                                gl.buffer_sub_data_u8_slice(
                                    glow::UNIFORM_BUFFER,
                                    *offset as i32,
                                    bytemuck::cast_slice(floats),
                                );
                            }
                            UniformType::Int | UniformType::Sampler2D => {
                                let value = staging[0] as i32;
                                gl.buffer_sub_data_u8_slice(
                                    glow::UNIFORM_BUFFER,
                                    *offset as i32,
                                    &value.to_ne_bytes(),
                                );
                            }
                        }
                        gl.bind_buffer(glow::UNIFORM_BUFFER, None);
                    }
                }
            }
        }
    }

    /// Stretches the scratch target into the window with the letterbox
    /// rectangle. Right after a reload (Degrade policy only) the rectangle
    /// grows in from zero as visible feedback.
    fn blit_output(&self, gl: &glow::Context) {
        let scratch = &self.full[2];

        unsafe {
            gl.bind_framebuffer(glow::READ_FRAMEBUFFER, Some(scratch.framebuffer()));
            gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, None);
            gl.clear(glow::COLOR_BUFFER_BIT);
        }

        let OutputRect { x0, y0, x1, y1 } = self.output;
        let (x0, y0, x1, y1) = if self.policy == ReloadPolicy::Degrade {
            let a = (self.reloaded_at.elapsed().as_secs_f32() / RELOAD_GROW.as_secs_f32())
                .min(1.0);
            (
                (x0 as f32 * a) as i32,
                (y0 as f32 * a) as i32,
                (x1 as f32 * a) as i32,
                (y1 as f32 * a) as i32,
            )
        } else {
            (x0, y0, x1, y1)
        };

        unsafe {
            gl.blit_framebuffer(
                0,
                0,
                scratch.width(),
                scratch.height(),
                x0,
                y0,
                x1,
                y1,
                glow::COLOR_BUFFER_BIT,
                glow::LINEAR,
            );
        }
    }

    /// Releases every GPU resource the pipeline owns. Must run on the
    /// context thread before the context goes away.
    pub fn destroy(&mut self) {
        let gl = Arc::clone(&self.gl);

        self.effect.destroy(&gl);
        self.post.destroy(&gl);
        self.bloom_pre.destroy(&gl);
        self.bloom_x.destroy(&gl);
        self.bloom_y.destroy(&gl);
        self.programs_ok = false;

        for target in self.full.drain(..) {
            target.destroy(&gl);
        }
        for target in self.quarter.drain(..) {
            target.destroy(&gl);
        }
        self.noise.destroy(&gl);
        unsafe { gl.delete_vertex_array(self.vao) };
    }
}
