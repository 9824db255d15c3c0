//! Shader and program construction.
//!
//! Compilation and linking never panic and never return half-built objects:
//! a failed compile yields `None` after logging the driver's info log, and a
//! failed link yields the unusable [`LinkedProgram`] sentinel that owns no
//! GPU resources. Callers check the sentinel before binding anything.

use glow::HasContext;
use tracing::error;

use crate::assets::AssetSource;
use crate::preprocess::{preprocess, Define};
use crate::reflect::{self, UniformBinding, UniformBlock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderKind {
    Vertex,
    Fragment,
    Geometry,
}

impl ShaderKind {
    /// Maps a file-extension-like tag (`vert`, `frag`, `geom`) to a kind.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "vert" => Some(Self::Vertex),
            "frag" => Some(Self::Fragment),
            "geom" => Some(Self::Geometry),
            _ => None,
        }
    }

    fn gl_enum(self) -> u32 {
        match self {
            Self::Vertex => glow::VERTEX_SHADER,
            Self::Fragment => glow::FRAGMENT_SHADER,
            Self::Geometry => glow::GEOMETRY_SHADER,
        }
    }
}

/// Preprocesses and compiles one shader stage.
///
/// Returns `None` when the driver rejects the source; the driver's log has
/// already been reported and the shader object released.
pub fn compile_shader(
    gl: &glow::Context,
    assets: &dyn AssetSource,
    include_dir: &str,
    source: &str,
    kind: ShaderKind,
    defines: &[Define<'_>],
) -> Option<glow::Shader> {
    let shader = match unsafe { gl.create_shader(kind.gl_enum()) } {
        Ok(shader) => shader,
        Err(err) => {
            error!("failed to create shader object: {err}");
            return None;
        }
    };

    let processed = preprocess(source, assets, include_dir, defines);
    unsafe {
        gl.shader_source(shader, &processed);
        gl.compile_shader(shader);
    }

    if !unsafe { gl.get_shader_compile_status(shader) } {
        let log = unsafe { gl.get_shader_info_log(shader) };
        error!("shader compilation failed:\n{log}");
        unsafe { gl.delete_shader(shader) };
        return None;
    }

    Some(shader)
}

/// Reads a shader from `assets` and compiles it, inferring the kind from the
/// name's last `.`-separated segment.
pub fn compile_shader_file(
    gl: &glow::Context,
    assets: &dyn AssetSource,
    include_dir: &str,
    name: &str,
    defines: &[Define<'_>],
) -> Option<glow::Shader> {
    let source = match assets.read_to_string(name) {
        Ok(source) => source,
        Err(err) => {
            error!("cannot read shader {name}: {err}");
            return None;
        }
    };

    let tag = name.rsplit('.').next().unwrap_or("");
    let Some(kind) = ShaderKind::from_tag(tag) else {
        error!("unrecognized shader type for {name}: {tag}");
        return None;
    };

    let shader = compile_shader(gl, assets, include_dir, &source, kind, defines);
    if shader.is_none() {
        error!("shader file: {name}");
    }
    shader
}

/// A linked program together with its reflected uniforms and the buffers
/// backing its uniform blocks.
///
/// The handle doubles as the usable/unusable sentinel: `None` means the link
/// failed and the value owns no GPU resources at all.
#[derive(Debug)]
pub struct LinkedProgram {
    handle: Option<glow::Program>,
    uniforms: Vec<UniformBinding>,
    blocks: Vec<UniformBlock>,
}

impl LinkedProgram {
    pub fn unusable() -> Self {
        Self {
            handle: None,
            uniforms: Vec::new(),
            blocks: Vec::new(),
        }
    }

    pub fn is_usable(&self) -> bool {
        self.handle.is_some()
    }

    pub fn handle(&self) -> Option<glow::Program> {
        self.handle
    }

    pub fn uniforms(&self) -> &[UniformBinding] {
        &self.uniforms
    }

    pub fn blocks(&self) -> &[UniformBlock] {
        &self.blocks
    }

    /// Releases every GPU resource owned by this program and leaves the
    /// unusable sentinel behind.
    pub fn destroy(&mut self, gl: &glow::Context) {
        for block in self.blocks.drain(..) {
            unsafe { gl.delete_buffer(block.buffer) };
        }
        self.uniforms.clear();
        if let Some(program) = self.handle.take() {
            unsafe { gl.delete_program(program) };
        }
    }
}

/// Links the given shader stages into a program and reflects its uniforms.
///
/// A `None` entry among the inputs (a stage that failed to compile) aborts
/// the link immediately; a partial program must never come out of here.
pub fn link_program(gl: &glow::Context, shaders: &[Option<glow::Shader>]) -> LinkedProgram {
    let program = match unsafe { gl.create_program() } {
        Ok(program) => program,
        Err(err) => {
            error!("failed to create program object: {err}");
            return LinkedProgram::unusable();
        }
    };

    for shader in shaders {
        let Some(shader) = shader else {
            unsafe { gl.delete_program(program) };
            return LinkedProgram::unusable();
        };
        unsafe { gl.attach_shader(program, *shader) };
    }

    unsafe { gl.link_program(program) };

    if !unsafe { gl.get_program_link_status(program) } {
        let log = unsafe { gl.get_program_info_log(program) };
        error!("program linking failed:\n{log}");
        unsafe { gl.delete_program(program) };
        return LinkedProgram::unusable();
    }

    let (uniforms, blocks) = reflect::reflect_program(gl, program);

    LinkedProgram {
        handle: Some(program),
        uniforms,
        blocks,
    }
}

/// Swaps `candidate` in over `old`, but only when the candidate is usable.
///
/// An unusable candidate leaves the old program fully intact and reports
/// failure so the caller can clear its aggregate flag. On success the old
/// program's resources are released only after the candidate is confirmed,
/// so there is no window without a bindable program.
pub fn replace_program(
    gl: &glow::Context,
    old: &mut LinkedProgram,
    candidate: LinkedProgram,
) -> bool {
    if !candidate.is_usable() {
        return false;
    }
    old.destroy(gl);
    *old = candidate;
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_map_to_kinds() {
        assert_eq!(ShaderKind::from_tag("vert"), Some(ShaderKind::Vertex));
        assert_eq!(ShaderKind::from_tag("frag"), Some(ShaderKind::Fragment));
        assert_eq!(ShaderKind::from_tag("geom"), Some(ShaderKind::Geometry));
        assert_eq!(ShaderKind::from_tag("comp"), None);
        assert_eq!(ShaderKind::from_tag(""), None);
    }

    #[test]
    fn unusable_sentinel_owns_nothing() {
        let program = LinkedProgram::unusable();
        assert!(!program.is_usable());
        assert!(program.handle().is_none());
        assert!(program.uniforms().is_empty());
        assert!(program.blocks().is_empty());
    }
}
