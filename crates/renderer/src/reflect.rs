//! Post-link uniform introspection.
//!
//! After a successful link the driver is asked for every active uniform:
//! its type, whether it lives in the default block (a location) or in a
//! named uniform block (a block index and byte offset), and, for uniforms
//! carrying the `r_` prefix, the timeline track names that drive it. Track
//! names are derived once here so the per-frame loop never composes
//! strings.
//!
//! Uniforms the compiler optimized away simply do not show up; that is
//! expected. Uniforms of a type outside the supported set are logged and
//! skipped, never fatal.

use std::collections::BTreeMap;

use glow::HasContext;
use tracing::warn;

/// Reserved prefix marking a uniform as timeline-driven.
const TRACK_PREFIX: &str = "r_";

const COMPONENT_SUFFIXES: [&str; 4] = [".x", ".y", ".z", ".w"];

/// The closed set of GLSL types the pipeline knows how to feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformType {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Int,
    /// Samplers are set through the same integer path as `Int`.
    Sampler2D,
}

impl UniformType {
    fn from_gl(raw: u32) -> Option<Self> {
        match raw {
            glow::FLOAT => Some(Self::Float),
            glow::FLOAT_VEC2 => Some(Self::Vec2),
            glow::FLOAT_VEC3 => Some(Self::Vec3),
            glow::FLOAT_VEC4 => Some(Self::Vec4),
            glow::INT => Some(Self::Int),
            glow::SAMPLER_2D => Some(Self::Sampler2D),
            _ => None,
        }
    }

    pub fn components(self) -> usize {
        match self {
            Self::Float | Self::Int | Self::Sampler2D => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Vec4 => 4,
        }
    }
}

/// Where a uniform's value goes at bind time.
#[derive(Debug, Clone)]
pub enum UniformStorage {
    /// Default uniform block; set through the cached location.
    Default { location: glow::UniformLocation },
    /// Member of a named uniform block: index into the program's block list
    /// and byte offset into that block's buffer.
    Block { block: usize, offset: usize },
}

#[derive(Debug, Clone)]
pub struct UniformBinding {
    pub name: String,
    pub ty: UniformType,
    pub storage: UniformStorage,
    /// Timeline track names, one per component; empty when the uniform is
    /// not timeline-driven.
    pub tracks: Vec<String>,
}

/// A named uniform block and the GPU buffer backing it, sized exactly to
/// the driver-reported byte size.
#[derive(Debug)]
pub struct UniformBlock {
    pub gl_index: u32,
    pub size: usize,
    pub buffer: glow::Buffer,
}

// `r_Cam.Pos` -> `Cam:Pos`, `r_Speed` -> `Speed`. None when the name does
// not carry the prefix (or carries nothing but it).
fn track_base(name: &str) -> Option<String> {
    let rest = name.strip_prefix(TRACK_PREFIX)?;
    if rest.is_empty() {
        return None;
    }
    Some(rest.replacen('.', ":", 1))
}

/// Derives the per-component track names for a uniform, or an empty list
/// when the uniform is not timeline-driven.
pub(crate) fn track_names(name: &str, ty: UniformType) -> Vec<String> {
    let Some(base) = track_base(name) else {
        return Vec::new();
    };

    match ty.components() {
        1 => vec![base],
        n => COMPONENT_SUFFIXES[..n]
            .iter()
            .map(|suffix| format!("{base}{suffix}"))
            .collect(),
    }
}

/// Enumerates the active uniforms and uniform blocks of a freshly linked
/// program, allocating one GPU buffer per block.
pub(crate) fn reflect_program(
    gl: &glow::Context,
    program: glow::Program,
) -> (Vec<UniformBinding>, Vec<UniformBlock>) {
    let count = unsafe { gl.get_active_uniforms(program) };
    if count == 0 {
        return (Vec::new(), Vec::new());
    }

    let indices: Vec<u32> = (0..count).collect();
    let (block_indices, offsets) = unsafe {
        (
            gl.get_active_uniforms_parameter(program, &indices, glow::UNIFORM_BLOCK_INDEX),
            gl.get_active_uniforms_parameter(program, &indices, glow::UNIFORM_OFFSET),
        )
    };

    // One buffer per block that actually has active members, keyed by the
    // driver's block index.
    let mut blocks: Vec<UniformBlock> = Vec::new();
    let mut block_slots: BTreeMap<u32, usize> = BTreeMap::new();
    for &block_index in &block_indices {
        let Ok(gl_index) = u32::try_from(block_index) else {
            continue;
        };
        if block_slots.contains_key(&gl_index) {
            continue;
        }

        let size = unsafe {
            gl.get_active_uniform_block_parameter_i32(
                program,
                gl_index,
                glow::UNIFORM_BLOCK_DATA_SIZE,
            )
        } as usize;

        let buffer = match unsafe { gl.create_buffer() } {
            Ok(buffer) => buffer,
            Err(err) => {
                warn!("failed to allocate uniform block buffer: {err}");
                continue;
            }
        };
        unsafe {
            gl.bind_buffer(glow::UNIFORM_BUFFER, Some(buffer));
            gl.buffer_data_size(glow::UNIFORM_BUFFER, size as i32, glow::DYNAMIC_DRAW);
            gl.bind_buffer(glow::UNIFORM_BUFFER, None);
        }

        block_slots.insert(gl_index, blocks.len());
        blocks.push(UniformBlock {
            gl_index,
            size,
            buffer,
        });
    }

    let mut uniforms = Vec::new();
    for index in 0..count {
        let Some(active) = (unsafe { gl.get_active_uniform(program, index) }) else {
            continue;
        };
        if active.name.starts_with("gl_") {
            continue;
        }
        if active.size != 1 {
            warn!("array uniform {} not supported, skipping", active.name);
            continue;
        }
        let Some(ty) = UniformType::from_gl(active.utype) else {
            warn!(
                "unsupported type {:#x} for uniform {}, skipping",
                active.utype, active.name
            );
            continue;
        };

        let storage = match u32::try_from(block_indices[index as usize]) {
            Ok(gl_index) => {
                let Some(&block) = block_slots.get(&gl_index) else {
                    continue;
                };
                UniformStorage::Block {
                    block,
                    offset: offsets[index as usize] as usize,
                }
            }
            Err(_) => {
                // Not in any block; the location must exist for an active
                // default-block uniform.
                let Some(location) = (unsafe { gl.get_uniform_location(program, &active.name) })
                else {
                    warn!("no location for active uniform {}, skipping", active.name);
                    continue;
                };
                UniformStorage::Default { location }
            }
        };

        let tracks = track_names(&active.name, ty);
        uniforms.push(UniformBinding {
            name: active.name,
            ty,
            storage,
            tracks,
        });
    }

    (uniforms, blocks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec3_block_member_expands_components() {
        assert_eq!(
            track_names("r_Cam.Pos", UniformType::Vec3),
            vec!["Cam:Pos.x", "Cam:Pos.y", "Cam:Pos.z"]
        );
    }

    #[test]
    fn vec4_gets_all_four_components() {
        assert_eq!(
            track_names("r_Tint", UniformType::Vec4),
            vec!["Tint.x", "Tint.y", "Tint.z", "Tint.w"]
        );
    }

    #[test]
    fn scalar_keeps_base_name() {
        assert_eq!(track_names("r_Speed", UniformType::Float), vec!["Speed"]);
        assert_eq!(track_names("r_Mode", UniformType::Int), vec!["Mode"]);
    }

    #[test]
    fn only_first_dot_becomes_separator() {
        assert_eq!(
            track_names("r_Cam.Pos.Far", UniformType::Float),
            vec!["Cam:Pos.Far"]
        );
    }

    #[test]
    fn unprefixed_names_are_not_timeline_driven() {
        assert!(track_names("u_Resolution", UniformType::Vec2).is_empty());
        assert!(track_names("radius", UniformType::Float).is_empty());
    }

    #[test]
    fn bare_prefix_is_not_a_track() {
        assert!(track_names("r_", UniformType::Float).is_empty());
    }
}
