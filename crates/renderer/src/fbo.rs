//! Render-target framebuffers.
//!
//! Each target is one framebuffer with a single RGBA16F color texture, so
//! pass outputs can be sampled by later passes without precision loss. A
//! target is either fully constructed and complete, or construction fails
//! and initialization of the whole pipeline fails with it.

use glow::{HasContext, PixelUnpackData};

use crate::RendererError;

#[derive(Debug)]
pub(crate) struct Framebuffer {
    framebuffer: glow::Framebuffer,
    texture: glow::Texture,
    width: i32,
    height: i32,
}

impl Framebuffer {
    pub(crate) fn new(
        gl: &glow::Context,
        width: i32,
        height: i32,
        filter: u32,
    ) -> Result<Self, RendererError> {
        let framebuffer = unsafe { gl.create_framebuffer() }.map_err(RendererError::Allocate)?;
        let texture = unsafe { gl.create_texture() }.map_err(RendererError::Allocate)?;

        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA16F as i32,
                width,
                height,
                0,
                glow::RGBA,
                glow::HALF_FLOAT,
                PixelUnpackData::Slice(None),
            );
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, filter as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, filter as i32);
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_S,
                glow::CLAMP_TO_EDGE as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_T,
                glow::CLAMP_TO_EDGE as i32,
            );
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(texture),
                0,
            );
        }

        let status = unsafe { gl.check_framebuffer_status(glow::FRAMEBUFFER) };
        unsafe { gl.bind_framebuffer(glow::FRAMEBUFFER, None) };
        if status != glow::FRAMEBUFFER_COMPLETE {
            unsafe {
                gl.delete_framebuffer(framebuffer);
                gl.delete_texture(texture);
            }
            return Err(RendererError::FramebufferIncomplete { status });
        }

        Ok(Self {
            framebuffer,
            texture,
            width,
            height,
        })
    }

    pub(crate) fn framebuffer(&self) -> glow::Framebuffer {
        self.framebuffer
    }

    pub(crate) fn texture(&self) -> glow::Texture {
        self.texture
    }

    pub(crate) fn width(&self) -> i32 {
        self.width
    }

    pub(crate) fn height(&self) -> i32 {
        self.height
    }

    pub(crate) fn destroy(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_framebuffer(self.framebuffer);
            gl.delete_texture(self.texture);
        }
    }
}
