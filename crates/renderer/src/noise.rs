//! Per-frame noise texture and its generator.
//!
//! The generator is xoshiro256** with an explicit seed (owned state, no
//! process-wide singleton), and the pixel buffer it fills is owned by the
//! texture so nothing is reallocated per frame; the upload is a sub-image
//! update of the already-allocated RGBA8 texture.

use glow::{HasContext, PixelUnpackData};

use crate::RendererError;

/// Side length of the square RGBA8 noise texture.
pub const NOISE_SIZE: i32 = 256;

/// xoshiro256** as published by Blackman and Vigna.
#[derive(Debug, Clone)]
pub struct Xoshiro256 {
    state: [u64; 4],
}

impl Xoshiro256 {
    /// The state must not be all zero.
    pub fn new(state: [u64; 4]) -> Self {
        debug_assert!(state != [0; 4]);
        Self { state }
    }

    pub fn next_u64(&mut self) -> u64 {
        let s = &mut self.state;
        let result = s[1].wrapping_mul(5).rotate_left(7).wrapping_mul(9);
        let t = s[1] << 17;

        s[2] ^= s[0];
        s[3] ^= s[1];
        s[1] ^= s[2];
        s[0] ^= s[3];

        s[2] ^= t;
        s[3] = s[3].rotate_left(45);

        result
    }

    pub fn fill(&mut self, buf: &mut [u8]) {
        for chunk in buf.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}

impl Default for Xoshiro256 {
    fn default() -> Self {
        Self::new([123, 450_435, 9, !0])
    }
}

#[derive(Debug)]
pub struct NoiseTexture {
    texture: glow::Texture,
    size: i32,
    rng: Xoshiro256,
    pixels: Vec<u8>,
}

impl NoiseTexture {
    pub fn new(gl: &glow::Context, size: i32, rng: Xoshiro256) -> Result<Self, RendererError> {
        let texture = unsafe { gl.create_texture() }.map_err(RendererError::Allocate)?;
        unsafe {
            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA8 as i32,
                size,
                size,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                PixelUnpackData::Slice(None),
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                glow::NEAREST as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                glow::NEAREST as i32,
            );
        }

        Ok(Self {
            texture,
            size,
            rng,
            pixels: vec![0; (size * size * 4) as usize],
        })
    }

    /// Refills the pixel buffer from the generator and uploads it.
    pub fn update(&mut self, gl: &glow::Context) {
        self.rng.fill(&mut self.pixels);
        unsafe {
            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture(glow::TEXTURE_2D, Some(self.texture));
            gl.tex_sub_image_2d(
                glow::TEXTURE_2D,
                0,
                0,
                0,
                self.size,
                self.size,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                PixelUnpackData::Slice(Some(&self.pixels)),
            );
        }
    }

    pub fn texture(&self) -> glow::Texture {
        self.texture
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    pub fn destroy(&self, gl: &glow::Context) {
        unsafe { gl.delete_texture(self.texture) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_output_matches_reference() {
        // rol64(450435 * 5, 7) * 9 for the default seed.
        let mut rng = Xoshiro256::default();
        assert_eq!(rng.next_u64(), 2_594_505_600);
    }

    #[test]
    fn same_seed_same_stream() {
        let mut a = Xoshiro256::new([1, 2, 3, 4]);
        let mut b = Xoshiro256::new([1, 2, 3, 4]);
        for _ in 0..64 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = Xoshiro256::new([1, 2, 3, 4]);
        let mut b = Xoshiro256::new([4, 3, 2, 1]);
        let same = (0..16).filter(|_| a.next_u64() == b.next_u64()).count();
        assert!(same < 16);
    }

    #[test]
    fn fill_covers_whole_buffer() {
        let mut rng = Xoshiro256::default();
        let mut buf = vec![0u8; 1021]; // deliberately not a multiple of 8
        rng.fill(&mut buf);
        assert!(buf.iter().any(|&b| b != 0));

        let mut rng2 = Xoshiro256::default();
        let mut buf2 = vec![0u8; 1021];
        rng2.fill(&mut buf2);
        assert_eq!(buf, buf2);
    }
}
