//! The 1024×1024 texture atlas: storage, pixel sampling and compositing.

pub mod color;
pub mod descriptor;
pub mod rle;

use image::{Rgba, RgbaImage};

pub use color::{decode_high_color, read_palette, AlphaMode};
pub use descriptor::{ColorDepth, Corner, TextureDescriptor, TextureFlags};
pub use rle::{decode_runs, encode_runs};

/// Atlas width and height in 4-bit pixels.
pub const ATLAS_SIZE: u32 = 1024;
/// Bytes per atlas row at any depth.
pub const ROW_STRIDE: usize = 512;
/// Decoded size of a full atlas.
pub const ATLAS_BYTES: usize = ROW_STRIDE * ATLAS_SIZE as usize;
/// Bytes of one 256-pixel page row in the flat storage.
pub const PAGE_ROW_BYTES: usize = 131_072;

/// How the atlas bytes are stored in the texture section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtlasEncoding {
    RunLength,
    /// Uncompressed, `n_rows` page rows.
    Flat,
}

/// Atlas pixel data together with its stored form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atlas {
    pixels: Vec<u8>,
    stored: Vec<u8>,
    encoding: AtlasEncoding,
}

impl Atlas {
    /// Wrap bytes read from a section. `pixels` is padded to a full atlas.
    pub(crate) fn from_parts(mut pixels: Vec<u8>, stored: Vec<u8>, encoding: AtlasEncoding) -> Self {
        if pixels.len() < ATLAS_BYTES {
            pixels.resize(ATLAS_BYTES, 0);
        }
        Self {
            pixels,
            stored,
            encoding,
        }
    }

    /// Build an atlas from raw pixel bytes, encoding them for storage.
    ///
    /// Flat storage keeps whole page rows; trailing all-zero rows are dropped.
    pub fn from_pixels(pixels: Vec<u8>, encoding: AtlasEncoding) -> Self {
        let stored = match encoding {
            AtlasEncoding::RunLength => encode_runs(&pixels),
            AtlasEncoding::Flat => {
                let used = pixels.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
                let rows = used.div_ceil(PAGE_ROW_BYTES);
                let mut stored = pixels[..(rows * PAGE_ROW_BYTES).min(pixels.len())].to_vec();
                stored.resize(rows * PAGE_ROW_BYTES, 0);
                stored
            }
        };
        Self::from_parts(pixels, stored, encoding)
    }

    /// Decoded pixel bytes, at least [`ATLAS_BYTES`] long.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Bytes as stored in the section.
    pub fn stored(&self) -> &[u8] {
        &self.stored
    }

    pub fn encoding(&self) -> AtlasEncoding {
        self.encoding
    }

    /// Number of 256-pixel page rows holding data.
    pub fn page_rows(&self) -> u32 {
        match self.encoding {
            AtlasEncoding::Flat => (self.stored.len() / PAGE_ROW_BYTES) as u32,
            AtlasEncoding::RunLength => {
                let used = self.pixels.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
                used.div_ceil(PAGE_ROW_BYTES) as u32
            }
        }
    }

    /// Raw sample at `(x, y)` viewed at `depth`: a palette index or a 15-bit
    /// color word. Out-of-range samples read as zero.
    pub fn sample(&self, depth: ColorDepth, x: u32, y: u32) -> u16 {
        if x >= depth.view_width() || y >= ATLAS_SIZE {
            return 0;
        }
        let row = y as usize * ROW_STRIDE;
        let x = x as usize;
        match depth {
            ColorDepth::Indexed4 => {
                let byte = self.pixels.get(row + x / 2).copied().unwrap_or(0);
                u16::from(if x % 2 == 0 { byte & 0xF } else { byte >> 4 })
            }
            ColorDepth::Indexed8 => u16::from(self.pixels.get(row + x).copied().unwrap_or(0)),
            ColorDepth::Direct15 => match self.pixels.get(row + x * 2..row + x * 2 + 2) {
                Some(b) => u16::from_le_bytes([b[0], b[1]]),
                None => 0,
            },
        }
    }

    /// Crop one texture and resolve its palette.
    pub fn texture_image(&self, texture: &TextureDescriptor, alpha: AlphaMode) -> RgbaImage {
        let depth = texture.depth();
        let (left, top, right, bottom) = texture.source_box();
        let width = right.saturating_sub(left);
        let height = bottom.saturating_sub(top);
        let palette = depth
            .palette_len()
            .map(|len| read_palette(&self.pixels, texture.palette_offset(), len, alpha));

        RgbaImage::from_fn(width, height, |x, y| {
            let sample = self.sample(depth, left + x, top + y);
            match &palette {
                Some(palette) => palette
                    .get(usize::from(sample))
                    .copied()
                    .unwrap_or(Rgba([0, 0, 0, 0])),
                None => decode_high_color(sample, alpha),
            }
        })
    }

    /// Assemble every texture into one 1024×1024 image. Later textures are
    /// drawn over earlier ones.
    pub fn composite(&self, textures: &[TextureDescriptor], alpha: AlphaMode) -> RgbaImage {
        let mut out = RgbaImage::new(ATLAS_SIZE, ATLAS_SIZE);
        for texture in textures {
            let image = self.texture_image(texture, alpha);
            let (ox, oy) = texture.atlas_position();
            for (x, y, pixel) in image.enumerate_pixels() {
                let (tx, ty) = (ox + x, oy + y);
                if tx < ATLAS_SIZE && ty < ATLAS_SIZE {
                    out.put_pixel(tx, ty, *pixel);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texture(corners: [(u8, u8); 4], palette_info: u16, flags: u16) -> TextureDescriptor {
        TextureDescriptor {
            corners: corners.map(|(x, y)| Corner { x, y }),
            palette_info,
            flags: TextureFlags::from_bits_retain(flags),
        }
    }

    #[test]
    fn sampling_depths() {
        let mut pixels = vec![0u8; ATLAS_BYTES];
        pixels[ROW_STRIDE + 1] = 0xA5;
        pixels[ROW_STRIDE + 2] = 0x1F;
        let atlas = Atlas::from_parts(pixels, Vec::new(), AtlasEncoding::Flat);
        // Low nibble first.
        assert_eq!(atlas.sample(ColorDepth::Indexed4, 2, 1), 0x5);
        assert_eq!(atlas.sample(ColorDepth::Indexed4, 3, 1), 0xA);
        assert_eq!(atlas.sample(ColorDepth::Indexed8, 1, 1), 0xA5);
        assert_eq!(atlas.sample(ColorDepth::Direct15, 1, 1), 0x001F);
        assert_eq!(atlas.sample(ColorDepth::Direct15, 256, 1), 0);
    }

    #[test]
    fn composite_places_textures() {
        let mut pixels = vec![0u8; ATLAS_BYTES];
        // 16-color palette at offset 0: entry 1 red, entry 2 blue.
        pixels[2..4].copy_from_slice(&0x001Fu16.to_le_bytes());
        pixels[4..6].copy_from_slice(&0x7C00u16.to_le_bytes());
        // Index 1 at x 16..20 and index 2 at x 32..36 on rows 2 and 3.
        for y in 2..4 {
            pixels[y * ROW_STRIDE + 8] = 0x11;
            pixels[y * ROW_STRIDE + 9] = 0x11;
            pixels[y * ROW_STRIDE + 16] = 0x22;
            pixels[y * ROW_STRIDE + 17] = 0x22;
        }
        let atlas = Atlas::from_parts(pixels, Vec::new(), AtlasEncoding::Flat);
        let red = texture([(16, 2), (20, 2), (16, 4), (20, 4)], 0, 0);
        let blue = texture([(32, 2), (36, 2), (32, 4), (36, 4)], 0, 0);
        assert_eq!(atlas.texture_image(&red, AlphaMode::Keyed).dimensions(), (4, 2));

        let image = atlas.composite(&[red, blue], AlphaMode::Keyed);
        assert_eq!(*image.get_pixel(16, 2), Rgba([255, 0, 0, 255]));
        assert_eq!(*image.get_pixel(35, 3), Rgba([0, 0, 255, 255]));
        assert_eq!(image.get_pixel(0, 0)[3], 0);
        assert_eq!(image.get_pixel(20, 2)[3], 0);
    }

    #[test]
    fn later_textures_win() {
        let mut pixels = vec![0u8; ATLAS_BYTES];
        // Palette 0 maps index 1 to red, palette 1 (offset 32) maps it to green.
        pixels[2..4].copy_from_slice(&0x001Fu16.to_le_bytes());
        pixels[34..36].copy_from_slice(&0x03E0u16.to_le_bytes());
        pixels[2 * ROW_STRIDE + 8] = 0x11;
        let atlas = Atlas::from_parts(pixels, Vec::new(), AtlasEncoding::Flat);
        let corners = [(16, 2), (18, 2), (16, 4), (18, 4)];
        let red = texture(corners, 0, 0);
        let green = texture(corners, 1, 0);

        let image = atlas.composite(&[red, green], AlphaMode::Keyed);
        assert_eq!(*image.get_pixel(16, 2), Rgba([0, 255, 0, 255]));
        let image = atlas.composite(&[green, red], AlphaMode::Keyed);
        assert_eq!(*image.get_pixel(16, 2), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn flat_storage_keeps_page_rows() {
        let mut pixels = vec![0u8; ATLAS_BYTES];
        pixels[PAGE_ROW_BYTES + 5] = 1;
        let atlas = Atlas::from_pixels(pixels, AtlasEncoding::Flat);
        assert_eq!(atlas.stored().len(), 2 * PAGE_ROW_BYTES);
        assert_eq!(atlas.page_rows(), 2);
    }

    #[test]
    fn run_length_storage_round_trips() {
        let mut pixels = vec![0u8; ATLAS_BYTES];
        pixels[1000] = 3;
        let atlas = Atlas::from_pixels(pixels.clone(), AtlasEncoding::RunLength);
        assert_eq!(decode_runs(atlas.stored()).unwrap(), pixels);
        assert_eq!(atlas.page_rows(), 1);
    }
}
