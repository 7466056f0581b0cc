//! TPSX: level titles and the texture atlas.

use bitflags::bitflags;
use image::RgbaImage;

use crate::atlas::descriptor::DESCRIPTOR_SIZE;
use crate::atlas::rle::decode_runs_until;
use crate::atlas::{
    AlphaMode, Atlas, AtlasEncoding, TextureDescriptor, ATLAS_BYTES, PAGE_ROW_BYTES,
};
use crate::config::DecodeConfig;
use crate::cursor::{Cursor, Writer};
use crate::error::{HeuristicWarning, Result};
use crate::sections::{write_framed, Codename, SectionHeader};
use crate::variant::Game;

const TITLE_SIZE: usize = 32;
const TRANSLATED_TITLE_SIZE: usize = 48;
/// Title screen and demo mode data, not decoded.
const DEMO_DATA_SIZE: usize = 2052;
const LEGACY_TEXTURES_SIZE: usize = 15360;
const IMAGE_HEADER_SIZE: usize = 4;

const MAX_TEXTURES: u32 = 4000;
const MAX_ROWS: u32 = 4;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TpsxFlags: u32 {
        const HAS_TITLE_AND_DEMO_DATA = 0x04;
        const HAS_LEGACY_TEXTURES = 0x08;
        const HAS_TRANSLATED_TITLES = 0x10;
    }
}

/// Header present in every variant but the dummy demo files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TpsxHeader {
    pub flags: TpsxFlags,
    /// Fixed-width latin-1 title records, NUL padded.
    pub titles: Vec<Vec<u8>>,
    pub demo_data: Vec<u8>,
}

impl TpsxHeader {
    fn parse(c: &mut Cursor<'_>) -> Result<Self> {
        let flags = TpsxFlags::from_bits_retain(c.read_u32()?);
        let mut titles = Vec::new();
        let mut demo_data = Vec::new();
        if flags.contains(TpsxFlags::HAS_TITLE_AND_DEMO_DATA) {
            if flags.contains(TpsxFlags::HAS_TRANSLATED_TITLES) {
                let n_titles = c.read_count()?;
                for _ in 0..n_titles {
                    titles.push(c.read_bytes(TRANSLATED_TITLE_SIZE)?.to_vec());
                }
            } else {
                titles.push(c.read_bytes(TITLE_SIZE)?.to_vec());
            }
            demo_data = c.read_bytes(DEMO_DATA_SIZE)?.to_vec();
        }
        Ok(Self {
            flags,
            titles,
            demo_data,
        })
    }

    fn encode(&self, w: &mut Writer) {
        w.write_u32(self.flags.bits());
        if self.flags.contains(TpsxFlags::HAS_TITLE_AND_DEMO_DATA) {
            let width = if self.flags.contains(TpsxFlags::HAS_TRANSLATED_TITLES) {
                w.write_count(self.titles.len());
                TRANSLATED_TITLE_SIZE
            } else {
                TITLE_SIZE
            };
            for title in &self.titles {
                let mut record = title.clone();
                record.resize(width, 0);
                w.write_bytes(&record);
            }
            w.write_bytes(&self.demo_data);
        }
    }
}

/// Descriptors and atlas of one level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureFile {
    /// Page rows declared in the header.
    pub n_rows: u32,
    pub descriptors: Vec<TextureDescriptor>,
    /// Empty descriptor records counted in the header but never used.
    pub reserved_slots: Vec<u8>,
    pub image_headers: Vec<[u8; IMAGE_HEADER_SIZE]>,
    pub image_header_extra: u32,
    pub legacy_textures: Option<Vec<u8>>,
    pub atlas: Atlas,
}

impl TextureFile {
    fn parse(
        c: &mut Cursor<'_>,
        data: &[u8],
        end: usize,
        legacy_textures: bool,
        config: &DecodeConfig,
    ) -> Result<Self> {
        let game = config.game;
        let offset = c.position();
        let n_textures = c.read_u32()?;
        let n_rows = c.read_u32()?;
        if n_textures > MAX_TEXTURES || n_rows > MAX_ROWS {
            config.check(HeuristicWarning::TooManyTextures {
                offset,
                textures: n_textures,
                rows: n_rows,
            })?;
        }

        let reserved = game.reserved_texture_slots();
        let stored = (n_textures as usize).saturating_sub(reserved);
        let mut descriptors = Vec::with_capacity(c.capacity_for(stored, DESCRIPTOR_SIZE));
        for _ in 0..stored {
            descriptors.push(TextureDescriptor::parse(c)?);
        }
        let reserved_slots = c.read_bytes(reserved * DESCRIPTOR_SIZE)?.to_vec();

        let n_image_headers = c.read_count()?;
        let image_header_extra = c.read_u32()?;
        let mut image_headers = Vec::with_capacity(c.capacity_for(n_image_headers, IMAGE_HEADER_SIZE));
        for _ in 0..n_image_headers {
            image_headers.push(c.read_array()?);
        }
        let legacy_textures = if legacy_textures {
            Some(c.read_bytes(LEGACY_TEXTURES_SIZE)?.to_vec())
        } else {
            None
        };

        let atlas = if game.has_run_length_atlas() {
            let start = c.position();
            let mut runs = Cursor::new(data)
                .at_offset(start)
                .bounded(end + game.atlas_overrun());
            let mut pixels = Vec::new();
            decode_runs_until(&mut runs, end, ATLAS_BYTES, &mut pixels)?;
            let stop = runs.position().min(end);
            c.seek(stop);
            Atlas::from_parts(pixels, data[start..stop].to_vec(), AtlasEncoding::RunLength)
        } else {
            let stored = c.read_bytes(n_rows as usize * PAGE_ROW_BYTES)?.to_vec();
            Atlas::from_parts(stored.clone(), stored, AtlasEncoding::Flat)
        };
        tracing::debug!(
            textures = descriptors.len(),
            rows = n_rows,
            encoding = ?atlas.encoding(),
            "decoded texture file"
        );

        Ok(Self {
            n_rows,
            descriptors,
            reserved_slots,
            image_headers,
            image_header_extra,
            legacy_textures,
            atlas,
        })
    }

    fn encode(&self, w: &mut Writer) {
        let n_textures = self.descriptors.len() + self.reserved_slots.len() / DESCRIPTOR_SIZE;
        w.write_count(n_textures);
        w.write_u32(self.n_rows);
        for descriptor in &self.descriptors {
            descriptor.encode(w);
        }
        w.write_bytes(&self.reserved_slots);
        w.write_count(self.image_headers.len());
        w.write_u32(self.image_header_extra);
        for header in &self.image_headers {
            w.write_bytes(header);
        }
        if let Some(legacy) = &self.legacy_textures {
            w.write_bytes(legacy);
        }
        w.write_bytes(self.atlas.stored());
    }

    /// Replace the atlas, keeping the row count in step with flat storage.
    pub fn set_atlas(&mut self, atlas: Atlas) {
        if atlas.encoding() == AtlasEncoding::Flat {
            self.n_rows = atlas.page_rows();
        }
        self.atlas = atlas;
    }

    /// Composite all textures into one 1024×1024 image.
    pub fn composite(&self, alpha: AlphaMode) -> RgbaImage {
        self.atlas.composite(&self.descriptors, alpha)
    }
}

/// Decoded TPSX section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tpsx {
    /// Absent for the dummy demo files.
    pub header: Option<TpsxHeader>,
    pub textures: TextureFile,
}

impl Tpsx {
    pub fn parse(data: &[u8], header: &SectionHeader, config: &DecodeConfig) -> Result<Self> {
        let mut c = header.cursor(data);
        let tpsx_header = if config.game.has_texture_header() {
            Some(TpsxHeader::parse(&mut c)?)
        } else {
            None
        };
        let legacy = tpsx_header
            .as_ref()
            .is_some_and(|h| h.flags.contains(TpsxFlags::HAS_LEGACY_TEXTURES));
        let textures = TextureFile::parse(&mut c, data, header.end(), legacy, config)?;
        header.expect_end(c.position())?;
        Ok(Self {
            header: tpsx_header,
            textures,
        })
    }

    pub fn encode(&self, w: &mut Writer) -> Result<()> {
        write_framed(w, Codename::TEXTURES, |w| {
            if let Some(header) = &self.header {
                header.encode(w);
            }
            self.textures.encode(w);
            Ok(())
        })
    }

    /// Level titles, one per language when translated.
    pub fn titles(&self) -> Vec<String> {
        let Some(header) = &self.header else {
            return Vec::new();
        };
        header
            .titles
            .iter()
            .map(|raw| {
                let start = raw.iter().position(|&b| b != 0).unwrap_or(raw.len());
                let end = raw.iter().rposition(|&b| b != 0).map_or(start, |i| i + 1);
                // latin-1 maps each byte to the code point of the same value.
                raw[start..end].iter().map(|&b| char::from(b)).collect()
            })
            .collect()
    }

    pub fn alpha_mode(game: Game) -> AlphaMode {
        if game.has_legacy_alpha() {
            AlphaMode::Opaque
        } else {
            AlphaMode::Keyed
        }
    }
}
