use bitflags::bitflags;

use crate::cursor::{Cursor, Writer};
use crate::error::Result;

/// Size of one on-disk descriptor record.
pub const DESCRIPTOR_SIZE: usize = 12;

bitflags! {
    /// Texture flags word. The row/column bits select the 256×256 page of
    /// the atlas the corners are relative to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureFlags: u16 {
        const COLUMN = 0x0003;
        const ROW_LOW = 0x0004;
        const ROW_HIGH = 0x0010;
        const HAS_256_COLORS = 0x0080;
        const IS_NOT_PALETTED = 0x0100;
    }
}

impl TextureFlags {
    pub fn page_row(self) -> u32 {
        let bits = u32::from(self.bits());
        ((bits & 0x4) >> 1) + ((bits & 0x10) >> 4)
    }

    pub fn page_column(self) -> u32 {
        u32::from(self.bits() & 0x3)
    }

    pub fn depth(self) -> ColorDepth {
        if self.contains(Self::IS_NOT_PALETTED) {
            ColorDepth::Direct15
        } else if self.contains(Self::HAS_256_COLORS) {
            ColorDepth::Indexed8
        } else {
            ColorDepth::Indexed4
        }
    }
}

/// Pixel format of one texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorDepth {
    /// 16-color palette, two pixels per byte.
    Indexed4,
    /// 256-color palette, one pixel per byte.
    Indexed8,
    /// 15-bit color, two bytes per pixel.
    Direct15,
}

impl ColorDepth {
    /// Atlas x-units per visible pixel of this depth.
    pub fn correction_ratio(self) -> u32 {
        match self {
            Self::Indexed4 => 1,
            Self::Indexed8 => 2,
            Self::Direct15 => 4,
        }
    }

    /// Width in pixels of the atlas viewed at this depth.
    pub fn view_width(self) -> u32 {
        1024 / self.correction_ratio()
    }

    pub fn palette_len(self) -> Option<usize> {
        match self {
            Self::Indexed4 => Some(16),
            Self::Indexed8 => Some(256),
            Self::Direct15 => None,
        }
    }
}

/// One raw UV corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Corner {
    pub x: u8,
    pub y: u8,
}

/// Canonical corner slots.
pub const TOP_LEFT: usize = 0;
pub const TOP_RIGHT: usize = 1;
pub const BOTTOM_LEFT: usize = 2;
pub const BOTTOM_RIGHT: usize = 3;

/// Placement of one texture in the atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDescriptor {
    /// Corners in on-disk order.
    pub corners: [Corner; 4],
    /// Packed palette location (PS1 CLUT id).
    pub palette_info: u16,
    pub flags: TextureFlags,
}

/// Round up to an even value.
fn round_even(v: u32) -> u32 {
    v + (v & 1)
}

impl TextureDescriptor {
    pub fn parse(c: &mut Cursor<'_>) -> Result<Self> {
        let c0 = Corner {
            x: c.read_u8()?,
            y: c.read_u8()?,
        };
        let palette_info = c.read_u16()?;
        let c1 = Corner {
            x: c.read_u8()?,
            y: c.read_u8()?,
        };
        let flags = TextureFlags::from_bits_retain(c.read_u16()?);
        let c2 = Corner {
            x: c.read_u8()?,
            y: c.read_u8()?,
        };
        let c3 = Corner {
            x: c.read_u8()?,
            y: c.read_u8()?,
        };
        if flags.bits() & 0xFE00 != 0 {
            tracing::debug!(flags = flags.bits(), "texture flags use unknown high bits");
        }
        Ok(Self {
            corners: [c0, c1, c2, c3],
            palette_info,
            flags,
        })
    }

    pub fn encode(&self, w: &mut Writer) {
        let [c0, c1, c2, c3] = self.corners;
        w.write_bytes(&[c0.x, c0.y]);
        w.write_u16(self.palette_info);
        w.write_bytes(&[c1.x, c1.y]);
        w.write_u16(self.flags.bits());
        w.write_bytes(&[c2.x, c2.y, c3.x, c3.y]);
    }

    pub fn depth(&self) -> ColorDepth {
        self.flags.depth()
    }

    pub fn correction_ratio(&self) -> u32 {
        self.depth().correction_ratio()
    }

    /// Indices into `corners` for the top-left, top-right, bottom-left and
    /// bottom-right slots.
    ///
    /// Rows are split by y, then each row is ordered by x, so the result
    /// depends only on the corner values and not on their on-disk order.
    /// This generalizes the rule that only handles the four mirrorings of
    /// an axis-aligned quad (compare corner 0 with corner 1 on x, and with
    /// corner 2 on y) and gives the same order on those four layouts.
    pub fn corner_order(&self) -> [usize; 4] {
        let mut order = [0usize, 1, 2, 3];
        order.sort_by_key(|&i| (self.corners[i].y, self.corners[i].x));
        let [a, b, c, d] = order;
        let (tl, tr) = if self.corners[a].x <= self.corners[b].x {
            (a, b)
        } else {
            (b, a)
        };
        let (bl, br) = if self.corners[c].x <= self.corners[d].x {
            (c, d)
        } else {
            (d, c)
        };
        [tl, tr, bl, br]
    }

    /// Corners in canonical order.
    pub fn canonical_corners(&self) -> [Corner; 4] {
        self.corner_order().map(|i| self.corners[i])
    }

    /// Byte offset of the palette inside the atlas buffer.
    pub fn palette_offset(&self) -> usize {
        let pi = usize::from(self.palette_info);
        ((pi & 0xFFC0) << 3) + ((pi & 0xF) << 5)
    }

    /// Corners in the pixel space of this texture's depth, in on-disk order.
    pub fn source_coords(&self) -> [(u32, u32); 4] {
        let column = (256 / self.correction_ratio()) * self.flags.page_column();
        let row = 256 * self.flags.page_row();
        self.corners.map(|c| {
            (
                round_even(u32::from(c.x) + column),
                round_even(u32::from(c.y) + row),
            )
        })
    }

    /// Corners in 1024×1024 atlas space, in on-disk order.
    ///
    /// Only the top-left corner is scaled by the correction ratio; the
    /// offset it gains is applied to all four corners.
    pub fn atlas_coords(&self) -> [(u32, u32); 4] {
        let ratio = self.correction_ratio();
        let anchor = u32::from(self.corners[self.corner_order()[TOP_LEFT]].x);
        let correction = anchor * ratio - anchor;
        let column = 256 * self.flags.page_column();
        let row = 256 * self.flags.page_row();
        self.corners.map(|c| {
            (
                round_even(u32::from(c.x) + correction + column),
                round_even(u32::from(c.y) + row),
            )
        })
    }

    /// `(left, top, right, bottom)` of the texture in its source pixel space.
    pub fn source_box(&self) -> (u32, u32, u32, u32) {
        let order = self.corner_order();
        let coords = self.source_coords();
        let (left, top) = coords[order[TOP_LEFT]];
        let (right, bottom) = coords[order[BOTTOM_RIGHT]];
        (left, top, right, bottom)
    }

    /// Where the texture's top-left pixel lands in the composited atlas.
    pub fn atlas_position(&self) -> (u32, u32) {
        self.atlas_coords()[self.corner_order()[TOP_LEFT]]
    }
}
