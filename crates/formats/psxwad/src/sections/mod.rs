//! Typed parsers for the sections of a WAD.
//!
//! Each section is `codename (4 bytes) | size (u32) | body (size bytes)`.
//! Parsers receive the whole WAD buffer plus the section header so that
//! offsets in errors and sector alignment stay absolute.

pub mod dpsx;
pub mod end;
pub mod port;
pub mod spsx;
pub mod tpsx;

use std::fmt;

use crate::cursor::{Cursor, Writer};
use crate::error::{Error, Result};
use crate::variant::Game;

pub use dpsx::Dpsx;
pub use end::EndSection;
pub use port::Port;
pub use spsx::Spsx;
pub use tpsx::Tpsx;

/// Four-byte section tag, stored byte-reversed on disk (`XSPT` is "TPSX").
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Codename(pub [u8; 4]);

impl Codename {
    pub const TEXTURES: Self = Self(*b"XSPT");
    pub const SOUNDS: Self = Self(*b"XSPS");
    pub const GEOMETRY: Self = Self(*b"XSPD");
    pub const ZONES: Self = Self(*b"TROP");
    pub const END: Self = Self(*b" DNE");
}

impl fmt::Display for Codename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Codename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Codename(\"{self}\")")
    }
}

/// Sections with a typed decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Textures,
    Sounds,
    Geometry,
    Zones,
    End,
}

impl SectionKind {
    pub fn from_codename(codename: Codename) -> Option<Self> {
        match codename {
            Codename::TEXTURES => Some(Self::Textures),
            Codename::SOUNDS => Some(Self::Sounds),
            Codename::GEOMETRY => Some(Self::Geometry),
            Codename::ZONES => Some(Self::Zones),
            Codename::END => Some(Self::End),
            _ => None,
        }
    }

    pub fn codename(self) -> Codename {
        match self {
            Self::Textures => Codename::TEXTURES,
            Self::Sounds => Codename::SOUNDS,
            Self::Geometry => Codename::GEOMETRY,
            Self::Zones => Codename::ZONES,
            Self::End => Codename::END,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Textures => "texture section",
            Self::Sounds => "sound section",
            Self::Geometry => "geometry section",
            Self::Zones => "zone section",
            Self::End => "sound payload section",
        }
    }
}

/// Location of one section inside a WAD.
#[derive(Debug, Clone, Copy)]
pub struct SectionHeader {
    pub codename: Codename,
    /// Absolute offset of the codename field.
    pub offset: usize,
    /// Declared body size.
    pub size: usize,
}

impl SectionHeader {
    pub fn body_start(&self) -> usize {
        self.offset + 8
    }

    pub fn end(&self) -> usize {
        self.body_start() + self.size
    }

    /// Cursor at the body start that cannot read past the declared end.
    pub fn cursor<'a>(&self, data: &'a [u8]) -> Cursor<'a> {
        Cursor::new(data).at_offset(self.body_start()).bounded(self.end())
    }

    /// Check that decoding stopped exactly at the declared end.
    pub fn expect_end(&self, pos: usize) -> Result<()> {
        if pos != self.end() {
            return Err(Error::SectionSizeMismatch {
                offset: self.offset,
                section: self.codename,
                declared: self.size,
                found: pos.saturating_sub(self.body_start()),
            });
        }
        Ok(())
    }
}

/// Write `codename | size | body`, backpatching the size once the body is
/// written.
pub(crate) fn write_framed(
    w: &mut Writer,
    codename: Codename,
    body: impl FnOnce(&mut Writer) -> Result<()>,
) -> Result<()> {
    w.write_bytes(&codename.0);
    let size_at = w.placeholder_u32();
    body(w)?;
    let size = w.position() - size_at - 4;
    w.patch_u32(size_at, size as u32);
    Ok(())
}

/// Section kept as raw bytes because no decoder handles it for this variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueSection {
    pub codename: Codename,
    pub body: Vec<u8>,
}

impl OpaqueSection {
    pub fn capture(data: &[u8], header: &SectionHeader) -> Result<Self> {
        let mut c = Cursor::new(data).at_offset(header.body_start());
        let body = c.read_bytes(header.size)?.to_vec();
        Ok(Self {
            codename: header.codename,
            body,
        })
    }

    pub fn encode(&self, w: &mut Writer) {
        w.write_bytes(&self.codename.0);
        w.write_count(self.body.len());
        w.write_bytes(&self.body);
    }
}

/// One decoded section.
#[derive(Debug)]
pub enum Section {
    Textures(Tpsx),
    Sounds(Spsx),
    Geometry(Box<Dpsx>),
    Zones(Port),
    End(EndSection),
    Opaque(OpaqueSection),
}

impl Section {
    pub fn codename(&self) -> Codename {
        match self {
            Section::Textures(_) => Codename::TEXTURES,
            Section::Sounds(_) => Codename::SOUNDS,
            Section::Geometry(_) => Codename::GEOMETRY,
            Section::Zones(_) => Codename::ZONES,
            Section::End(_) => Codename::END,
            Section::Opaque(s) => s.codename,
        }
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self, Section::Opaque(_))
    }

    pub fn encode(&self, w: &mut Writer, game: Game) -> Result<()> {
        match self {
            Section::Textures(s) => s.encode(w),
            Section::Sounds(s) => s.encode(w),
            Section::Geometry(s) => s.encode(w),
            Section::Zones(s) => s.encode(w),
            Section::End(s) => s.encode(w, game),
            Section::Opaque(s) => {
                s.encode(w);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codename_display() {
        assert_eq!(Codename::END.to_string(), " DNE");
        assert_eq!(Codename(*b"FE\x00S").to_string(), "FE\\x00S");
        assert_eq!(
            SectionKind::from_codename(Codename(*b"TROP")),
            Some(SectionKind::Zones)
        );
        assert_eq!(SectionKind::from_codename(Codename(*b"FESO")), None);
    }

    #[test]
    fn framed_size_is_backpatched() {
        let mut w = Writer::new();
        write_framed(&mut w, Codename::ZONES, |w| {
            w.write_bytes(&[1, 2, 3]);
            Ok(())
        })
        .unwrap();
        let bytes = w.into_bytes();
        assert_eq!(&bytes[..4], b"TROP");
        assert_eq!(bytes[4..8], 3u32.to_le_bytes());
    }

    #[test]
    fn header_bounds() {
        let header = SectionHeader {
            codename: Codename::TEXTURES,
            offset: 4,
            size: 8,
        };
        assert_eq!(header.end(), 20);
        assert!(header.expect_end(20).is_ok());
        assert!(matches!(
            header.expect_end(18),
            Err(Error::SectionSizeMismatch {
                declared: 8,
                found: 6,
                ..
            })
        ));
    }
}
