//! WAD files: a u32 size followed by framed sections, the last one being END.

use std::fmt;

use serde::Serialize;

use crate::config::DecodeConfig;
use crate::cursor::{Cursor, Writer};
use crate::error::{Error, Result};
use crate::sections::{
    Codename, Dpsx, EndSection, OpaqueSection, Port, Section, SectionHeader, SectionKind, Spsx, Tpsx,
};
use crate::variant::Game;

/// Decoded WAD.
#[derive(Debug)]
pub struct Wad {
    /// Sections in file order.
    pub sections: Vec<Section>,
    /// Size field as stored. Recomputed on encode.
    pub declared_size: u32,
    /// Bytes after the END section.
    pub trailing: Vec<u8>,
}

/// Walk the section frames. The first section must be TPSX; other files
/// with the same outer shape (`FESOUND.WAD`) fail here.
pub fn scan_sections(data: &[u8]) -> Result<(Vec<SectionHeader>, usize)> {
    let mut c = Cursor::new(data);
    c.skip(4)?;
    let mut headers = Vec::new();
    loop {
        if !headers.is_empty() && c.remaining() < 8 {
            tracing::warn!(offset = c.position(), "WAD ends without an END section");
            break;
        }
        let offset = c.position();
        let codename = Codename(c.read_array()?);
        if headers.is_empty() && codename != Codename::TEXTURES {
            return Err(Error::SectionNameMismatch {
                offset,
                expected: Codename::TEXTURES,
                found: codename,
            });
        }
        let size = c.read_count()?;
        c.skip(size)?;
        headers.push(SectionHeader {
            codename,
            offset,
            size,
        });
        if codename == Codename::END {
            break;
        }
    }
    Ok((headers, c.position()))
}

impl Wad {
    pub fn decode(data: &[u8], config: &DecodeConfig) -> Result<Self> {
        let game = config.game;
        let declared_size = Cursor::new(data).read_u32()?;
        let (headers, end) = scan_sections(data)?;

        let mut sections: Vec<Section> = Vec::with_capacity(headers.len());
        for header in &headers {
            let kind = SectionKind::from_codename(header.codename).filter(|&k| game.supports(k));
            tracing::debug!(
                section = %header.codename,
                offset = header.offset,
                size = header.size,
                typed = kind.is_some(),
                "dispatching section"
            );
            let section = match kind {
                Some(SectionKind::Textures) => Section::Textures(Tpsx::parse(data, header, config)?),
                Some(SectionKind::Sounds) => Section::Sounds(Spsx::parse(data, header)?),
                Some(SectionKind::Geometry) => {
                    Section::Geometry(Box::new(Dpsx::parse(data, header, config)?))
                }
                Some(SectionKind::Zones) => Section::Zones(Port::parse(data, header)?),
                Some(SectionKind::End) => {
                    let spsx = sections.iter().find_map(|s| match s {
                        Section::Sounds(spsx) => Some(spsx),
                        _ => None,
                    });
                    match spsx {
                        Some(spsx) => Section::End(EndSection::parse(data, header, spsx, game)?),
                        None if header.size == 0 => Section::End(EndSection::default()),
                        None => Section::Opaque(OpaqueSection::capture(data, header)?),
                    }
                }
                None => Section::Opaque(OpaqueSection::capture(data, header)?),
            };
            sections.push(section);
        }

        Ok(Self {
            sections,
            declared_size,
            trailing: data[end..].to_vec(),
        })
    }

    /// Encode with a recomputed size field.
    pub fn encode(&self, game: Game) -> Result<Vec<u8>> {
        let mut w = Writer::new();
        let size_at = w.placeholder_u32();
        for section in &self.sections {
            section.encode(&mut w, game)?;
        }
        let size = w.position() as u32 + game.wad_size_bias();
        if size != self.declared_size {
            tracing::debug!(stored = self.declared_size, size, "WAD size field changed");
        }
        w.patch_u32(size_at, size);
        w.write_bytes(&self.trailing);
        Ok(w.into_bytes())
    }

    pub fn section(&self, codename: Codename) -> Option<&Section> {
        self.sections.iter().find(|s| s.codename() == codename)
    }

    pub fn tpsx(&self) -> Option<&Tpsx> {
        self.sections.iter().find_map(|s| match s {
            Section::Textures(t) => Some(t),
            _ => None,
        })
    }

    pub fn spsx(&self) -> Option<&Spsx> {
        self.sections.iter().find_map(|s| match s {
            Section::Sounds(s) => Some(s),
            _ => None,
        })
    }

    pub fn dpsx(&self) -> Option<&Dpsx> {
        self.sections.iter().find_map(|s| match s {
            Section::Geometry(d) => Some(d.as_ref()),
            _ => None,
        })
    }

    pub fn port(&self) -> Option<&Port> {
        self.sections.iter().find_map(|s| match s {
            Section::Zones(p) => Some(p),
            _ => None,
        })
    }

    pub fn end(&self) -> Option<&EndSection> {
        self.sections.iter().find_map(|s| match s {
            Section::End(e) => Some(e),
            _ => None,
        })
    }

    pub fn summary(&self) -> WadSummary {
        let dpsx = self.dpsx();
        let chunks = dpsx.map(|d| &d.level().chunks);
        WadSummary {
            titles: self.tpsx().map(Tpsx::titles).unwrap_or_default(),
            sections: self.sections.iter().map(|s| s.codename().to_string()).collect(),
            opaque_sections: self
                .sections
                .iter()
                .filter(|s| s.is_opaque())
                .map(|s| s.codename().to_string())
                .collect(),
            n_textures: self.tpsx().map(|t| t.textures.descriptors.len()),
            n_sounds: self.spsx().map(Spsx::n_sounds),
            n_models: dpsx.map(|d| d.models().len()),
            n_animations: dpsx.map(|d| d.animations().len()),
            n_scripts: dpsx.map(|d| d.scripts().len()),
            chunk_grid: chunks.map(|c| (c.n_rows, c.n_columns)),
            n_filled_chunks: chunks.map(|c| c.n_filled_chunks()),
            n_zones: self.port().map(|p| p.zones.len()),
        }
    }
}

/// What a decoded WAD contains.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WadSummary {
    pub titles: Vec<String>,
    pub sections: Vec<String>,
    /// Sections kept as raw bytes.
    pub opaque_sections: Vec<String>,
    pub n_textures: Option<usize>,
    pub n_sounds: Option<usize>,
    pub n_models: Option<usize>,
    pub n_animations: Option<usize>,
    pub n_scripts: Option<usize>,
    /// `(rows, columns)` of the level grid.
    pub chunk_grid: Option<(usize, usize)>,
    pub n_filled_chunks: Option<usize>,
    pub n_zones: Option<usize>,
}

impl fmt::Display for WadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Game level")?;
        if !self.titles.is_empty() {
            let titles: Vec<_> = self.titles.iter().map(|t| t.trim()).collect();
            write!(f, " ({})", titles.join(", "))?;
        }
        if let Some(n) = self.n_textures {
            write!(f, " {n:>4} texture(s)")?;
        }
        if let Some(n) = self.n_sounds {
            write!(f, " {n:>4} audio file(s)")?;
        }
        if let (Some(models), Some(animations)) = (self.n_models, self.n_animations) {
            write!(f, " {models:>4} model(s) {animations:>4} animation(s)")?;
        }
        if let Some(n) = self.n_filled_chunks {
            write!(f, " {n:>4} chunk(s)")?;
        }
        if !self.opaque_sections.is_empty() {
            write!(f, " [raw: {}]", self.opaque_sections.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::SECTOR_SIZE;
    use crate::sections::spsx::tests::sample;
    use crate::vag::{Channels, Vag};

    fn frame(w: &mut Writer, codename: &[u8; 4], body: &[u8]) {
        w.write_bytes(codename);
        w.write_count(body.len());
        w.write_bytes(body);
    }

    /// Dummy demo texture section: no header, no textures, no page rows.
    fn empty_dummy_textures() -> Vec<u8> {
        vec![0; 16]
    }

    #[test]
    fn first_section_must_be_textures() {
        let mut data = 0u32.to_le_bytes().to_vec();
        data.extend_from_slice(b"FESOUND\0");
        let config = DecodeConfig::new(Game::Croc2);
        assert!(matches!(
            Wad::decode(&data, &config),
            Err(Error::SectionNameMismatch {
                offset: 4,
                expected: Codename::TEXTURES,
                found,
            }) if found == Codename(*b"FESO")
        ));
    }

    #[test]
    fn unknown_sections_pass_through() {
        let mut w = Writer::new();
        w.write_u32(0);
        frame(&mut w, b"XSPT", &empty_dummy_textures());
        frame(&mut w, b"ABCD", &[1, 2, 3, 4, 5]);
        frame(&mut w, b" DNE", &[]);
        let size = w.position() as u32;
        w.patch_u32(0, size);
        w.write_bytes(&[0xEE; 3]);
        let data = w.into_bytes();

        let config = DecodeConfig::new(Game::Croc2DemoDummy);
        let wad = Wad::decode(&data, &config).unwrap();
        assert_eq!(wad.sections.len(), 3);
        assert!(matches!(wad.sections[0], Section::Textures(_)));
        assert!(wad.sections[1].is_opaque());
        // END is only decoded for the Harry Potter games.
        assert!(wad.sections[2].is_opaque());
        assert_eq!(wad.trailing, [0xEE; 3]);
        assert_eq!(wad.encode(Game::Croc2DemoDummy).unwrap(), data);

        let summary = wad.summary();
        assert_eq!(summary.sections, ["XSPT", "ABCD", " DNE"]);
        assert_eq!(summary.opaque_sections, ["ABCD", " DNE"]);
        assert_eq!(summary.n_textures, Some(0));
        assert_eq!(summary.n_models, None);
    }

    #[test]
    fn size_field_is_recomputed_with_bias() {
        let mut w = Writer::new();
        w.write_u32(0);
        frame(&mut w, b"XSPT", &empty_dummy_textures());
        frame(&mut w, b" DNE", &[]);
        let data = w.into_bytes();
        let wad = Wad::decode(&data, &DecodeConfig::new(Game::Croc1)).unwrap();
        assert!(wad.sections.iter().all(Section::is_opaque));
        let encoded = wad.encode(Game::HarryPotter2).unwrap();
        assert_eq!(encoded[..4], (data.len() as u32 + 2048).to_le_bytes());
        assert_eq!(encoded[4..], data[4..]);
    }

    #[test]
    fn sound_payloads_follow_their_descriptors() {
        let spsx = sample();
        let mut w = Writer::new();
        w.write_u32(0);
        // Harry Potter texture section: flags, 16 reserved slots, no atlas.
        let mut textures = Writer::new();
        textures.write_u32(0);
        textures.write_u32(16);
        textures.write_u32(0);
        textures.write_zeros(16 * 12);
        textures.write_u32(0);
        textures.write_u32(0);
        frame(&mut w, b"XSPT", &textures.into_bytes());
        spsx.encode(&mut w).unwrap();

        let level_sfx = spsx
            .level_groups()
            .iter()
            .map(|group| {
                group
                    .effects
                    .iter()
                    .map(|e| Vag::new(vec![5; e.size as usize], Channels::Mono, e.sampling_rate))
                    .collect()
            })
            .collect();
        let dialogues = spsx
            .dialogues
            .iter()
            .map(|d| Vag::new(vec![6; d.size as usize], d.channels(), d.sampling_rate()))
            .collect();
        let end = EndSection {
            level_sfx,
            dialogues,
            populated: true,
        };
        end.encode(&mut w, Game::HarryPotter1).unwrap();
        let size = w.position() as u32 + 2048;
        w.patch_u32(0, size);
        let data = w.into_bytes();

        let config = DecodeConfig::new(Game::HarryPotter1);
        let wad = Wad::decode(&data, &config).unwrap();
        assert_eq!(wad.spsx(), Some(&spsx));
        let decoded = wad.end().unwrap();
        assert_eq!(decoded, &end);
        assert_eq!(decoded.vags().count(), 5);
        assert_eq!(wad.summary().n_sounds, Some(8));
        assert_eq!(wad.encode(Game::HarryPotter1).unwrap(), data);
        assert_eq!(data.len() % SECTOR_SIZE, 0);
    }
}
