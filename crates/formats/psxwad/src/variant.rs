//! Closed registry of the supported games.
//!
//! Every layout difference between the titles is answered by a method on
//! [`Game`]; decoders ask the question at the point where the layouts split
//! instead of comparing variants inline.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::sections::SectionKind;

/// Game variant selecting one binary layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Game {
    Croc1,
    Croc2,
    Croc2Demo,
    /// Croc 2 demo disc whose assets live in a directory-less `DUMMY.DAT`.
    Croc2DemoDummy,
    HarryPotter1,
    HarryPotter2,
}

/// Layout of one DIR record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryLayout {
    /// Record width in bytes: 12-byte name, size, start, then reserved bytes.
    pub record_size: usize,
    /// Whether the encoder writes the u32 entry count before the records.
    pub writes_count: bool,
}

/// Per-variant constants.
#[derive(Debug, Clone, Copy)]
pub struct GameInfo {
    pub title: &'static str,
    /// Short name accepted by [`Game::from_str`].
    pub slug: &'static str,
    pub release_year: u16,
    pub dat_file: &'static str,
    pub dir_file: Option<&'static str>,
    /// `None` when entries are found by scanning the DAT.
    pub directory: Option<DirectoryLayout>,
}

const STANDARD_DIRECTORY: DirectoryLayout = DirectoryLayout {
    record_size: 20,
    writes_count: true,
};

const CROC_1: GameInfo = GameInfo {
    title: "Croc: Legend of the Gobbos",
    slug: "croc1",
    release_year: 1997,
    dat_file: "CROCFILE.1",
    dir_file: Some("CROCFILE.DIR"),
    directory: Some(DirectoryLayout {
        record_size: 24,
        writes_count: false,
    }),
};

const CROC_2: GameInfo = GameInfo {
    title: "Croc 2",
    slug: "croc2",
    release_year: 1999,
    dat_file: "CROCII.DAT",
    dir_file: Some("CROCII.DIR"),
    directory: Some(STANDARD_DIRECTORY),
};

const CROC_2_DEMO: GameInfo = GameInfo {
    title: "Croc 2 (demo)",
    slug: "croc2-demo",
    ..CROC_2
};

const CROC_2_DEMO_DUMMY: GameInfo = GameInfo {
    title: "Croc 2 (demo, dummy files)",
    slug: "croc2-demo-dummy",
    release_year: 1999,
    dat_file: "DUMMY.DAT",
    dir_file: None,
    directory: None,
};

const HARRY_POTTER_1: GameInfo = GameInfo {
    title: "Harry Potter and the Philosopher's Stone",
    slug: "hp1",
    release_year: 2001,
    dat_file: "POTTER.DAT",
    dir_file: Some("POTTER.DIR"),
    directory: Some(STANDARD_DIRECTORY),
};

const HARRY_POTTER_2: GameInfo = GameInfo {
    title: "Harry Potter and the Chamber of Secrets",
    slug: "hp2",
    release_year: 2002,
    ..HARRY_POTTER_1
};

impl Game {
    pub const ALL: [Game; 6] = [
        Game::Croc1,
        Game::Croc2,
        Game::Croc2Demo,
        Game::Croc2DemoDummy,
        Game::HarryPotter1,
        Game::HarryPotter2,
    ];

    pub fn info(self) -> &'static GameInfo {
        match self {
            Game::Croc1 => &CROC_1,
            Game::Croc2 => &CROC_2,
            Game::Croc2Demo => &CROC_2_DEMO,
            Game::Croc2DemoDummy => &CROC_2_DEMO_DUMMY,
            Game::HarryPotter1 => &HARRY_POTTER_1,
            Game::HarryPotter2 => &HARRY_POTTER_2,
        }
    }

    pub fn is_harry_potter(self) -> bool {
        matches!(self, Game::HarryPotter1 | Game::HarryPotter2)
    }

    /// Whether WAD contents can be decoded at all. Croc 1 archives can only
    /// be sliced and packed.
    pub fn is_parsable(self) -> bool {
        self != Game::Croc1
    }

    /// Whether the typed decoder for `kind` understands this variant.
    pub fn supports(self, kind: SectionKind) -> bool {
        match kind {
            SectionKind::Textures => self.is_parsable(),
            SectionKind::Geometry => matches!(
                self,
                Game::Croc2 | Game::Croc2DemoDummy | Game::HarryPotter1 | Game::HarryPotter2
            ),
            SectionKind::Sounds | SectionKind::Zones | SectionKind::End => self.is_harry_potter(),
        }
    }

    /// Fail with [`Error::UnsupportedForVariant`] unless `kind` is supported.
    pub fn require(self, kind: SectionKind) -> Result<()> {
        if self.supports(kind) {
            Ok(())
        } else {
            Err(Error::UnsupportedForVariant {
                feature: kind.description(),
                game: self,
            })
        }
    }

    /// Amount added to the WAD size header on top of the bytes written.
    pub fn wad_size_bias(self) -> u32 {
        match self {
            Game::Croc2 | Game::HarryPotter1 | Game::HarryPotter2 => 2048,
            _ => 0,
        }
    }

    /// Whether the texture section starts with a u32 flags word.
    pub fn has_texture_header(self) -> bool {
        self != Game::Croc2DemoDummy
    }

    /// Whether the atlas is stored with the sign-run-length scheme rather
    /// than as a flat row block.
    pub fn has_run_length_atlas(self) -> bool {
        matches!(
            self,
            Game::Croc2 | Game::Croc2Demo | Game::HarryPotter1 | Game::HarryPotter2
        )
    }

    /// Bytes the run-length stream reads past the declared section end.
    pub fn atlas_overrun(self) -> usize {
        if self == Game::Croc2Demo {
            2
        } else {
            0
        }
    }

    /// Number of trailing empty descriptor slots counted in `n_textures`.
    pub fn reserved_texture_slots(self) -> usize {
        if self.is_harry_potter() {
            16
        } else {
            0
        }
    }

    /// Whether high-color pixels are decoded without a transparency key.
    pub fn has_legacy_alpha(self) -> bool {
        matches!(self, Game::Croc2Demo | Game::Croc2DemoDummy)
    }

    /// Padding after the model header counts.
    pub fn model_header_padding(self) -> usize {
        if self.is_harry_potter() {
            6
        } else {
            2
        }
    }

    /// Width of one bounding-box record trailing a model.
    pub fn bounding_box_record_size(self) -> usize {
        if self.is_harry_potter() {
            32
        } else {
            44
        }
    }

    /// Whether level geometry stores normals after its vertices.
    pub fn world_models_have_normals(self) -> bool {
        !self.is_harry_potter()
    }

    /// Whether level geometry uses the compact 12-byte face records.
    pub fn world_models_have_compact_faces(self) -> bool {
        self != Game::Croc2DemoDummy
    }

    /// Whether animation headers carry an inter-frame count (Croc) rather
    /// than a stored frame count (Harry Potter).
    pub fn has_inter_frames(self) -> bool {
        !self.is_harry_potter()
    }

    /// Size of the opaque block before the model list in the geometry section.
    pub fn geometry_preamble_size(self) -> usize {
        if self == Game::Croc2DemoDummy {
            2052
        } else {
            2048
        }
    }

    /// Whether the geometry section carries the legacy texture table.
    pub fn has_legacy_texture_table(self) -> bool {
        matches!(self, Game::Croc2 | Game::Croc2Demo)
    }

    /// Whether the geometry section decodes exactly to its declared size.
    /// The level tail of the other variants is not fully understood.
    pub fn validates_geometry_size(self) -> bool {
        !matches!(self, Game::Croc2 | Game::Croc2DemoDummy)
    }

    /// Whether the level file carries lighting tables, zone ids and the
    /// wider header.
    pub fn has_full_level_header(self) -> bool {
        self != Game::Croc2DemoDummy
    }

    /// Whether the level file lists the additional lighting model mapping.
    pub fn has_additional_lighting_mapping(self) -> bool {
        !matches!(self, Game::Croc2Demo | Game::Croc2DemoDummy)
    }

    /// Size of the level file's lighting tail when it is stored as one
    /// block of unknown layout.
    pub fn opaque_lighting_size(self) -> Option<usize> {
        if self == Game::Croc2 {
            Some(30732)
        } else {
            None
        }
    }

    /// Whether the final sound payload region is padded to a sector.
    pub fn pads_end_section(self) -> bool {
        self == Game::HarryPotter2
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.info().title)
    }
}

impl FromStr for Game {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.to_ascii_lowercase();
        Game::ALL
            .into_iter()
            .find(|g| g.info().slug == wanted)
            .ok_or_else(|| {
                let known: Vec<_> = Game::ALL.iter().map(|g| g.info().slug).collect();
                format!("unknown game {s:?}, expected one of: {}", known.join(", "))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_round_trip() {
        for game in Game::ALL {
            assert_eq!(game.info().slug.parse::<Game>().unwrap(), game);
        }
        assert_eq!("HP2".parse::<Game>().unwrap(), Game::HarryPotter2);
        assert!("croc3".parse::<Game>().is_err());
    }

    #[test]
    fn directory_layouts() {
        assert_eq!(Game::Croc1.info().directory.unwrap().record_size, 24);
        assert!(!Game::Croc1.info().directory.unwrap().writes_count);
        assert_eq!(Game::HarryPotter2.info().directory, Some(STANDARD_DIRECTORY));
        assert!(Game::Croc2DemoDummy.info().directory.is_none());
        assert_eq!(Game::Croc2Demo.info().dat_file, "CROCII.DAT");
    }

    #[test]
    fn section_support() {
        assert!(!Game::Croc1.supports(SectionKind::Textures));
        assert!(Game::Croc2Demo.supports(SectionKind::Textures));
        assert!(!Game::Croc2Demo.supports(SectionKind::Geometry));
        assert!(Game::Croc2DemoDummy.supports(SectionKind::Geometry));
        assert!(!Game::Croc2.supports(SectionKind::Sounds));
        assert!(Game::HarryPotter1.supports(SectionKind::End));
        assert!(matches!(
            Game::Croc2.require(SectionKind::Zones),
            Err(Error::UnsupportedForVariant { game: Game::Croc2, .. })
        ));
    }
}
