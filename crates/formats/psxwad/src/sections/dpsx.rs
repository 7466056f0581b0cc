//! DPSX (`XSPD`): actor models, their animations, scripts and the level file.
//!
//! The level tail is walked by length only, so encoding re-emits the body
//! bytes the section was decoded from. The decoded values are read-only for
//! that reason.

use crate::config::DecodeConfig;
use crate::cursor::{Cursor, Writer};
use crate::error::Result;
use crate::level::LevelFile;
use crate::model::{guess_animation, Animation, Model};
use crate::sections::{write_framed, Codename, SectionHeader};

/// Bytes per texture of the legacy table some Croc 2 builds carry.
const LEGACY_TEXTURE_SIZE: usize = 3072;
/// Smallest actor model and animation: their fixed headers alone.
const MIN_ACTOR_SIZE: usize = 100;
const MIN_ANIMATION_SIZE: usize = 32;

#[derive(Debug, Clone)]
pub struct Dpsx {
    idk1: [u8; 4],
    n_unique_textures: u32,
    models: Vec<Model>,
    animations: Vec<Animation>,
    n_legacy_textures: usize,
    scripts: Vec<Vec<u8>>,
    level: LevelFile,
    body: Vec<u8>,
}

impl Dpsx {
    pub fn parse(data: &[u8], header: &SectionHeader, config: &DecodeConfig) -> Result<Self> {
        let game = config.game;
        let mut c = header.cursor(data);
        let idk1 = c.read_array()?;
        let n_unique_textures = c.read_u32()?;
        c.skip(game.geometry_preamble_size())?;

        let n_models = c.read_count()?;
        let mut models = Vec::with_capacity(c.capacity_for(n_models, MIN_ACTOR_SIZE));
        for _ in 0..n_models {
            models.push(Model::parse_actor(&mut c, config)?);
        }
        let n_animations = c.read_count()?;
        let mut animations = Vec::with_capacity(c.capacity_for(n_animations, MIN_ANIMATION_SIZE));
        for _ in 0..n_animations {
            animations.push(Animation::parse(&mut c, config)?);
        }

        let mut n_legacy_textures = 0;
        if game.has_legacy_texture_table() {
            n_legacy_textures = c.read_count()?;
            c.skip(LEGACY_TEXTURE_SIZE * n_legacy_textures)?;
        }

        let n_scripts = c.read_count()?;
        let mut scripts = Vec::with_capacity(c.capacity_for(n_scripts, 4));
        for _ in 0..n_scripts {
            let words = c.read_count()?;
            scripts.push(c.read_bytes(4 * words)?.to_vec());
        }

        let level = LevelFile::parse(&mut c, config)?;
        if game.validates_geometry_size() {
            header.expect_end(c.position())?;
        } else if c.position() != header.end() {
            tracing::debug!(
                decoded = c.position() - header.body_start(),
                declared = header.size,
                "level tail not fully decoded"
            );
        }
        tracing::debug!(
            models = models.len(),
            animations = animations.len(),
            scripts = scripts.len(),
            "decoded geometry"
        );

        let body = Cursor::new(data)
            .at_offset(header.body_start())
            .read_bytes(header.size)?
            .to_vec();
        Ok(Self {
            idk1,
            n_unique_textures,
            models,
            animations,
            n_legacy_textures,
            scripts,
            level,
            body,
        })
    }

    /// Frame and write the body this section was decoded from.
    pub fn encode(&self, w: &mut Writer) -> Result<()> {
        write_framed(w, Codename::GEOMETRY, |w| {
            w.write_bytes(&self.body);
            Ok(())
        })
    }

    /// Bytes the section was decoded from, without the frame.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn idk1(&self) -> [u8; 4] {
        self.idk1
    }

    pub fn n_unique_textures(&self) -> u32 {
        self.n_unique_textures
    }

    pub fn models(&self) -> &[Model] {
        &self.models
    }

    pub fn animations(&self) -> &[Animation] {
        &self.animations
    }

    /// Entries of the legacy texture table, skipped when decoding.
    pub fn n_legacy_textures(&self) -> usize {
        self.n_legacy_textures
    }

    /// Raw script bytecode, one entry per script.
    pub fn scripts(&self) -> &[Vec<u8>] {
        &self.scripts
    }

    pub fn level(&self) -> &LevelFile {
        &self.level
    }

    /// Best animation for each actor model, by [`guess_animation`].
    pub fn model_animations(&self) -> Vec<Option<usize>> {
        self.models
            .iter()
            .enumerate()
            .map(|(i, model)| guess_animation(i, model, &self.animations))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WarningPolicy;
    use crate::error::Error;
    use crate::level::tests::hp_level_bytes;
    use crate::model::tests::actor_bytes;
    use crate::variant::Game;

    fn section_bytes(extra: usize) -> (Vec<u8>, SectionHeader) {
        let game = Game::HarryPotter1;
        let mut w = Writer::new();
        w.write_zeros(4);
        w.write_bytes(&Codename::GEOMETRY.0);
        let size_at = w.placeholder_u32();
        w.write_bytes(b"IDK1");
        w.write_u32(12);
        w.write_zeros(game.geometry_preamble_size());
        w.write_u32(1);
        w.write_bytes(&actor_bytes(game, &[2, 3]));
        w.write_u32(0); // animations
        w.write_u32(1);
        w.write_u32(2);
        w.write_bytes(&[1, 2, 3, 4, 5, 6, 7, 8]);
        w.write_bytes(&hp_level_bytes(0));
        w.write_zeros(extra);
        let size = w.position() - size_at - 4;
        w.patch_u32(size_at, size as u32);
        let header = SectionHeader {
            codename: Codename::GEOMETRY,
            offset: 4,
            size,
        };
        (w.into_bytes(), header)
    }

    #[test]
    fn decodes_and_reemits() {
        let (data, header) = section_bytes(0);
        let config = DecodeConfig::new(Game::HarryPotter1);
        let dpsx = Dpsx::parse(&data, &header, &config).unwrap();
        assert_eq!(dpsx.idk1(), *b"IDK1");
        assert_eq!(dpsx.n_unique_textures(), 12);
        assert_eq!(dpsx.models().len(), 1);
        assert_eq!(dpsx.models()[0].n_vertex_groups(), 2);
        assert_eq!(dpsx.scripts(), [vec![1, 2, 3, 4, 5, 6, 7, 8]]);
        assert_eq!(dpsx.level().chunks.n_filled_chunks(), 1);
        assert_eq!(dpsx.model_animations(), [None]);

        let mut w = Writer::new();
        w.write_zeros(4);
        dpsx.encode(&mut w).unwrap();
        assert_eq!(w.into_bytes(), data);
    }

    #[test]
    fn encoding_writes_the_decoded_body() {
        let (data, header) = section_bytes(0);
        let dpsx = Dpsx::parse(&data, &header, &DecodeConfig::new(Game::HarryPotter1)).unwrap();
        assert_eq!(dpsx.body(), &data[header.body_start()..header.end()]);
        let mut w = Writer::new();
        dpsx.clone().encode(&mut w).unwrap();
        assert_eq!(&w.into_bytes()[8..], dpsx.body());
    }

    #[test]
    fn huge_model_count_fails_without_allocating() {
        let game = Game::Croc2;
        let size = 8 + game.geometry_preamble_size() + 4 + 4;
        let mut w = Writer::new();
        w.write_zeros(4);
        w.write_bytes(&Codename::GEOMETRY.0);
        w.write_u32(size as u32);
        w.write_zeros(8 + game.geometry_preamble_size());
        w.write_u32(u32::MAX);
        w.write_zeros(4);
        let data = w.into_bytes();
        let header = SectionHeader {
            codename: Codename::GEOMETRY,
            offset: 4,
            size,
        };
        let config = DecodeConfig::new(game).with_warnings(WarningPolicy::Continue);
        assert!(matches!(
            Dpsx::parse(&data, &header, &config),
            Err(Error::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn harry_potter_geometry_is_size_checked() {
        let (data, header) = section_bytes(4);
        let config = DecodeConfig::new(Game::HarryPotter1);
        assert!(matches!(
            Dpsx::parse(&data, &header, &config),
            Err(Error::SectionSizeMismatch { declared, found, .. }) if declared == found + 4
        ));
    }
}
