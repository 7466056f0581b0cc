//! END (` DNE`): audio of the level effects and the dialogues.
//!
//! The section only holds compressed sound data; sizes, rates and channel
//! counts come from the descriptors of the preceding SPSX section. Every
//! group and every dialogue starts on a sector boundary of the WAD.

use crate::cursor::{Writer, SECTOR_SIZE};
use crate::error::Result;
use crate::sections::spsx::Spsx;
use crate::sections::{write_framed, Codename, SectionHeader};
use crate::vag::{Channels, Vag};
use crate::variant::Game;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EndSection {
    /// Audio of each level effect group, in descriptor order.
    pub level_sfx: Vec<Vec<Vag>>,
    pub dialogues: Vec<Vag>,
    /// Whether the section has a body. Levels without sound data store a
    /// zero-sized END.
    pub populated: bool,
}

impl EndSection {
    pub fn parse(data: &[u8], header: &SectionHeader, spsx: &Spsx, game: Game) -> Result<Self> {
        if header.size == 0 {
            return Ok(Self::default());
        }
        let mut c = header.cursor(data);

        let mut level_sfx = Vec::new();
        if spsx.has_level_sfx() {
            for group in spsx.level_groups() {
                c.align(SECTOR_SIZE)?;
                let vags = group
                    .effects
                    .iter()
                    .map(|e| Vag::read(&mut c, e.size as usize, Channels::Mono, e.sampling_rate))
                    .collect::<Result<Vec<_>>>()?;
                level_sfx.push(vags);
            }
        }

        c.align(SECTOR_SIZE)?;
        let mut dialogues = Vec::with_capacity(spsx.dialogues.len());
        for dialogue in &spsx.dialogues {
            c.align(SECTOR_SIZE)?;
            dialogues.push(Vag::read(
                &mut c,
                dialogue.size as usize,
                dialogue.channels(),
                dialogue.sampling_rate(),
            )?);
        }
        if game.pads_end_section() {
            c.align(SECTOR_SIZE)?;
        }
        header.expect_end(c.position())?;

        tracing::debug!(
            groups = level_sfx.len(),
            dialogues = dialogues.len(),
            "decoded sound payload section"
        );
        Ok(Self {
            level_sfx,
            dialogues,
            populated: true,
        })
    }

    pub fn encode(&self, w: &mut Writer, game: Game) -> Result<()> {
        write_framed(w, Codename::END, |w| {
            if !self.populated {
                return Ok(());
            }
            for group in &self.level_sfx {
                w.align(SECTOR_SIZE);
                for vag in group {
                    w.write_bytes(&vag.data);
                }
            }
            w.align(SECTOR_SIZE);
            for vag in &self.dialogues {
                w.align(SECTOR_SIZE);
                w.write_bytes(&vag.data);
            }
            if game.pads_end_section() {
                w.align(SECTOR_SIZE);
            }
            Ok(())
        })
    }

    /// Every sound in the section.
    pub fn vags(&self) -> impl Iterator<Item = &Vag> {
        self.level_sfx.iter().flatten().chain(&self.dialogues)
    }
}
