//! SPSX: sound descriptors plus the common effects and ambient tracks.
//!
//! Level effects and dialogues only have their descriptors here; their
//! audio lives in the END section that closes the WAD.

use bitflags::bitflags;

use crate::cursor::{round_up, Cursor, Writer, SECTOR_SIZE};
use crate::error::{Error, Result};
use crate::sections::{write_framed, Codename, SectionHeader};
use crate::vag::{Channels, Vag};

const EFFECT_DESCRIPTOR_SIZE: usize = 20;
const MAX_LEVEL_SFX_GROUPS: usize = 16;
/// One byte per sound channel.
const MAPPING_ROW_SIZE: usize = 16;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SpsxFlags: u32 {
        const AMBIENT_TRACKS = 0x01;
        /// Common effects in this section, dialogues and music in END.
        const COMMON_SFX_AND_DIALOGUES = 0x04;
        /// Per-level effect groups, audio in END.
        const LEVEL_SFX = 0x08;
        /// Always mirrors `AMBIENT_TRACKS`.
        const AMBIENT_TRACKS_MIRROR = 0x10;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DialogueFlags: u16 {
        const STEREO = 0x1;
        const MONO = 0x2;
        const BACKGROUND_MUSIC = 0x4;
    }
}

/// 20-byte descriptor of a sound effect or ambient track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectDescriptor {
    pub sampling_rate: u32,
    /// Sampling rate as a 4.12 pitch value, kept as stored.
    pub pitch: u16,
    pub volume: u16,
    pub flags: u32,
    pub unknown: [u8; 4],
    pub size: u32,
}

impl EffectDescriptor {
    fn parse(c: &mut Cursor<'_>) -> Result<Self> {
        let sampling_rate = c.read_u32()?;
        let pitch = c.read_u16()?;
        let volume = c.read_u16()?;
        let flags = c.read_u32()?;
        let unknown = c.read_array()?;
        let size = c.read_u32()?;
        Ok(Self {
            sampling_rate,
            pitch,
            volume,
            flags,
            unknown,
            size,
        })
    }

    fn encode(&self, w: &mut Writer) {
        w.write_u32(self.sampling_rate);
        w.write_u16(self.pitch);
        w.write_u16(self.volume);
        w.write_u32(self.flags);
        w.write_bytes(&self.unknown);
        w.write_u32(self.size);
    }
}

/// Effect or ambient track stored in this section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sound {
    pub descriptor: EffectDescriptor,
    pub vag: Vag,
}

/// 16-byte descriptor of a dialogue or music track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialogueDescriptor {
    /// Offset of the audio inside END, kept as stored.
    pub end_offset: u32,
    pub pitch: u16,
    pub flags: DialogueFlags,
    pub unknown: [u8; 4],
    pub size: u32,
}

impl DialogueDescriptor {
    fn parse(c: &mut Cursor<'_>) -> Result<Self> {
        Ok(Self {
            end_offset: c.read_u32()?,
            pitch: c.read_u16()?,
            flags: DialogueFlags::from_bits_retain(c.read_u16()?),
            unknown: c.read_array()?,
            size: c.read_u32()?,
        })
    }

    fn encode(&self, w: &mut Writer) {
        w.write_u32(self.end_offset);
        w.write_u16(self.pitch);
        w.write_u16(self.flags.bits());
        w.write_bytes(&self.unknown);
        w.write_u32(self.size);
    }

    /// Sampling rate in Hz recovered from the pitch value.
    pub fn sampling_rate(&self) -> u32 {
        (f64::from(self.pitch) * 44100.0 / 4096.0).round() as u32
    }

    pub fn channels(&self) -> Channels {
        if self.flags.contains(DialogueFlags::STEREO) {
            Channels::Stereo
        } else {
            Channels::Mono
        }
    }
}

/// One group of level effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelSfxGroup {
    pub descriptor_offset: u32,
    pub end_offset: u32,
    pub effects: Vec<EffectDescriptor>,
}

impl LevelSfxGroup {
    /// Compressed bytes of all effects in the group.
    pub fn size(&self) -> usize {
        self.effects.iter().map(|e| e.size as usize).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelSfx {
    pub idk1: u32,
    pub idk2: u32,
    pub groups: Vec<LevelSfxGroup>,
    /// Per unique sound, the index of the sound in each channel's group
    /// (255 when unused).
    pub mapping: Vec<[u8; MAPPING_ROW_SIZE]>,
}

/// Decoded SPSX section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spsx {
    pub flags: SpsxFlags,
    pub common_sfx: Vec<Sound>,
    pub ambient_tracks: Vec<Sound>,
    pub level_sfx: Option<LevelSfx>,
    pub dialogues: Vec<DialogueDescriptor>,
    /// Bytes of END taken by the level effect groups, as stored.
    pub end_gap: u32,
}

fn parse_error(message: String) -> Error {
    Error::Parse {
        context: "SPSX",
        message,
    }
}

fn read_sounds(c: &mut Cursor<'_>, descriptors: Vec<EffectDescriptor>) -> Result<Vec<Sound>> {
    let declared = c.read_count()?;
    let total: usize = descriptors.iter().map(|d| d.size as usize).sum();
    if declared != total {
        return Err(parse_error(format!(
            "audio block declares {declared} bytes, descriptors sum to {total}"
        )));
    }
    descriptors
        .into_iter()
        .map(|descriptor| {
            let vag = Vag::read(c, descriptor.size as usize, Channels::Mono, descriptor.sampling_rate)?;
            Ok(Sound { descriptor, vag })
        })
        .collect()
}

fn write_sounds(w: &mut Writer, sounds: &[Sound]) {
    w.write_count(sounds.iter().map(|s| s.vag.size()).sum());
    for sound in sounds {
        w.write_bytes(&sound.vag.data);
    }
}

impl Spsx {
    pub fn parse(data: &[u8], header: &SectionHeader) -> Result<Self> {
        let mut c = header.cursor(data);
        let flags = SpsxFlags::from_bits_retain(c.read_u32()?);
        if flags.contains(SpsxFlags::AMBIENT_TRACKS) != flags.contains(SpsxFlags::AMBIENT_TRACKS_MIRROR) {
            tracing::debug!(flags = flags.bits(), "ambient track flags disagree");
        }
        let has_common = flags.contains(SpsxFlags::COMMON_SFX_AND_DIALOGUES);
        let has_ambient = flags.contains(SpsxFlags::AMBIENT_TRACKS);

        let n_sfx = c.read_count()?;
        let mut common = Vec::new();
        if has_common {
            for _ in 0..n_sfx {
                common.push(EffectDescriptor::parse(&mut c)?);
            }
        }

        let mut ambient = Vec::new();
        if has_ambient {
            let headers_size = c.read_count()?;
            if headers_size % EFFECT_DESCRIPTOR_SIZE != 0 {
                return Err(parse_error(format!(
                    "ambient header block of {headers_size} bytes is not a whole number of descriptors"
                )));
            }
            for _ in 0..headers_size / EFFECT_DESCRIPTOR_SIZE {
                ambient.push(EffectDescriptor::parse(&mut c)?);
            }
        }

        let level_sfx = if flags.contains(SpsxFlags::LEVEL_SFX) {
            Some(Self::parse_level_sfx(&mut c)?)
        } else {
            None
        };

        let n_dialogues = c.read_count()?;
        let mut end_gap = 0;
        let mut dialogues = Vec::new();
        let mut common_sfx = Vec::new();
        if has_common {
            end_gap = c.read_u32()?;
            for _ in 0..n_dialogues {
                dialogues.push(DialogueDescriptor::parse(&mut c)?);
            }
            common_sfx = read_sounds(&mut c, common)?;
        }
        let ambient_tracks = if has_ambient {
            read_sounds(&mut c, ambient)?
        } else {
            Vec::new()
        };
        header.expect_end(c.position())?;

        tracing::debug!(
            common = common_sfx.len(),
            ambient = ambient_tracks.len(),
            dialogues = dialogues.len(),
            "decoded sound section"
        );
        Ok(Self {
            flags,
            common_sfx,
            ambient_tracks,
            level_sfx,
            dialogues,
            end_gap,
        })
    }

    fn parse_level_sfx(c: &mut Cursor<'_>) -> Result<LevelSfx> {
        let n_groups = c.read_count()?;
        if n_groups >= MAX_LEVEL_SFX_GROUPS {
            return Err(parse_error(format!("{n_groups} level effect groups")));
        }
        let idk1 = c.read_u32()?;
        let idk2 = c.read_u32()?;
        let n_unique = c.read_count()?;

        let mut headers = Vec::with_capacity(n_groups);
        for _ in 0..n_groups {
            let descriptor_offset = c.read_u32()?;
            let n_effects = c.read_count()?;
            let end_offset = c.read_u32()?;
            // Sum of the group's sizes, recomputed on encode.
            c.skip(4)?;
            headers.push((descriptor_offset, n_effects, end_offset));
        }
        let mut groups = Vec::with_capacity(n_groups);
        for (descriptor_offset, n_effects, end_offset) in headers {
            let mut effects = Vec::with_capacity(c.capacity_for(n_effects, EFFECT_DESCRIPTOR_SIZE));
            for _ in 0..n_effects {
                effects.push(EffectDescriptor::parse(c)?);
            }
            groups.push(LevelSfxGroup {
                descriptor_offset,
                end_offset,
                effects,
            });
        }

        let n_effects: usize = groups.iter().map(|g| g.effects.len()).sum();
        if n_unique > n_effects {
            return Err(parse_error(format!(
                "{n_unique} unique level effects but only {n_effects} effects"
            )));
        }
        let mut mapping = Vec::with_capacity(c.capacity_for(n_unique, MAPPING_ROW_SIZE));
        for _ in 0..n_unique {
            mapping.push(c.read_array()?);
        }
        Ok(LevelSfx {
            idk1,
            idk2,
            groups,
            mapping,
        })
    }

    pub fn encode(&self, w: &mut Writer) -> Result<()> {
        write_framed(w, Codename::SOUNDS, |w| {
            w.write_u32(self.flags.bits());
            w.write_count(self.common_sfx.len());
            if self.has_common() {
                for sound in &self.common_sfx {
                    sound.descriptor.encode(w);
                }
            }
            if self.has_ambient() {
                w.write_count(self.ambient_tracks.len() * EFFECT_DESCRIPTOR_SIZE);
                for sound in &self.ambient_tracks {
                    sound.descriptor.encode(w);
                }
            }
            if let Some(level) = self.level_sfx.as_ref().filter(|_| self.has_level_sfx()) {
                w.write_count(level.groups.len());
                w.write_u32(level.idk1);
                w.write_u32(level.idk2);
                w.write_count(level.mapping.len());
                for group in &level.groups {
                    w.write_u32(group.descriptor_offset);
                    w.write_count(group.effects.len());
                    w.write_u32(group.end_offset);
                    w.write_count(group.size());
                }
                for group in &level.groups {
                    for effect in &group.effects {
                        effect.encode(w);
                    }
                }
                for row in &level.mapping {
                    w.write_bytes(row);
                }
            }

            w.write_count(self.dialogues.len());
            if self.has_common() {
                w.write_u32(self.end_gap);
                for dialogue in &self.dialogues {
                    dialogue.encode(w);
                }
                write_sounds(w, &self.common_sfx);
            }
            if self.has_ambient() {
                write_sounds(w, &self.ambient_tracks);
            }
            Ok(())
        })
    }

    pub fn has_common(&self) -> bool {
        self.flags.contains(SpsxFlags::COMMON_SFX_AND_DIALOGUES)
    }

    pub fn has_ambient(&self) -> bool {
        self.flags.contains(SpsxFlags::AMBIENT_TRACKS)
    }

    pub fn has_level_sfx(&self) -> bool {
        self.flags.contains(SpsxFlags::LEVEL_SFX)
    }

    /// Groups of level effects, empty when the section has none.
    pub fn level_groups(&self) -> &[LevelSfxGroup] {
        self.level_sfx.as_ref().map_or(&[], |l| l.groups.as_slice())
    }

    /// END bytes used by the level effect groups, each padded to a sector.
    pub fn computed_end_gap(&self) -> u32 {
        self.level_groups()
            .iter()
            .map(|g| round_up(g.size(), SECTOR_SIZE))
            .sum::<usize>() as u32
    }

    /// Recompute [`Spsx::end_gap`] after the level effects changed.
    pub fn refresh_end_gap(&mut self) {
        self.end_gap = self.computed_end_gap();
    }

    /// Number of sounds of every kind.
    pub fn n_sounds(&self) -> usize {
        let level: usize = self.level_groups().iter().map(|g| g.effects.len()).sum();
        self.common_sfx.len() + self.ambient_tracks.len() + level + self.dialogues.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn effect(size: u32) -> EffectDescriptor {
        EffectDescriptor {
            sampling_rate: 22050,
            pitch: 2048,
            volume: 0x3FFF,
            flags: 0,
            unknown: [0, 0, 0x42, 0],
            size,
        }
    }

    pub(crate) fn dialogue(size: u32, stereo: bool) -> DialogueDescriptor {
        DialogueDescriptor {
            end_offset: 0,
            pitch: 4096,
            flags: if stereo {
                DialogueFlags::STEREO
            } else {
                DialogueFlags::MONO
            },
            unknown: [0; 4],
            size,
        }
    }

    /// Sound section with every feature enabled: two common effects, one
    /// ambient track, two level groups and two dialogues.
    pub(crate) fn sample() -> Spsx {
        let sound = |size: u32, fill: u8| Sound {
            descriptor: effect(size),
            vag: Vag::new(vec![fill; size as usize], Channels::Mono, 22050),
        };
        let mut spsx = Spsx {
            flags: SpsxFlags::all(),
            common_sfx: vec![sound(32, 1), sound(16, 2)],
            ambient_tracks: vec![sound(48, 3)],
            level_sfx: Some(LevelSfx {
                idk1: 7,
                idk2: 9,
                groups: vec![
                    LevelSfxGroup {
                        descriptor_offset: 0x100,
                        end_offset: 0,
                        effects: vec![effect(32), effect(16)],
                    },
                    LevelSfxGroup {
                        descriptor_offset: 0x128,
                        end_offset: 0x800,
                        effects: vec![effect(2100)],
                    },
                ],
                mapping: vec![[255; 16]],
            }),
            dialogues: vec![dialogue(64, false), dialogue(4096, true)],
            end_gap: 0,
        };
        spsx.refresh_end_gap();
        spsx
    }

    pub(crate) fn frame(spsx: &Spsx) -> (Vec<u8>, SectionHeader) {
        let mut w = Writer::new();
        w.write_zeros(4);
        spsx.encode(&mut w).unwrap();
        let data = w.into_bytes();
        let size = u32::from_le_bytes(data[8..12].try_into().unwrap()) as usize;
        let header = SectionHeader {
            codename: Codename::SOUNDS,
            offset: 4,
            size,
        };
        (data, header)
    }

    #[test]
    fn full_section_round_trip() {
        let spsx = sample();
        assert_eq!(spsx.end_gap, 2048 + 4096);
        let (data, header) = frame(&spsx);
        let parsed = Spsx::parse(&data, &header).unwrap();
        assert_eq!(parsed, spsx);
        assert_eq!(parsed.n_sounds(), 8);

        let (again, _) = frame(&parsed);
        assert_eq!(again, data);
    }

    #[test]
    fn dialogue_rate_and_channels() {
        let d = dialogue(0, true);
        assert_eq!(d.sampling_rate(), 44100);
        assert_eq!(d.channels(), Channels::Stereo);
        let d = DialogueDescriptor {
            pitch: 2048,
            ..dialogue(0, false)
        };
        assert_eq!(d.sampling_rate(), 22050);
        assert_eq!(d.channels(), Channels::Mono);
    }

    #[test]
    fn audio_block_size_is_checked() {
        let spsx = sample();
        let (mut data, header) = frame(&spsx);
        // Corrupt the ambient audio block size.
        let at = data
            .windows(4)
            .rposition(|win| win == 48u32.to_le_bytes())
            .unwrap();
        data[at] = 47;
        assert!(matches!(
            Spsx::parse(&data, &header),
            Err(Error::Parse { context: "SPSX", .. })
        ));
    }

    #[test]
    fn minimal_section() {
        let spsx = Spsx {
            flags: SpsxFlags::empty(),
            common_sfx: Vec::new(),
            ambient_tracks: Vec::new(),
            level_sfx: None,
            dialogues: Vec::new(),
            end_gap: 0,
        };
        let (data, header) = frame(&spsx);
        assert_eq!(header.size, 12);
        assert_eq!(Spsx::parse(&data, &header).unwrap(), spsx);
    }
}
