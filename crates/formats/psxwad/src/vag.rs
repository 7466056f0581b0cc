//! PS1 ADPCM ("VAG") sound data.
//!
//! Each 16-byte block holds a predictor/shift byte, a flags byte and 28
//! 4-bit samples. Stereo streams interleave the channels in 1024-byte halves
//! of each 2048-byte block.

use crate::cursor::Cursor;
use crate::error::{Error, Result};

const BLOCK_SIZE: usize = 16;
const SAMPLES_PER_BLOCK: usize = 28;
const INTERLEAVE_BLOCK: usize = 2048;
const INTERLEAVE_HALF: usize = INTERLEAVE_BLOCK / 2;

const FLAG_LAST_BLOCK: u8 = 1;
const FLAG_END: u8 = 7;

/// Prediction filter coefficients, indexed by the block's predictor.
const COEFFICIENTS: [(f64, f64); 5] = [
    (0.0, 0.0),
    (60.0 / 64.0, 0.0),
    (115.0 / 64.0, -52.0 / 64.0),
    (98.0 / 64.0, -55.0 / 64.0),
    (122.0 / 64.0, -60.0 / 64.0),
];

const VAG_MAGIC: &[u8; 4] = b"VAGp";
pub const VAG_HEADER_SIZE: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channels {
    Mono,
    Stereo,
}

impl Channels {
    pub fn count(self) -> usize {
        match self {
            Channels::Mono => 1,
            Channels::Stereo => 2,
        }
    }
}

/// Size in bytes of the 16-bit PCM decoded from `compressed` bytes of one
/// channel.
pub fn pcm_bytes(compressed: usize) -> usize {
    compressed * 7 / 2
}

/// One compressed sound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vag {
    pub data: Vec<u8>,
    pub channels: Channels,
    pub sampling_rate: u32,
}

impl Vag {
    pub fn new(data: Vec<u8>, channels: Channels, sampling_rate: u32) -> Self {
        Self {
            data,
            channels,
            sampling_rate,
        }
    }

    pub(crate) fn read(c: &mut Cursor<'_>, size: usize, channels: Channels, sampling_rate: u32) -> Result<Self> {
        Ok(Self::new(c.read_bytes(size)?.to_vec(), channels, sampling_rate))
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Compressed bytes of each channel.
    pub fn channel_data(&self) -> Vec<Vec<u8>> {
        match self.channels {
            Channels::Mono => vec![self.data.clone()],
            Channels::Stereo => {
                let mut left = Vec::with_capacity(self.data.len() / 2);
                let mut right = Vec::with_capacity(self.data.len() / 2);
                for block in self.data.chunks(INTERLEAVE_BLOCK) {
                    let split = block.len().min(INTERLEAVE_HALF);
                    left.extend_from_slice(&block[..split]);
                    right.extend_from_slice(&block[split..]);
                }
                vec![left, right]
            }
        }
    }

    /// Decode to 16-bit PCM, channels interleaved sample by sample.
    pub fn decode(&self) -> Result<Vec<i16>> {
        let mut channels = self
            .channel_data()
            .iter()
            .map(|data| decode_channel(data))
            .collect::<Result<Vec<_>>>()?;
        if channels.len() == 1 {
            return Ok(channels.remove(0));
        }
        let len = channels.iter().map(Vec::len).min().unwrap_or(0);
        let mut out = Vec::with_capacity(len * 2);
        for i in 0..len {
            out.push(channels[0][i]);
            out.push(channels[1][i]);
        }
        Ok(out)
    }

    /// Standalone `.VAG` files, one per channel.
    ///
    /// `name` fills the 16-byte name field of the header.
    pub fn to_vag_files(&self, name: &str) -> Vec<Vec<u8>> {
        self.channel_data()
            .into_iter()
            .map(|data| {
                let mut out = Vec::with_capacity(VAG_HEADER_SIZE + data.len());
                out.extend_from_slice(VAG_MAGIC);
                out.extend_from_slice(&[0; 8]);
                out.extend_from_slice(&(data.len() as u32).to_be_bytes());
                out.extend_from_slice(&self.sampling_rate.to_be_bytes());
                out.extend_from_slice(&[0; 10]);
                out.extend_from_slice(&[1, 0]);
                let mut field = [0u8; 16];
                for (dst, src) in field.iter_mut().zip(name.bytes()) {
                    *dst = src;
                }
                out.extend_from_slice(&field);
                out.extend_from_slice(&data);
                out
            })
            .collect()
    }

    /// Rebuild a sound from one (mono) or two (stereo) `.VAG` files.
    pub fn from_vag_files(files: &[&[u8]]) -> Result<Self> {
        let channels = match files.len() {
            1 => Channels::Mono,
            2 => Channels::Stereo,
            n => {
                return Err(Error::Parse {
                    context: "VAG",
                    message: format!("expected 1 or 2 channel files, got {n}"),
                })
            }
        };

        let mut sampling_rate = 0;
        let mut streams = Vec::with_capacity(files.len());
        for file in files {
            let mut c = Cursor::new(file);
            if &c.read_array::<4>()? != VAG_MAGIC {
                return Err(Error::Parse {
                    context: "VAG",
                    message: "missing VAGp magic".into(),
                });
            }
            c.skip(8)?;
            let size = u32::from_be_bytes(c.read_array()?) as usize;
            sampling_rate = u32::from_be_bytes(c.read_array()?);
            c.seek(VAG_HEADER_SIZE);
            streams.push(c.read_bytes(size)?);
        }

        let data = match streams.as_slice() {
            [mono] => mono.to_vec(),
            [left, right] => {
                let mut data = Vec::with_capacity(left.len() + right.len());
                for (l, r) in left.chunks(INTERLEAVE_HALF).zip(right.chunks(INTERLEAVE_HALF)) {
                    data.extend_from_slice(l);
                    data.extend_from_slice(r);
                }
                data
            }
            _ => unreachable!("channel count checked above"),
        };
        Ok(Self::new(data, channels, sampling_rate))
    }
}

/// Decode one channel of compressed data.
///
/// The first block carries no samples; its 28 output samples stay silent so
/// the output always holds [`pcm_bytes`] bytes.
pub fn decode_channel(data: &[u8]) -> Result<Vec<i16>> {
    let mut out = vec![0i16; pcm_bytes(data.len()) / 2];
    let mut s1 = 0.0f64;
    let mut s2 = 0.0f64;

    let mut offset = BLOCK_SIZE;
    while offset + BLOCK_SIZE <= data.len() {
        let block = &data[offset..offset + BLOCK_SIZE];
        let predictor = block[0] >> 4;
        let shift = block[0] & 0xF;
        let flags = block[1];
        if flags == FLAG_END {
            break;
        }
        let (c0, c1) = *COEFFICIENTS
            .get(usize::from(predictor))
            .ok_or(Error::InvalidPredictor { offset, predictor })?;

        let base = offset / BLOCK_SIZE * SAMPLES_PER_BLOCK;
        for j in 0..SAMPLES_PER_BLOCK {
            let byte = block[2 + j / 2];
            let nibble = if j % 2 == 0 { byte & 0xF } else { byte >> 4 };
            // Sign-extend the nibble from the top of a 16-bit word.
            let s = i32::from((u16::from(nibble) << 12) as i16) >> shift;
            let sample = f64::from(s) + s1 * c0 + s2 * c1;
            s2 = s1;
            s1 = sample;
            if let Some(slot) = out.get_mut(base + j) {
                *slot = (sample + 0.5) as i32 as i16;
            }
        }

        if flags == FLAG_LAST_BLOCK {
            break;
        }
        offset += BLOCK_SIZE;
    }
    Ok(out)
}
