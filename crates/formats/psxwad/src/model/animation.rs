//! Vertex-group animations.
//!
//! Every stored frame holds one rigid transform per vertex group. Older
//! files store a fixed-point 3×3 matrix, newer ones a quaternion.

use glam::{Mat3, Quat, Vec3};

use crate::config::DecodeConfig;
use crate::cursor::{round_up, Cursor};
use crate::error::{Error, HeuristicWarning, Result};

const MAX_FRAMES: u32 = 500;
const FIXED_POINT_ONE: f32 = 4096.0;
const INTER_FRAME_HEADER_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationFormat {
    /// 12 words per group: row-major 3×3 matrix in 4.12 fixed point, then
    /// the translation.
    Matrix,
    /// 8 words per group: quaternion `(w, x, y, z)`, translation, frame index.
    Quaternion,
}

impl AnimationFormat {
    fn words(self) -> usize {
        match self {
            Self::Matrix => 12,
            Self::Quaternion => 8,
        }
    }
}

/// Rotation and translation of one vertex group in one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTransform {
    pub rotation: Mat3,
    pub translation: Vec3,
}

impl FrameTransform {
    fn from_words(words: &[i16], format: AnimationFormat) -> Self {
        let w = |i: usize| f32::from(words[i]);
        match format {
            AnimationFormat::Matrix => {
                let row = |i: usize| Vec3::new(w(i), w(i + 1), w(i + 2)) / FIXED_POINT_ONE;
                Self {
                    rotation: Mat3::from_cols(row(0), row(3), row(6)).transpose(),
                    translation: Vec3::new(w(9), w(10), w(11)),
                }
            }
            AnimationFormat::Quaternion => {
                let q = Quat::from_xyzw(w(1), w(2), w(3), w(0));
                // A zero quaternion collapses the group instead of failing.
                let rotation = if q.length_squared() > 0.0 {
                    Mat3::from_quat(q.normalize())
                } else {
                    Mat3::ZERO
                };
                Self {
                    rotation,
                    translation: Vec3::new(w(4), w(5), w(6)),
                }
            }
        }
    }

    /// Transform one point. Quaternion frames rotate by the transpose, the
    /// two formats disagree on operand order.
    pub fn apply(&self, v: Vec3, format: AnimationFormat) -> Vec3 {
        let rotated = match format {
            AnimationFormat::Matrix => self.rotation * v,
            AnimationFormat::Quaternion => self.rotation.transpose() * v,
        };
        rotated + self.translation
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    pub n_total_frames: u32,
    pub n_inter_frames: usize,
    pub n_vertex_groups: usize,
    pub flags: Vec<[u8; 4]>,
    pub has_additional_data: bool,
    pub format: AnimationFormat,
    /// Frame number of each stored frame.
    pub frame_indices: Vec<i32>,
    /// `frames[frame][group]`.
    pub frames: Vec<Vec<FrameTransform>>,
}

impl Animation {
    pub fn parse(c: &mut Cursor<'_>, config: &DecodeConfig) -> Result<Self> {
        let game = config.game;
        let offset = c.position();
        let n_flags = c.read_count()?;
        c.skip(4)?;
        let n_total_frames = c.read_u32()?;
        let has_additional_data = c.read_u32()? == 0;

        let mut n_stored = 0;
        let mut n_inter_frames = 0;
        if game.has_inter_frames() {
            n_inter_frames = c.read_count()?;
            if n_inter_frames != 0 {
                n_stored = n_total_frames as usize;
            }
            c.skip(4)?;
        } else {
            c.skip(8)?;
        }
        let n_vertex_groups = c.read_count()?;
        c.skip(4)?;
        if !game.has_inter_frames() {
            n_stored = c.read_count()?;
            c.skip(12)?;
        }
        if n_total_frames == 0 || n_total_frames > MAX_FRAMES {
            config.check(HeuristicWarning::BadFrameCount {
                offset,
                frames: n_total_frames,
            })?;
        }

        let mut flags = Vec::with_capacity(c.capacity_for(n_flags, 4));
        for _ in 0..n_flags {
            flags.push(c.read_array()?);
        }
        let total = n_total_frames as usize;
        if has_additional_data {
            c.skip(8 * total)?;
        }
        c.skip(4 * total)?;
        c.skip(INTER_FRAME_HEADER_SIZE * n_inter_frames)?;
        if !game.has_inter_frames() || n_inter_frames != 0 {
            c.skip(4 * n_stored)?;
        }

        let format = if n_stored == 0 || n_inter_frames != 0 {
            n_stored = total;
            AnimationFormat::Matrix
        } else {
            AnimationFormat::Quaternion
        };
        let indexed = format == AnimationFormat::Quaternion && n_stored != total;

        let inter_frames_size = round_up(n_inter_frames * 2, 4);
        let record_size = 2 * format.words();
        let mut frames = Vec::with_capacity(c.capacity_for(n_stored, record_size));
        let mut frame_indices = Vec::with_capacity(c.capacity_for(n_stored, record_size));
        let mut words = vec![0i16; format.words()];
        for frame in 0..n_stored {
            let mut groups = Vec::with_capacity(c.capacity_for(n_vertex_groups, record_size));
            for group in 0..n_vertex_groups {
                for word in words.iter_mut() {
                    *word = c.read_i16()?;
                }
                if indexed && group == 0 {
                    frame_indices.push(i32::from(words[7]));
                }
                groups.push(FrameTransform::from_words(&words, format));
            }
            if n_inter_frames != 0 && frame + 1 != n_stored {
                c.skip(inter_frames_size)?;
            }
            frames.push(groups);
        }
        if !indexed {
            frame_indices = (0..n_stored as i32).collect();
        }

        Ok(Self {
            n_total_frames,
            n_inter_frames,
            n_vertex_groups,
            flags,
            has_additional_data,
            format,
            frame_indices,
            frames,
        })
    }

    pub fn n_stored_frames(&self) -> usize {
        self.frames.len()
    }

    /// Transforms of one stored frame, one per vertex group.
    pub fn frame(&self, frame: usize) -> Result<&[FrameTransform]> {
        self.frames
            .get(frame)
            .map(Vec::as_slice)
            .ok_or(Error::FrameOutOfRange {
                frame,
                frames: self.frames.len(),
            })
    }
}
