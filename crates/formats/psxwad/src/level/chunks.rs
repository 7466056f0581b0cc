//! The level grid: cells of 4096×4096 world units, each holding zero or
//! more sub-chunks (placed instances of level geometry models).

use std::collections::HashSet;
use std::fmt;

use glam::Vec3;

use crate::cursor::Cursor;
use crate::error::{Error, Result};

/// Offset marking an empty cell or the end of a chain.
pub const NO_CHUNK: u32 = 0xFFFF_FFFF;
/// World units per cell side.
pub const CHUNK_SIZE: u32 = 4096;

const FILLED: char = '█';
const EMPTY: char = '░';

/// Quarter turns of a sub-chunk about the vertical axis, stored as a
/// big-endian word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkRotation {
    Top = 0,
    Right = 4,
    Bottom = 8,
    Left = 12,
}

impl ChunkRotation {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Top),
            4 => Some(Self::Right),
            8 => Some(Self::Bottom),
            12 => Some(Self::Left),
            _ => None,
        }
    }

    /// Rotate a model-space point into the orientation of the sub-chunk.
    pub fn apply(self, v: Vec3) -> Vec3 {
        match self {
            Self::Top => v,
            Self::Right => Vec3::new(v.z, v.y, -v.x),
            Self::Bottom => Vec3::new(-v.x, v.y, -v.z),
            Self::Left => Vec3::new(-v.z, v.y, v.x),
        }
    }
}

/// Follow one cell's linked list of `(sub_chunk_id, next_offset)` records.
///
/// `c` must cover the record table; offsets are relative to `base`. Each
/// offset may be visited once, so a malformed table fails with
/// [`Error::ChunkCycle`] instead of looping.
pub fn resolve_chain(c: &Cursor<'_>, base: usize, cell: usize, start: u32) -> Result<Vec<u32>> {
    let mut visited = HashSet::new();
    let mut ids = Vec::new();
    let mut offset = start;
    loop {
        if !visited.insert(offset) {
            return Err(Error::ChunkCycle { cell, offset });
        }
        let mut record = c.at_offset(base + offset as usize);
        let id = record.read_u32()?;
        let next = record.read_u32()?;
        if ids.contains(&id) {
            return Err(Error::DuplicateSubChunk {
                cell,
                sub_chunk: id,
            });
        }
        ids.push(id);
        if next == NO_CHUNK {
            return Ok(ids);
        }
        offset = next;
    }
}

/// World `(x, z)` of the centre of `cell` in a grid `n_columns` wide. Every
/// sub-chunk of the cell is placed there.
pub fn cell_centre(cell: usize, n_columns: usize) -> (u32, u32) {
    let columns = n_columns.max(1);
    let half = CHUNK_SIZE / 2;
    (
        CHUNK_SIZE * (cell % columns) as u32 + half,
        CHUNK_SIZE * (cell / columns) as u32 + half,
    )
}

/// One placed instance of a level geometry model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubChunk {
    pub id: u32,
    /// Index into the level's chunk models.
    pub model: usize,
    pub height: i32,
    pub rotation: ChunkRotation,
}

/// Contents of one grid cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkHolder {
    pub sub_chunks: Vec<SubChunk>,
    pub zone_id: Option<u32>,
    pub fvw: Option<[u8; 2]>,
}

impl ChunkHolder {
    pub fn is_filled(&self) -> bool {
        !self.sub_chunks.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunksMatrix {
    pub n_rows: usize,
    pub n_columns: usize,
    /// Row-major cells.
    pub holders: Vec<ChunkHolder>,
}

impl ChunksMatrix {
    pub fn n_filled_chunks(&self) -> usize {
        self.holders.iter().filter(|h| h.is_filled()).count()
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&ChunkHolder> {
        if column >= self.n_columns {
            return None;
        }
        self.holders.get(row * self.n_columns + column)
    }

    /// Largest zone id. Cells carrying it are outside every zone.
    pub fn max_zone_id(&self) -> Option<u32> {
        self.holders.iter().filter_map(|h| h.zone_id).max()
    }

    /// World `(x, z)` of the centre of cell `id`.
    pub fn x_z_coords(&self, id: usize) -> (u32, u32) {
        cell_centre(id, self.n_columns)
    }

    fn render(&self, width: usize, mut cell: impl FnMut(usize, &ChunkHolder) -> Option<String>) -> String {
        let blank: String = std::iter::repeat(EMPTY).take(width).collect();
        let mut out = String::new();
        for row in 0..self.n_rows {
            let line: Vec<String> = (0..self.n_columns)
                .map(|column| {
                    let id = row * self.n_columns + column;
                    self.holders
                        .get(id)
                        .and_then(|h| cell(id, h))
                        .map_or_else(|| blank.clone(), |s| format!("{s:<width$}"))
                })
                .collect();
            out.push_str(&line.join(" "));
            out.push('\n');
        }
        out
    }

    /// One character per cell: filled or empty.
    pub fn visual_map(&self) -> String {
        self.render(1, |_, h| h.is_filled().then(|| FILLED.to_string()))
    }

    /// Cell ids of the filled cells.
    pub fn visual_ids(&self) -> String {
        self.render(4, |id, h| h.is_filled().then(|| id.to_string()))
    }

    /// Index of the first sub-chunk of each filled cell, counted in grid
    /// order.
    pub fn visual_sub_chunk_ids(&self) -> String {
        let mut next = 0;
        self.render(4, |_, h| {
            h.is_filled().then(|| {
                let first = next;
                next += h.sub_chunks.len();
                first.to_string()
            })
        })
    }

    /// Zone id of each cell, blank outside every zone.
    pub fn visual_zone_ids(&self) -> Option<String> {
        let max = self.max_zone_id()?;
        Some(self.render(3, |_, h| {
            h.zone_id.filter(|&z| z != max).map(|z| z.to_string())
        }))
    }
}

impl fmt::Display for ChunksMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.visual_map())
    }
}
