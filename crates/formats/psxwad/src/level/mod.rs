//! The level file at the end of the geometry section: chunk models, the
//! chunk grid and the tables placing sub-chunks in it.
//!
//! Large parts of the tail (lighting, actor instances, unknown tables) are
//! only walked over. Their sizes depend on the variant and on vertex counts
//! of the chunk models, which is why the geometry section of some variants
//! cannot be size-checked.

pub mod chunks;

use crate::config::DecodeConfig;
use crate::cursor::Cursor;
use crate::error::{Error, HeuristicWarning, Result};
use crate::model::{Model, ModelHeader, ModelKind};

pub use chunks::{
    cell_centre, resolve_chain, ChunkHolder, ChunkRotation, ChunksMatrix, SubChunk, NO_CHUNK,
};

const FVW_MAGIC: &[u8; 4] = b"fvw\0";
const ZONE_HEADER_SIZE: usize = 256;
const LIGHTING_HEADER_SIZE: usize = 84;
const IDK4_RECORD_SIZE: usize = 36;
const IDK_RECORD_SIZE: usize = 32;
const IDK3_RECORD_SIZE: usize = 40;
/// Lighting bytes stored per vertex of a lit model.
const LIGHTING_VERTEX_SIZE: usize = 4;
/// Smallest chunk model header.
const MIN_MODEL_HEADER_SIZE: usize = 96;

/// One actor placed in the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorInstance {
    pub offset: u32,
    pub sound_level: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevelFile {
    pub chunk_models: Vec<Model>,
    pub chunks: ChunksMatrix,
    pub actors: Vec<ActorInstance>,
    /// Model of each sub-chunk lit by the additional lighting tables.
    pub additional_lighting_models: Vec<usize>,
}

fn parse_error(message: String) -> Error {
    Error::Parse {
        context: "level file",
        message,
    }
}

impl LevelFile {
    pub fn parse(c: &mut Cursor<'_>, config: &DecodeConfig) -> Result<Self> {
        let game = config.game;
        let full = game.has_full_level_header();

        let n_models = c.read_count()?;
        let mut headers = Vec::with_capacity(c.capacity_for(n_models, MIN_MODEL_HEADER_SIZE));
        for _ in 0..n_models {
            headers.push(ModelHeader::parse(c, config)?);
        }
        let chunk_models = headers
            .into_iter()
            .map(|header| Model::parse_body(c, config, header, ModelKind::World))
            .collect::<Result<Vec<_>>>()?;

        if full {
            c.skip(8)?;
        }
        let n_sub_chunks = c.read_count()?;
        let n_idk1 = c.read_count()?;
        c.skip(4 * n_idk1)?;
        let repeated = c.read_count()?;
        if repeated != n_sub_chunks {
            return Err(parse_error(format!(
                "sub-chunk count {n_sub_chunks} repeated as {repeated}"
            )));
        }
        let n_actors = usize::from(c.read_u16()?);
        c.skip(if full { 6 } else { 2 })?;
        let n_total_chunks = c.read_count()?;
        let n_columns = c.read_count()?;
        let n_rows = c.read_count()?;
        if n_rows.checked_mul(n_columns) != Some(n_total_chunks) {
            return Err(parse_error(format!(
                "{n_rows}×{n_columns} grid declares {n_total_chunks} cells"
            )));
        }
        let (n_lighting_headers, n_additional_lighting) = if full {
            let lighting = usize::from(c.read_u16()?);
            let additional = usize::from(c.read_u16()?);
            c.skip(4)?;
            (lighting, additional)
        } else {
            (0, 0)
        };
        let n_idk4 = c.read_count()?;
        c.skip(if full { 116 } else { 80 })?;

        let mut offsets = Vec::with_capacity(c.capacity_for(n_total_chunks, 4));
        for _ in 0..n_total_chunks {
            offsets.push(c.read_u32()?);
        }

        // Sub-chunk ids of each cell, and the cell each sub-chunk sits in.
        let info_start = c.position();
        c.at_offset(info_start).skip(8 * n_sub_chunks)?;
        let mut cells = Vec::with_capacity(offsets.len());
        let mut placement = vec![None; n_sub_chunks];
        for (cell, &offset) in offsets.iter().enumerate() {
            if offset == NO_CHUNK {
                cells.push(Vec::new());
                continue;
            }
            let ids = resolve_chain(c, info_start, cell, offset)?;
            for &id in &ids {
                let slot = placement.get_mut(id as usize).ok_or_else(|| {
                    parse_error(format!("cell {cell} references sub-chunk {id} of {n_sub_chunks}"))
                })?;
                *slot = Some(cell);
            }
            cells.push(ids);
        }
        c.seek(info_start + 8 * n_sub_chunks);

        let mut zone_ids = None;
        let mut fvw = None;
        if full {
            c.skip(ZONE_HEADER_SIZE)?;
            let n_zone_ids = c.read_count()?;
            if n_zone_ids != n_total_chunks {
                return Err(parse_error(format!(
                    "{n_zone_ids} zone ids for {n_total_chunks} cells"
                )));
            }
            zone_ids = Some(
                (0..n_zone_ids)
                    .map(|_| c.read_u32())
                    .collect::<Result<Vec<_>>>()?,
            );
            if c.peek_bytes(4) == Some(&FVW_MAGIC[..]) {
                c.skip(4)?;
                fvw = Some(
                    (0..n_total_chunks)
                        .map(|_| c.read_array::<2>())
                        .collect::<Result<Vec<_>>>()?,
                );
            }
        }

        let mut sub_chunks = Vec::with_capacity(n_sub_chunks);
        for (id, cell) in placement.iter().enumerate() {
            let record = c.position();
            let code = c.read_u32_be()?;
            let rotation = ChunkRotation::from_code(code).ok_or_else(|| {
                parse_error(format!("sub-chunk {id} has rotation code {code} at {record:#x}"))
            })?;
            Self::check_reserved(c, config)?;
            let x = c.read_u32()?;
            let height = c.read_i32()?;
            let z = c.read_u32()?;
            Self::check_reserved(c, config)?;
            match cell {
                Some(cell) => {
                    let expected = cell_centre(*cell, n_columns);
                    if (x, z) != expected {
                        return Err(Error::ChunkPlacement {
                            sub_chunk: id as u32,
                            expected,
                            found: (x, z),
                        });
                    }
                }
                None => tracing::debug!(id, "sub-chunk is not referenced by any cell"),
            }
            sub_chunks.push((height, rotation));
        }

        let mut models = Vec::with_capacity(n_sub_chunks);
        for id in 0..n_sub_chunks {
            let model = c.read_count()?;
            if model >= chunk_models.len() {
                return Err(parse_error(format!(
                    "sub-chunk {id} uses model {model} of {}",
                    chunk_models.len()
                )));
            }
            models.push(model);
        }

        c.skip(LIGHTING_HEADER_SIZE * n_lighting_headers)?;
        c.skip(IDK4_RECORD_SIZE * n_idk4)?;

        let mut actors = Vec::with_capacity(n_actors);
        for _ in 0..n_actors {
            c.skip(24)?;
            let offset = c.read_u32()?;
            c.skip(32)?;
            let sound_level = c.read_u32()?;
            actors.push(ActorInstance {
                offset,
                sound_level,
            });
        }

        let mut additional_lighting_models = Vec::new();
        if game.has_additional_lighting_mapping() {
            for _ in 0..n_additional_lighting {
                c.skip(16)?;
                additional_lighting_models.push(c.read_count()?);
                c.skip(4)?;
            }
            let n_idk2 = c.read_count()?;
            c.skip(IDK_RECORD_SIZE * n_idk2)?;
        } else {
            // Two tables of one 32-byte record per sub-chunk.
            c.skip(2 * IDK_RECORD_SIZE * n_sub_chunks)?;
            c.skip(if full { 32 } else { 92 })?;
        }

        if let Some(size) = game.opaque_lighting_size() {
            c.skip(size)?;
        } else if full && n_sub_chunks != 0 {
            Self::skip_lighting(c, config, &chunk_models, &models, &additional_lighting_models)?;
        }

        let holders = cells
            .into_iter()
            .enumerate()
            .map(|(cell, ids)| ChunkHolder {
                sub_chunks: ids
                    .into_iter()
                    .map(|id| {
                        let (height, rotation) = sub_chunks[id as usize];
                        SubChunk {
                            id,
                            model: models[id as usize],
                            height,
                            rotation,
                        }
                    })
                    .collect(),
                zone_id: zone_ids.as_ref().map(|z| z[cell]),
                fvw: fvw.as_ref().map(|f| f[cell]),
            })
            .collect();

        tracing::debug!(
            models = chunk_models.len(),
            sub_chunks = n_sub_chunks,
            rows = n_rows,
            columns = n_columns,
            "decoded level file"
        );
        Ok(Self {
            chunk_models,
            chunks: ChunksMatrix {
                n_rows,
                n_columns,
                holders,
            },
            actors,
            additional_lighting_models,
        })
    }

    /// Read a sub-chunk word that is always zero in shipped levels.
    fn check_reserved(c: &mut Cursor<'_>, config: &DecodeConfig) -> Result<()> {
        let offset = c.position();
        let value = c.read_u32()?;
        if value != 0 {
            config.check(HeuristicWarning::NonZeroReserved { offset, value })?;
        }
        Ok(())
    }

    /// Walk the per-vertex lighting of every sub-chunk and the tables that
    /// follow it.
    fn skip_lighting(
        c: &mut Cursor<'_>,
        config: &DecodeConfig,
        chunk_models: &[Model],
        models: &[usize],
        additional: &[usize],
    ) -> Result<()> {
        let mut lit = Vec::with_capacity(models.len());
        for _ in models {
            lit.push(c.read_count()?);
        }
        let mut lit_additional = Vec::with_capacity(additional.len());
        for _ in additional {
            lit_additional.push(c.read_count()?);
        }
        let vertices = |model: usize| -> Result<usize> {
            chunk_models
                .get(model)
                .map(|m| m.header.n_vertices as usize)
                .ok_or_else(|| parse_error(format!("lighting references model {model}")))
        };
        for (&model, &count) in models.iter().zip(&lit) {
            c.skip(count.saturating_mul(LIGHTING_VERTEX_SIZE * vertices(model)?))?;
        }
        for (&model, &count) in additional.iter().zip(&lit_additional) {
            c.skip(count.saturating_mul(LIGHTING_VERTEX_SIZE * vertices(model)?))?;
        }

        if config.game.has_additional_lighting_mapping() {
            // Both tables below are optional; a zero count word belongs to
            // whatever follows.
            let idk_size = c.read_count()?;
            if idk_size != 0 {
                c.skip(4 + idk_size)?;
            } else {
                c.rewind(4);
            }
            let n_idk3 = c.read_count()?;
            if n_idk3 == 0 {
                c.rewind(4);
            }
            c.skip(IDK3_RECORD_SIZE * n_idk3)?;
        }
        c.skip(12)
    }

    pub fn n_sub_chunks(&self) -> usize {
        self.chunks.holders.iter().map(|h| h.sub_chunks.len()).sum()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cursor::Writer;
    use crate::model::tests::{write_header, write_vertex};
    use crate::variant::Game;

    pub(crate) const N_SUB_CHUNKS: u32 = 8;

    /// Harry Potter level file: a 4×4 grid whose cell 5 holds sub-chunks 7
    /// then 2, both using the one two-vertex chunk model. `misplace` shifts
    /// sub-chunk 7 along x.
    pub(crate) fn hp_level_bytes(misplace: u32) -> Vec<u8> {
        level_bytes(4, misplace, 0)
    }

    /// Same level with `rows` written as the row count and `reserved` in the
    /// trailing word of sub-chunk 2.
    fn level_bytes(rows: u32, misplace: u32, reserved: u32) -> Vec<u8> {
        let game = Game::HarryPotter1;
        let mut w = Writer::new();
        w.write_u32(1);
        write_header(&mut w, game, 2, 0, 0);
        write_vertex(&mut w, [0, 0, 0], 2);
        write_vertex(&mut w, [1, 1, 1], 1);

        w.write_zeros(8);
        w.write_u32(N_SUB_CHUNKS);
        w.write_u32(0); // idk1
        w.write_u32(N_SUB_CHUNKS);
        w.write_u16(1); // actors
        w.write_zeros(6);
        w.write_u32(16);
        w.write_u32(4);
        w.write_u32(rows);
        w.write_u16(0); // lighting headers
        w.write_u16(0); // additional lighting
        w.write_u32(0);
        w.write_u32(0); // idk4
        w.write_zeros(116);

        for cell in 0..16 {
            w.write_u32(if cell == 5 { 0 } else { NO_CHUNK });
        }
        let mut table = vec![(0u32, 0u32); N_SUB_CHUNKS as usize];
        table[0] = (7, 8);
        table[1] = (2, NO_CHUNK);
        for (id, next) in table {
            w.write_u32(id);
            w.write_u32(next);
        }

        w.write_zeros(256);
        w.write_u32(16);
        for cell in 0..16 {
            w.write_u32(cell % 3);
        }

        let (x, z) = cell_centre(5, 4);
        for id in 0..N_SUB_CHUNKS {
            w.write_u32_be(if id == 7 { 4 } else { 0 });
            w.write_zeros(4);
            w.write_u32(if id == 7 { x + misplace } else { x });
            w.write_i32(id as i32 * 100);
            w.write_u32(z);
            w.write_u32(if id == 2 { reserved } else { 0 });
        }
        for _ in 0..N_SUB_CHUNKS {
            w.write_u32(0);
        }

        w.write_zeros(24);
        w.write_u32(0x1234);
        w.write_zeros(32);
        w.write_u32(3);

        w.write_u32(1); // idk2
        w.write_zeros(32);

        // Sub-chunk 2 carries one lighting record of 4 bytes per vertex.
        for id in 0..N_SUB_CHUNKS {
            w.write_u32(u32::from(id == 2));
        }
        w.write_zeros(4 * 2);
        w.write_zeros(12);
        w.into_bytes()
    }

    #[test]
    fn resolves_the_chunk_grid() {
        let bytes = hp_level_bytes(0);
        let config = DecodeConfig::new(Game::HarryPotter1);
        let mut c = Cursor::new(&bytes);
        let level = LevelFile::parse(&mut c, &config).unwrap();
        assert_eq!(c.position(), bytes.len());

        let chunks = &level.chunks;
        assert_eq!((chunks.n_rows, chunks.n_columns), (4, 4));
        assert_eq!(chunks.n_filled_chunks(), 1);
        let cell = chunks.cell(1, 1).unwrap();
        let ids: Vec<_> = cell.sub_chunks.iter().map(|s| s.id).collect();
        assert_eq!(ids, [7, 2]);
        assert_eq!(cell.sub_chunks[0].rotation, ChunkRotation::Right);
        assert_eq!(cell.sub_chunks[0].height, 700);
        assert_eq!(cell.sub_chunks[1].height, 200);
        assert_eq!(cell.zone_id, Some(2));
        assert_eq!(cell.fvw, None);
        assert_eq!(level.n_sub_chunks(), 2);
        assert_eq!(level.chunk_models[0].n_vertices(), 2);
        assert_eq!(
            level.actors,
            [ActorInstance {
                offset: 0x1234,
                sound_level: 3
            }]
        );
    }

    #[test]
    fn misplaced_sub_chunk() {
        let bytes = hp_level_bytes(16);
        let config = DecodeConfig::new(Game::HarryPotter1);
        assert!(matches!(
            LevelFile::parse(&mut Cursor::new(&bytes), &config),
            Err(Error::ChunkPlacement {
                sub_chunk: 7,
                expected: (6144, 6144),
                found: (6160, 6144),
            })
        ));
    }

    #[test]
    fn grid_shape_must_match_cell_count() {
        let bytes = level_bytes(3, 0, 0);
        let config = DecodeConfig::new(Game::HarryPotter1);
        match LevelFile::parse(&mut Cursor::new(&bytes), &config) {
            Err(Error::Parse { context, message }) => {
                assert_eq!(context, "level file");
                assert!(message.contains("16 cells"), "{message}");
            }
            other => panic!("expected a grid mismatch, got {other:?}"),
        }
    }

    #[test]
    fn reserved_sub_chunk_word_is_guarded() {
        let bytes = level_bytes(4, 0, 0xDEAD);
        let config = DecodeConfig::new(Game::HarryPotter1);
        assert!(matches!(
            LevelFile::parse(&mut Cursor::new(&bytes), &config),
            Err(Error::Heuristic(HeuristicWarning::NonZeroReserved { value: 0xDEAD, .. }))
        ));

        let lenient = config.with_warnings(crate::config::WarningPolicy::Continue);
        let mut c = Cursor::new(&bytes);
        let level = LevelFile::parse(&mut c, &lenient).unwrap();
        assert_eq!(c.position(), bytes.len());
        assert_eq!(level.chunks.n_filled_chunks(), 1);
    }

    #[test]
    fn huge_sub_chunk_count_fails_without_allocating() {
        let mut bytes = hp_level_bytes(0);
        // Model count, a 104-byte header, two vertices, then 8 bytes.
        let at = 4 + 104 + 2 * 8 + 8;
        assert_eq!(bytes[at..at + 4], N_SUB_CHUNKS.to_le_bytes());
        bytes[at..at + 4].copy_from_slice(&u32::MAX.to_le_bytes());
        bytes[at + 8..at + 12].copy_from_slice(&u32::MAX.to_le_bytes());
        let config = DecodeConfig::new(Game::HarryPotter1);
        assert!(matches!(
            LevelFile::parse(&mut Cursor::new(&bytes), &config),
            Err(Error::UnexpectedEof { .. })
        ));
    }
}
