//! 3D models of actors and level chunks.
//!
//! Vertices and normals are stored as `(x, y, z, terminator)` records of four
//! 16-bit words. A terminator of 1 closes the current vertex group; groups
//! are the rigid parts an animation moves independently.

pub mod animation;

use glam::{I16Vec3, Vec3};

use crate::config::DecodeConfig;
use crate::cursor::Cursor;
use crate::error::{Error, HeuristicWarning, IndexKind, Result};

pub use animation::{Animation, AnimationFormat, FrameTransform};

/// Bytes between the start of a model header and its vertex count.
const HEADER_PREFIX: usize = 72;
const MAX_ELEMENTS: u32 = 1000;
const QUAD_FLAG: u16 = 0x0800;
const WIDE_FACE_SIZE: usize = 20;
const COMPACT_FACE_SIZE: usize = 12;

/// Counts read from the fixed-size header in front of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelHeader {
    pub n_vertices: u32,
    pub n_faces: u32,
    /// Records in the bounding-box block that trails the model.
    pub n_bounding_boxes: usize,
}

impl ModelHeader {
    pub fn parse(c: &mut Cursor<'_>, config: &DecodeConfig) -> Result<Self> {
        let offset = c.position();
        c.skip(HEADER_PREFIX)?;
        let n_vertices = c.read_u32()?;
        c.skip(8)?;
        let n_faces = c.read_u32()?;
        if n_vertices > MAX_ELEMENTS || n_faces > MAX_ELEMENTS {
            config.check(HeuristicWarning::TooManyModelElements {
                offset,
                vertices: n_vertices,
                faces: n_faces,
            })?;
        }
        c.skip(4)?;
        let mut n_bounding_boxes = 0;
        for _ in 0..3 {
            n_bounding_boxes += usize::from(c.read_u16()?);
        }
        c.skip(config.game.model_header_padding())?;
        Ok(Self {
            n_vertices,
            n_faces,
            n_bounding_boxes,
        })
    }
}

/// Vertex indices of one face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polygon {
    Triangle([u16; 3]),
    /// Indices in on-disk order.
    Quad([u16; 4]),
}

impl Polygon {
    pub fn indices(&self) -> &[u16] {
        match self {
            Polygon::Triangle(v) => v,
            Polygon::Quad(v) => v,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Face {
    pub polygon: Polygon,
    /// Index of the texture descriptor.
    pub texture: u16,
    /// Face normal indices. Only the wide actor face records carry them.
    pub normals: Option<[i16; 3]>,
}

/// Whether a model belongs to an actor or to the level geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Actor,
    World,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub header: ModelHeader,
    pub kind: ModelKind,
    pub vertex_groups: Vec<Vec<I16Vec3>>,
    /// Same grouping as the vertices. Empty for Harry Potter level geometry.
    pub normal_groups: Vec<Vec<I16Vec3>>,
    pub faces: Vec<Face>,
}

fn read_groups(c: &mut Cursor<'_>, count: u32, kind: IndexKind) -> Result<Vec<Vec<I16Vec3>>> {
    let mut groups = Vec::new();
    let mut group = Vec::new();
    for _ in 0..count {
        let v = I16Vec3::new(c.read_i16()?, c.read_i16()?, c.read_i16()?);
        let terminator = c.read_u16()?;
        group.push(v);
        match terminator {
            0 => {
                return Err(Error::MalformedIndex {
                    offset: c.position() - 2,
                    kind,
                    value: 0,
                })
            }
            1 => groups.push(std::mem::take(&mut group)),
            _ => {}
        }
    }
    if !group.is_empty() {
        groups.push(group);
    }
    Ok(groups)
}

impl Model {
    /// Parse an actor model: header immediately followed by its data.
    pub fn parse_actor(c: &mut Cursor<'_>, config: &DecodeConfig) -> Result<Self> {
        let header = ModelHeader::parse(c, config)?;
        Self::parse_body(c, config, header, ModelKind::Actor)
    }

    /// Parse the data of a model whose header was read separately.
    pub fn parse_body(
        c: &mut Cursor<'_>,
        config: &DecodeConfig,
        header: ModelHeader,
        kind: ModelKind,
    ) -> Result<Self> {
        let game = config.game;
        let vertex_groups = read_groups(c, header.n_vertices, IndexKind::Vertex)?;
        let mut normal_groups = Vec::new();
        if kind == ModelKind::Actor || game.world_models_have_normals() {
            normal_groups = read_groups(c, header.n_vertices, IndexKind::Normal)?;
            if normal_groups.len() != vertex_groups.len() {
                return Err(Error::GroupCountMismatch {
                    offset: c.position(),
                    vertex_groups: vertex_groups.len(),
                    normal_groups: normal_groups.len(),
                });
            }
        }

        let compact = kind == ModelKind::World && game.world_models_have_compact_faces();
        let face_size = if compact { COMPACT_FACE_SIZE } else { WIDE_FACE_SIZE };
        let mut faces = Vec::with_capacity(c.capacity_for(header.n_faces as usize, face_size));
        for _ in 0..header.n_faces {
            faces.push(if compact {
                Self::read_compact_face(c)?
            } else {
                Self::read_wide_face(c)?
            });
        }
        c.skip(header.n_bounding_boxes * game.bounding_box_record_size())?;

        Ok(Self {
            header,
            kind,
            vertex_groups,
            normal_groups,
            faces,
        })
    }

    /// 20-byte actor face record.
    fn read_wide_face(c: &mut Cursor<'_>) -> Result<Face> {
        let normals = [c.read_i16()?, c.read_i16()?, c.read_i16()?];
        let terminator = c.read_u16()?;
        if terminator == 0 {
            return Err(Error::MalformedIndex {
                offset: c.position() - 2,
                kind: IndexKind::Face,
                value: 0,
            });
        }
        let v = [c.read_u16()?, c.read_u16()?, c.read_u16()?, c.read_u16()?];
        let texture = c.read_u16()?;
        let flags = c.read_u16()?;
        Ok(Face {
            polygon: polygon(v, flags),
            texture,
            normals: Some(normals),
        })
    }

    /// 12-byte level chunk face record.
    fn read_compact_face(c: &mut Cursor<'_>) -> Result<Face> {
        let v = [c.read_u16()?, c.read_u16()?, c.read_u16()?, c.read_u16()?];
        let texture = c.read_u16()?;
        let flags = c.read_u16()?;
        Ok(Face {
            polygon: polygon(v, flags),
            texture,
            normals: None,
        })
    }

    pub fn n_vertex_groups(&self) -> usize {
        self.vertex_groups.len()
    }

    pub fn n_vertices(&self) -> usize {
        self.vertex_groups.iter().map(Vec::len).sum()
    }

    /// Vertices and normals posed by one frame of `animation`. The model
    /// itself is left untouched.
    pub fn animate(&self, animation: &Animation, frame: usize) -> Result<Pose> {
        if self.n_vertex_groups() != animation.n_vertex_groups {
            return Err(Error::IncompatibleAnimation {
                model: self.n_vertex_groups(),
                animation: animation.n_vertex_groups,
            });
        }
        let transforms = animation.frame(frame)?;
        let apply = |groups: &[Vec<I16Vec3>]| -> Vec<Vec<Vec3>> {
            groups
                .iter()
                .zip(transforms)
                .map(|(group, transform)| {
                    group
                        .iter()
                        .map(|v| transform.apply(v.as_vec3(), animation.format))
                        .collect()
                })
                .collect()
        };
        Ok(Pose {
            vertices: apply(&self.vertex_groups),
            normals: apply(&self.normal_groups),
        })
    }
}

fn polygon(v: [u16; 4], flags: u16) -> Polygon {
    if flags & QUAD_FLAG != 0 {
        Polygon::Quad(v)
    } else {
        Polygon::Triangle([v[0], v[1], v[2]])
    }
}

/// A model after applying one animation frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    pub vertices: Vec<Vec<Vec3>>,
    pub normals: Vec<Vec<Vec3>>,
}

impl Pose {
    pub fn n_vertices(&self) -> usize {
        self.vertices.iter().map(Vec::len).sum()
    }
}

/// Pick the animation most likely to drive model `model_index`.
///
/// Actor animations are stored in model order, so among the animations with
/// a matching group count the first one at or after the model's index wins.
pub fn guess_animation(model_index: usize, model: &Model, animations: &[Animation]) -> Option<usize> {
    let groups = model.n_vertex_groups();
    let matching = |&(_, a): &(usize, &Animation)| a.n_vertex_groups == groups;
    animations
        .iter()
        .enumerate()
        .skip(model_index)
        .find(matching)
        .or_else(|| animations.iter().enumerate().find(matching))
        .map(|(i, _)| i)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cursor::Writer;
    use crate::variant::Game;

    /// Encode a model header followed by `body`.
    pub(crate) fn write_header(w: &mut Writer, game: Game, n_vertices: u32, n_faces: u32, n_bbox: u16) {
        w.write_zeros(HEADER_PREFIX);
        w.write_u32(n_vertices);
        w.write_zeros(8);
        w.write_u32(n_faces);
        w.write_zeros(4);
        w.write_u16(n_bbox);
        w.write_u16(0);
        w.write_u16(0);
        w.write_zeros(game.model_header_padding());
    }

    pub(crate) fn write_vertex(w: &mut Writer, v: [i16; 3], terminator: u16) {
        for c in v {
            w.write_i16(c);
        }
        w.write_u16(terminator);
    }

    /// Actor model with one vertex group per entry of `group_sizes`, and one
    /// triangle and one quad.
    pub(crate) fn actor_bytes(game: Game, group_sizes: &[usize]) -> Vec<u8> {
        let n_vertices: usize = group_sizes.iter().sum();
        let mut w = Writer::new();
        write_header(&mut w, game, n_vertices as u32, 2, 1);
        for _ in 0..2 {
            for &size in group_sizes {
                for i in 0..size {
                    let terminator = if i + 1 == size { 1 } else { 2 };
                    write_vertex(&mut w, [i as i16, 10, -10], terminator);
                }
            }
        }
        for (flags, texture) in [(0u16, 3u16), (QUAD_FLAG, 4)] {
            for n in [1i16, 2, 3] {
                w.write_i16(n);
            }
            w.write_u16(1);
            for v in [0u16, 1, 2, 3] {
                w.write_u16(v);
            }
            w.write_u16(texture);
            w.write_u16(flags);
        }
        w.write_zeros(game.bounding_box_record_size());
        w.into_bytes()
    }

    #[test]
    fn actor_model_layout() {
        for game in [Game::Croc2, Game::HarryPotter1] {
            let bytes = actor_bytes(game, &[2, 3]);
            let config = DecodeConfig::new(game);
            let mut c = Cursor::new(&bytes);
            let model = Model::parse_actor(&mut c, &config).unwrap();
            assert_eq!(c.position(), bytes.len());
            assert_eq!(model.n_vertex_groups(), 2);
            assert_eq!(model.n_vertices(), 5);
            assert_eq!(model.normal_groups.len(), 2);
            assert_eq!(model.faces[0].polygon, Polygon::Triangle([0, 1, 2]));
            assert_eq!(model.faces[1].polygon, Polygon::Quad([0, 1, 2, 3]));
            assert_eq!(model.faces[1].texture, 4);
            assert_eq!(model.faces[0].normals, Some([1, 2, 3]));
        }
    }

    #[test]
    fn zero_terminator_is_rejected() {
        let mut w = Writer::new();
        write_header(&mut w, Game::Croc2, 2, 0, 0);
        write_vertex(&mut w, [0, 0, 0], 2);
        write_vertex(&mut w, [0, 0, 0], 0);
        let bytes = w.into_bytes();
        let config = DecodeConfig::new(Game::Croc2);
        assert!(matches!(
            Model::parse_actor(&mut Cursor::new(&bytes), &config),
            Err(Error::MalformedIndex {
                kind: IndexKind::Vertex,
                value: 0,
                ..
            })
        ));
    }

    #[test]
    fn normal_groups_must_match() {
        let mut w = Writer::new();
        write_header(&mut w, Game::Croc2, 2, 0, 0);
        write_vertex(&mut w, [0, 0, 0], 1);
        write_vertex(&mut w, [0, 0, 0], 1);
        write_vertex(&mut w, [0, 0, 0], 2);
        write_vertex(&mut w, [0, 0, 0], 1);
        let bytes = w.into_bytes();
        let config = DecodeConfig::new(Game::Croc2);
        assert!(matches!(
            Model::parse_actor(&mut Cursor::new(&bytes), &config),
            Err(Error::GroupCountMismatch {
                vertex_groups: 2,
                normal_groups: 1,
                ..
            })
        ));
    }

    #[test]
    fn header_guard() {
        let mut w = Writer::new();
        write_header(&mut w, Game::HarryPotter2, 5000, 1, 0);
        let bytes = w.into_bytes();
        let config = DecodeConfig::new(Game::HarryPotter2);
        assert!(matches!(
            ModelHeader::parse(&mut Cursor::new(&bytes), &config),
            Err(Error::Heuristic(HeuristicWarning::TooManyModelElements { vertices: 5000, .. }))
        ));
    }

    #[test]
    fn world_faces_are_compact() {
        let mut w = Writer::new();
        write_vertex(&mut w, [1, 2, 3], 1);
        for v in [4u16, 5, 6, 7, 9, QUAD_FLAG] {
            w.write_u16(v);
        }
        let bytes = w.into_bytes();
        let header = ModelHeader {
            n_vertices: 1,
            n_faces: 1,
            n_bounding_boxes: 0,
        };
        let config = DecodeConfig::new(Game::HarryPotter1);
        let model =
            Model::parse_body(&mut Cursor::new(&bytes), &config, header, ModelKind::World).unwrap();
        assert!(model.normal_groups.is_empty());
        assert_eq!(model.faces[0].polygon, Polygon::Quad([4, 5, 6, 7]));
        assert_eq!(model.faces[0].texture, 9);
        assert_eq!(model.faces[0].normals, None);
    }
}
