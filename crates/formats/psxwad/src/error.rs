use thiserror::Error;

use crate::sections::Codename;
use crate::variant::Game;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unexpected end of data at offset {offset:#x} (need {need} bytes, have {have})")]
    UnexpectedEof {
        offset: usize,
        need: usize,
        have: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid 8.3 file name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("directory declares {declared} entries but {found} records were read")]
    EntryCountMismatch { declared: usize, found: usize },

    #[error("section codename mismatch at offset {offset:#x}: expected {expected}, found {found}")]
    SectionNameMismatch {
        offset: usize,
        expected: Codename,
        found: Codename,
    },

    #[error("{section} section at offset {offset:#x} declares {declared} bytes but {found} were decoded")]
    SectionSizeMismatch {
        offset: usize,
        section: Codename,
        declared: usize,
        found: usize,
    },

    #[error("{feature} is not supported for {game}")]
    UnsupportedForVariant { feature: &'static str, game: Game },

    #[error("malformed {kind} index {value} at offset {offset:#x}")]
    MalformedIndex {
        offset: usize,
        kind: IndexKind,
        value: i64,
    },

    #[error("{vertex_groups} vertex groups but {normal_groups} normal groups at offset {offset:#x}")]
    GroupCountMismatch {
        offset: usize,
        vertex_groups: usize,
        normal_groups: usize,
    },

    #[error("zero-length run at offset {offset:#x}")]
    MalformedRunLength { offset: usize },

    #[error("run at offset {offset:#x} decodes past {limit} bytes")]
    RunLengthOverflow { offset: usize, limit: usize },

    #[error("model has {model} vertex groups but the animation drives {animation}")]
    IncompatibleAnimation { model: usize, animation: usize },

    #[error("frame {frame} is out of range ({frames} frames)")]
    FrameOutOfRange { frame: usize, frames: usize },

    #[error("chunk chain of cell {cell} revisits offset {offset:#x}")]
    ChunkCycle { cell: usize, offset: u32 },

    #[error("chunk chain of cell {cell} lists sub-chunk {sub_chunk} twice")]
    DuplicateSubChunk { cell: usize, sub_chunk: u32 },

    #[error("sub-chunk {sub_chunk} placed at {found:?}, expected {expected:?}")]
    ChunkPlacement {
        sub_chunk: u32,
        expected: (u32, u32),
        found: (u32, u32),
    },

    #[error("invalid ADPCM predictor {predictor} at offset {offset:#x}")]
    InvalidPredictor { offset: usize, predictor: u8 },

    #[error(transparent)]
    Heuristic(#[from] HeuristicWarning),

    #[error("{context}: {message}")]
    Parse { context: &'static str, message: String },
}

/// Guards against counts that only a misaligned cursor would produce.
///
/// The format carries no magic numbers past the section header, so a layout
/// drift shows up as absurd element counts long before anything else fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeuristicWarning {
    #[error("suspicious texture header at offset {offset:#x}: {textures} textures in {rows} rows")]
    TooManyTextures {
        offset: usize,
        textures: u32,
        rows: u32,
    },

    #[error("suspicious model header at offset {offset:#x}: {vertices} vertices, {faces} faces")]
    TooManyModelElements {
        offset: usize,
        vertices: u32,
        faces: u32,
    },

    #[error("suspicious animation header at offset {offset:#x}: {frames} frames")]
    BadFrameCount { offset: usize, frames: u32 },

    #[error("suspicious sub-chunk record at offset {offset:#x}: reserved word is {value:#x}")]
    NonZeroReserved { offset: usize, value: u32 },
}

/// What a malformed group terminator belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Vertex,
    Normal,
    Face,
}

impl std::fmt::Display for IndexKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Vertex => "vertex",
            Self::Normal => "vertex normal",
            Self::Face => "face",
        })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
