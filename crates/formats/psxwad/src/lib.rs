//! Reader/writer for the DIR/DAT archives of the PS1 Argonaut games (Croc 2
//! and the first two Harry Potter titles).
//!
//! Three layers:
//! - **Archive** (`archive`): DIR/DAT container, one file per entry
//! - **WAD** (`wad`, `sections`): section framing and the typed section
//!   codecs, with raw passthrough for anything not understood
//! - **Assets** (`atlas`, `model`, `level`, `vag`): textures, 3D models and
//!   animations, the level chunk grid, ADPCM audio

pub mod archive;
pub mod atlas;
pub mod batch;
pub mod config;
pub mod cursor;
pub mod error;
pub mod level;
pub mod model;
pub mod sections;
pub mod vag;
pub mod variant;
pub mod wad;

pub use archive::{Archive, ArchiveEntry, EntryKind, EntryName};
pub use config::{DecodeConfig, WarningPolicy};
pub use error::{Error, HeuristicWarning, IndexKind, Result};
pub use sections::{Codename, Section};
pub use variant::{Game, GameInfo};
pub use wad::{Wad, WadSummary};
