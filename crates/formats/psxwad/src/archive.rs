//! DIR/DAT archives.
//!
//! The DAT is a flat blob of files, each padded to a 2048-byte sector. The
//! DIR lists `name (12 bytes) | size (u32) | start (u32)` per file, after a
//! u32 count. The dummy demo files have no DIR; their DAT is scanned instead.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::DecodeConfig;
use crate::cursor::{round_up, Cursor, Writer, SECTOR_SIZE};
use crate::error::{Error, Result};
use crate::sections::Codename;
use crate::variant::{DirectoryLayout, Game};
use crate::wad::Wad;

const NAME_SIZE: usize = 12;

/// An 8.3 file name: stem of at most 8 characters, a dot, an extension of at
/// most 3 characters. Stored upper-case as the engine expects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryName {
    stem: String,
    extension: String,
}

impl EntryName {
    pub fn new(name: &str) -> Result<Self> {
        let invalid = |reason| Error::InvalidName {
            name: name.to_owned(),
            reason,
        };
        if !name.is_ascii() {
            return Err(invalid("not ASCII"));
        }
        let (stem, extension) = name.rsplit_once('.').ok_or_else(|| invalid("missing extension"))?;
        if stem.is_empty() || stem.len() > 8 {
            return Err(invalid("stem must be 1 to 8 characters"));
        }
        if extension.is_empty() || extension.len() > 3 {
            return Err(invalid("extension must be 1 to 3 characters"));
        }
        if name.bytes().any(|b| b == 0 || b == b'/' || b == b'\\') {
            return Err(invalid("contains a path separator or NUL"));
        }
        Ok(Self {
            stem: stem.to_ascii_uppercase(),
            extension: extension.to_ascii_uppercase(),
        })
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// NUL-padded name field of a DIR record.
    fn to_field(&self) -> [u8; NAME_SIZE] {
        let mut field = [0; NAME_SIZE];
        let name = self.to_string();
        field[..name.len()].copy_from_slice(name.as_bytes());
        field
    }
}

impl fmt::Display for EntryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.stem, self.extension)
    }
}

/// What an entry holds, guessed from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum EntryKind {
    /// Level or menu data made of sections.
    Wad,
    /// Menu image.
    Img,
    Dem,
    Bin,
    /// Kept as raw bytes.
    NonParsable,
}

impl EntryKind {
    pub fn guess(name: &EntryName) -> Self {
        match (name.extension(), name.stem()) {
            ("WAD", "FESOUND" | "FETHUND") => Self::NonParsable,
            ("WAD", _) => Self::Wad,
            ("IMG", "SECURITY" | "KEEP") => Self::NonParsable,
            ("IMG", _) => Self::Img,
            ("DEM", _) => Self::Dem,
            ("BIN", _) => Self::Bin,
            _ => Self::NonParsable,
        }
    }
}

/// One file of the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: EntryName,
    pub data: Vec<u8>,
}

impl ArchiveEntry {
    pub fn new(name: &str, data: Vec<u8>) -> Result<Self> {
        Ok(Self {
            name: EntryName::new(name)?,
            data,
        })
    }

    pub fn kind(&self) -> EntryKind {
        EntryKind::guess(&self.name)
    }

    /// Decode the entry as a WAD.
    pub fn decode_wad(&self, config: &DecodeConfig) -> Result<Wad> {
        Wad::decode(&self.data, config)
    }

    /// Replace the entry contents with an encoded WAD.
    pub fn set_wad(&mut self, wad: &Wad, game: Game) -> Result<()> {
        self.data = wad.encode(game)?;
        Ok(())
    }
}

/// Encoded DIR and DAT bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedArchive {
    /// `None` for variants without a directory file.
    pub dir: Option<Vec<u8>>,
    pub dat: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Archive {
    pub entries: Vec<ArchiveEntry>,
}

impl Archive {
    pub fn new(entries: Vec<ArchiveEntry>) -> Self {
        Self { entries }
    }

    /// Decode an archive. `dir` is ignored for variants that scan the DAT.
    pub fn decode(dir: Option<&[u8]>, dat: &[u8], game: Game) -> Result<Self> {
        let entries = match (game.info().directory, dir) {
            (Some(layout), Some(dir)) => Self::decode_directory(dir, dat, layout)?,
            (Some(_), None) => {
                return Err(Error::Parse {
                    context: "archive",
                    message: format!("{game} needs a directory file"),
                })
            }
            (None, _) => Self::scan(dat)?,
        };
        tracing::debug!(entries = entries.len(), %game, "decoded archive");
        Ok(Self { entries })
    }

    fn decode_directory(dir: &[u8], dat: &[u8], layout: DirectoryLayout) -> Result<Vec<ArchiveEntry>> {
        let mut c = Cursor::new(dir);
        // Directories written without a count hold whole records only.
        let declared = if !layout.writes_count && dir.len() % layout.record_size == 0 {
            dir.len() / layout.record_size
        } else {
            c.read_count()?
        };
        let available = c.remaining() / layout.record_size;
        if available < declared {
            return Err(Error::EntryCountMismatch {
                declared,
                found: available,
            });
        }
        let blob = Cursor::new(dat);
        let mut entries = Vec::with_capacity(declared);
        for _ in 0..declared {
            let record = c.position();
            let field = c.read_array::<NAME_SIZE>()?;
            let size = c.read_count()?;
            let start = c.read_count()?;
            c.seek(record + layout.record_size);

            let len = field.iter().position(|&b| b == 0).unwrap_or(NAME_SIZE);
            let name = String::from_utf8_lossy(&field[..len]);
            let data = blob.at_offset(start).read_bytes(size)?.to_vec();
            entries.push(ArchiveEntry::new(&name, data)?);
        }
        if c.remaining() != 0 {
            tracing::warn!(bytes = c.remaining(), "directory has bytes past the last record");
        }
        Ok(entries)
    }

    /// Walk a directory-less DAT. Every file starts with its u32 length,
    /// prefix included, and is padded to a sector.
    fn scan(dat: &[u8]) -> Result<Vec<ArchiveEntry>> {
        let mut c = Cursor::new(dat);
        let mut entries = Vec::new();
        while c.remaining() >= 4 {
            let start = c.position();
            let size = c.read_count()?;
            if size == 0 {
                break;
            }
            let is_wad = c.peek_bytes(4) == Some(&Codename::TEXTURES.0[..]);
            c.seek(start);
            let data = c.read_bytes(size.max(4))?.to_vec();
            let extension = if is_wad { "WAD" } else { "DEM" };
            entries.push(ArchiveEntry::new(&format!("{start:07x}.{extension}"), data)?);
            c.seek(round_up(c.position(), SECTOR_SIZE));
        }
        Ok(entries)
    }

    pub fn encode(&self, game: Game) -> Result<EncodedArchive> {
        let mut dat = Writer::new();
        let Some(layout) = game.info().directory else {
            for entry in &self.entries {
                dat.write_bytes(&entry.data);
                dat.align(SECTOR_SIZE);
            }
            return Ok(EncodedArchive {
                dir: None,
                dat: dat.into_bytes(),
            });
        };

        let mut dir = Writer::with_capacity(4 + layout.record_size * self.entries.len());
        if layout.writes_count {
            dir.write_count(self.entries.len());
        }
        for entry in &self.entries {
            let start = dat.position();
            dat.write_bytes(&entry.data);
            dat.align(SECTOR_SIZE);
            dir.write_bytes(&entry.name.to_field());
            dir.write_count(entry.data.len());
            dir.write_count(start);
            dir.write_zeros(layout.record_size - NAME_SIZE - 8);
        }
        Ok(EncodedArchive {
            dir: Some(dir.into_bytes()),
            dat: dat.into_bytes(),
        })
    }

    pub fn find(&self, name: &str) -> Option<&ArchiveEntry> {
        self.entries
            .iter()
            .find(|e| e.name.to_string().eq_ignore_ascii_case(name))
    }

    /// Size of the DAT once encoded.
    pub fn dat_size(&self) -> usize {
        self.entries
            .iter()
            .map(|e| round_up(e.data.len(), SECTOR_SIZE))
            .sum()
    }

    /// Find the DIR and DAT of `game` given either the folder holding them
    /// or one of the two files.
    pub fn locate(path: &Path, game: Game) -> Result<(Option<PathBuf>, PathBuf)> {
        let info = game.info();
        if path.is_dir() {
            return Ok((info.dir_file.map(|f| path.join(f)), path.join(info.dat_file)));
        }
        if !path.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )
            .into());
        }
        if info.dir_file.is_none() {
            return Ok((None, path.to_path_buf()));
        }
        let is_dir_file = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("DIR"));
        if is_dir_file {
            let dat = path.with_file_name(info.dat_file);
            Ok((Some(path.to_path_buf()), dat))
        } else {
            Ok((Some(path.with_extension("DIR")), path.to_path_buf()))
        }
    }

    /// Read the archive of `game` from disk. See [`Archive::locate`].
    pub fn read(path: &Path, game: Game) -> Result<Self> {
        let (dir_path, dat_path) = Self::locate(path, game)?;
        let dir = dir_path.map(std::fs::read).transpose()?;
        let dat = std::fs::read(dat_path)?;
        Self::decode(dir.as_deref(), &dat, game)
    }

    /// Write the DIR and DAT of `game` into `folder`.
    pub fn write(&self, folder: &Path, game: Game) -> Result<()> {
        let encoded = self.encode(game)?;
        std::fs::create_dir_all(folder)?;
        let info = game.info();
        if let (Some(dir), Some(name)) = (&encoded.dir, info.dir_file) {
            std::fs::write(folder.join(name), dir)?;
        }
        std::fs::write(folder.join(info.dat_file), &encoded.dat)?;
        Ok(())
    }

    /// Write every entry as its own file into `folder`.
    pub fn write_entries(&self, folder: &Path) -> Result<()> {
        std::fs::create_dir_all(folder)?;
        for entry in &self.entries {
            std::fs::write(folder.join(entry.name.to_string()), &entry.data)?;
        }
        Ok(())
    }

    /// Build an archive from files and folders. Folders contribute their
    /// files recursively, in name order.
    pub fn from_paths(paths: &[PathBuf]) -> Result<Self> {
        let mut files = Vec::new();
        for path in paths {
            if path.is_dir() {
                collect_files(path, &mut files)?;
            } else {
                files.push(path.clone());
            }
        }
        let entries = files
            .iter()
            .map(|path| {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                ArchiveEntry::new(&name, std::fs::read(path)?)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }
}

fn collect_files(folder: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let mut children = std::fs::read_dir(folder)?
        .map(|e| e.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    children.sort();
    for child in children {
        if child.is_dir() {
            collect_files(&child, out)?;
        } else {
            out.push(child);
        }
    }
    Ok(())
}
