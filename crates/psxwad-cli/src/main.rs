use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use psxwad::batch::{decode_entries, summarize, verify_entries, Verification};
use psxwad::sections::Tpsx;
use psxwad::vag::Vag;
use psxwad::{Archive, ArchiveEntry, DecodeConfig, Game, Wad, WarningPolicy};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "psxwad", about = "Slice, pack and inspect PS1 Argonaut game archives")]
struct Cli {
    /// Game the archive belongs to: croc1, croc2, croc2-demo,
    /// croc2-demo-dummy, hp1 or hp2.
    #[arg(short, long, global = true, default_value = "croc2")]
    game: Game,
    /// Log heuristic guard failures instead of aborting the decode.
    #[arg(long, global = true)]
    ignore_warnings: bool,
    /// Debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract every file of a DIR/DAT archive.
    Slice {
        /// Folder holding the archive, or its DIR or DAT file.
        archive: PathBuf,
        /// Output folder.
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Build a DIR/DAT archive from files and folders.
    Pack {
        inputs: Vec<PathBuf>,
        /// Output folder for the DIR and DAT.
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Summarize every entry of an archive.
    Info {
        archive: PathBuf,
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Print the chunk grid of level files.
    Chunks {
        archive: PathBuf,
        /// Only this entry (e.g. MAP01.WAD).
        #[arg(long)]
        entry: Option<String>,
    },
    /// Export the texture atlas of each level as PNG.
    Textures {
        archive: PathBuf,
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Export every sound as .VAG files.
    Audio {
        archive: PathBuf,
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Decode and re-encode every WAD, reporting byte differences.
    Verify { archive: PathBuf },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_archive(path: &Path, game: Game) -> Result<Archive> {
    let archive = Archive::read(path, game)
        .with_context(|| format!("failed to read {game} archive at {}", path.display()))?;
    tracing::debug!(entries = archive.entries.len(), path = %path.display(), "read archive");
    Ok(archive)
}

fn cmd_slice(path: &Path, out: &Path, game: Game) -> Result<()> {
    let archive = read_archive(path, game)?;
    archive
        .write_entries(out)
        .with_context(|| format!("failed to write files to {}", out.display()))?;
    println!("{} file(s) written to {}", archive.entries.len(), out.display());
    Ok(())
}

fn cmd_pack(inputs: &[PathBuf], out: &Path, game: Game) -> Result<()> {
    if inputs.is_empty() {
        bail!("nothing to pack");
    }
    let archive = Archive::from_paths(inputs).context("failed to collect input files")?;
    archive
        .write(out, game)
        .with_context(|| format!("failed to write archive to {}", out.display()))?;
    println!(
        "{} file(s) packed, {} byte(s) of data",
        archive.entries.len(),
        archive.dat_size()
    );
    Ok(())
}

fn cmd_info(path: &Path, json: bool, config: &DecodeConfig) -> Result<()> {
    let archive = read_archive(path, config.game)?;
    let summaries = summarize(&archive, config);
    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }
    println!("Game:    {}", config.game);
    println!("Entries: {}", summaries.len());
    for summary in &summaries {
        print!("  {:<12} {:>9}  ", summary.name, summary.size);
        match (&summary.wad, &summary.error) {
            (Some(wad), _) => println!("{wad}"),
            (None, Some(error)) => println!("error: {error}"),
            (None, None) => println!("{:?}", summary.kind),
        }
    }
    Ok(())
}

/// Decoded WADs, skipping the ones that fail. `only` keeps a single entry.
fn decoded_wads<'a>(
    archive: &'a Archive,
    config: &DecodeConfig,
    only: Option<&str>,
) -> Vec<(&'a ArchiveEntry, Wad)> {
    decode_entries(archive, config)
        .into_iter()
        .filter(|(entry, _)| only.is_none_or(|name| entry.name.to_string().eq_ignore_ascii_case(name)))
        .filter_map(|(entry, result)| result.ok().map(|wad| (entry, wad)))
        .collect()
}

fn cmd_chunks(path: &Path, entry: Option<&str>, config: &DecodeConfig) -> Result<()> {
    let archive = read_archive(path, config.game)?;
    if let Some(name) = entry {
        if archive.find(name).is_none() {
            bail!("no entry named {name}");
        }
    }
    for (entry, wad) in decoded_wads(&archive, config, entry) {
        let Some(dpsx) = wad.dpsx() else {
            continue;
        };
        let chunks = &dpsx.level().chunks;
        println!(
            "{}: {}×{} cells, {} filled",
            entry.name,
            chunks.n_rows,
            chunks.n_columns,
            chunks.n_filled_chunks()
        );
        println!("{chunks}");
        println!("{}", chunks.visual_sub_chunk_ids());
        if let Some(zones) = chunks.visual_zone_ids() {
            println!("{zones}");
        }
    }
    Ok(())
}

fn cmd_textures(path: &Path, out: &Path, config: &DecodeConfig) -> Result<()> {
    let archive = read_archive(path, config.game)?;
    fs::create_dir_all(out).with_context(|| format!("failed to create {}", out.display()))?;
    let alpha = Tpsx::alpha_mode(config.game);
    let mut written = 0;
    for (entry, wad) in decoded_wads(&archive, config, None) {
        let Some(tpsx) = wad.tpsx() else {
            continue;
        };
        let file = out.join(format!("{}.png", entry.name.stem()));
        tpsx.textures
            .composite(alpha)
            .save(&file)
            .with_context(|| format!("failed to write {}", file.display()))?;
        written += 1;
    }
    println!("{written} atlas image(s) written to {}", out.display());
    Ok(())
}

fn write_vag(folder: &Path, name: &str, vag: &Vag) -> Result<usize> {
    let files = vag.to_vag_files(name);
    let stereo = files.len() == 2;
    for (channel, bytes) in files.iter().enumerate() {
        let file = if stereo {
            folder.join(format!("{name}_{}.VAG", ["L", "R"][channel]))
        } else {
            folder.join(format!("{name}.VAG"))
        };
        fs::write(&file, bytes).with_context(|| format!("failed to write {}", file.display()))?;
    }
    Ok(files.len())
}

fn cmd_audio(path: &Path, out: &Path, config: &DecodeConfig) -> Result<()> {
    let archive = read_archive(path, config.game)?;
    let mut written = 0;
    for (entry, wad) in decoded_wads(&archive, config, None) {
        let folder = out.join(entry.name.stem());
        let mut sounds: Vec<(String, &Vag)> = Vec::new();
        if let Some(spsx) = wad.spsx() {
            for (i, sound) in spsx.common_sfx.iter().enumerate() {
                sounds.push((format!("SFX{i:03}"), &sound.vag));
            }
            for (i, sound) in spsx.ambient_tracks.iter().enumerate() {
                sounds.push((format!("AMB{i:03}"), &sound.vag));
            }
        }
        if let Some(end) = wad.end() {
            for (g, group) in end.level_sfx.iter().enumerate() {
                for (i, vag) in group.iter().enumerate() {
                    sounds.push((format!("LVL{g}_{i:03}"), vag));
                }
            }
            for (i, vag) in end.dialogues.iter().enumerate() {
                sounds.push((format!("DLG{i:03}"), vag));
            }
        }
        if sounds.is_empty() {
            continue;
        }
        fs::create_dir_all(&folder).with_context(|| format!("failed to create {}", folder.display()))?;
        for (name, vag) in sounds {
            written += write_vag(&folder, &name, vag)?;
        }
    }
    println!("{written} VAG file(s) written to {}", out.display());
    Ok(())
}

fn cmd_verify(path: &Path, config: &DecodeConfig) -> Result<()> {
    let archive = read_archive(path, config.game)?;
    let results = verify_entries(&archive, config);
    let mut failures = 0;
    for (name, outcome) in &results {
        match outcome {
            Verification::Identical => println!("  ok     {name}"),
            Verification::Differs { offset } => {
                failures += 1;
                println!("  differ {name} (first difference at {offset:#x})");
            }
            Verification::Failed(error) => {
                failures += 1;
                println!("  failed {name}: {error}");
            }
        }
    }
    if failures > 0 {
        bail!("{failures} of {} WAD(s) did not round-trip", results.len());
    }
    println!("{} WAD(s) round-trip", results.len());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let warnings = if cli.ignore_warnings {
        WarningPolicy::Continue
    } else {
        WarningPolicy::Abort
    };
    let config = DecodeConfig::new(cli.game).with_warnings(warnings);
    match &cli.command {
        Command::Slice { archive, out } => cmd_slice(archive, out, cli.game),
        Command::Pack { inputs, out } => cmd_pack(inputs, out, cli.game),
        Command::Info { archive, json } => cmd_info(archive, *json, &config),
        Command::Chunks { archive, entry } => cmd_chunks(archive, entry.as_deref(), &config),
        Command::Textures { archive, out } => cmd_textures(archive, out, &config),
        Command::Audio { archive, out } => cmd_audio(archive, out, &config),
        Command::Verify { archive } => cmd_verify(archive, &config),
    }
}
