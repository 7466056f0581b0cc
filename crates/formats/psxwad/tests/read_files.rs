use std::path::PathBuf;

use psxwad::batch::{verify_entries, Verification};
use psxwad::{Archive, DecodeConfig, EntryKind, Game};

/// Game discs are not redistributable; point `PSXWAD_GAME_DIR` at a folder
/// holding one sub-folder per game slug (`croc2/CROCII.DAT`, `hp1/POTTER.DAT`).
fn load_if_exists(game: Game) -> Option<Archive> {
    let root = PathBuf::from(std::env::var_os("PSXWAD_GAME_DIR")?);
    let folder = root.join(game.info().slug);
    if !folder.join(game.info().dat_file).is_file() {
        return None;
    }
    Some(Archive::read(&folder, game).expect("failed to read archive"))
}

#[test]
fn archives_repack_identically() {
    for game in Game::ALL {
        let Some(archive) = load_if_exists(game) else {
            eprintln!("skipping: {game} not found");
            continue;
        };
        let encoded = archive.encode(game).unwrap();
        assert_eq!(encoded.dat.len(), archive.dat_size());
        let again = Archive::decode(encoded.dir.as_deref(), &encoded.dat, game).unwrap();
        assert_eq!(again, archive);
    }
}

#[test]
fn level_wads_decode_and_reencode() {
    for game in Game::ALL.into_iter().filter(|g| g.is_parsable()) {
        let Some(archive) = load_if_exists(game) else {
            eprintln!("skipping: {game} not found");
            continue;
        };
        let n_wads = archive
            .entries
            .iter()
            .filter(|e| e.kind() == EntryKind::Wad)
            .count();
        let results = verify_entries(&archive, &DecodeConfig::new(game));
        assert_eq!(results.len(), n_wads);
        for (name, outcome) in results {
            assert_eq!(outcome, Verification::Identical, "{game}: {name}");
        }
    }
}

#[test]
fn harry_potter_levels_have_chunk_grids() {
    let Some(archive) = load_if_exists(Game::HarryPotter1) else {
        eprintln!("skipping: Harry Potter 1 not found");
        return;
    };
    let config = DecodeConfig::new(Game::HarryPotter1);
    let level = archive
        .entries
        .iter()
        .filter(|e| e.kind() == EntryKind::Wad)
        .filter_map(|e| e.decode_wad(&config).ok())
        .find(|wad| wad.dpsx().is_some())
        .expect("no level with geometry");
    let summary = level.summary();
    let (rows, columns) = summary.chunk_grid.unwrap();
    assert!(rows > 0 && columns > 0);
    assert!(summary.n_filled_chunks.unwrap() > 0);
}
