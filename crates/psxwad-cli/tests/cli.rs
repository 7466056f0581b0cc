use std::path::Path;
use std::process::{Command, Output};

fn psxwad(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_psxwad"))
        .args(args)
        .output()
        .expect("failed to run psxwad")
}

fn path(p: &Path) -> &str {
    p.to_str().unwrap()
}

#[test]
fn pack_then_slice_restores_files() {
    let tmp = tempfile::tempdir().unwrap();
    let files = tmp.path().join("files");
    std::fs::create_dir(&files).unwrap();
    std::fs::write(files.join("A.WAD"), [1u8; 10]).unwrap();
    std::fs::write(files.join("B.IMG"), [2u8; 3000]).unwrap();
    std::fs::write(files.join("C.DEM"), [3u8; 2048]).unwrap();

    let packed = tmp.path().join("packed");
    let output = psxwad(&["--game", "hp1", "pack", path(&files), "-o", path(&packed)]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(std::fs::read(packed.join("POTTER.DIR")).unwrap().len(), 4 + 3 * 20);
    assert_eq!(std::fs::read(packed.join("POTTER.DAT")).unwrap().len(), 8192);

    let sliced = tmp.path().join("sliced");
    let output = psxwad(&["--game", "hp1", "slice", path(&packed), "-o", path(&sliced)]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    for name in ["A.WAD", "B.IMG", "C.DEM"] {
        assert_eq!(
            std::fs::read(sliced.join(name)).unwrap(),
            std::fs::read(files.join(name)).unwrap()
        );
    }
}

#[test]
fn info_reports_each_entry_as_json() {
    let tmp = tempfile::tempdir().unwrap();
    let files = tmp.path().join("files");
    std::fs::create_dir(&files).unwrap();
    std::fs::write(files.join("BROKEN.WAD"), b"\x08\0\0\0FESOUND!").unwrap();
    std::fs::write(files.join("LOAD.IMG"), [0u8; 16]).unwrap();
    let packed = tmp.path().join("packed");
    assert!(psxwad(&["-g", "croc2", "pack", path(&files), "-o", path(&packed)])
        .status
        .success());

    let output = psxwad(&["-g", "croc2", "info", "--json", path(&packed)]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let entries = report.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["name"], "BROKEN.WAD");
    assert!(entries[0]["error"].as_str().unwrap().contains("FESO"));
    assert_eq!(entries[1]["kind"], "Img");
    assert!(entries[1].get("error").is_none());

    let output = psxwad(&["-g", "croc2", "verify", path(&packed)]);
    assert!(!output.status.success());
}

#[test]
fn unknown_game_is_rejected() {
    let output = psxwad(&["--game", "croc3", "info", "."]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("croc2-demo-dummy"));
}
