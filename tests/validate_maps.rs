use std::path::Path;

use tmxbake::validate::{find_tmx_files, validate_dir, validate_file, IssueKind};
use tmxbake::ValidateOptions;

#[test]
fn missing_tsx_fails_with_one_resolution_error() {
    let report = validate_file(Path::new("tests/maps/missing_tsx.tmx"), &ValidateOptions::default());

    assert!(!report.ok());
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].kind, IssueKind::Resolution);
    assert!(report.errors[0].message.contains("missing.tsx"));
}

#[test]
fn unusual_tile_size_does_not_fail() {
    let report = validate_file(Path::new("tests/maps/odd_tiles.tmx"), &ValidateOptions::default());

    assert!(report.ok(), "{:?}", report.errors);
    let kinds: Vec<_> = report.warnings.iter().map(|w| w.kind).collect();
    assert_eq!(kinds, vec![IssueKind::TileSize, IssueKind::TileSize]);
}

#[test]
fn town_passes_with_required_layers() {
    let options = ValidateOptions{
        required_layers: vec!["Ground".into(), "Entities".into()],
        ..ValidateOptions::default()
    };
    let report = validate_file(Path::new("tests/maps/town.tmx"), &options);

    assert!(report.ok(), "{:?}", report.errors);
    assert_eq!(report.tsx_files.len(), 1);
    assert_eq!(report.images_found.len(), 2);
    assert!(report.layers_found.contains("Sky"));
}

#[test]
fn scan_directory() {
    let files = find_tmx_files(Path::new("tests/maps"), 10).unwrap();
    let names: Vec<_> = files.iter().map(|f| f.file_name().unwrap().to_string_lossy().into_owned()).collect();
    assert_eq!(names, vec!["missing_tsx.tmx", "odd_tiles.tmx", "town.tmx"]);

    assert_eq!(find_tmx_files(Path::new("tests/maps"), 1).unwrap().len(), 1);

    let reports = validate_dir(Path::new("tests/maps"), &ValidateOptions::default()).unwrap();
    let failed = reports.iter().filter(|r| !r.ok()).count();
    assert_eq!((reports.len(), failed), (3, 1));
}
