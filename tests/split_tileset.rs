use std::path::Path;

use image::{GenericImageView, Rgba, RgbaImage};
use tmxbake::partition::{split_map_file, split_map_files};
use tmxbake::{Error, Map, PartitionOptions};

/// A map with a 64x160 atlas of 16px tiles (40 tiles) followed by a small tileset.
fn write_map(dir: &Path, next_firstgid: u32) -> std::path::PathBuf {
    let mut atlas = RgbaImage::new(64, 160);
    atlas.put_pixel(0, 70, Rgba([255, 0, 0, 255]));
    std::fs::create_dir_all(dir.join("img")).unwrap();
    atlas.save(dir.join("img/atlas.png")).unwrap();

    let json = format!(r#"{{
        "type": "map", "version": 1.0, "tiledversion": "1.10.2",
        "orientation": "orthogonal", "renderorder": "right-down",
        "width": 2, "height": 1, "tilewidth": 16, "tileheight": 16, "infinite": false,
        "layers": [
            {{"type": "tilelayer", "id": 1, "name": "Ground", "opacity": 1.0, "visible": true,
              "x": 0, "y": 0, "width": 2, "height": 1, "data": [1, 40]}}
        ],
        "tilesets": [
            {{"firstgid": 1, "name": "atlas", "tilewidth": 16, "tileheight": 16, "spacing": 0, "margin": 0,
              "image": "img/atlas.png", "imagewidth": 64, "imageheight": 160, "tilecount": 40, "columns": 4}},
            {{"firstgid": {}, "name": "small", "tilewidth": 16, "tileheight": 16, "spacing": 0, "margin": 0,
              "image": "img/small.png", "imagewidth": 32, "imageheight": 16, "tilecount": 2, "columns": 2}}
        ]
    }}"#, next_firstgid);

    let path = dir.join("map.json");
    std::fs::write(&path, json).unwrap();
    path
}

fn options(max_chunk_height: u32) -> PartitionOptions {
    PartitionOptions{ max_chunk_height, target: None }
}

#[test]
fn split_oversized_atlas() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_map(dir.path(), 41);
    let output = dir.path().join("map_split.json");

    let report = split_map_file(&input, &output, &options(64)).unwrap();
    assert_eq!(report.tileset.as_deref(), Some("atlas"));
    let counts: Vec<_> = report.chunks.iter().map(|c| c.tile_count).collect();
    assert_eq!(counts, vec![16, 16, 8]);

    let map = Map::from_json_file(&output).unwrap();
    let tilesets: Vec<_> = map.tilesets.iter().map(|t| (t.name.as_str(), t.firstgid, t.tilecount)).collect();
    assert_eq!(tilesets, vec![("atlas_0", 1, 16), ("atlas_1", 17, 16), ("atlas_2", 33, 8), ("small", 41, 2)]);
    assert_eq!(map.tilesets[2].image, "img/atlas_2.png");
    assert_eq!(map.tilesets[2].imageheight, 32);

    let chunk = image::open(dir.path().join("img/atlas_1.png")).unwrap();
    assert_eq!(chunk.dimensions(), (64, 64));
    assert_eq!(chunk.get_pixel(0, 6), Rgba([255, 0, 0, 255]));
    assert_eq!(image::image_dimensions(dir.path().join("img/atlas_2.png")).unwrap(), (64, 32));

    // the input map is left untouched
    assert_eq!(Map::from_json_file(&input).unwrap().tilesets.len(), 2);
}

#[test]
fn collision_with_next_tileset_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_map(dir.path(), 30);
    let output = dir.path().join("map_split.json");

    let result = split_map_file(&input, &output, &options(64));
    assert!(matches!(result, Err(Error::GidContiguity{ end: 41, next_firstgid: 30, .. })));
    assert!(!output.exists());
    assert!(!dir.path().join("img/atlas_0.png").exists());
}

#[test]
fn misaligned_chunk_height() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_map(dir.path(), 41);

    let result = split_map_file(&input, &dir.path().join("out.json"), &options(40));
    assert!(matches!(result, Err(Error::MisalignedChunk{ index: 0, height: 40, tile_height: 16 })));
}

#[test]
fn nothing_to_split() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_map(dir.path(), 41);
    let output = dir.path().join("same.json");

    let report = split_map_file(&input, &output, &options(4096)).unwrap();
    assert!(report.tileset.is_none());
    assert_eq!(Map::from_json_file(&output).unwrap(), Map::from_json_file(&input).unwrap());
}

#[test]
fn batch_continues_after_failed_map() {
    let dir = tempfile::tempdir().unwrap();
    let broken = write_map(&dir.path().join("broken"), 30);
    let good = write_map(&dir.path().join("good"), 41);
    let missing = dir.path().join("missing/map.json");

    let jobs = vec![
        (broken.clone(), broken.clone()),
        (missing.clone(), missing.clone()),
        (good.clone(), good.clone()),
    ];
    let batch = split_map_files(&jobs, &options(64));
    assert_eq!((batch.succeeded(), batch.failed()), (1, 2));

    let outcomes: Vec<_> = batch.results.iter().map(|(path, result)| (path.clone(), result.is_ok())).collect();
    assert_eq!(outcomes, vec![(broken.clone(), false), (missing, false), (good.clone(), true)]);
    assert!(matches!(batch.results[0].1, Err(Error::GidContiguity{ .. })));

    // the good map was rewritten in place, the broken one was left alone
    assert_eq!(Map::from_json_file(&good).unwrap().tilesets.len(), 4);
    assert_eq!(Map::from_json_file(&broken).unwrap().tilesets.len(), 2);
}
