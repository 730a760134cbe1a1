//! Splitting of atlas images that are too tall for the engine.
//!
//! A tileset whose image exceeds the maximum texture height is cut into
//! horizontal chunks. Each chunk becomes a tileset of its own with a png of
//! its own, and the chunks take over the gid range of the original tileset
//! without moving any other tileset:
//!
//! ```text
//! terrain     firstgid 5, 3000 tiles, 256x12000
//!   => terrain_0  firstgid 5,    1024 tiles, 256x4096
//!      terrain_1  firstgid 1029, 1024 tiles, 256x4096
//!      terrain_2  firstgid 2053,  952 tiles, 256x3808
//! ```

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::GenericImageView;

use crate::math::{uvec2, Rect};
use crate::resource_manager::{clean_path, to_slash, write_atomic};
use crate::tileset::TileMeta;
use crate::{Diagnostics, Error, Map, PartitionOptions, Result, Tileset};

/// One horizontal slice of an atlas image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    /// Pixel region of the source image.
    pub region: Rect,
    pub rows: u32,
    pub tile_count: u32,
    pub firstgid: u32,
}

impl Chunk {
    pub fn end_gid(&self) -> u32 {
        self.firstgid.saturating_add(self.tile_count)
    }
}

/// Plan the chunks of `tileset`, given the actual size of its image.
pub fn plan_chunks(tileset: &Tileset, image_width: u32, image_height: u32, max_height: u32) -> Result<Vec<Chunk>> {
    if max_height == 0 || tileset.tilewidth == 0 || tileset.tileheight == 0 {
        return Err(Error::StructureError{
            tag: format!("tileset '{}'", tileset.name),
            msg: format!(
                "Cannot split with chunk height {} and tile size {}x{}",
                max_height, tileset.tilewidth, tileset.tileheight
            ),
        });
    }
    if tileset.margin != 0 || tileset.spacing != 0 {
        return Err(Error::UnsupportedFeature(format!(
            "Splitting tileset '{}' with margin or spacing", tileset.name
        )));
    }

    let columns = image_width / tileset.tilewidth;
    let overflow = |what: String| Error::StructureError{
        tag: format!("tileset '{}'", tileset.name),
        msg: format!("{} does not fit into 32 bits", what),
    };

    let mut chunks: Vec<Chunk> = Vec::with_capacity(image_height.div_ceil(max_height) as usize);
    let mut firstgid = tileset.firstgid;
    let mut top = 0;
    while top < image_height {
        let index = chunks.len();
        let height = max_height.min(image_height - top);
        if height % tileset.tileheight != 0 {
            return Err(Error::MisalignedChunk{ index, height, tile_height: tileset.tileheight });
        }

        let rows = height / tileset.tileheight;
        let tile_count = u32::try_from(uvec2::new(columns, rows).area())
            .map_err(|_| overflow(format!("tile count of chunk {}", index)))?;
        let chunk = Chunk{
            index,
            region: Rect::new(uvec2::new(0, top), uvec2::new(image_width, height)),
            rows,
            tile_count,
            firstgid,
        };
        firstgid = firstgid.checked_add(tile_count)
            .ok_or_else(|| overflow(format!("gid range of chunk {}", index)))?;
        top = chunk.region.bottom();
        chunks.push(chunk);
    }

    let total: u64 = chunks.iter().map(|c| u64::from(c.tile_count)).sum();
    if total != u64::from(tileset.tilecount) {
        return Err(Error::TileCountMismatch{
            tileset: tileset.name.clone(),
            expected: tileset.tilecount,
            actual: total,
        });
    }

    Ok(chunks)
}

/// Base name of the chunk images, the file stem of the original image.
fn image_stem(tileset: &Tileset) -> String {
    Path::new(&tileset.image)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| tileset.name.clone())
}

/// Image path of a chunk, next to the original image.
pub fn chunk_image_path(tileset: &Tileset, index: usize) -> String {
    let file_name = format!("{}_{}.png", image_stem(tileset), index);
    match clean_path(&tileset.image).parent() {
        Some(dir) => to_slash(&dir.join(file_name)),
        None => file_name,
    }
}

/// Tile metadata of the tiles inside `chunk`, renumbered to chunk local ids.
fn chunk_tiles(original: &Tileset, chunk: &Chunk, diagnostics: &mut Diagnostics) -> BTreeMap<u32, TileMeta> {
    let offset = chunk.firstgid - original.firstgid;
    let local = offset..offset + chunk.tile_count;

    let mut tiles = BTreeMap::new();
    for meta in original.tiles.values().filter(|meta| local.contains(&meta.id)) {
        let mut meta = meta.clone();
        meta.id -= offset;
        let frames = meta.animation.len();
        meta.animation.retain(|frame| local.contains(&frame.tileid));
        if meta.animation.len() != frames {
            diagnostics.warn(
                format!("tileset '{}'", original.name),
                format!("animation of tile {} crosses a chunk border, dropping {} frames", meta.id + offset, frames - meta.animation.len()),
            );
        }
        for frame in &mut meta.animation {
            frame.tileid -= offset;
        }
        tiles.insert(meta.id, meta);
    }
    tiles
}

/// Build a new tileset list with the tileset at `index` replaced by `chunks`.
///
/// Tilesets after the replaced one keep their firstgid. If the chunks would run
/// into the next tileset this fails with [GidContiguity](Error::GidContiguity).
pub fn split_tilesets(
    tilesets: &[Tileset],
    index: usize,
    chunks: &[Chunk],
    diagnostics: &mut Diagnostics,
) -> Result<Vec<Tileset>> {
    let original = tilesets.get(index).ok_or_else(|| Error::StructureError{
        tag: "tilesets".into(),
        msg: format!("No tileset at index {}", index),
    })?;
    let end = chunks.last().map_or(original.firstgid, Chunk::end_gid);

    if let Some(next) = tilesets.get(index + 1) {
        if next.firstgid < end {
            return Err(Error::GidContiguity{
                tileset: original.name.clone(),
                end,
                next: next.name.clone(),
                next_firstgid: next.firstgid,
            });
        }
    }

    let mut result = Vec::with_capacity(tilesets.len() + chunks.len());
    result.extend_from_slice(&tilesets[..index]);
    for chunk in chunks {
        result.push(Tileset{
            firstgid: chunk.firstgid,
            name: format!("{}_{}", image_stem(original), chunk.index),
            image: chunk_image_path(original, chunk.index),
            imagewidth: chunk.region.size.x,
            imageheight: chunk.region.size.y,
            tilecount: chunk.tile_count,
            columns: chunk.region.size.x / original.tilewidth,
            tiles: chunk_tiles(original, chunk, diagnostics),
            source: None,
            ..original.clone()
        });
    }
    result.extend_from_slice(&tilesets[index + 1..]);
    Ok(result)
}

/// Tileset to split: the one matching the configured target,
/// otherwise the first one taller than the chunk height.
pub fn select_target(tilesets: &[Tileset], options: &PartitionOptions) -> Result<Option<usize>> {
    match &options.target {
        Some(pattern) => tilesets
            .iter()
            .position(|t| t.name.contains(pattern.as_str()) || t.image.contains(pattern.as_str()))
            .map(Some)
            .ok_or_else(|| Error::StructureError{
                tag: "tilesets".into(),
                msg: format!("No tileset matches '{}'", pattern),
            }),
        None => Ok(tilesets.iter().position(|t| t.imageheight > options.max_chunk_height)),
    }
}

/// Outcome of splitting one map.
#[derive(Debug)]
pub struct SplitReport {
    /// Name of the tileset that was split, if any was.
    pub tileset: Option<String>,
    pub chunks: Vec<Chunk>,
    /// Chunk images that were written.
    pub images: Vec<PathBuf>,
    pub diagnostics: Diagnostics,
}

/// Split the oversized tileset of the json map at `map_path` and write the
/// updated map to `output`. Chunk images are written next to the source image.
pub fn split_map_file(map_path: &Path, output: &Path, options: &PartitionOptions) -> Result<SplitReport> {
    log::info!("Loading map {}", map_path.display());
    let mut map = Map::from_json_file(map_path)?;
    let map_dir = map_path.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut diagnostics = Diagnostics::new();

    let index = match select_target(&map.tilesets, options)? {
        Some(index) => index,
        None => {
            log::info!("No tileset is taller than {}px, nothing to split", options.max_chunk_height);
            map.write_json(output)?;
            return Ok(SplitReport{ tileset: None, chunks: Vec::new(), images: Vec::new(), diagnostics });
        }
    };
    let tileset = &map.tilesets[index];
    log::info!("Splitting tileset '{}'", tileset.name);

    let image_path = map_dir.join(clean_path(&tileset.image));
    let image = image::open(&image_path)?;
    let (width, height) = image.dimensions();
    if (width, height) != (tileset.imagewidth, tileset.imageheight) {
        diagnostics.warn(
            format!("tileset '{}'", tileset.name),
            format!(
                "image is {}x{}, the tileset declares {}x{}, using the image size",
                width, height, tileset.imagewidth, tileset.imageheight
            ),
        );
    }

    let chunks = plan_chunks(tileset, width, height, options.max_chunk_height)?;
    log::info!("Splitting {}x{} into {} chunks of height {}", width, height, chunks.len(), options.max_chunk_height);

    let tilesets = split_tilesets(&map.tilesets, index, &chunks, &mut diagnostics)?;

    let mut images = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
        let Rect{ upper_left, size } = chunk.region;
        let cropped = image.crop_imm(upper_left.x, upper_left.y, size.x, size.y);

        let mut png = Cursor::new(Vec::new());
        cropped.write_to(&mut png, image::ImageOutputFormat::Png)?;

        let path = map_dir.join(clean_path(&tilesets[index + chunk.index].image));
        write_atomic(&path, png.get_ref())?;
        log::debug!("Saved chunk {} ({}x{}) to {}", chunk.index, size.x, size.y, path.display());
        images.push(path);
    }

    let name = tileset.name.clone();
    map.tilesets = tilesets;
    map.write_json(output)?;

    Ok(SplitReport{ tileset: Some(name), chunks, images, diagnostics })
}

/// Outcome of splitting several maps, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: Vec<(PathBuf, Result<SplitReport>)>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|(_, result)| result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// Split each `(input, output)` pair with [split_map_file].
/// A map that fails is recorded and the next one is still processed.
pub fn split_map_files(jobs: &[(PathBuf, PathBuf)], options: &PartitionOptions) -> BatchReport {
    let mut report = BatchReport::default();
    for (input, output) in jobs {
        let result = split_map_file(input, output, options);
        if let Err(e) = &result {
            log::error!("Failed to split {}: {}", input.display(), e);
        }
        report.results.push((input.clone(), result));
    }
    log::info!("Split {} map(s), {} failed", report.results.len(), report.failed());
    report
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tileset::test::tileset;
    use crate::tileset::Frame;

    fn atlas(firstgid: u32, height: u32) -> Tileset {
        let mut atlas = tileset("terrain", firstgid, 8 * (height / 32));
        atlas.image = "img/terrain-map-v8.png".into();
        atlas.imageheight = height;
        atlas
    }

    #[test]
    fn test_three_chunks() -> Result<()> {
        let original = atlas(5, 12000);
        let chunks = plan_chunks(&original, 256, 12000, 4096)?;

        let heights: Vec<_> = chunks.iter().map(|c| c.region.size.y).collect();
        let rows: Vec<_> = chunks.iter().map(|c| c.rows).collect();
        let firstgids: Vec<_> = chunks.iter().map(|c| c.firstgid).collect();
        assert_eq!(heights, vec![4096, 4096, 3808]);
        assert_eq!(rows, vec![128, 128, 119]);
        assert_eq!(firstgids, vec![5, 1029, 2053]);
        assert_eq!(chunks.iter().map(|c| c.tile_count).sum::<u32>(), original.tilecount);
        assert_eq!(chunks[2].region.upper_left.y, 8192);
        Ok(())
    }

    #[test]
    fn test_gid_range_overflow() {
        let result = plan_chunks(&atlas(u32::MAX - 10, 512), 256, 512, 256);
        assert!(matches!(result, Err(Error::StructureError{ .. })));
    }

    #[test]
    fn test_single_chunk() -> Result<()> {
        let chunks = plan_chunks(&atlas(1, 512), 256, 512, 4096)?;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].tile_count, 128);
        Ok(())
    }

    #[test]
    fn test_misaligned_chunk() {
        let mut original = atlas(1, 96);
        original.tilecount = 24;
        assert!(matches!(
            plan_chunks(&original, 256, 100, 64),
            Err(Error::MisalignedChunk{ index: 1, height: 36, tile_height: 32 })
        ));
    }

    #[test]
    fn test_tile_count_mismatch() {
        // tsx claims fewer tiles than the image holds
        let mut original = atlas(1, 12000);
        original.tilecount = 2048;
        assert!(matches!(
            plan_chunks(&original, 256, 12000, 4096),
            Err(Error::TileCountMismatch{ expected: 2048, actual: 3000, .. })
        ));
    }

    #[test]
    fn test_split_keeps_neighbours() -> Result<()> {
        let tilesets = vec![tileset("a", 1, 4), atlas(5, 12000), tileset("c", 3005, 16)];
        let chunks = plan_chunks(&tilesets[1], 256, 12000, 4096)?;
        let split = split_tilesets(&tilesets, 1, &chunks, &mut Diagnostics::new())?;

        let names: Vec<_> = split.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "terrain-map-v8_0", "terrain-map-v8_1", "terrain-map-v8_2", "c"]);
        assert_eq!(split[2].image, "img/terrain-map-v8_1.png");
        assert_eq!(split[3].imageheight, 3808);
        assert_eq!(split[4].firstgid, 3005);
        for pair in split.windows(2) {
            assert!(pair[0].end_gid() <= pair[1].firstgid);
        }
        // the input list is left alone
        assert_eq!(tilesets[1].name, "terrain");
        Ok(())
    }

    #[test]
    fn test_split_collides_with_next() -> Result<()> {
        let tilesets = vec![atlas(1, 12000), tileset("c", 2000, 16)];
        let chunks = plan_chunks(&tilesets[0], 256, 12000, 4096)?;
        assert!(matches!(
            split_tilesets(&tilesets, 0, &chunks, &mut Diagnostics::new()),
            Err(Error::GidContiguity{ end: 3001, next_firstgid: 2000, .. })
        ));
        Ok(())
    }

    #[test]
    fn test_tile_metadata_follows_chunk() -> Result<()> {
        let mut original = atlas(1, 12000);
        let mut meta = TileMeta{ id: 1030, animation: Vec::new(), properties: Default::default() };
        meta.animation = vec![Frame{ tileid: 1030, duration: 100 }, Frame{ tileid: 10, duration: 100 }];
        original.tiles.insert(1030, meta);

        let chunks = plan_chunks(&original, 256, 12000, 4096)?;
        let mut diagnostics = Diagnostics::new();
        let split = split_tilesets(&[original], 0, &chunks, &mut diagnostics)?;

        assert!(split[0].tiles.is_empty());
        let moved = &split[1].tiles[&6];
        assert_eq!(moved.animation, vec![Frame{ tileid: 6, duration: 100 }]);
        assert_eq!(diagnostics.warnings().count(), 1);
        Ok(())
    }

    #[test]
    fn test_select_target() -> Result<()> {
        let tilesets = vec![tileset("a", 1, 4), atlas(5, 12000)];
        assert_eq!(select_target(&tilesets, &PartitionOptions::default())?, Some(1));

        let options = PartitionOptions{ target: Some("a.png".into()), ..PartitionOptions::default() };
        assert_eq!(select_target(&tilesets, &options)?, Some(0));

        let options = PartitionOptions{ target: Some("castle".into()), ..PartitionOptions::default() };
        assert!(select_target(&tilesets, &options).is_err());

        assert_eq!(select_target(&tilesets[..1], &PartitionOptions::default())?, None);
        Ok(())
    }
}
