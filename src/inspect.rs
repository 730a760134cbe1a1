//! Gid range report of a converted map.

use std::collections::BTreeSet;
use std::fmt;

use crate::math::uvec2;
use crate::tileset::tileset_for_gid;
use crate::{Layer, Map};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilesetReport {
    pub index: usize,
    pub name: String,
    pub firstgid: u32,
    pub declared_count: u32,
    /// `imagewidth / tilewidth * imageheight / tileheight`
    pub derived_count: u64,
    /// First gid after the declared range.
    pub end_gid: u32,
    pub image: String,
    pub imagewidth: u32,
    pub imageheight: u32,
    pub problems: Vec<String>,
}

impl fmt::Display for TilesetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (Start: {}, Count: {}, End: {}, Img: {}, W: {}, H: {})",
            self.index, self.name, self.firstgid, self.declared_count, self.end_gid,
            self.image, self.imagewidth, self.imageheight
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct Inspection {
    pub tilesets: Vec<TilesetReport>,
    /// Gids used by tile layers or tile objects that no tileset owns.
    pub unresolved_gids: BTreeSet<u32>,
}

impl Inspection {
    pub fn has_problems(&self) -> bool {
        !self.unresolved_gids.is_empty() || self.tilesets.iter().any(|t| !t.problems.is_empty())
    }
}

pub fn inspect(map: &Map) -> Inspection {
    let mut tilesets: Vec<TilesetReport> = map.tilesets.iter().enumerate().map(|(index, tileset)| {
        let image = uvec2::new(tileset.imagewidth, tileset.imageheight);
        let derived_count = match uvec2::new(tileset.tilewidth, tileset.tileheight) {
            tile if tile.x == 0 || tile.y == 0 => 0,
            tile => (image / tile).area(),
        };
        let mut problems = Vec::new();
        if !tileset.image.is_empty() && derived_count != u64::from(tileset.tilecount) {
            problems.push(format!(
                "declares {} tiles, the {}x{} image holds {}",
                tileset.tilecount, tileset.imagewidth, tileset.imageheight, derived_count
            ));
        }
        TilesetReport{
            index,
            name: tileset.name.clone(),
            firstgid: tileset.firstgid,
            declared_count: tileset.tilecount,
            derived_count,
            end_gid: tileset.end_gid(),
            image: tileset.image.clone(),
            imagewidth: tileset.imagewidth,
            imageheight: tileset.imageheight,
            problems,
        }
    }).collect();

    for i in 1..tilesets.len() {
        let (next_name, next_firstgid) = (tilesets[i].name.clone(), tilesets[i].firstgid);
        let previous = &mut tilesets[i - 1];
        if previous.end_gid > next_firstgid {
            previous.problems.push(format!("range runs into '{}' starting at gid {}", next_name, next_firstgid));
        }
    }

    let mut unresolved_gids = BTreeSet::new();
    let mut check = |gid: u32| {
        if gid != 0 && tileset_for_gid(&map.tilesets, gid).is_none() {
            unresolved_gids.insert(gid);
        }
    };
    for layer in &map.layers {
        match layer {
            Layer::Tile(tiles) => tiles.data.iter().copied().for_each(&mut check),
            Layer::Object(group) => group.objects.iter().filter_map(|o| o.gid).for_each(&mut check),
            Layer::Image(_) => {}
        }
    }

    Inspection{ tilesets, unresolved_gids }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tileset::test::tileset;

    fn map(tilesets: Vec<crate::Tileset>, data: Vec<u32>) -> Map {
        let json = format!(
            r#"{{"type":"map","version":1.0,"tiledversion":"1.10","orientation":"orthogonal","renderorder":"right-down",
                "width":{},"height":1,"tilewidth":32,"tileheight":32,"infinite":false,
                "layers":[{{"type":"tilelayer","id":1,"name":"Ground","opacity":1.0,"visible":true,"x":0,"y":0,
                            "width":{},"height":1,"data":{:?}}}],
                "tilesets":[]}}"#,
            data.len(), data.len(), data
        );
        let mut map = Map::from_json_str(&json).unwrap();
        map.tilesets = tilesets;
        map
    }

    #[test]
    fn test_clean_map() {
        let inspection = inspect(&map(vec![tileset("a", 1, 16), tileset("b", 17, 8)], vec![1, 0, 24]));
        assert!(!inspection.has_problems());
        assert_eq!(inspection.tilesets[1].end_gid, 25);
        assert_eq!(
            inspection.tilesets[1].to_string(),
            "1: b (Start: 17, Count: 8, End: 25, Img: b.png, W: 256, H: 32)"
        );
    }

    #[test]
    fn test_count_mismatch_and_overlap() {
        let mut a = tileset("a", 1, 16);
        a.tilecount = 20;
        let inspection = inspect(&map(vec![a, tileset("b", 17, 8)], vec![]));
        assert_eq!(inspection.tilesets[0].derived_count, 16);
        assert_eq!(inspection.tilesets[0].problems.len(), 2);
        assert!(inspection.tilesets[1].problems.is_empty());
    }

    #[test]
    fn test_unresolved_gids() {
        let inspection = inspect(&map(vec![tileset("a", 1, 16)], vec![1, 17, 0, 17 | crate::GID_HORIZONTAL_FLIP_FLAG, 3]));
        assert_eq!(inspection.unresolved_gids.into_iter().collect::<Vec<_>>(), vec![17, 17 | crate::GID_HORIZONTAL_FLIP_FLAG]);
    }
}
