use serde::{Deserialize, Serialize};

use crate::{Direction, Position, map::Grid};

/// Static type of a cell in the kitchen layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tile {
    Floor,
    /// Counter (`#`). Items can be placed on it; agents cannot walk over it.
    Counter,
    OnionDispenser,
    TomatoDispenser,
    BowlRack,
    Pot,
    ServingStation,
    Garbage,
    /// Spawn markers `A` and `B`. Walkable floor during simulation.
    Spawn1,
    Spawn2,
}

impl Tile {
    pub fn from_char(c: char) -> Option<Tile> {
        Some(match c {
            ' ' => Tile::Floor,
            '#' => Tile::Counter,
            'I' => Tile::OnionDispenser,
            'J' => Tile::TomatoDispenser,
            'R' => Tile::BowlRack,
            'P' => Tile::Pot,
            'S' => Tile::ServingStation,
            'G' => Tile::Garbage,
            'A' => Tile::Spawn1,
            'B' => Tile::Spawn2,
            _ => return None,
        })
    }

    pub fn to_char(self) -> char {
        match self {
            Tile::Floor => ' ',
            Tile::Counter => '#',
            Tile::OnionDispenser => 'I',
            Tile::TomatoDispenser => 'J',
            Tile::BowlRack => 'R',
            Tile::Pot => 'P',
            Tile::ServingStation => 'S',
            Tile::Garbage => 'G',
            Tile::Spawn1 => 'A',
            Tile::Spawn2 => 'B',
        }
    }

    #[inline]
    pub fn is_walkable(self) -> bool {
        matches!(self, Tile::Floor | Tile::Spawn1 | Tile::Spawn2)
    }
}

/// Errors produced while parsing a level layout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LevelError {
    #[error("Level layout is empty")]
    Empty,
    #[error("Level has zero width")]
    ZeroWidth,
    #[error("Inconsistent width at row {row}: expected {expected}, found {found}")]
    NotRectangular {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Unknown tile code '{code}' at position ({x}, {y})")]
    UnknownTile { code: char, x: usize, y: usize },
    #[error("Required tile '{0}' not found in level")]
    MissingTile(char),
    #[error("Tile '{code}' must appear exactly once, found {count}")]
    DuplicateTile { code: char, count: usize },
    #[error("Unknown level preset '{0}'")]
    UnknownPreset(String),
}

/// Tiles that must appear exactly once in every level.
const UNIQUE_TILES: [Tile; 5] = [
    Tile::Pot,
    Tile::ServingStation,
    Tile::BowlRack,
    Tile::Spawn1,
    Tile::Spawn2,
];

/// Named level presets.
pub const PRESET_NAMES: [&str; 3] = ["level_1", "level_2", "level_3"];

// The Bottleneck: a horizontal counter with a single gap both agents must share.
const LEVEL_1: [&str; 8] = [
    "#####S#####",
    "I         J",
    "#         #",
    "# A     B #",
    "##### #####",
    "#         #",
    "#         #",
    "##P##G##R##",
];

// The Partition: a vertical counter splits the kitchen, items are passed across it.
const LEVEL_2: [&str; 8] = [
    "###S#######",
    "#    #    #",
    "#    #    #",
    "#    #    P",
    "I    #    #",
    "# B  #  A #",
    "#    #    G",
    "##R#####J##",
];

// The Obstacle Course: pot and rack stand as pillars in an open room.
const LEVEL_3: [&str; 8] = [
    "#####S#####",
    "I         #",
    "#         #",
    "#    P    #",
    "#    #    #",
    "# A  R  B #",
    "#         J",
    "#####G#####",
];

/// An immutable, validated kitchen layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    tiles: Grid<Tile>,
}

impl Level {
    /// Parses a layout given as equal-length rows of tile codes.
    pub fn parse<S: AsRef<str>>(rows: &[S]) -> Result<Level, LevelError> {
        if rows.is_empty() {
            return Err(LevelError::Empty);
        }

        let parsed: Vec<Vec<char>> = rows.iter().map(|row| row.as_ref().chars().collect()).collect();
        let width = parsed[0].len();
        if width == 0 {
            return Err(LevelError::ZeroWidth);
        }
        let mut decoded = Vec::with_capacity(parsed.len());
        for (y, row) in parsed.iter().enumerate() {
            if row.len() != width {
                return Err(LevelError::NotRectangular {
                    row: y,
                    expected: width,
                    found: row.len(),
                });
            }
            let tiles = row
                .iter()
                .enumerate()
                .map(|(x, code)| {
                    Tile::from_char(*code).ok_or(LevelError::UnknownTile { code: *code, x, y })
                })
                .collect::<Result<Vec<_>, _>>()?;
            decoded.push(tiles);
        }

        let tiles = Grid::from_generator(width, decoded.len(), |p| decoded[p.y][p.x]);
        let level = Level { tiles };

        for tile in UNIQUE_TILES {
            match level.tiles.iter().filter(|t| **t == tile).count() {
                0 => return Err(LevelError::MissingTile(tile.to_char())),
                1 => {}
                count => {
                    return Err(LevelError::DuplicateTile {
                        code: tile.to_char(),
                        count,
                    });
                }
            }
        }

        Ok(level)
    }

    /// Parses a layout from a newline separated string. Trailing newlines are ignored.
    pub fn parse_str(layout: &str) -> Result<Level, LevelError> {
        let rows: Vec<&str> = layout.trim_end_matches('\n').lines().collect();
        Self::parse(&rows)
    }

    /// Loads one of the built-in layouts by name.
    pub fn preset(name: &str) -> Result<Level, LevelError> {
        match name {
            "level_1" => Self::parse(&LEVEL_1),
            "level_2" => Self::parse(&LEVEL_2),
            "level_3" => Self::parse(&LEVEL_3),
            other => Err(LevelError::UnknownPreset(other.to_string())),
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.tiles.width()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.tiles.height()
    }

    pub fn tiles(&self) -> &Grid<Tile> {
        &self.tiles
    }

    pub fn tile_at(&self, position: Position) -> Option<Tile> {
        self.tiles.get(position).copied()
    }

    /// True iff the position is inside the grid and on floor or a spawn marker.
    pub fn is_walkable(&self, position: Position) -> bool {
        self.tile_at(position).is_some_and(Tile::is_walkable)
    }

    /// Returns the first occurrence of `tile` in row-major order.
    pub fn find_first(&self, tile: Tile) -> Option<Position> {
        self.tiles
            .enumerate()
            .find_map(|(position, t)| (*t == tile).then_some(position))
    }

    /// The tile an agent at `position` facing `direction` interacts with,
    /// or `None` past the grid edge.
    pub fn in_front(&self, position: Position, direction: Direction) -> Option<(Tile, Position)> {
        let front = self.tiles.neighbor(position, direction)?;
        Some((self.tiles[front], front))
    }

    /// Rows of tile codes, the inverse of [`Level::parse`].
    pub fn rows(&self) -> Vec<String> {
        (0..self.height())
            .map(|y| {
                (0..self.width())
                    .map(|x| self.tiles[Position { x, y }].to_char())
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_parse() {
        for name in PRESET_NAMES {
            let level = Level::preset(name).unwrap();
            assert_eq!(level.width(), 11);
            assert_eq!(level.height(), 8);
        }
        assert!(matches!(
            Level::preset("level_9"),
            Err(LevelError::UnknownPreset(_))
        ));
    }

    #[test]
    fn walkability() {
        let level = Level::preset("level_2").unwrap();
        assert!(!level.is_walkable(Position::new(0, 0)));
        assert!(level.is_walkable(Position::new(1, 1)));
        // spawn markers are floor
        assert!(level.is_walkable(Position::new(2, 5)));
        assert!(level.is_walkable(Position::new(8, 5)));
        // stations block movement
        assert!(!level.is_walkable(Position::new(10, 3)));
        assert!(!level.is_walkable(Position::new(40, 3)));
    }

    #[test]
    fn find_stations() {
        let level = Level::preset("level_3").unwrap();
        assert_eq!(level.find_first(Tile::Pot), Some(Position::new(5, 3)));
        assert_eq!(level.find_first(Tile::BowlRack), Some(Position::new(5, 5)));
        assert_eq!(level.find_first(Tile::ServingStation), Some(Position::new(5, 0)));
        assert_eq!(level.find_first(Tile::OnionDispenser), Some(Position::new(0, 1)));
        assert_eq!(level.find_first(Tile::TomatoDispenser), Some(Position::new(10, 6)));
        assert_eq!(level.find_first(Tile::Garbage), Some(Position::new(5, 7)));
        assert_eq!(level.find_first(Tile::Spawn1), Some(Position::new(2, 5)));
    }

    #[test]
    fn in_front_stops_at_edge() {
        let level = Level::preset("level_3").unwrap();
        assert_eq!(
            level.in_front(Position::new(1, 1), Direction::Left),
            Some((Tile::OnionDispenser, Position::new(0, 1)))
        );
        assert_eq!(level.in_front(Position::new(0, 1), Direction::Left), None);
        assert_eq!(level.in_front(Position::new(3, 7), Direction::Down), None);
    }

    #[test]
    fn rejects_non_rectangular() {
        let err = Level::parse(&["#P#", "#S", "RAB"]).unwrap_err();
        assert_eq!(
            err,
            LevelError::NotRectangular {
                row: 1,
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn rejects_missing_and_duplicate_stations() {
        assert_eq!(
            Level::parse(&["#S#", "RAB"]).unwrap_err(),
            LevelError::MissingTile('P')
        );
        assert_eq!(
            Level::parse(&["PPS", "RAB"]).unwrap_err(),
            LevelError::DuplicateTile { code: 'P', count: 2 }
        );
        assert_eq!(
            Level::parse(&["PS?", "RAB"]).unwrap_err(),
            LevelError::UnknownTile { code: '?', x: 2, y: 0 }
        );
    }

    #[test]
    fn rows_round_trip() {
        let level = Level::preset("level_1").unwrap();
        let reparsed = Level::parse(&level.rows()).unwrap();
        assert_eq!(level, reparsed);
        assert_eq!(Level::parse_str(&level.rows().join("\n")).unwrap(), level);
    }

    #[test]
    fn every_cell_keeps_its_code() {
        let level = Level::parse(&["#PSI", "RA B", "GJ #"]).unwrap();
        let expected = [
            (0, 0, Tile::Counter),
            (1, 0, Tile::Pot),
            (2, 0, Tile::ServingStation),
            (3, 0, Tile::OnionDispenser),
            (0, 1, Tile::BowlRack),
            (1, 1, Tile::Spawn1),
            (2, 1, Tile::Floor),
            (3, 1, Tile::Spawn2),
            (0, 2, Tile::Garbage),
            (1, 2, Tile::TomatoDispenser),
            (2, 2, Tile::Floor),
            (3, 2, Tile::Counter),
        ];
        for (x, y, tile) in expected {
            assert_eq!(level.tile_at(Position::new(x, y)), Some(tile), "({x}, {y})");
        }
    }
}
