//! Reachability analysis over the walkable tiles of a level.
//!
//! Component labels drive handoff-counter detection during play; distance maps
//! feed the observation features. Everything here is a pure function of the
//! level, so the results are identical across resets of the same layout.

use std::collections::{BTreeSet, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::{
    Position,
    level::{Level, Tile},
    map::Grid,
};

/// Per-cell BFS distance to a station. `None` marks unreachable cells.
pub type DistanceMap = Grid<Option<u32>>;

/// Connected components of the walkable tiles and the counters bridging them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connectivity {
    components: Grid<Option<usize>>,
    component_count: usize,
    handoff_counters: HashSet<Position>,
}

impl Connectivity {
    /// Labels the 4-connected walkable regions of `level`.
    ///
    /// Ids are dense and assigned in row-major order: the first unvisited
    /// walkable tile in the scan starts the next component.
    pub fn build(level: &Level) -> Self {
        let mut components: Grid<Option<usize>> = Grid::filled(level.width(), level.height(), None);
        let mut next_id = 0;

        for y in 0..level.height() {
            for x in 0..level.width() {
                let start = Position { x, y };
                if !level.is_walkable(start) || components[start].is_some() {
                    continue;
                }

                components[start] = Some(next_id);
                let mut queue = VecDeque::from([start]);
                while let Some(current) = queue.pop_front() {
                    for neighbor in level.tiles().neighbors4(current) {
                        if level.is_walkable(neighbor) && components[neighbor].is_none() {
                            components[neighbor] = Some(next_id);
                            queue.push_back(neighbor);
                        }
                    }
                }
                next_id += 1;
            }
        }

        let mut connectivity = Connectivity {
            components,
            component_count: next_id,
            handoff_counters: HashSet::new(),
        };
        let handoff_counters: HashSet<Position> = level
            .tiles()
            .enumerate()
            .filter(|(position, tile)| {
                **tile == Tile::Counter
                    && connectivity.station_adjacent_components(*position).len() >= 2
            })
            .map(|(position, _)| position)
            .collect();
        connectivity.handoff_counters = handoff_counters;

        tracing::debug!(
            components = connectivity.component_count,
            handoff_counters = connectivity.handoff_counters.len(),
            "Built connectivity"
        );
        connectivity
    }

    /// Component id of a cell, `None` for non-walkable or out-of-bounds cells.
    pub fn component_id(&self, position: Position) -> Option<usize> {
        self.components.get(position).copied().flatten()
    }

    pub fn component_count(&self) -> usize {
        self.component_count
    }

    pub fn components(&self) -> &Grid<Option<usize>> {
        &self.components
    }

    /// Ids of the components touching a station (or any tile) through its 4-neighbours.
    pub fn station_adjacent_components(&self, station: Position) -> BTreeSet<usize> {
        self.components
            .neighbors4(station)
            .filter_map(|neighbor| self.component_id(neighbor))
            .collect()
    }

    /// True iff some walkable neighbour of `wall` belongs to `component`.
    pub fn wall_accessible_from(&self, component: usize, wall: Position) -> bool {
        self.components
            .neighbors4(wall)
            .any(|neighbor| self.component_id(neighbor) == Some(component))
    }

    pub fn handoff_counters(&self) -> &HashSet<Position> {
        &self.handoff_counters
    }

    /// True iff `position` is a counter bordering two or more components.
    pub fn is_handoff_counter(&self, position: Position) -> bool {
        self.handoff_counters.contains(&position)
    }
}

/// Multi-source BFS from the walkable neighbours of `station`.
///
/// Cells next to the station have distance 0 and each walkable hop adds one.
/// Non-walkable cells and cells outside the station's components stay `None`.
pub fn bfs_distance_map(level: &Level, station: Position) -> DistanceMap {
    let mut distances: DistanceMap = Grid::filled(level.width(), level.height(), None);
    let mut queue = VecDeque::new();

    for neighbor in level.tiles().neighbors4(station) {
        if level.is_walkable(neighbor) && distances[neighbor].is_none() {
            distances[neighbor] = Some(0);
            queue.push_back(neighbor);
        }
    }

    while let Some(current) = queue.pop_front() {
        let base = distances[current].unwrap_or(0);
        for neighbor in level.tiles().neighbors4(current) {
            if level.is_walkable(neighbor) && distances[neighbor].is_none() {
                distances[neighbor] = Some(base + 1);
                queue.push_back(neighbor);
            }
        }
    }

    distances
}

/// Stations that get a distance map, in feature order.
pub const DISTANCE_STATIONS: [Tile; 6] = [
    Tile::Pot,
    Tile::BowlRack,
    Tile::ServingStation,
    Tile::Garbage,
    Tile::OnionDispenser,
    Tile::TomatoDispenser,
];

/// Distance maps to every station plus the normalisation constant shared by all of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationDistances {
    maps: Vec<(Tile, DistanceMap)>,
    max_distance: u32,
}

impl StationDistances {
    /// Computes one map per entry of [`DISTANCE_STATIONS`]. A station missing
    /// from the level gets a map with every cell unreachable.
    pub fn build(level: &Level) -> Self {
        let maps: Vec<(Tile, DistanceMap)> = DISTANCE_STATIONS
            .iter()
            .map(|&station| {
                let map = match level.find_first(station) {
                    Some(position) => bfs_distance_map(level, position),
                    None => Grid::filled(level.width(), level.height(), None),
                };
                (station, map)
            })
            .collect();

        let max_distance = maps
            .iter()
            .flat_map(|(_, map)| map.iter().flatten().copied())
            .max()
            .unwrap_or(1)
            .max(1);

        StationDistances { maps, max_distance }
    }

    pub fn map(&self, station: Tile) -> Option<&DistanceMap> {
        self.maps
            .iter()
            .find_map(|(tile, map)| (*tile == station).then_some(map))
    }

    /// Largest finite distance over all maps, at least 1.
    pub fn max_distance(&self) -> u32 {
        self.max_distance
    }

    /// Raw distance from `position` to `station`, `None` when unreachable.
    pub fn distance(&self, position: Position, station: Tile) -> Option<u32> {
        self.map(station)?.get(position).copied().flatten()
    }

    /// Normalised distance and reachability flag.
    ///
    /// Reachable cells yield `(distance / max_distance, 1.0)`; unreachable
    /// ones yield `(1.0, 0.0)`.
    pub fn distance_and_reach(&self, position: Position, station: Tile) -> (f32, f32) {
        match self.distance(position, station) {
            Some(distance) => {
                let normalised = (distance as f32 / self.max_distance as f32).clamp(0.0, 1.0);
                (normalised, 1.0)
            }
            None => (1.0, 0.0),
        }
    }
}
