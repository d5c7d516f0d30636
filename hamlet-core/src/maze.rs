//! The maze — hierarchical spatial index and per-tile occupancy grid.
//!
//! Static data (passability, the world → sector → arena → object address
//! hierarchy) is loaded once at world initialization and never mutated.
//! The only shared mutable state in the whole engine is the occupancy
//! grid, guarded by a single lock so move commits are atomic.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DistanceMetric;
use crate::error::{EngineError, Result};
use crate::types::{AgentId, SpatialAddress, TilePos};

// ---------------------------------------------------------------------------
// Layout description
// ---------------------------------------------------------------------------

/// A named region of the map: an address and the tiles it covers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSpec {
    /// Sector name.
    pub sector: String,
    /// Arena name within the sector, if this region is arena-level.
    #[serde(default)]
    pub arena: Option<String>,
    /// Game-object name within the arena, if this region is object-level.
    #[serde(default)]
    pub object: Option<String>,
    /// Tiles covered by this region.
    pub tiles: Vec<TilePos>,
}

/// Static description of a maze, deserializable from TOML/JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MazeLayout {
    /// World name — the root of every address on this map.
    pub world: String,
    /// Grid width in tiles.
    pub width: u32,
    /// Grid height in tiles.
    pub height: u32,
    /// Impassable tiles; everything else is walkable.
    #[serde(default)]
    pub blocked: Vec<TilePos>,
    /// Named regions. A tile in several regions takes the deepest
    /// (most specific) address; ties take the earliest region.
    #[serde(default)]
    pub regions: Vec<RegionSpec>,
}

// ---------------------------------------------------------------------------
// Maze
// ---------------------------------------------------------------------------

/// The loaded spatial index.
pub struct Maze {
    world: String,
    width: u32,
    height: u32,
    passable: Vec<bool>,
    /// Per-tile index into `addresses`; `None` means the bare world
    /// address.
    tile_address: Vec<Option<usize>>,
    addresses: Vec<SpatialAddress>,
    /// Tiles per address, same indexing as `addresses`, each sorted
    /// `(y, x)` for reproducible resolution.
    address_tiles: Vec<Vec<TilePos>>,
    allow_corner_cutting: bool,
    occupancy: Mutex<Vec<Option<AgentId>>>,
}

impl std::fmt::Debug for Maze {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Maze")
            .field("world", &self.world)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("addresses", &self.addresses.len())
            .finish_non_exhaustive()
    }
}

impl Maze {
    /// Build a maze from a static layout description.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] for a zero-sized grid, or
    /// [`EngineError::OutOfBounds`] for a blocked/region tile outside
    /// the extent.
    pub fn from_layout(layout: &MazeLayout, allow_corner_cutting: bool) -> Result<Self> {
        if layout.width == 0 || layout.height == 0 {
            return Err(EngineError::Config(format!(
                "maze '{}' has a zero-sized grid ({}x{})",
                layout.world, layout.width, layout.height
            )));
        }

        let len = (layout.width * layout.height) as usize;
        let mut maze = Self {
            world: layout.world.clone(),
            width: layout.width,
            height: layout.height,
            passable: vec![true; len],
            tile_address: vec![None; len],
            addresses: Vec::new(),
            address_tiles: Vec::new(),
            allow_corner_cutting,
            occupancy: Mutex::new(vec![None; len]),
        };

        for &pos in &layout.blocked {
            let index = maze.index(pos)?;
            maze.passable[index] = false;
        }

        for region in &layout.regions {
            let mut address = SpatialAddress::world(&layout.world).with_sector(&region.sector);
            if let Some(arena) = &region.arena {
                address = address.with_arena(arena);
            }
            if let Some(object) = &region.object {
                address = address.with_object(object);
            }
            let depth = address.depth();

            let address_index = maze.addresses.len();
            maze.addresses.push(address);
            let mut tiles = region.tiles.clone();
            tiles.sort_by_key(|t| (t.y, t.x));
            tiles.dedup();

            for &pos in &tiles {
                let index = maze.index(pos)?;
                // Deepest address wins; earlier regions win ties.
                let keep = maze.tile_address[index]
                    .is_none_or(|existing| maze.addresses[existing].depth() < depth);
                if keep {
                    maze.tile_address[index] = Some(address_index);
                }
            }
            maze.address_tiles.push(tiles);
        }

        debug!(
            world = %maze.world,
            width = maze.width,
            height = maze.height,
            regions = maze.addresses.len(),
            "maze loaded"
        );
        Ok(maze)
    }

    /// An open grid with no blocked tiles or regions. Test helper.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] for a zero-sized grid.
    pub fn open(world: impl Into<String>, width: u32, height: u32) -> Result<Self> {
        Self::from_layout(
            &MazeLayout {
                world: world.into(),
                width,
                height,
                blocked: Vec::new(),
                regions: Vec::new(),
            },
            false,
        )
    }

    /// Grid width in tiles.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in tiles.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The world name, the root of every address on this map.
    #[must_use]
    pub fn world(&self) -> &str {
        &self.world
    }

    /// Every named address on the map, in load order. Used to tell the
    /// oracle which places can be chosen by name.
    pub fn addresses(&self) -> impl Iterator<Item = &SpatialAddress> {
        self.addresses.iter()
    }

    fn in_bounds(&self, pos: TilePos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    fn index(&self, pos: TilePos) -> Result<usize> {
        if self.in_bounds(pos) {
            Ok((pos.y as u32 * self.width + pos.x as u32) as usize)
        } else {
            Err(EngineError::OutOfBounds {
                x: pos.x,
                y: pos.y,
                width: self.width,
                height: self.height,
            })
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// The address of a tile. Tiles outside any named region carry the
    /// bare world address.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::OutOfBounds`] outside the grid extent.
    pub fn tile_address(&self, pos: TilePos) -> Result<SpatialAddress> {
        let index = self.index(pos)?;
        Ok(match self.tile_address[index] {
            Some(address_index) => self.addresses[address_index].clone(),
            None => SpatialAddress::world(&self.world),
        })
    }

    /// Whether a tile is passable.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::OutOfBounds`] outside the grid extent.
    pub fn passable(&self, pos: TilePos) -> Result<bool> {
        Ok(self.passable[self.index(pos)?])
    }

    /// All tiles within `radius` of `center` under `metric`, including
    /// the center tile and impassable tiles, clipped to the grid.
    ///
    /// Sorted `(y, x)` so perception order is reproducible.
    #[must_use]
    pub fn neighbors(&self, center: TilePos, radius: u32, metric: DistanceMetric) -> Vec<TilePos> {
        let r = radius as i32;
        let mut tiles = Vec::new();
        for dy in -r..=r {
            for dx in -r..=r {
                let pos = TilePos::new(center.x + dx, center.y + dy);
                if !self.in_bounds(pos) {
                    continue;
                }
                let within = match metric {
                    DistanceMetric::Chebyshev => center.chebyshev(pos) <= radius,
                    DistanceMetric::Manhattan => center.manhattan(pos) <= radius,
                };
                if within {
                    tiles.push(pos);
                }
            }
        }
        tiles
    }

    /// Current occupant of a tile.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::OutOfBounds`] outside the grid extent.
    pub fn occupant(&self, pos: TilePos) -> Result<Option<AgentId>> {
        let index = self.index(pos)?;
        Ok(self.occupancy.lock()[index])
    }

    /// Whether a single-step move from `from` to `to` is currently legal:
    /// adjacency, passability, vacancy, and the corner-cut rule.
    ///
    /// Advisory only — the destination can be taken before the commit, so
    /// [`Maze::commit_move`] re-validates atomically.
    #[must_use]
    pub fn can_move(&self, from: TilePos, to: TilePos) -> bool {
        self.step_shape_legal(from, to)
            && self.index(to).map(|i| self.occupancy.lock()[i].is_none()).unwrap_or(false)
    }

    /// Geometry-only step legality (ignores occupancy).
    fn step_shape_legal(&self, from: TilePos, to: TilePos) -> bool {
        if !self.in_bounds(from) || !self.in_bounds(to) {
            return false;
        }
        if from.chebyshev(to) != 1 {
            return false;
        }
        let Ok(true) = self.passable(to) else {
            return false;
        };
        // Diagonal steps may not cut corners: both flanking orthogonal
        // tiles must be passable unless corner cutting is enabled.
        let diagonal = from.x != to.x && from.y != to.y;
        if diagonal && !self.allow_corner_cutting {
            let flank_a = TilePos::new(from.x, to.y);
            let flank_b = TilePos::new(to.x, from.y);
            if !matches!(self.passable(flank_a), Ok(true))
                || !matches!(self.passable(flank_b), Ok(true))
            {
                return false;
            }
        }
        true
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Put an agent on a tile at world initialization.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::OutOfBounds`] outside the grid,
    /// [`EngineError::Config`] for an impassable tile, or
    /// [`EngineError::Collision`] if the tile is already occupied.
    pub fn place_agent(&self, agent: AgentId, pos: TilePos) -> Result<()> {
        let index = self.index(pos)?;
        if !self.passable[index] {
            return Err(EngineError::Config(format!(
                "agent {agent} placed on impassable tile {pos}"
            )));
        }
        let mut occupancy = self.occupancy.lock();
        if occupancy[index].is_some() {
            return Err(EngineError::Collision(pos));
        }
        occupancy[index] = Some(agent);
        Ok(())
    }

    /// Commit a single-step move, re-validating atomically under the
    /// occupancy lock.
    ///
    /// On success the old tile's occupant is cleared and the new tile's
    /// occupant set, as one step — two agents can never end up on one
    /// tile.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::OutOfBounds`] outside the grid, or
    /// [`EngineError::Collision`] if the destination became occupied (or
    /// the step is otherwise no longer legal) since `can_move`.
    pub fn commit_move(&self, agent: AgentId, from: TilePos, to: TilePos) -> Result<()> {
        let from_index = self.index(from)?;
        let to_index = self.index(to)?;
        if !self.step_shape_legal(from, to) {
            return Err(EngineError::Collision(to));
        }

        let mut occupancy = self.occupancy.lock();
        if occupancy[to_index].is_some() {
            return Err(EngineError::Collision(to));
        }
        if occupancy[from_index] == Some(agent) {
            occupancy[from_index] = None;
        }
        occupancy[to_index] = Some(agent);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Address resolution & navigation
    // ------------------------------------------------------------------

    /// Tiles covered by an address path, possibly partial (e.g. sector
    /// only). Deeper stored addresses match a shallower query.
    ///
    /// Sorted `(y, x)` so "go to the cafe" picks the same tile on every
    /// replay.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownAddress`] when nothing matches.
    pub fn resolve_address(&self, query: &SpatialAddress) -> Result<Vec<TilePos>> {
        if query.world != self.world {
            return Err(EngineError::UnknownAddress(query.to_string()));
        }

        let mut tiles: Vec<TilePos> = Vec::new();
        for (address, region_tiles) in self.addresses.iter().zip(&self.address_tiles) {
            let matches = query.sector.as_ref().is_none_or(|s| address.sector.as_ref() == Some(s))
                && query.arena.as_ref().is_none_or(|a| address.arena.as_ref() == Some(a))
                && query.object.as_ref().is_none_or(|o| address.object.as_ref() == Some(o));
            if matches {
                tiles.extend_from_slice(region_tiles);
            }
        }

        if tiles.is_empty() && query.depth() == 1 {
            // Bare world query covers every tile.
            for y in 0..self.height as i32 {
                for x in 0..self.width as i32 {
                    tiles.push(TilePos::new(x, y));
                }
            }
        }

        if tiles.is_empty() {
            return Err(EngineError::UnknownAddress(query.to_string()));
        }
        tiles.sort_by_key(|t| (t.y, t.x));
        tiles.dedup();
        Ok(tiles)
    }

    /// Breadth-first shortest path over passable tiles, ignoring
    /// occupancy (collisions resolve at commit time, step by step).
    ///
    /// Returns the path excluding `from`, ending at `to`; `None` when
    /// unreachable. Neighbor expansion is in `(y, x)` order, so equal-
    /// length paths tie-break identically on every run.
    #[must_use]
    pub fn shortest_path(&self, from: TilePos, to: TilePos) -> Option<Vec<TilePos>> {
        if !self.in_bounds(from) || !self.in_bounds(to) {
            return None;
        }
        if !matches!(self.passable(to), Ok(true)) {
            return None;
        }
        if from == to {
            return Some(Vec::new());
        }

        let mut parents: HashMap<TilePos, TilePos> = HashMap::new();
        let mut queue = VecDeque::new();
        queue.push_back(from);
        parents.insert(from, from);

        while let Some(current) = queue.pop_front() {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let next = TilePos::new(current.x + dx, current.y + dy);
                    if parents.contains_key(&next) || !self.step_shape_legal(current, next) {
                        continue;
                    }
                    parents.insert(next, current);
                    if next == to {
                        let mut path = vec![next];
                        let mut cursor = current;
                        while cursor != from {
                            path.push(cursor);
                            cursor = parents[&cursor];
                        }
                        path.reverse();
                        return Some(path);
                    }
                    queue.push_back(next);
                }
            }
        }
        None
    }

    // ------------------------------------------------------------------
    // Snapshot support
    // ------------------------------------------------------------------

    /// Occupied tiles and their agents, sorted `(y, x)`.
    #[must_use]
    pub fn occupancy_snapshot(&self) -> Vec<(TilePos, AgentId)> {
        let occupancy = self.occupancy.lock();
        let mut entries: Vec<(TilePos, AgentId)> = occupancy
            .iter()
            .enumerate()
            .filter_map(|(index, occupant)| {
                occupant.map(|agent| {
                    let x = (index as u32 % self.width) as i32;
                    let y = (index as u32 / self.width) as i32;
                    (TilePos::new(x, y), agent)
                })
            })
            .collect();
        entries.sort_by_key(|(pos, _)| (pos.y, pos.x));
        entries
    }

    /// Replace the whole occupancy grid from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::OutOfBounds`] for entries outside the grid
    /// or [`EngineError::Collision`] for duplicate tiles.
    pub fn restore_occupancy(&self, entries: &[(TilePos, AgentId)]) -> Result<()> {
        let mut fresh = vec![None; (self.width * self.height) as usize];
        for &(pos, agent) in entries {
            let index = self.index(pos)?;
            if fresh[index].is_some() {
                return Err(EngineError::Collision(pos));
            }
            fresh[index] = Some(agent);
        }
        *self.occupancy.lock() = fresh;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cross_street_layout() -> MazeLayout {
        MazeLayout {
            world: "the ville".into(),
            width: 20,
            height: 20,
            blocked: vec![TilePos::new(11, 10), TilePos::new(11, 11)],
            regions: vec![
                RegionSpec {
                    sector: "hobbs cafe".into(),
                    arena: Some("cafe".into()),
                    object: None,
                    tiles: vec![TilePos::new(2, 2), TilePos::new(3, 2)],
                },
                RegionSpec {
                    sector: "hobbs cafe".into(),
                    arena: Some("cafe".into()),
                    object: Some("counter".into()),
                    tiles: vec![TilePos::new(3, 2)],
                },
                RegionSpec {
                    sector: "the park".into(),
                    arena: None,
                    object: None,
                    tiles: vec![TilePos::new(15, 15)],
                },
            ],
        }
    }

    #[test]
    fn radius_one_perceives_nine_tiles_on_open_grid() {
        let maze = Maze::open("w", 30, 30).expect("maze");
        let tiles = maze.neighbors(TilePos::new(10, 10), 1, DistanceMetric::Chebyshev);
        assert_eq!(tiles.len(), 9, "8 surrounding tiles plus its own");
        assert!(tiles.contains(&TilePos::new(10, 10)));
    }

    #[test]
    fn manhattan_radius_one_is_five_tiles() {
        let maze = Maze::open("w", 30, 30).expect("maze");
        let tiles = maze.neighbors(TilePos::new(10, 10), 1, DistanceMetric::Manhattan);
        assert_eq!(tiles.len(), 5);
    }

    #[test]
    fn neighbors_clip_at_the_border() {
        let maze = Maze::open("w", 5, 5).expect("maze");
        let tiles = maze.neighbors(TilePos::new(0, 0), 1, DistanceMetric::Chebyshev);
        assert_eq!(tiles.len(), 4);
    }

    #[test]
    fn impassable_neighbor_blocks_can_move() {
        let maze = Maze::from_layout(&cross_street_layout(), false).expect("maze");
        assert!(!maze.can_move(TilePos::new(10, 10), TilePos::new(11, 10)));
        assert!(maze.can_move(TilePos::new(10, 10), TilePos::new(10, 11)));
    }

    #[test]
    fn can_move_requires_single_step() {
        let maze = Maze::open("w", 10, 10).expect("maze");
        assert!(!maze.can_move(TilePos::new(1, 1), TilePos::new(3, 1)));
        assert!(!maze.can_move(TilePos::new(1, 1), TilePos::new(1, 1)));
    }

    #[test]
    fn diagonal_corner_cutting_is_blocked_by_default() {
        let layout = MazeLayout {
            world: "w".into(),
            width: 4,
            height: 4,
            blocked: vec![TilePos::new(1, 0), TilePos::new(0, 1)],
            regions: Vec::new(),
        };
        let strict = Maze::from_layout(&layout, false).expect("maze");
        assert!(!strict.can_move(TilePos::new(0, 0), TilePos::new(1, 1)));

        let permissive = Maze::from_layout(&layout, true).expect("maze");
        assert!(permissive.can_move(TilePos::new(0, 0), TilePos::new(1, 1)));
    }

    #[test]
    fn tile_address_prefers_deepest_region() {
        let maze = Maze::from_layout(&cross_street_layout(), false).expect("maze");
        let counter = maze.tile_address(TilePos::new(3, 2)).expect("address");
        assert_eq!(counter.object.as_deref(), Some("counter"));
        let cafe_floor = maze.tile_address(TilePos::new(2, 2)).expect("address");
        assert_eq!(cafe_floor.arena.as_deref(), Some("cafe"));
        assert!(cafe_floor.object.is_none());
        // Unregioned tiles carry the bare world address.
        let street = maze.tile_address(TilePos::new(9, 9)).expect("address");
        assert_eq!(street.depth(), 1);
    }

    #[test]
    fn tile_address_out_of_bounds_errors() {
        let maze = Maze::open("w", 5, 5).expect("maze");
        assert!(matches!(
            maze.tile_address(TilePos::new(5, 0)),
            Err(EngineError::OutOfBounds { .. })
        ));
        assert!(matches!(
            maze.tile_address(TilePos::new(0, -1)),
            Err(EngineError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn resolve_partial_address_collects_region_tiles() {
        let maze = Maze::from_layout(&cross_street_layout(), false).expect("maze");
        let sector = SpatialAddress::world("the ville").with_sector("hobbs cafe");
        let tiles = maze.resolve_address(&sector).expect("resolve");
        assert_eq!(tiles, vec![TilePos::new(2, 2), TilePos::new(3, 2)]);

        let object = sector.clone().with_arena("cafe").with_object("counter");
        assert_eq!(maze.resolve_address(&object).expect("resolve"), vec![TilePos::new(3, 2)]);
    }

    #[test]
    fn resolve_unknown_address_errors() {
        let maze = Maze::from_layout(&cross_street_layout(), false).expect("maze");
        let query = SpatialAddress::world("the ville").with_sector("no such place");
        assert!(matches!(maze.resolve_address(&query), Err(EngineError::UnknownAddress(_))));
        let wrong_world = SpatialAddress::world("elsewhere");
        assert!(matches!(maze.resolve_address(&wrong_world), Err(EngineError::UnknownAddress(_))));
    }

    #[test]
    fn commit_move_updates_both_tiles() {
        let maze = Maze::open("w", 5, 5).expect("maze");
        let agent = AgentId(1);
        maze.place_agent(agent, TilePos::new(1, 1)).expect("place");
        maze.commit_move(agent, TilePos::new(1, 1), TilePos::new(2, 1)).expect("move");
        assert_eq!(maze.occupant(TilePos::new(1, 1)).expect("occ"), None);
        assert_eq!(maze.occupant(TilePos::new(2, 1)).expect("occ"), Some(agent));
    }

    #[test]
    fn racing_commits_have_exactly_one_winner() {
        let maze = std::sync::Arc::new(Maze::open("w", 5, 5).expect("maze"));
        let a = AgentId(1);
        let b = AgentId(2);
        maze.place_agent(a, TilePos::new(0, 1)).expect("place");
        maze.place_agent(b, TilePos::new(2, 1)).expect("place");
        let contested = TilePos::new(1, 1);

        let maze_a = std::sync::Arc::clone(&maze);
        let maze_b = std::sync::Arc::clone(&maze);
        let ta = std::thread::spawn(move || maze_a.commit_move(a, TilePos::new(0, 1), contested));
        let tb = std::thread::spawn(move || maze_b.commit_move(b, TilePos::new(2, 1), contested));
        let ra = ta.join().expect("join");
        let rb = tb.join().expect("join");

        assert!(
            ra.is_ok() ^ rb.is_ok(),
            "exactly one of two racing moves must win"
        );
        let loser_error = if ra.is_ok() { rb } else { ra };
        assert!(matches!(loser_error, Err(EngineError::Collision(_))));
        assert!(maze.occupant(contested).expect("occ").is_some());
    }

    #[test]
    fn shortest_path_routes_around_walls() {
        let layout = MazeLayout {
            world: "w".into(),
            width: 5,
            height: 3,
            // A vertical wall at x=2 with a gap at the bottom row.
            blocked: vec![TilePos::new(2, 0), TilePos::new(2, 1)],
            regions: Vec::new(),
        };
        let maze = Maze::from_layout(&layout, false).expect("maze");
        let path = maze.shortest_path(TilePos::new(0, 0), TilePos::new(4, 0)).expect("path");
        assert_eq!(path.last(), Some(&TilePos::new(4, 0)));
        assert!(path.contains(&TilePos::new(2, 2)), "must route through the gap");
        // Every step is a legal single step.
        let mut current = TilePos::new(0, 0);
        for &step in &path {
            assert_eq!(current.chebyshev(step), 1);
            current = step;
        }
    }

    #[test]
    fn shortest_path_unreachable_is_none() {
        let layout = MazeLayout {
            world: "w".into(),
            width: 3,
            height: 3,
            blocked: vec![TilePos::new(1, 0), TilePos::new(1, 1), TilePos::new(1, 2)],
            regions: Vec::new(),
        };
        let maze = Maze::from_layout(&layout, false).expect("maze");
        assert!(maze.shortest_path(TilePos::new(0, 0), TilePos::new(2, 0)).is_none());
    }

    #[test]
    fn occupancy_snapshot_round_trips() {
        let maze = Maze::open("w", 4, 4).expect("maze");
        maze.place_agent(AgentId(3), TilePos::new(1, 2)).expect("place");
        maze.place_agent(AgentId(7), TilePos::new(3, 0)).expect("place");

        let snapshot = maze.occupancy_snapshot();
        let other = Maze::open("w", 4, 4).expect("maze");
        other.restore_occupancy(&snapshot).expect("restore");
        assert_eq!(other.occupancy_snapshot(), snapshot);
    }
}
