// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Space detection via flood fill and contour tracing
//!
//! A space is a 4-connected component of occupiable cells on one floor. Its
//! outline is traced along cell edges, so polygon vertices always sit on
//! lattice corners and cell centres never lie on the boundary.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::types::{BoundingBox, BuildingGrid, CellType, FloorGrid, GridCoord, Point2D};

/// Space detection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceConfig {
    /// Count `empty` cells as occupiable.
    pub include_empty_tiles: bool,
    /// Components with fewer cells are discarded.
    pub min_cells: usize,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            include_empty_tiles: false,
            min_cells: 1,
        }
    }
}

impl SpaceConfig {
    /// Whether a cell label belongs to a space.
    pub fn is_occupiable(&self, cell: CellType) -> bool {
        !cell.is_blocked() && (cell != CellType::Empty || self.include_empty_tiles)
    }
}

/// A connected region of occupiable cells on one floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Space {
    pub id: String,
    pub name: String,
    pub floor: usize,
    /// Closed ring of world points (first point repeated at the end).
    #[serde(alias = "points")]
    pub polygon: Vec<Point2D>,
    /// Member cells as `(row, col)`. Only known for detected spaces.
    #[serde(skip)]
    pub cells: Vec<(usize, usize)>,
}

impl Space {
    /// Polygon area in square metres.
    pub fn area(&self) -> f64 {
        polygon_area(&self.polygon).abs()
    }

    /// Member cells as building coordinates.
    ///
    /// Spaces that came over the wire carry no cells; those are resolved
    /// through the polygon, testing every cell centre on the space's floor.
    pub fn resolve_cells(&self, grid: &BuildingGrid) -> Vec<GridCoord> {
        if !self.cells.is_empty() {
            return self
                .cells
                .iter()
                .map(|&(row, col)| GridCoord::new(row, col, self.floor))
                .collect();
        }
        if self.floor >= grid.floor_count() || self.polygon.len() < 3 {
            return Vec::new();
        }

        let gs = grid.grid_size();
        let bbox = grid.bbox();
        let (min, max) = polygon_extent(&self.polygon);
        let (r0, c0) = bbox.world_to_cell(min, gs);
        let (r1, c1) = bbox.world_to_cell(max, gs);
        let row_range = r0.max(0)..=r1.min(grid.rows() as i64 - 1);
        let col_range = c0.max(0)..=c1.min(grid.cols() as i64 - 1);

        let mut cells = Vec::new();
        for row in row_range {
            for col in col_range.clone() {
                let centre = bbox.cell_center(row as usize, col as usize, gs);
                if point_in_polygon(centre, &self.polygon) {
                    cells.push(GridCoord::new(row as usize, col as usize, self.floor));
                }
            }
        }
        cells
    }
}

/// Detects spaces on every floor of a (buffered) building grid.
///
/// Spaces are numbered per floor in row-major order of their first cell.
pub fn detect_spaces(grid: &BuildingGrid, config: &SpaceConfig) -> Vec<Space> {
    let mut spaces = Vec::new();
    for (floor, floor_grid) in grid.grids().iter().enumerate() {
        let mut n = 0;
        for cells in components(floor_grid, config) {
            if cells.len() < config.min_cells.max(1) {
                continue;
            }
            n += 1;
            let polygon = trace_outline(&cells, floor_grid, grid.bbox(), grid.grid_size());
            spaces.push(Space {
                id: format!("Space_{floor}_{n}"),
                name: format!("Space {n}"),
                floor,
                polygon,
                cells,
            });
        }
    }
    spaces
}

/// 4-connected components of occupiable cells, each in discovery order.
fn components(grid: &FloorGrid, config: &SpaceConfig) -> Vec<Vec<(usize, usize)>> {
    let mut seen = vec![false; grid.len()];
    let mut result = Vec::new();
    let mut stack = Vec::new();

    for (row, col, cell) in grid.iter() {
        let idx = grid.index(row, col);
        if seen[idx] || !config.is_occupiable(cell) {
            continue;
        }
        seen[idx] = true;
        stack.push((row, col));
        let mut cells = Vec::new();

        while let Some((r, c)) = stack.pop() {
            cells.push((r, c));
            for (nr, nc) in neighbours4(r as i64, c as i64) {
                let Some(next) = grid.get_signed(nr, nc) else {
                    continue;
                };
                let nidx = grid.index(nr as usize, nc as usize);
                if !seen[nidx] && config.is_occupiable(next) {
                    seen[nidx] = true;
                    stack.push((nr as usize, nc as usize));
                }
            }
        }
        result.push(cells);
    }
    result
}

fn neighbours4(r: i64, c: i64) -> [(i64, i64); 4] {
    [(r - 1, c), (r, c + 1), (r + 1, c), (r, c - 1)]
}

type Vertex = (i64, i64);

struct Edge {
    from: Vertex,
    to: Vertex,
}

impl Edge {
    fn dir(&self) -> Vertex {
        (self.to.0 - self.from.0, self.to.1 - self.from.1)
    }
}

/// Traces the outer contour of a component in world coordinates.
fn trace_outline(
    cells: &[(usize, usize)],
    grid: &FloorGrid,
    bbox: &BoundingBox,
    grid_size: f64,
) -> Vec<Point2D> {
    let mut member = vec![false; grid.len()];
    for &(r, c) in cells {
        member[grid.index(r, c)] = true;
    }
    let inside = |r: i64, c: i64| grid.in_bounds(r, c) && member[grid.index(r as usize, c as usize)];

    // Directed boundary edges in (x = col, y = row) lattice space, oriented
    // so the component's outer loop has positive shoelace area.
    let mut edges = Vec::new();
    for &(r, c) in cells {
        let (r, c) = (r as i64, c as i64);
        if !inside(r - 1, c) {
            edges.push(Edge { from: (c, r), to: (c + 1, r) });
        }
        if !inside(r, c + 1) {
            edges.push(Edge { from: (c + 1, r), to: (c + 1, r + 1) });
        }
        if !inside(r + 1, c) {
            edges.push(Edge { from: (c + 1, r + 1), to: (c, r + 1) });
        }
        if !inside(r, c - 1) {
            edges.push(Edge { from: (c, r + 1), to: (c, r) });
        }
    }

    let mut outgoing: FxHashMap<Vertex, SmallVec<[usize; 2]>> = FxHashMap::default();
    for (i, edge) in edges.iter().enumerate() {
        outgoing.entry(edge.from).or_default().push(i);
    }

    let mut used = vec![false; edges.len()];
    let mut best: Option<(i64, Vec<usize>)> = None;

    for start in 0..edges.len() {
        if used[start] {
            continue;
        }
        let ring = chain_loop(start, &edges, &outgoing, &mut used);
        let area = twice_area(&ring, &edges);
        if area > 0 && best.as_ref().map_or(true, |(a, _)| area > *a) {
            best = Some((area, ring));
        }
    }

    let Some((_, ring)) = best else {
        return Vec::new();
    };

    // Drop vertices where the walk goes straight on.
    let n = ring.len();
    let mut polygon: Vec<Point2D> = (0..n)
        .filter(|&i| edges[ring[(i + n - 1) % n]].dir() != edges[ring[i]].dir())
        .map(|i| {
            let (x, y) = edges[ring[i]].from;
            bbox.corner_to_world(y as usize, x as usize, grid_size)
        })
        .collect();
    if let Some(&first) = polygon.first() {
        polygon.push(first);
    }
    polygon
}

/// Follows boundary edges from `start` until the walk returns to it.
///
/// At pinch vertices (two outgoing edges) the left turn wins, then straight
/// on, then right, which keeps diagonally touching cells on separate loops.
fn chain_loop(
    start: usize,
    edges: &[Edge],
    outgoing: &FxHashMap<Vertex, SmallVec<[usize; 2]>>,
    used: &mut [bool],
) -> Vec<usize> {
    let mut ring = vec![start];
    used[start] = true;
    let mut current = start;

    loop {
        let (dx, dy) = edges[current].dir();
        let next = outgoing
            .get(&edges[current].to)
            .into_iter()
            .flatten()
            .copied()
            .filter(|&e| e == start || !used[e])
            .max_by_key(|&e| {
                let (ox, oy) = edges[e].dir();
                (dx * oy - dy * ox).signum()
            });

        match next {
            Some(e) if e == start => break,
            Some(e) => {
                used[e] = true;
                ring.push(e);
                current = e;
            }
            None => break,
        }
    }
    ring
}

fn twice_area(ring: &[usize], edges: &[Edge]) -> i64 {
    ring.iter()
        .map(|&i| {
            let Edge { from: (x0, y0), to: (x1, y1) } = edges[i];
            x0 * y1 - x1 * y0
        })
        .sum()
}

/// Signed shoelace area of a ring (closed or open).
pub fn polygon_area(points: &[Point2D]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..points.len() {
        let j = (i + 1) % points.len();
        sum += points[i].x * points[j].y - points[j].x * points[i].y;
    }
    sum / 2.0
}

/// Even-odd ray casting test.
pub fn point_in_polygon(point: Point2D, polygon: &[Point2D]) -> bool {
    let mut inside = false;
    let n = polygon.len();
    let mut j = n.wrapping_sub(1);
    for i in 0..n {
        let (pi, pj) = (polygon[i], polygon[j]);
        if (pi.y > point.y) != (pj.y > point.y)
            && point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn polygon_extent(points: &[Point2D]) -> (Point2D, Point2D) {
    let mut min = Point2D::new(f64::INFINITY, f64::INFINITY);
    let mut max = Point2D::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in points {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn building(drawing: &str) -> BuildingGrid {
        BuildingGrid::single_floor(FloorGrid::from_ascii(drawing).unwrap(), 1.0).unwrap()
    }

    fn pts(coords: &[(f64, f64)]) -> Vec<Point2D> {
        coords.iter().map(|&(x, y)| Point2D::new(x, y)).collect()
    }

    #[test]
    fn ring_outline_ignores_the_hole() {
        let grid = building(
            "___
             _#_
             ___",
        );
        let spaces = detect_spaces(&grid, &SpaceConfig::default());
        assert_eq!(spaces.len(), 1);
        let space = &spaces[0];
        assert_eq!(space.id, "Space_0_1");
        assert_eq!(space.name, "Space 1");
        assert_eq!(space.cells.len(), 8);
        assert_eq!(
            space.polygon,
            pts(&[(0.0, 0.0), (3.0, 0.0), (3.0, 3.0), (0.0, 3.0), (0.0, 0.0)])
        );
    }

    #[test]
    fn l_shape_outline() {
        let grid = building(
            "_#
             __",
        );
        let spaces = detect_spaces(&grid, &SpaceConfig::default());
        assert_eq!(spaces.len(), 1);
        assert_eq!(
            spaces[0].polygon,
            pts(&[
                (0.0, 0.0),
                (1.0, 0.0),
                (1.0, 1.0),
                (2.0, 1.0),
                (2.0, 2.0),
                (0.0, 2.0),
                (0.0, 0.0)
            ])
        );
        assert_relative_eq!(spaces[0].area(), 3.0);
    }

    #[test]
    fn pinched_component_keeps_its_area() {
        let grid = building(
            "__#
             _#_
             ___",
        );
        let spaces = detect_spaces(&grid, &SpaceConfig::default());
        assert_eq!(spaces.len(), 1);
        assert_relative_eq!(spaces[0].area(), 7.0);
    }

    #[test]
    fn diagonal_contact_does_not_merge() {
        let grid = building(
            "_#
             #_",
        );
        let spaces = detect_spaces(&grid, &SpaceConfig::default());
        assert_eq!(spaces.len(), 2);
        assert_eq!(spaces[1].id, "Space_0_2");
        for space in &spaces {
            assert_relative_eq!(space.area(), 1.0);
        }
    }

    #[test]
    fn empty_tiles_are_optional() {
        let grid = building(
            "_._
             ###",
        );
        let without = detect_spaces(&grid, &SpaceConfig::default());
        assert_eq!(without.len(), 2);

        let config = SpaceConfig {
            include_empty_tiles: true,
            ..SpaceConfig::default()
        };
        let with = detect_spaces(&grid, &config);
        assert_eq!(with.len(), 1);
        assert_eq!(with[0].cells.len(), 3);
    }

    #[test]
    fn buffered_cells_are_not_occupiable() {
        let grid = building("_a_\n_a_");
        let spaces = detect_spaces(&grid, &SpaceConfig::default());
        assert_eq!(spaces.len(), 2);
    }

    #[test]
    fn small_components_are_dropped() {
        let grid = building("_#__");
        let config = SpaceConfig {
            min_cells: 2,
            ..SpaceConfig::default()
        };
        let spaces = detect_spaces(&grid, &config);
        assert_eq!(spaces.len(), 1);
        assert_eq!(spaces[0].name, "Space 1");
        assert_eq!(spaces[0].cells.len(), 2);
    }

    #[test]
    fn world_coordinates_follow_the_bbox() {
        let floor = FloorGrid::from_ascii("__").unwrap();
        let bbox = BoundingBox {
            min_x: 100.0,
            min_y: 50.0,
            max_x: 101.0,
            max_y: 50.5,
        };
        let grid = BuildingGrid::new(vec![floor], 0.5, Vec::new(), bbox).unwrap();
        let spaces = detect_spaces(&grid, &SpaceConfig::default());
        assert_eq!(
            spaces[0].polygon,
            pts(&[(100.0, 50.0), (101.0, 50.0), (101.0, 50.5), (100.0, 50.5), (100.0, 50.0)])
        );
    }

    #[test]
    fn wire_spaces_resolve_through_the_polygon() {
        let grid = building(
            "___#
             ___#
             ####",
        );
        let detected = detect_spaces(&grid, &SpaceConfig::default());
        let json = serde_json::to_string(&detected[0]).unwrap();
        assert!(!json.contains("cells"));

        let received: Space = serde_json::from_str(&json).unwrap();
        assert!(received.cells.is_empty());
        let mut resolved = received.resolve_cells(&grid);
        resolved.sort();
        let mut expected = detected[0].resolve_cells(&grid);
        expected.sort();
        assert_eq!(resolved, expected);
        assert_eq!(resolved.len(), 6);
    }

    #[test]
    fn points_alias_is_accepted() {
        let space: Space = serde_json::from_str(
            r#"{"id": "a", "name": "A", "floor": 0, "points": [[0,0],[1,0],[1,1],[0,1]]}"#,
        )
        .unwrap();
        assert_eq!(space.polygon.len(), 4);
        assert!(point_in_polygon(Point2D::new(0.5, 0.5), &space.polygon));
        assert!(!point_in_polygon(Point2D::new(1.5, 0.5), &space.polygon));
    }

    fn arb_floor() -> impl Strategy<Value = FloorGrid> {
        let cell = prop_oneof![
            Just(CellType::Wall),
            Just(CellType::Floor),
            Just(CellType::Floor),
            Just(CellType::Empty),
            Just(CellType::Door),
        ];
        (1usize..7, 1usize..7).prop_flat_map(move |(rows, cols)| {
            prop::collection::vec(cell.clone(), rows * cols).prop_map(move |cells| {
                FloorGrid::from_rows(cells.chunks(cols).map(<[CellType]>::to_vec).collect())
                    .unwrap()
            })
        })
    }

    proptest! {
        #[test]
        fn spaces_partition_occupiable_cells(floor in arb_floor(), include_empty in any::<bool>()) {
            let config = SpaceConfig { include_empty_tiles: include_empty, min_cells: 1 };
            let grid = BuildingGrid::single_floor(floor.clone(), 1.0).unwrap();
            let spaces = detect_spaces(&grid, &config);

            let mut owner = vec![None; floor.len()];
            for (i, space) in spaces.iter().enumerate() {
                for &(r, c) in &space.cells {
                    let idx = floor.index(r, c);
                    prop_assert!(owner[idx].is_none());
                    owner[idx] = Some(i);
                }
                // The outer outline covers every member cell, holes included.
                prop_assert!(space.area() + 1e-9 >= space.cells.len() as f64);
            }
            for (r, c, cell) in floor.iter() {
                let idx = floor.index(r, c);
                prop_assert_eq!(owner[idx].is_some(), config.is_occupiable(cell));
                // 4-neighbours that are both occupiable share a space.
                if let Some(right) = floor.get(r, c + 1) {
                    if config.is_occupiable(cell) && config.is_occupiable(right) {
                        prop_assert_eq!(owner[idx], owner[floor.index(r, c + 1)]);
                    }
                }
                if let Some(below) = floor.get(r + 1, c) {
                    if config.is_occupiable(cell) && config.is_occupiable(below) {
                        prop_assert_eq!(owner[idx], owner[floor.index(r + 1, c)]);
                    }
                }
            }
        }
    }
}
