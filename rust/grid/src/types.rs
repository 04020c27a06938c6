// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core types for multi-floor occupancy grids.
//!
//! A building is a stack of floors sharing one lattice: every floor grid has
//! the same dimensions and origin, so `(row, col)` addresses the same plan
//! position on every floor. World coordinates run `x` along columns and `y`
//! along rows, anchored at the bounding box minimum.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default storey height used when a bundle carries no floor descriptions.
pub const DEFAULT_FLOOR_HEIGHT: f64 = 3.0;

/// Label of a single grid cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    #[default]
    Empty,
    Wall,
    Door,
    Stair,
    Floor,
    /// Buffered wall: blocked for routing, rendered differently from a wall.
    Walla,
}

impl CellType {
    /// All labels, in wire order.
    pub const ALL: [CellType; 6] = [
        CellType::Empty,
        CellType::Wall,
        CellType::Door,
        CellType::Stair,
        CellType::Floor,
        CellType::Walla,
    ];

    /// Returns true for cells that can never be walked through.
    pub fn is_blocked(self) -> bool {
        matches!(self, CellType::Wall | CellType::Walla)
    }

    /// Returns the wire label.
    pub fn as_str(self) -> &'static str {
        match self {
            CellType::Empty => "empty",
            CellType::Wall => "wall",
            CellType::Door => "door",
            CellType::Stair => "stair",
            CellType::Floor => "floor",
            CellType::Walla => "walla",
        }
    }

    /// Maps a fixture character to a label.
    ///
    /// `#` wall, `.` empty, `_` floor, `D` door, `S` stair, `a` walla.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '#' => Some(CellType::Wall),
            '.' => Some(CellType::Empty),
            '_' => Some(CellType::Floor),
            'D' => Some(CellType::Door),
            'S' => Some(CellType::Stair),
            'a' => Some(CellType::Walla),
            _ => None,
        }
    }

    /// Inverse of [`CellType::from_char`].
    pub fn to_char(self) -> char {
        match self {
            CellType::Wall => '#',
            CellType::Empty => '.',
            CellType::Floor => '_',
            CellType::Door => 'D',
            CellType::Stair => 'S',
            CellType::Walla => 'a',
        }
    }
}

/// A cell address across the whole building.
///
/// Serialized as a `[row, col, floor]` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "[usize; 3]", into = "[usize; 3]")]
pub struct GridCoord {
    pub row: usize,
    pub col: usize,
    pub floor: usize,
}

impl GridCoord {
    pub const fn new(row: usize, col: usize, floor: usize) -> Self {
        Self { row, col, floor }
    }
}

impl From<[usize; 3]> for GridCoord {
    fn from([row, col, floor]: [usize; 3]) -> Self {
        Self { row, col, floor }
    }
}

impl From<GridCoord> for [usize; 3] {
    fn from(c: GridCoord) -> Self {
        [c.row, c.col, c.floor]
    }
}

/// Object form of a cell address (`{row, col, floor}`), used by path requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRef {
    pub row: usize,
    pub col: usize,
    pub floor: usize,
}

impl From<CellRef> for GridCoord {
    fn from(c: CellRef) -> Self {
        GridCoord::new(c.row, c.col, c.floor)
    }
}

impl From<GridCoord> for CellRef {
    fn from(c: GridCoord) -> Self {
        CellRef {
            row: c.row,
            col: c.col,
            floor: c.floor,
        }
    }
}

/// A 2D world-space point, serialized as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point2D) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl From<[f64; 2]> for Point2D {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point2D> for [f64; 2] {
    fn from(p: Point2D) -> Self {
        [p.x, p.y]
    }
}

/// World-space extent of the grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// World position of a lattice corner (`row`, `col` may equal the grid size).
    pub fn corner_to_world(&self, row: usize, col: usize, grid_size: f64) -> Point2D {
        Point2D::new(
            self.min_x + col as f64 * grid_size,
            self.min_y + row as f64 * grid_size,
        )
    }

    /// World position of a cell centre.
    pub fn cell_center(&self, row: usize, col: usize, grid_size: f64) -> Point2D {
        Point2D::new(
            self.min_x + (col as f64 + 0.5) * grid_size,
            self.min_y + (row as f64 + 0.5) * grid_size,
        )
    }

    /// Lattice cell containing a world point, as signed `(row, col)`.
    pub fn world_to_cell(&self, point: Point2D, grid_size: f64) -> (i64, i64) {
        (
            ((point.y - self.min_y) / grid_size).floor() as i64,
            ((point.x - self.min_x) / grid_size).floor() as i64,
        )
    }
}

/// One storey of the building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Floor {
    /// Elevation of the floor level in metres.
    pub elevation: f64,
    /// Storey height in metres.
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Floor {
    pub fn new(elevation: f64, height: f64) -> Self {
        Self {
            elevation,
            height,
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Dense row-major grid of cell labels for one floor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloorGrid {
    rows: usize,
    cols: usize,
    cells: Vec<CellType>,
}

impl FloorGrid {
    /// Creates a grid filled with one label.
    pub fn new(rows: usize, cols: usize, fill: CellType) -> Self {
        Self {
            rows,
            cols,
            cells: vec![fill; rows * cols],
        }
    }

    /// Builds a grid from nested rows, rejecting ragged input.
    pub fn from_rows(rows: Vec<Vec<CellType>>) -> Result<Self> {
        let row_count = rows.len();
        let cols = rows.first().map_or(0, Vec::len);
        let mut cells = Vec::with_capacity(row_count * cols);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != cols {
                return Err(Error::InvalidGridShape(format!(
                    "row {} has {} cells, expected {}",
                    i,
                    row.len(),
                    cols
                )));
            }
            cells.extend(row);
        }
        Ok(Self {
            rows: row_count,
            cols,
            cells,
        })
    }

    /// Parses a fixture drawing, one line per row (see [`CellType::from_char`]).
    ///
    /// Leading/trailing whitespace on each line and blank lines are ignored.
    pub fn from_ascii(drawing: &str) -> Result<Self> {
        let rows = drawing
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                line.chars()
                    .map(|c| {
                        CellType::from_char(c).ok_or_else(|| {
                            Error::InvalidGridShape(format!("unknown cell character {c:?}"))
                        })
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_rows(rows)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Row-major flat index of a cell.
    #[inline]
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    #[inline]
    pub fn in_bounds(&self, row: i64, col: i64) -> bool {
        row >= 0 && col >= 0 && (row as usize) < self.rows && (col as usize) < self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<CellType> {
        if row < self.rows && col < self.cols {
            Some(self.cells[self.index(row, col)])
        } else {
            None
        }
    }

    /// Signed lookup; `None` means off-grid.
    pub fn get_signed(&self, row: i64, col: i64) -> Option<CellType> {
        if self.in_bounds(row, col) {
            Some(self.cells[self.index(row as usize, col as usize)])
        } else {
            None
        }
    }

    pub fn set(&mut self, row: usize, col: usize, cell: CellType) -> bool {
        if row < self.rows && col < self.cols {
            let idx = self.index(row, col);
            self.cells[idx] = cell;
            true
        } else {
            false
        }
    }

    /// Flat cell slice in row-major order.
    pub fn cells(&self) -> &[CellType] {
        &self.cells
    }

    /// Iterates `(row, col, cell)` in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, CellType)> + '_ {
        let cols = self.cols.max(1);
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, &cell)| (i / cols, i % cols, cell))
    }

    /// Number of cells carrying a label.
    pub fn count(&self, cell: CellType) -> usize {
        self.cells.iter().filter(|&&c| c == cell).count()
    }

    /// Nested-row form used on the wire.
    pub fn to_rows(&self) -> Vec<Vec<CellType>> {
        if self.cols == 0 {
            return vec![Vec::new(); self.rows];
        }
        self.cells.chunks(self.cols).map(<[CellType]>::to_vec).collect()
    }

    /// Fixture drawing, the inverse of [`FloorGrid::from_ascii`].
    pub fn to_ascii(&self) -> String {
        let mut out = String::with_capacity(self.rows * (self.cols + 1));
        for row in 0..self.rows {
            for col in 0..self.cols {
                out.push(self.cells[self.index(row, col)].to_char());
            }
            out.push('\n');
        }
        out
    }
}

/// Wire form of a building grid (the "grid bundle").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridBundle {
    /// `grids[floor][row][col]`.
    pub grids: Vec<Vec<Vec<CellType>>>,
    /// Metres per cell.
    pub grid_size: f64,
    #[serde(default)]
    pub floors: Vec<Floor>,
    #[serde(default)]
    pub bbox: BoundingBox,
    #[serde(default = "default_unit_size")]
    pub unit_size: f64,
}

fn default_unit_size() -> f64 {
    1.0
}

/// A single cell relabeling, as sent by an editing client.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellEdit {
    pub floor: usize,
    pub row: usize,
    pub col: usize,
    #[serde(alias = "type")]
    pub cell_type: CellType,
}

/// Validated multi-floor grid.
///
/// All floors share the same dimensions. Instances are treated as immutable
/// snapshots: edits and buffering produce new values.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildingGrid {
    grids: Vec<FloorGrid>,
    grid_size: f64,
    floors: Vec<Floor>,
    bbox: BoundingBox,
    unit_size: f64,
}

impl BuildingGrid {
    /// Validates and assembles a building grid.
    ///
    /// An empty `floors` list is filled with evenly stacked default storeys.
    pub fn new(
        grids: Vec<FloorGrid>,
        grid_size: f64,
        floors: Vec<Floor>,
        bbox: BoundingBox,
    ) -> Result<Self> {
        let first = grids.first().ok_or(Error::EmptyGrid)?;
        let (rows, cols) = (first.rows(), first.cols());
        if rows == 0 || cols == 0 {
            return Err(Error::EmptyGrid);
        }
        for (i, grid) in grids.iter().enumerate().skip(1) {
            if grid.rows() != rows || grid.cols() != cols {
                return Err(Error::InvalidGridShape(format!(
                    "floor {} is {}x{}, floor 0 is {}x{}",
                    i,
                    grid.rows(),
                    grid.cols(),
                    rows,
                    cols
                )));
            }
        }
        if !(grid_size.is_finite() && grid_size > 0.0) {
            return Err(Error::InvalidGridSize(grid_size));
        }

        let floors = if floors.is_empty() {
            (0..grids.len())
                .map(|i| Floor::new(i as f64 * DEFAULT_FLOOR_HEIGHT, DEFAULT_FLOOR_HEIGHT))
                .collect()
        } else if floors.len() != grids.len() {
            return Err(Error::FloorCountMismatch {
                grids: grids.len(),
                floors: floors.len(),
            });
        } else {
            floors
        };

        Ok(Self {
            grids,
            grid_size,
            floors,
            bbox,
            unit_size: 1.0,
        })
    }

    /// Single-floor convenience constructor with a unit bounding box origin.
    pub fn single_floor(grid: FloorGrid, grid_size: f64) -> Result<Self> {
        Self::new(vec![grid], grid_size, Vec::new(), BoundingBox::default())
    }

    pub fn with_unit_size(mut self, unit_size: f64) -> Self {
        self.unit_size = unit_size;
        self
    }

    /// Same metadata, different floor grids (e.g. the buffered copy).
    pub fn with_grids(&self, grids: Vec<FloorGrid>) -> Result<Self> {
        let mut next = Self::new(grids, self.grid_size, self.floors.clone(), self.bbox)?;
        next.unit_size = self.unit_size;
        Ok(next)
    }

    /// Returns a new snapshot with the edits applied in order.
    pub fn with_edits(&self, edits: &[CellEdit]) -> Result<Self> {
        let mut next = self.clone();
        for edit in edits {
            let grid = next
                .grids
                .get_mut(edit.floor)
                .ok_or(Error::CellOutOfBounds {
                    row: edit.row,
                    col: edit.col,
                    floor: edit.floor,
                })?;
            if !grid.set(edit.row, edit.col, edit.cell_type) {
                return Err(Error::CellOutOfBounds {
                    row: edit.row,
                    col: edit.col,
                    floor: edit.floor,
                });
            }
        }
        Ok(next)
    }

    pub fn floor_count(&self) -> usize {
        self.grids.len()
    }

    pub fn rows(&self) -> usize {
        self.grids[0].rows()
    }

    pub fn cols(&self) -> usize {
        self.grids[0].cols()
    }

    pub fn grid_size(&self) -> f64 {
        self.grid_size
    }

    pub fn unit_size(&self) -> f64 {
        self.unit_size
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn floors(&self) -> &[Floor] {
        &self.floors
    }

    pub fn grids(&self) -> &[FloorGrid] {
        &self.grids
    }

    pub fn grid(&self, floor: usize) -> Option<&FloorGrid> {
        self.grids.get(floor)
    }

    pub fn cell(&self, coord: GridCoord) -> Option<CellType> {
        self.grids.get(coord.floor)?.get(coord.row, coord.col)
    }

    /// Vertical distance between two adjacent floors.
    ///
    /// Uses the elevation difference; falls back to the lower storey height
    /// when both floors report the same elevation.
    pub fn height_between(&self, a: usize, b: usize) -> f64 {
        let (lower, upper) = if a <= b { (a, b) } else { (b, a) };
        let diff = (self.floors[upper].elevation - self.floors[lower].elevation).abs();
        if diff > f64::EPSILON {
            diff
        } else {
            self.floors[lower].height
        }
    }

    /// Converts back to the wire form.
    pub fn to_bundle(&self) -> GridBundle {
        GridBundle {
            grids: self.grids.iter().map(FloorGrid::to_rows).collect(),
            grid_size: self.grid_size,
            floors: self.floors.clone(),
            bbox: self.bbox,
            unit_size: self.unit_size,
        }
    }

    /// Nested `grids[floor][row][col]` form only.
    pub fn to_nested(&self) -> Vec<Vec<Vec<CellType>>> {
        self.grids.iter().map(FloorGrid::to_rows).collect()
    }
}

impl TryFrom<GridBundle> for BuildingGrid {
    type Error = Error;

    fn try_from(bundle: GridBundle) -> Result<Self> {
        let grids = bundle
            .grids
            .into_iter()
            .enumerate()
            .map(|(floor, rows)| {
                FloorGrid::from_rows(rows).map_err(|e| match e {
                    Error::InvalidGridShape(reason) => {
                        Error::InvalidGridShape(format!("floor {floor}: {reason}"))
                    }
                    other => other,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(grids, bundle.grid_size, bundle.floors, bundle.bbox)?
            .with_unit_size(bundle.unit_size))
    }
}

impl From<&BuildingGrid> for GridBundle {
    fn from(grid: &BuildingGrid) -> Self {
        grid.to_bundle()
    }
}
