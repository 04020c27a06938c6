// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Exit detection
//!
//! A door is an exit when it opens onto the building exterior: a 4-neighbour
//! is off-grid, or is an `empty` cell of the floor's outer region (the
//! `empty` cells reachable from the grid border without crossing anything
//! else).

use serde::{Deserialize, Serialize};

use crate::types::{BuildingGrid, CellType, FloorGrid, GridCoord};

/// Exit detection parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitConfig {
    /// Also treat a door as an exit when it opens onto a `floor`, `stair`
    /// or `empty` cell lying on the grid border.
    pub floor_touching_boundary_is_exterior: bool,
    /// Collapse each 4-connected group of doors into one exit, the member
    /// closest to the group centroid.
    pub group_doors: bool,
}

/// Detects exits on every floor, sorted by floor then row-major.
pub fn detect_exits(grid: &BuildingGrid, config: &ExitConfig) -> Vec<GridCoord> {
    let mut exits = Vec::new();
    for (floor, floor_grid) in grid.grids().iter().enumerate() {
        let outer = outer_region(floor_grid);
        let is_exit = |row: usize, col: usize| door_is_exit(floor_grid, &outer, row, col, config);

        if config.group_doors {
            for group in door_groups(floor_grid) {
                if group.iter().any(|&(r, c)| is_exit(r, c)) {
                    let (row, col) = representative(&group);
                    exits.push(GridCoord::new(row, col, floor));
                }
            }
        } else {
            for (row, col, cell) in floor_grid.iter() {
                if cell == CellType::Door && is_exit(row, col) {
                    exits.push(GridCoord::new(row, col, floor));
                }
            }
        }
    }
    exits.sort_by_key(|c| (c.floor, c.row, c.col));
    exits
}

/// Marks `empty` cells connected to the grid border through `empty` cells.
fn outer_region(grid: &FloorGrid) -> Vec<bool> {
    let mut outer = vec![false; grid.len()];
    let mut stack = Vec::new();

    for (row, col, cell) in grid.iter() {
        let on_border = row == 0 || col == 0 || row + 1 == grid.rows() || col + 1 == grid.cols();
        if on_border && cell == CellType::Empty {
            outer[grid.index(row, col)] = true;
            stack.push((row as i64, col as i64));
        }
    }

    while let Some((r, c)) = stack.pop() {
        for (nr, nc) in [(r - 1, c), (r + 1, c), (r, c - 1), (r, c + 1)] {
            if grid.get_signed(nr, nc) == Some(CellType::Empty) {
                let idx = grid.index(nr as usize, nc as usize);
                if !outer[idx] {
                    outer[idx] = true;
                    stack.push((nr, nc));
                }
            }
        }
    }
    outer
}

fn door_is_exit(
    grid: &FloorGrid,
    outer: &[bool],
    row: usize,
    col: usize,
    config: &ExitConfig,
) -> bool {
    let (r, c) = (row as i64, col as i64);
    [(r - 1, c), (r + 1, c), (r, c - 1), (r, c + 1)]
        .into_iter()
        .any(|(nr, nc)| match grid.get_signed(nr, nc) {
            None => true,
            Some(CellType::Empty) if outer[grid.index(nr as usize, nc as usize)] => true,
            Some(cell) if config.floor_touching_boundary_is_exterior => {
                let on_border = nr == 0
                    || nc == 0
                    || nr as usize + 1 == grid.rows()
                    || nc as usize + 1 == grid.cols();
                on_border && matches!(cell, CellType::Floor | CellType::Stair | CellType::Empty)
            }
            Some(_) => false,
        })
}

fn door_groups(grid: &FloorGrid) -> Vec<Vec<(usize, usize)>> {
    let mut seen = vec![false; grid.len()];
    let mut groups = Vec::new();

    for (row, col, cell) in grid.iter() {
        if cell != CellType::Door || seen[grid.index(row, col)] {
            continue;
        }
        seen[grid.index(row, col)] = true;
        let mut stack = vec![(row as i64, col as i64)];
        let mut group = Vec::new();
        while let Some((r, c)) = stack.pop() {
            group.push((r as usize, c as usize));
            for (nr, nc) in [(r - 1, c), (r + 1, c), (r, c - 1), (r, c + 1)] {
                if grid.get_signed(nr, nc) == Some(CellType::Door) {
                    let idx = grid.index(nr as usize, nc as usize);
                    if !seen[idx] {
                        seen[idx] = true;
                        stack.push((nr, nc));
                    }
                }
            }
        }
        group.sort_unstable();
        groups.push(group);
    }
    groups
}

/// Group member closest to the centroid; ties go to the first in row-major order.
fn representative(group: &[(usize, usize)]) -> (usize, usize) {
    let n = group.len() as f64;
    let mean_r = group.iter().map(|&(r, _)| r as f64).sum::<f64>() / n;
    let mean_c = group.iter().map(|&(_, c)| c as f64).sum::<f64>() / n;
    let dist = |&(r, c): &(usize, usize)| {
        let (dr, dc) = (r as f64 - mean_r, c as f64 - mean_c);
        dr * dr + dc * dc
    };
    group
        .iter()
        .copied()
        .fold(None, |best: Option<(usize, usize)>, cell| match best {
            Some(b) if dist(&b) <= dist(&cell) => Some(b),
            _ => Some(cell),
        })
        .unwrap_or((0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn building(drawing: &str) -> BuildingGrid {
        BuildingGrid::single_floor(FloorGrid::from_ascii(drawing).unwrap(), 1.0).unwrap()
    }

    #[test]
    fn boundary_door_is_an_exit() {
        let grid = building(
            "##D##
             #...#
             #...#
             #...#
             #####",
        );
        let exits = detect_exits(&grid, &ExitConfig::default());
        assert_eq!(exits, vec![GridCoord::new(0, 2, 0)]);
    }

    #[test]
    fn interior_doors_are_not_exits() {
        let grid = building(
            "#######
             #__D__#
             #######",
        );
        assert!(detect_exits(&grid, &ExitConfig::default()).is_empty());
    }

    #[test]
    fn door_onto_outer_empty_region() {
        let grid = building(
            ".......
             .#####.
             .#__D..
             .#####.
             .......",
        );
        let exits = detect_exits(&grid, &ExitConfig::default());
        assert_eq!(exits, vec![GridCoord::new(2, 4, 0)]);
    }

    #[test]
    fn enclosed_empty_pocket_is_not_exterior() {
        let grid = building(
            "#######
             #__D..#
             #######",
        );
        assert!(detect_exits(&grid, &ExitConfig::default()).is_empty());
    }

    #[test]
    fn floor_on_border_is_configurable() {
        let grid = building(
            "#####
             #_D__
             #####",
        );
        assert!(detect_exits(&grid, &ExitConfig::default()).is_empty());

        let config = ExitConfig {
            floor_touching_boundary_is_exterior: true,
            ..ExitConfig::default()
        };
        assert_eq!(detect_exits(&grid, &config).len(), 0);

        let grid = building(
            "#####
             #__D_
             #####",
        );
        assert_eq!(detect_exits(&grid, &config), vec![GridCoord::new(1, 3, 0)]);
    }

    #[test]
    fn grouped_doors_collapse_to_the_middle() {
        let grid = building(
            "#DDD#
             #___#
             #####",
        );
        let all = detect_exits(&grid, &ExitConfig::default());
        assert_eq!(all.len(), 3);

        let config = ExitConfig {
            group_doors: true,
            ..ExitConfig::default()
        };
        assert_eq!(detect_exits(&grid, &config), vec![GridCoord::new(0, 2, 0)]);
    }

    #[test]
    fn exits_are_found_per_floor() {
        let ground = FloorGrid::from_ascii("#D#\n#_#").unwrap();
        let upper = FloorGrid::from_ascii("###\n#_D").unwrap();
        let grid =
            BuildingGrid::new(vec![ground, upper], 1.0, Vec::new(), Default::default()).unwrap();
        let exits = detect_exits(&grid, &ExitConfig::default());
        assert_eq!(exits, vec![GridCoord::new(0, 1, 0), GridCoord::new(1, 2, 1)]);
    }

    #[test]
    fn no_doors_no_exits() {
        let grid = building("___\n___");
        assert!(detect_exits(&grid, &ExitConfig::default()).is_empty());
    }
}
