//! Movement pathfinding over the walkable grid

use std::collections::{HashMap, HashSet, VecDeque};

use super::grid::{ChapterGrid, ChapterPos};

/// Shortest 4-connected path from `start` to `end`, both ends included.
///
/// Returns `None` when either endpoint is not walkable or `end` is unreachable.
/// Neighbours are probed in the order row+1, row-1, column+1, column-1 and
/// never below 1.
pub fn find_move_path(grids: &[ChapterGrid], start: ChapterPos, end: ChapterPos) -> Option<Vec<ChapterPos>> {
    if start == end {
        return Some(vec![start]);
    }

    let walkable: HashSet<ChapterPos> = grids
        .iter()
        .filter(|grid| grid.walkable)
        .map(ChapterGrid::pos)
        .collect();
    if !walkable.contains(&start) || !walkable.contains(&end) {
        return None;
    }

    let mut parent: HashMap<ChapterPos, ChapterPos> = HashMap::new();
    let mut visited: HashSet<ChapterPos> = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);

    while let Some(current) = queue.pop_front() {
        if current == end {
            break;
        }
        for neighbor in neighbors(current) {
            if !walkable.contains(&neighbor) || !visited.insert(neighbor) {
                continue;
            }
            parent.insert(neighbor, current);
            queue.push_back(neighbor);
        }
    }

    if !visited.contains(&end) {
        return None;
    }

    let mut path = vec![end];
    let mut cursor = end;
    while let Some(&previous) = parent.get(&cursor) {
        path.push(previous);
        cursor = previous;
    }
    path.reverse();
    Some(path)
}

fn neighbors(pos: ChapterPos) -> impl Iterator<Item = ChapterPos> {
    let ChapterPos { row, column } = pos;
    [
        Some(ChapterPos::new(row + 1, column)),
        (row > 1).then(|| ChapterPos::new(row - 1, column)),
        Some(ChapterPos::new(row, column + 1)),
        (column > 1).then(|| ChapterPos::new(row, column - 1)),
    ]
    .into_iter()
    .flatten()
}
