use std::{cmp::Reverse, collections::VecDeque};

use shared::domain::{CellId, CellType, Route};
use tracing::debug;

use crate::board::Board;

pub const DEFAULT_MIN_REAL: usize = 2;

/// A completed route together with the number of `Real` cells it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteCandidate {
    pub real_count: usize,
    pub route: Route,
}

struct Partial {
    current: CellId,
    path: Vec<CellId>,
    real_count: usize,
    r1_used: usize,
}

impl Partial {
    fn seed(board: &Board, start: CellId) -> Self {
        let kind = board.get(start);
        Self {
            current: start,
            path: vec![start],
            real_count: usize::from(kind == CellType::Real),
            r1_used: usize::from(kind == CellType::R1),
        }
    }

    fn extend(&self, next: CellId, kind: CellType) -> Self {
        let mut path = Vec::with_capacity(self.path.len() + 1);
        path.extend_from_slice(&self.path);
        path.push(next);
        Self {
            current: next,
            path,
            real_count: self.real_count + usize::from(kind == CellType::Real),
            r1_used: self.r1_used + usize::from(kind == CellType::R1),
        }
    }
}

pub struct PathFinder<'a> {
    board: &'a Board,
    min_real: usize,
}

impl<'a> PathFinder<'a> {
    pub fn new(board: &'a Board, min_real: usize) -> Self {
        Self { board, min_real }
    }

    /// Best-first list of every quota-satisfying route from the board's own
    /// first-row cells to its last-row cells.
    pub fn find_routes(&self) -> Vec<RouteCandidate> {
        self.find_routes_between(&self.board.start_cells(), &self.board.end_cells())
    }

    pub fn best_route(&self) -> Option<RouteCandidate> {
        self.find_routes().into_iter().next()
    }

    /// Runs one breadth-first expansion per start cell and ranks the pooled
    /// completions by most `Real` cells, then shortest.
    pub fn find_routes_between(&self, starts: &[CellId], ends: &[CellId]) -> Vec<RouteCandidate> {
        let ends: Vec<CellId> = ends
            .iter()
            .copied()
            .filter(|cell| cell.is_last_row() && self.board.get(*cell).is_traversable())
            .collect();

        let mut completions = Vec::new();
        for start in starts
            .iter()
            .copied()
            .filter(|cell| cell.is_first_row() && self.board.get(*cell).is_traversable())
        {
            self.expand_from(start, &ends, &mut completions);
        }

        completions.sort_by_key(|c: &RouteCandidate| (Reverse(c.real_count), c.route.len()));
        debug!(
            candidates = completions.len(),
            min_real = self.min_real,
            "route search finished"
        );
        completions
    }

    fn expand_from(&self, start: CellId, ends: &[CellId], completions: &mut Vec<RouteCandidate>) {
        let seed = Partial::seed(self.board, start);
        if seed.r1_used > 1 {
            return;
        }

        let mut queue = VecDeque::from([seed]);
        while let Some(partial) = queue.pop_front() {
            if ends.contains(&partial.current) && partial.real_count >= self.min_real {
                completions.push(RouteCandidate {
                    real_count: partial.real_count,
                    route: Route::from(partial.path),
                });
                continue;
            }

            let mut next_cells: Vec<CellId> = self
                .board
                .neighbors(partial.current)
                .into_iter()
                .filter(|next| !partial.path.contains(next))
                .collect();
            next_cells.sort_by_key(|next| self.priority(*next, partial.r1_used));

            for next in next_cells {
                let kind = self.board.get(next);
                let extended = partial.extend(next, kind);
                if extended.r1_used <= 1 {
                    queue.push_back(extended);
                }
            }
        }
    }

    fn priority(&self, cell: CellId, r1_used: usize) -> u8 {
        match self.board.get(cell) {
            CellType::Real => 0,
            CellType::Empty => 1,
            CellType::R1 if r1_used == 0 => 2,
            _ => 3,
        }
    }
}

#[cfg(test)]
#[path = "tests/finder_tests.rs"]
mod tests;
