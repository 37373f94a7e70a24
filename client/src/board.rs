//! Local replica of the server's minefield

use log::debug;
use ndarray::Array2;
use shared::{BoardSnapshot, Cell, CellPatch, FlagState, GameConstants};

/// Counts from applying one batch of cell patches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchOutcome {
    pub applied: usize,
    pub skipped: usize,
    pub newly_revealed: u64,
}

impl PatchOutcome {
    pub fn changed(&self) -> bool {
        self.applied > 0
    }
}

/// The board as last told by the server.
///
/// Dimensions are fixed by the snapshot that created the replica; a new
/// snapshot replaces the whole replica rather than resizing it.
/// `cells_remaining` only ever goes down between snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardReplica {
    cells: Array2<Cell>,
    cells_remaining: u64,
    constants: GameConstants,
    restart_time: Option<i64>,
}

impl BoardReplica {
    pub fn from_snapshot(snapshot: BoardSnapshot) -> Self {
        Self {
            cells: snapshot.cells,
            cells_remaining: snapshot.cells_remaining,
            constants: snapshot.constants,
            restart_time: snapshot.restart_time,
        }
    }

    pub fn width(&self) -> usize {
        self.cells.dim().0
    }

    pub fn height(&self) -> usize {
        self.cells.dim().1
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, x: usize, y: usize) -> Option<&Cell> {
        self.cells.get((x, y))
    }

    pub fn cells(&self) -> &Array2<Cell> {
        &self.cells
    }

    /// Safe cells not yet revealed.
    pub fn cells_remaining(&self) -> u64 {
        self.cells_remaining
    }

    pub fn constants(&self) -> &GameConstants {
        &self.constants
    }

    pub fn restart_time(&self) -> Option<i64> {
        self.restart_time
    }

    /// Applies cell changes in order. Coordinates outside the board are
    /// skipped. Every hidden cell that turns into a revealed non-mine cell
    /// counts once against `cells_remaining`, which stops at zero.
    pub fn apply_patch(&mut self, patches: &[CellPatch]) -> PatchOutcome {
        let mut outcome = PatchOutcome::default();

        for patch in patches {
            let Some(cell) = self.cell_mut(patch.x, patch.y) else {
                debug!("Skipping cell update outside board at ({}, {})", patch.x, patch.y);
                outcome.skipped += 1;
                continue;
            };

            let update = &patch.update;
            if !cell.revealed && update.revealed && !update.mine {
                outcome.newly_revealed += 1;
            }

            cell.revealed = update.revealed;
            cell.mine = update.mine;
            cell.adjacent_mines = update.adjacent_mines;
            if let Some(flag) = update.flag {
                cell.flag = flag;
                cell.flag_owner = match flag {
                    FlagState::Placed => update.flag_owner.clone(),
                    FlagState::Clear => None,
                };
            }

            outcome.applied += 1;
        }

        self.cells_remaining = self.cells_remaining.saturating_sub(outcome.newly_revealed);
        outcome
    }

    fn cell_mut(&mut self, x: i64, y: i64) -> Option<&mut Cell> {
        let x = usize::try_from(x).ok()?;
        let y = usize::try_from(y).ok()?;
        self.cells.get_mut((x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::CellUpdate;

    /// 3x3 board, every cell hidden, mine at the centre.
    fn three_by_three() -> BoardReplica {
        let mut cells = Array2::from_elem((3, 3), Cell::hidden());
        cells[(1, 1)].mine = true;
        BoardReplica::from_snapshot(BoardSnapshot {
            cells,
            cells_remaining: 8,
            constants: GameConstants::default(),
            phase: None,
            restart_time: None,
            players: None,
        })
    }

    fn reveal(x: i64, y: i64, adjacent_mines: u32) -> CellPatch {
        CellPatch {
            x,
            y,
            update: CellUpdate {
                revealed: true,
                mine: false,
                adjacent_mines,
                flag: Some(FlagState::Clear),
                flag_owner: None,
            },
        }
    }

    fn flag(x: i64, y: i64, owner: Option<&str>) -> CellPatch {
        CellPatch {
            x,
            y,
            update: CellUpdate {
                flag: Some(if owner.is_some() {
                    FlagState::Placed
                } else {
                    FlagState::Clear
                }),
                flag_owner: owner.map(str::to_string),
                ..CellUpdate::default()
            },
        }
    }

    #[test]
    fn test_snapshot_dimensions() {
        let board = three_by_three();
        assert_eq!(board.width(), 3);
        assert_eq!(board.height(), 3);
        assert_eq!(board.cells_remaining(), 8);
        assert!(board.cell(1, 1).unwrap().mine);
        assert!(board.cell(3, 0).is_none());
    }

    #[test]
    fn test_reveal_decrements_cells_remaining() {
        let mut board = three_by_three();

        let outcome = board.apply_patch(&[reveal(0, 0, 1)]);

        assert_eq!(outcome.newly_revealed, 1);
        assert_eq!(board.cells_remaining(), 7);
        let cell = board.cell(0, 0).unwrap();
        assert!(cell.revealed);
        assert!(!cell.mine);
        assert_eq!(cell.adjacent_mines, 1);
    }

    #[test]
    fn test_out_of_bounds_patch_leaves_board_unchanged() {
        let mut board = three_by_three();
        let before = board.clone();

        let outcome = board.apply_patch(&[
            reveal(3, 0, 0),
            reveal(0, 3, 0),
            reveal(-1, 1, 0),
            reveal(99, 99, 0),
        ]);

        assert_eq!(outcome.applied, 0);
        assert_eq!(outcome.skipped, 4);
        assert!(!outcome.changed());
        assert_eq!(board, before);
    }

    #[test]
    fn test_revealing_twice_counts_once() {
        let mut board = three_by_three();
        board.apply_patch(&[reveal(0, 0, 1)]);
        board.apply_patch(&[reveal(0, 0, 1), reveal(0, 0, 1)]);
        assert_eq!(board.cells_remaining(), 7);
    }

    #[test]
    fn test_mine_reveal_does_not_count() {
        let mut board = three_by_three();
        let mut hit = reveal(1, 1, 0);
        hit.update.mine = true;

        let outcome = board.apply_patch(&[hit]);

        assert_eq!(outcome.newly_revealed, 0);
        assert_eq!(board.cells_remaining(), 8);
        assert!(board.cell(1, 1).unwrap().revealed);
    }

    #[test]
    fn test_cells_remaining_floors_at_zero() {
        // Server undercounted: more safe cells than it claims remain
        let mut board = BoardReplica::from_snapshot(BoardSnapshot {
            cells: Array2::from_elem((2, 2), Cell::hidden()),
            cells_remaining: 1,
            constants: GameConstants::default(),
            phase: None,
            restart_time: None,
            players: None,
        });

        let outcome = board.apply_patch(&[reveal(0, 0, 0), reveal(0, 1, 0), reveal(1, 1, 0)]);

        assert_eq!(outcome.newly_revealed, 3);
        assert_eq!(board.cells_remaining(), 0);
    }

    #[test]
    fn test_cells_remaining_matches_transition_count() {
        let mut board = three_by_three();
        let batches = vec![
            vec![reveal(0, 0, 1), reveal(0, 1, 1)],
            vec![reveal(0, 1, 1), reveal(7, 7, 0), reveal(2, 2, 1)],
            vec![flag(1, 0, Some("p1")), reveal(2, 0, 1)],
        ];

        let mut transitions = 0;
        let mut previous = board.cells_remaining();
        for batch in &batches {
            transitions += board.apply_patch(batch).newly_revealed;
            assert!(board.cells_remaining() <= previous);
            previous = board.cells_remaining();
        }

        assert_eq!(transitions, 4);
        assert_eq!(board.cells_remaining(), 8 - transitions);
    }

    #[test]
    fn test_flag_owner_set_and_cleared() {
        let mut board = three_by_three();

        board.apply_patch(&[flag(2, 1, Some("p1"))]);
        let cell = board.cell(2, 1).unwrap();
        assert!(cell.is_flagged());
        assert_eq!(cell.flag_owner.as_deref(), Some("p1"));

        board.apply_patch(&[flag(2, 1, None)]);
        let cell = board.cell(2, 1).unwrap();
        assert!(!cell.is_flagged());
        assert_eq!(cell.flag_owner, None);
    }

    #[test]
    fn test_unknown_flag_state_keeps_existing_flag() {
        let mut board = three_by_three();
        board.apply_patch(&[flag(0, 2, Some("p2"))]);

        let mut odd = flag(0, 2, None);
        odd.update.flag = None;
        board.apply_patch(&[odd]);

        let cell = board.cell(0, 2).unwrap();
        assert!(cell.is_flagged());
        assert_eq!(cell.flag_owner.as_deref(), Some("p2"));
    }

    #[test]
    fn test_patch_order_within_batch() {
        let mut board = three_by_three();

        let outcome = board.apply_patch(&[flag(0, 0, Some("p1")), reveal(0, 0, 2)]);

        assert_eq!(outcome.applied, 2);
        let cell = board.cell(0, 0).unwrap();
        assert!(cell.revealed);
        assert!(!cell.is_flagged());
        assert_eq!(cell.adjacent_mines, 2);
    }
}
