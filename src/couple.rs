//! The two-piece falling unit and its relation-aware movement rules.

use crate::board::{Board, BOARD_HEIGHT, BOARD_WIDTH};

/// Where the second piece sits relative to the first. The first piece is the
/// rotation pivot; the relation decides which cells a move has to probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Left,
    Right,
    Up,
    Down,
}

/// Commands accepted while a couple is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDir {
    Left,
    Right,
    Down,
    Rotate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved,
    /// Blocked or out of bounds; state unchanged. Normal input rejection,
    /// not an error.
    Rejected,
    /// A descent could not proceed; the couple is done and its pieces stay
    /// behind as independent grid cells.
    Locked,
}

/// The active falling pair, tracked as the grid coordinates of its two
/// pieces. The pieces themselves live in the grid; destroying the couple
/// leaves them in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Couple {
    pub a: (usize, usize),
    pub b: (usize, usize),
}

impl Couple {
    pub fn relation(&self) -> Relation {
        let ((ax, ay), (bx, by)) = (self.a, self.b);
        if bx > ax {
            Relation::Right
        } else if bx < ax {
            Relation::Left
        } else if by < ay {
            Relation::Up
        } else {
            Relation::Down
        }
    }

    pub fn cells(&self) -> [(usize, usize); 2] {
        [self.a, self.b]
    }
}

/// Apply one movement command. Blocked shifts and rotations are silently
/// rejected; a blocked descent reports `Locked` and the caller tears the
/// couple down.
pub fn apply(board: &mut Board, couple: &mut Couple, dir: MoveDir) -> MoveOutcome {
    match dir {
        MoveDir::Left => shift(board, couple, -1),
        MoveDir::Right => shift(board, couple, 1),
        MoveDir::Down => drop_step(board, couple),
        MoveDir::Rotate => rotate(board, couple),
    }
}

fn shift(board: &mut Board, couple: &mut Couple, dx: isize) -> MoveOutcome {
    let ((ax, ay), (bx, by)) = (couple.a, couple.b);
    let (Some(nax), Some(nbx)) = (ax.checked_add_signed(dx), bx.checked_add_signed(dx)) else {
        return MoveOutcome::Rejected;
    };
    if nax >= BOARD_WIDTH || nbx >= BOARD_WIDTH {
        return MoveOutcome::Rejected;
    }
    let grid = &mut board.grid;
    // Horizontal couples only probe the leading piece's destination; the
    // trailing piece moves into a cell the couple itself vacates.
    let blocked = match couple.relation() {
        Relation::Left => {
            if dx < 0 {
                !grid.is_free(nbx, by)
            } else {
                !grid.is_free(nax, ay)
            }
        }
        Relation::Right => {
            if dx < 0 {
                !grid.is_free(nax, ay)
            } else {
                !grid.is_free(nbx, by)
            }
        }
        Relation::Up | Relation::Down => !grid.is_free(nax, ay) || !grid.is_free(nbx, by),
    };
    if blocked {
        return MoveOutcome::Rejected;
    }
    let (Some(pa), Some(pb)) = (grid.take(ax, ay), grid.take(bx, by)) else {
        return MoveOutcome::Rejected;
    };
    grid.place(nax, ay, pa);
    grid.place(nbx, by, pb);
    couple.a = (nax, ay);
    couple.b = (nbx, by);
    MoveOutcome::Moved
}

fn drop_step(board: &mut Board, couple: &mut Couple) -> MoveOutcome {
    let ((ax, ay), (bx, by)) = (couple.a, couple.b);
    let both_falling = board.grid.get(ax, ay).is_some_and(|p| p.falling)
        && board.grid.get(bx, by).is_some_and(|p| p.falling);
    if !both_falling {
        return MoveOutcome::Rejected;
    }
    if ay + 1 >= BOARD_HEIGHT || by + 1 >= BOARD_HEIGHT {
        return MoveOutcome::Locked;
    }
    // For vertical couples only the lower piece's support matters.
    let clear_below = match couple.relation() {
        Relation::Up => board.grid.is_free(ax, ay + 1),
        Relation::Down => board.grid.is_free(bx, by + 1),
        Relation::Left | Relation::Right => {
            board.grid.is_free(ax, ay + 1) && board.grid.is_free(bx, by + 1)
        }
    };
    if !clear_below {
        return MoveOutcome::Locked;
    }
    let grid = &mut board.grid;
    let (Some(pa), Some(pb)) = (grid.take(ax, ay), grid.take(bx, by)) else {
        return MoveOutcome::Rejected;
    };
    grid.place(ax, ay + 1, pa);
    grid.place(bx, by + 1, pb);
    couple.a = (ax, ay + 1);
    couple.b = (bx, by + 1);
    MoveOutcome::Moved
}

/// The second piece pivots 90° clockwise around the first:
/// right → up → left → down → right. Each target orientation has its own
/// bounds and free-cell precondition; a failed check keeps the prior
/// orientation.
fn rotate(board: &mut Board, couple: &mut Couple) -> MoveOutcome {
    let (ax, ay) = couple.a;
    let (bx, by) = couple.b;
    let grid = &mut board.grid;
    let target = match couple.relation() {
        // rotating into "up" needs headroom above the pivot
        Relation::Right => (ay > 0 && grid.is_free(ax, ay - 1)).then(|| (ax, ay - 1)),
        Relation::Up => (ax > 0 && grid.is_free(ax - 1, ay)).then(|| (ax - 1, ay)),
        Relation::Left => (ay + 1 < BOARD_HEIGHT && grid.is_free(ax, ay + 1)).then(|| (ax, ay + 1)),
        Relation::Down => (ax + 1 < BOARD_WIDTH && grid.is_free(ax + 1, ay)).then(|| (ax + 1, ay)),
    };
    let Some((nx, ny)) = target else {
        return MoveOutcome::Rejected;
    };
    let Some(pb) = grid.take(bx, by) else {
        return MoveOutcome::Rejected;
    };
    grid.place(nx, ny, pb);
    couple.b = (nx, ny);
    MoveOutcome::Moved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Piece, PieceColor};

    fn spawn(board: &mut Board, a: (usize, usize), b: (usize, usize)) -> Couple {
        board.grid.place(a.0, a.1, Piece::new(PieceColor::Blue));
        board.grid.place(b.0, b.1, Piece::new(PieceColor::Green));
        Couple { a, b }
    }

    fn adjacent(couple: &Couple) -> bool {
        let ((ax, ay), (bx, by)) = (couple.a, couple.b);
        ax.abs_diff(bx) + ay.abs_diff(by) == 1
    }

    #[test]
    fn relation_tracks_piece_two() {
        let mut board = Board::new();
        let couple = spawn(&mut board, (2, 5), (3, 5));
        assert_eq!(couple.relation(), Relation::Right);
        let couple = Couple {
            a: (2, 5),
            b: (2, 4),
        };
        assert_eq!(couple.relation(), Relation::Up);
    }

    #[test]
    fn shift_moves_both_pieces() {
        let mut board = Board::new();
        let mut couple = spawn(&mut board, (2, 0), (3, 0));
        assert_eq!(apply(&mut board, &mut couple, MoveDir::Left), MoveOutcome::Moved);
        assert_eq!(couple.a, (1, 0));
        assert_eq!(couple.b, (2, 0));
        assert!(board.grid.get(1, 0).is_some());
        assert!(board.grid.get(2, 0).is_some());
        assert!(board.grid.is_free(3, 0));
        assert!(adjacent(&couple));
    }

    #[test]
    fn shift_rejected_at_the_wall() {
        let mut board = Board::new();
        let mut couple = spawn(&mut board, (0, 0), (1, 0));
        assert_eq!(
            apply(&mut board, &mut couple, MoveDir::Left),
            MoveOutcome::Rejected
        );
        assert_eq!(couple.a, (0, 0));
        assert_eq!(couple.b, (1, 0));
    }

    #[test]
    fn shift_rejected_by_leading_occupancy() {
        let mut board = Board::new();
        board.grid.place(4, 0, Piece::new(PieceColor::Garbage));
        let mut couple = spawn(&mut board, (2, 0), (3, 0));
        assert_eq!(
            apply(&mut board, &mut couple, MoveDir::Right),
            MoveOutcome::Rejected
        );
        assert_eq!(couple.b, (3, 0));
    }

    #[test]
    fn vertical_shift_needs_both_destination_cells() {
        let mut board = Board::new();
        // blocker beside the lower piece only
        board.grid.place(1, 6, Piece::new(PieceColor::Garbage));
        let mut couple = spawn(&mut board, (2, 6), (2, 5));
        assert_eq!(
            apply(&mut board, &mut couple, MoveDir::Left),
            MoveOutcome::Rejected
        );
        // the clear side is fine
        assert_eq!(apply(&mut board, &mut couple, MoveDir::Right), MoveOutcome::Moved);
        assert!(adjacent(&couple));
    }

    #[test]
    fn drop_locks_on_the_floor() {
        let mut board = Board::new();
        let mut couple = spawn(&mut board, (2, BOARD_HEIGHT - 1), (3, BOARD_HEIGHT - 1));
        assert_eq!(
            apply(&mut board, &mut couple, MoveDir::Down),
            MoveOutcome::Locked
        );
        // pieces stay behind as grid cells
        assert!(board.grid.get(2, BOARD_HEIGHT - 1).is_some());
        assert!(board.grid.get(3, BOARD_HEIGHT - 1).is_some());
    }

    #[test]
    fn drop_locks_on_occupied_support() {
        let mut board = Board::new();
        board.grid.place(2, 4, Piece::new(PieceColor::Garbage));
        let mut couple = spawn(&mut board, (2, 3), (3, 3));
        assert_eq!(
            apply(&mut board, &mut couple, MoveDir::Down),
            MoveOutcome::Locked
        );
    }

    #[test]
    fn vertical_drop_only_probes_the_lower_cell() {
        let mut board = Board::new();
        // b above a: support under a decides
        let mut couple = spawn(&mut board, (2, 5), (2, 4));
        assert_eq!(apply(&mut board, &mut couple, MoveDir::Down), MoveOutcome::Moved);
        assert_eq!(couple.a, (2, 6));
        assert_eq!(couple.b, (2, 5));
        assert!(adjacent(&couple));
    }

    #[test]
    fn rotation_cycles_clockwise_around_the_pivot() {
        let mut board = Board::new();
        let mut couple = spawn(&mut board, (2, 5), (3, 5));
        let expected = [
            ((2, 4), Relation::Up),
            ((1, 5), Relation::Left),
            ((2, 6), Relation::Down),
            ((3, 5), Relation::Right),
        ];
        for (pos, rel) in expected {
            assert_eq!(apply(&mut board, &mut couple, MoveDir::Rotate), MoveOutcome::Moved);
            assert_eq!(couple.b, pos);
            assert_eq!(couple.relation(), rel);
            assert_eq!(couple.a, (2, 5), "pivot never moves");
            assert!(adjacent(&couple));
        }
    }

    #[test]
    fn rotation_rejected_in_the_top_row() {
        let mut board = Board::new();
        let mut couple = spawn(&mut board, (2, 0), (3, 0));
        assert_eq!(
            apply(&mut board, &mut couple, MoveDir::Rotate),
            MoveOutcome::Rejected
        );
        assert_eq!(couple.relation(), Relation::Right);
    }

    #[test]
    fn rotation_rejected_into_occupied_cell() {
        let mut board = Board::new();
        board.grid.place(2, 4, Piece::new(PieceColor::Garbage));
        let mut couple = spawn(&mut board, (2, 5), (3, 5));
        assert_eq!(
            apply(&mut board, &mut couple, MoveDir::Rotate),
            MoveOutcome::Rejected
        );
        assert_eq!(couple.b, (3, 5));
    }

    #[test]
    fn rotation_rejected_against_the_left_wall() {
        let mut board = Board::new();
        // b above a with the pivot on column 0: up → left needs x > 0
        let mut couple = spawn(&mut board, (0, 5), (0, 4));
        assert_eq!(
            apply(&mut board, &mut couple, MoveDir::Rotate),
            MoveOutcome::Rejected
        );
        assert_eq!(couple.relation(), Relation::Up);
    }
}
