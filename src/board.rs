//! Per-player board: grid storage, gravity settling, combo detection.

use rand::Rng;

/// Board width in cells. Fixed; garbage rows and attack caps derive from it.
pub const BOARD_WIDTH: usize = 6;
/// Board height in cells. Row 0 is the top (spawn row).
pub const BOARD_HEIGHT: usize = 12;
/// Minimum coloured pieces in a connected group for it to clear.
pub const CHAIN_MIN: usize = 4;

/// Forced-descent cadence in simulation ticks (~500 ms at 60 ticks/s).
pub const FORCED_DROP_TICKS: u32 = 30;

/// Piece colours. Five chain colours plus the neutral garbage colour, which
/// never forms chains but clears as a passenger of an adjacent group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceColor {
    Blue,
    Green,
    Orange,
    Yellow,
    Purple,
    Garbage,
}

impl PieceColor {
    pub const CHAIN_COLORS: [Self; 5] = [
        Self::Blue,
        Self::Green,
        Self::Orange,
        Self::Yellow,
        Self::Purple,
    ];

    /// Uniformly random chain colour (never garbage).
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self::CHAIN_COLORS[rng.random_range(0..Self::CHAIN_COLORS.len())]
    }

    #[inline]
    pub fn is_garbage(self) -> bool {
        self == Self::Garbage
    }

    /// Index into theme.puyo_color().
    pub fn palette_index(self) -> u8 {
        match self {
            Self::Blue => 0,
            Self::Green => 1,
            Self::Orange => 2,
            Self::Yellow => 3,
            Self::Purple => 4,
            Self::Garbage => 5,
        }
    }
}

/// One occupied cell. Coordinates are implicit in the grid slot that owns the
/// piece, so slot and position can never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    pub color: PieceColor,
    /// Eligible for gravity this pass. Settling clears it when the piece rests.
    pub falling: bool,
}

impl Piece {
    pub fn new(color: PieceColor) -> Self {
        Self {
            color,
            falling: true,
        }
    }
}

/// Fixed-size cell matrix, pure storage. `cells[x][y]`, y = 0 at the top.
/// Out-of-range access panics via the array bounds check.
#[derive(Debug, Clone)]
pub struct Grid {
    cells: [[Option<Piece>; BOARD_HEIGHT]; BOARD_WIDTH],
}

impl Grid {
    pub fn new() -> Self {
        Self {
            cells: [[None; BOARD_HEIGHT]; BOARD_WIDTH],
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<Piece> {
        self.cells[x][y]
    }

    /// Like `get` but tolerant of out-of-range coordinates (flood fill probes
    /// neighbours without pre-checking bounds).
    #[inline]
    pub fn probe(&self, x: i32, y: i32) -> Option<Piece> {
        if x < 0 || y < 0 || x as usize >= BOARD_WIDTH || y as usize >= BOARD_HEIGHT {
            return None;
        }
        self.cells[x as usize][y as usize]
    }

    #[inline]
    pub fn is_free(&self, x: usize, y: usize) -> bool {
        self.cells[x][y].is_none()
    }

    /// Place a piece into an empty cell. Writing over an occupied cell would
    /// break single-ownership, hence the debug assert.
    pub fn place(&mut self, x: usize, y: usize, piece: Piece) {
        debug_assert!(self.cells[x][y].is_none(), "cell ({x},{y}) already occupied");
        self.cells[x][y] = Some(piece);
    }

    pub fn take(&mut self, x: usize, y: usize) -> Option<Piece> {
        self.cells[x][y].take()
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::new()
    }
}

/// A connected group found by one resolver pass: the removed cells (passengers
/// included) and the coloured count that keyed the removal.
#[derive(Debug)]
pub struct ComboGroup {
    pub cells: Vec<(usize, usize, PieceColor)>,
    pub colored: usize,
}

impl ComboGroup {
    /// Garbage units generated, keyed on the coloured group size only.
    pub fn attack_units(&self) -> u32 {
        match self.colored {
            4 => 1,
            5 => 3,
            6 => 5,
            7 => 6,
            _ => 1,
        }
    }
}

/// One player's board: the grid plus per-board match state.
#[derive(Debug, Clone)]
pub struct Board {
    pub grid: Grid,
    /// Terminal, one-way. Set when a couple spawn finds its entry cells taken.
    pub lost: bool,
    /// Terminal, one-way. Set when every other board is lost.
    pub won: bool,
    /// Garbage pieces owed; materialized on the next lock.
    pub pending_garbage: u32,
    /// Ticks since the last forced descent (or soft drop).
    pub ticks_since_drop: u32,
}

impl Board {
    pub fn new() -> Self {
        Self {
            grid: Grid::new(),
            lost: false,
            won: false,
            pending_garbage: 0,
            ticks_since_drop: 0,
        }
    }

    fn set_all_falling(&mut self) {
        for column in &mut self.grid.cells {
            for cell in column.iter_mut().flatten() {
                cell.falling = true;
            }
        }
    }

    /// One gravity relaxation pass: every piece becomes falling-eligible, then
    /// each column is scanned top-down and falling pieces drop into empty
    /// cells. Pieces at `skip` (the active couple) are left to the movement
    /// engine. Returns whether anything moved; callers loop to fixpoint.
    pub fn settle(&mut self, skip: Option<[(usize, usize); 2]>) -> bool {
        self.set_all_falling();
        let mut moved = false;
        for x in 0..BOARD_WIDTH {
            for y in 0..BOARD_HEIGHT {
                let Some(piece) = self.grid.cells[x][y] else {
                    continue;
                };
                if !piece.falling {
                    continue;
                }
                if skip.is_some_and(|cells| cells.contains(&(x, y))) {
                    continue;
                }
                if y + 1 < BOARD_HEIGHT && self.grid.cells[x][y + 1].is_none() {
                    self.grid.cells[x][y] = None;
                    self.grid.cells[x][y + 1] = Some(piece);
                    moved = true;
                } else if let Some(p) = self.grid.cells[x][y].as_mut() {
                    p.falling = false;
                }
            }
        }
        moved
    }

    /// One combo scan: every cell visited once in fixed column-major order,
    /// flood-filling same-colour groups (4-directional). Garbage neighbours
    /// ride along without extending the search or counting toward the
    /// threshold. Qualifying groups are removed immediately and returned.
    pub fn resolve_once(&mut self) -> Vec<ComboGroup> {
        let mut visited = [[false; BOARD_HEIGHT]; BOARD_WIDTH];
        let mut groups = Vec::new();
        for x in 0..BOARD_WIDTH {
            for y in 0..BOARD_HEIGHT {
                let Some(piece) = self.grid.get(x, y) else {
                    continue;
                };
                if visited[x][y] || piece.color.is_garbage() {
                    continue;
                }
                let mut members = Vec::new();
                let mut swept = Vec::new();
                self.flood(
                    x as i32,
                    y as i32,
                    piece.color,
                    &mut visited,
                    &mut members,
                    &mut swept,
                );
                if members.len() < CHAIN_MIN {
                    continue;
                }
                let mut cells = Vec::with_capacity(members.len() + swept.len());
                for &(cx, cy) in members.iter().chain(swept.iter()) {
                    if let Some(removed) = self.grid.take(cx, cy) {
                        cells.push((cx, cy, removed.color));
                    }
                }
                groups.push(ComboGroup {
                    cells,
                    colored: members.len(),
                });
            }
        }
        groups
    }

    /// Recursive 4-directional search. Same-colour cells are marked in the
    /// scan-wide visited set and recursed into; garbage cells are collected
    /// once per group and never searched past.
    fn flood(
        &self,
        x: i32,
        y: i32,
        color: PieceColor,
        visited: &mut [[bool; BOARD_HEIGHT]; BOARD_WIDTH],
        members: &mut Vec<(usize, usize)>,
        swept: &mut Vec<(usize, usize)>,
    ) {
        let Some(piece) = self.grid.probe(x, y) else {
            return;
        };
        let (ux, uy) = (x as usize, y as usize);
        if piece.color == color {
            if visited[ux][uy] {
                return;
            }
            visited[ux][uy] = true;
            members.push((ux, uy));
            self.flood(x, y - 1, color, visited, members, swept);
            self.flood(x - 1, y, color, visited, members, swept);
            self.flood(x + 1, y, color, visited, members, swept);
            self.flood(x, y + 1, color, visited, members, swept);
        } else if piece.color.is_garbage() && !swept.contains(&(ux, uy)) {
            swept.push((ux, uy));
        }
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}
