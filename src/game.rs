//! Match state: four boards, couple spawning, the tick loop, and the garbage
//! attack protocol between players.

use crate::board::{Board, ComboGroup, Piece, PieceColor, BOARD_WIDTH, FORCED_DROP_TICKS};
use crate::couple::{self, Couple, MoveDir, MoveOutcome};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Fixed number of player slots.
pub const PLAYER_COUNT: usize = 4;
/// Entry columns for a freshly spawned couple (piece one, piece two).
pub const SPAWN_COLS: (usize, usize) = (2, 3);

/// Particle lifetime in simulation ticks (~500 ms at 60 ticks/s).
const PARTICLE_TTL_TICKS: u32 = 30;
/// Cosmetic burst size per cleared coloured piece.
const PARTICLES_PER_PIECE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerKind {
    Human,
    Cpu,
}

/// Ephemeral visual spark emitted on a clear. Position and velocity are in
/// board cell units; the renderer maps them to the screen.
#[derive(Debug, Clone, Copy)]
pub struct Particle {
    pub player: usize,
    pub x: f32,
    pub y: f32,
    pub x_vel: f32,
    pub y_vel: f32,
    pub color: PieceColor,
    pub ttl: u32,
}

/// One qualifying combo pass on one board, surfaced to the presentation
/// layer (clear flash, chain sound cue).
#[derive(Debug)]
pub struct ChainEvent {
    pub player: usize,
    pub cells: Vec<(usize, usize)>,
    pub units: u32,
}

#[derive(Debug, Default)]
pub struct TickEvents {
    pub chains: Vec<ChainEvent>,
}

/// The whole four-board match. Boards are updated strictly in slot order;
/// the pending-garbage counters are the only state crossing board
/// boundaries.
pub struct Match {
    pub players: [PlayerKind; PLAYER_COUNT],
    pub boards: [Board; PLAYER_COUNT],
    pub couples: [Option<Couple>; PLAYER_COUNT],
    pub particles: Vec<Particle>,
    pub over: bool,
    rng: StdRng,
}

impl Match {
    /// New match with `humans` human-controlled slots (the rest are CPU) and
    /// a fixed RNG seed. The same seed and command sequence replays to the
    /// same outcome.
    pub fn new(humans: usize, seed: u64) -> Self {
        let mut players = [PlayerKind::Cpu; PLAYER_COUNT];
        for kind in players.iter_mut().take(humans.clamp(1, PLAYER_COUNT)) {
            *kind = PlayerKind::Human;
        }
        Self {
            players,
            boards: std::array::from_fn(|_| Board::new()),
            couples: [None; PLAYER_COUNT],
            particles: Vec::new(),
            over: false,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Movement command from the input layer. Ignored for slots with no
    /// active couple or with a finished board.
    pub fn apply_move(&mut self, player: usize, dir: MoveDir) -> TickEvents {
        let mut events = TickEvents::default();
        self.command(player, dir, &mut events);
        events
    }

    /// Advance the simulation one tick: per slot in fixed order, spawn or
    /// force-descend the couple and let loose pieces settle; lost boards
    /// forward their garbage backlog. Returns the tick's combo events.
    pub fn tick(&mut self) -> TickEvents {
        let mut events = TickEvents::default();
        if self.over {
            return events;
        }
        for p in 0..PLAYER_COUNT {
            if self.boards[p].lost {
                self.forward_backlog(p);
                continue;
            }
            if self.boards[p].won {
                continue;
            }
            if self.couples[p].is_none() {
                self.spawn_couple(p);
                continue;
            }
            self.boards[p].ticks_since_drop += 1;
            if self.boards[p].ticks_since_drop >= FORCED_DROP_TICKS {
                self.boards[p].ticks_since_drop = 0;
                if self.players[p] == PlayerKind::Cpu {
                    self.cpu_command(p, &mut events);
                }
                self.command(p, MoveDir::Down, &mut events);
            }
            // garbage that arrived mid-descent keeps sliding down under the couple
            if let Some(couple) = self.couples[p] {
                self.boards[p].settle(Some(couple.cells()));
            }
        }
        self.check_match_end();
        events
    }

    /// Age and move particles; expired ones are dropped. Called once per
    /// simulation tick by the presentation loop.
    pub fn tick_particles(&mut self) {
        self.particles.retain_mut(|p| {
            p.x += p.x_vel;
            p.y += p.y_vel;
            p.ttl = p.ttl.saturating_sub(1);
            p.ttl > 0
        });
    }

    /// Slot of the surviving board, if the match has been decided.
    pub fn winner(&self) -> Option<usize> {
        self.boards.iter().position(|b| b.won)
    }

    fn command(&mut self, player: usize, dir: MoveDir, events: &mut TickEvents) {
        if self.boards[player].lost || self.boards[player].won {
            return;
        }
        let Some(mut couple) = self.couples[player] else {
            return;
        };
        match couple::apply(&mut self.boards[player], &mut couple, dir) {
            MoveOutcome::Locked => {
                self.couples[player] = None;
                self.lock(player, events);
            }
            outcome => {
                self.couples[player] = Some(couple);
                if dir == MoveDir::Down && outcome == MoveOutcome::Moved {
                    self.boards[player].ticks_since_drop = 0;
                }
            }
        }
    }

    /// CPU slots play one random command per forced-descent beat: shift,
    /// drop, rotate, or nothing, with equal odds.
    fn cpu_command(&mut self, player: usize, events: &mut TickEvents) {
        let dir = match self.rng.random_range(0..5) {
            0 => Some(MoveDir::Left),
            1 => Some(MoveDir::Right),
            2 => None,
            3 => Some(MoveDir::Down),
            _ => Some(MoveDir::Rotate),
        };
        if let Some(dir) = dir {
            self.command(player, dir, events);
        }
    }

    /// Spawn a fresh couple at the entry columns. If either entry cell is
    /// already taken the board is lost and no couple is created.
    fn spawn_couple(&mut self, player: usize) {
        let colors = (
            PieceColor::random(&mut self.rng),
            PieceColor::random(&mut self.rng),
        );
        let a = (SPAWN_COLS.0, 0);
        let b = (SPAWN_COLS.1, 0);
        let board = &mut self.boards[player];
        if !board.grid.is_free(a.0, a.1) || !board.grid.is_free(b.0, b.1) {
            board.lost = true;
            return;
        }
        board.grid.place(a.0, a.1, Piece::new(colors.0));
        board.grid.place(b.0, b.1, Piece::new(colors.1));
        board.ticks_since_drop = 0;
        self.couples[player] = Some(Couple { a, b });
    }

    /// Lock aftermath: settle and resolve to fixpoint (the chain cascade),
    /// then materialize whatever garbage is owed.
    fn lock(&mut self, player: usize, events: &mut TickEvents) {
        self.cascade(player, events);
        self.materialize(player, events);
        self.boards[player].ticks_since_drop = 0;
    }

    /// Alternate settling and one resolver pass until a pass clears nothing.
    /// Each qualifying group sends its attack immediately, in scan order.
    fn cascade(&mut self, player: usize, events: &mut TickEvents) {
        loop {
            while self.boards[player].settle(None) {}
            let groups = self.boards[player].resolve_once();
            if groups.is_empty() {
                break;
            }
            let mut cells = Vec::new();
            let mut units = 0;
            for group in &groups {
                units += group.attack_units();
                self.send_attack(player, group.attack_units());
                self.burst_particles(player, group);
                cells.extend(group.cells.iter().map(|&(x, y, _)| (x, y)));
            }
            events.chains.push(ChainEvent {
                player,
                cells,
                units,
            });
        }
    }

    /// Attack units first counter the attacker's own pending garbage
    /// (floored at zero); the leftover lands on the next non-lost player in
    /// cyclic slot order. With no eligible target the leftover is discarded.
    fn send_attack(&mut self, from: usize, units: u32) {
        let own = &mut self.boards[from].pending_garbage;
        let countered = units.min(*own);
        *own -= countered;
        let leftover = units - countered;
        if leftover == 0 {
            return;
        }
        if let Some(target) = self.next_eligible(from) {
            self.boards[target].pending_garbage += leftover;
        }
    }

    /// Next non-lost slot after `from` in cyclic order, excluding `from`
    /// itself. None once every other board is lost.
    fn next_eligible(&self, from: usize) -> Option<usize> {
        (1..PLAYER_COUNT)
            .map(|step| (from + step) % PLAYER_COUNT)
            .find(|&p| !self.boards[p].lost)
    }

    /// A lost board never keeps garbage: its whole backlog moves to the next
    /// eligible slot in one step and its own counter is zeroed, so repeated
    /// invocations cannot double-count.
    fn forward_backlog(&mut self, player: usize) {
        let pending = std::mem::take(&mut self.boards[player].pending_garbage);
        if pending == 0 {
            return;
        }
        if let Some(target) = self.next_eligible(player) {
            self.boards[target].pending_garbage += pending;
        }
    }

    /// Drop owed garbage onto the board: up to one row's worth, into the top
    /// row at width-wrapped random offset columns. An occupied top cell is
    /// skipped silently (only couple spawns can lose a board). Afterwards
    /// the board settles and resolves to fixpoint and the counter is zeroed.
    fn materialize(&mut self, player: usize, events: &mut TickEvents) {
        let pending = std::mem::take(&mut self.boards[player].pending_garbage);
        let count = pending.min(BOARD_WIDTH as u32) as usize;
        if count == 0 {
            return;
        }
        let offset = self.rng.random_range(0..BOARD_WIDTH);
        for o in 0..count {
            let x = (offset + o) % BOARD_WIDTH;
            if self.boards[player].grid.is_free(x, 0) {
                self.boards[player]
                    .grid
                    .place(x, 0, Piece::new(PieceColor::Garbage));
            }
        }
        self.cascade(player, events);
    }

    fn burst_particles(&mut self, player: usize, group: &ComboGroup) {
        for &(x, y, color) in &group.cells {
            if color.is_garbage() {
                continue;
            }
            for _ in 0..PARTICLES_PER_PIECE {
                let x_vel = self.rng.random_range(-0.4..0.4f32);
                let y_vel = self.rng.random_range(-0.6..0.1f32);
                self.particles.push(Particle {
                    player,
                    x: x as f32 + 0.5,
                    y: y as f32 + 0.5,
                    x_vel,
                    y_vel,
                    color,
                    ttl: PARTICLE_TTL_TICKS,
                });
            }
        }
    }

    /// When all boards but one are lost, the survivor wins and the match is
    /// over. Both flags are one-way.
    fn check_match_end(&mut self) {
        let lost = self.boards.iter().filter(|b| b.lost).count();
        if lost >= PLAYER_COUNT - 1 {
            self.over = true;
            for board in &mut self.boards {
                if !board.lost {
                    board.won = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::BOARD_HEIGHT;

    fn pending_total(m: &Match) -> u32 {
        m.boards.iter().map(|b| b.pending_garbage).sum()
    }

    fn garbage_count(board: &Board) -> usize {
        let mut count = 0;
        for x in 0..BOARD_WIDTH {
            for y in 0..BOARD_HEIGHT {
                if board.grid.get(x, y).is_some_and(|p| p.color.is_garbage()) {
                    count += 1;
                }
            }
        }
        count
    }

    #[test]
    fn new_match_marks_human_slots() {
        let m = Match::new(1, 7);
        assert_eq!(m.players[0], PlayerKind::Human);
        assert!(m.players[1..].iter().all(|&k| k == PlayerKind::Cpu));
        let m = Match::new(3, 7);
        assert_eq!(
            m.players.iter().filter(|&&k| k == PlayerKind::Human).count(),
            3
        );
    }

    #[test]
    fn first_tick_spawns_couples_for_every_board() {
        let mut m = Match::new(1, 7);
        m.tick();
        for p in 0..PLAYER_COUNT {
            let couple = m.couples[p].expect("couple spawned");
            assert_eq!(couple.a, (SPAWN_COLS.0, 0));
            assert_eq!(couple.b, (SPAWN_COLS.1, 0));
            assert!(m.boards[p].grid.get(SPAWN_COLS.0, 0).is_some());
            assert!(m.boards[p].grid.get(SPAWN_COLS.1, 0).is_some());
        }
    }

    #[test]
    fn blocked_spawn_loses_the_board_and_never_respawns() {
        let mut m = Match::new(1, 7);
        m.boards[0]
            .grid
            .place(SPAWN_COLS.0, 0, Piece::new(PieceColor::Garbage));
        m.tick();
        assert!(m.boards[0].lost);
        assert!(m.couples[0].is_none());
        m.tick();
        assert!(m.couples[0].is_none(), "lost boards never spawn again");
    }

    #[test]
    fn plus_shape_clear_attacks_the_next_player() {
        let mut m = Match::new(1, 7);
        let y = BOARD_HEIGHT - 2;
        for (x, cy) in [(2, y), (1, y), (3, y), (2, y + 1)] {
            m.boards[0].grid.place(x, cy, Piece::new(PieceColor::Purple));
        }
        let mut events = TickEvents::default();
        m.cascade(0, &mut events);
        assert_eq!(events.chains.len(), 1);
        assert_eq!(events.chains[0].units, 1);
        assert_eq!(m.boards[1].pending_garbage, 1);
        assert_eq!(m.boards[0].pending_garbage, 0);
    }

    #[test]
    fn own_pending_counters_the_attack_first() {
        let mut m = Match::new(1, 7);
        m.boards[0].pending_garbage = 2;
        m.send_attack(0, 1);
        assert_eq!(m.boards[0].pending_garbage, 1);
        assert_eq!(m.boards[1].pending_garbage, 0);
        m.send_attack(0, 3);
        assert_eq!(m.boards[0].pending_garbage, 0);
        assert_eq!(m.boards[1].pending_garbage, 2);
    }

    #[test]
    fn attacks_skip_lost_boards() {
        let mut m = Match::new(1, 7);
        m.boards[1].lost = true;
        m.send_attack(0, 5);
        assert_eq!(m.boards[1].pending_garbage, 0);
        assert_eq!(m.boards[2].pending_garbage, 5);
    }

    #[test]
    fn attack_discarded_when_everyone_else_is_lost() {
        let mut m = Match::new(1, 7);
        for p in 1..PLAYER_COUNT {
            m.boards[p].lost = true;
        }
        m.send_attack(0, 5);
        assert_eq!(pending_total(&m), 0);
    }

    #[test]
    fn lost_board_forwards_its_backlog_once() {
        let mut m = Match::new(1, 7);
        m.boards[1].lost = true;
        m.boards[1].pending_garbage = 4;
        let before = pending_total(&m);
        m.forward_backlog(1);
        assert_eq!(m.boards[1].pending_garbage, 0);
        assert_eq!(m.boards[2].pending_garbage, 4);
        assert_eq!(pending_total(&m), before, "transfer conserves units");
        // drained; invoking again moves nothing
        m.forward_backlog(1);
        assert_eq!(m.boards[2].pending_garbage, 4);
    }

    #[test]
    fn materialize_caps_at_board_width_and_zeroes() {
        let mut m = Match::new(1, 7);
        m.boards[0].pending_garbage = BOARD_WIDTH as u32 + 3;
        let mut events = TickEvents::default();
        m.materialize(0, &mut events);
        assert_eq!(m.boards[0].pending_garbage, 0);
        assert_eq!(garbage_count(&m.boards[0]), BOARD_WIDTH, "one full row, no more");
        // settled to the bottom row
        for x in 0..BOARD_WIDTH {
            assert!(m.boards[0]
                .grid
                .get(x, BOARD_HEIGHT - 1)
                .is_some_and(|p| p.color.is_garbage()));
        }
    }

    #[test]
    fn materialize_skips_occupied_top_cells_without_losing() {
        let mut m = Match::new(1, 7);
        // wall every top cell
        for x in 0..BOARD_WIDTH {
            m.boards[0].grid.place(x, 0, Piece::new(PieceColor::Blue));
        }
        m.boards[0].pending_garbage = 3;
        let mut events = TickEvents::default();
        m.materialize(0, &mut events);
        assert!(!m.boards[0].lost);
        assert_eq!(m.boards[0].pending_garbage, 0);
    }

    #[test]
    fn garbage_passenger_keeps_units_at_the_colored_lookup() {
        let mut m = Match::new(1, 7);
        let y = BOARD_HEIGHT - 1;
        for x in 0..4 {
            m.boards[0].grid.place(x, y, Piece::new(PieceColor::Green));
        }
        m.boards[0].grid.place(4, y, Piece::new(PieceColor::Garbage));
        let mut events = TickEvents::default();
        m.cascade(0, &mut events);
        assert_eq!(events.chains.len(), 1);
        assert_eq!(events.chains[0].cells.len(), 5);
        assert_eq!(events.chains[0].units, 1);
    }

    #[test]
    fn match_ends_when_one_board_survives() {
        let mut m = Match::new(1, 7);
        for p in 0..PLAYER_COUNT - 1 {
            m.boards[p].lost = true;
        }
        m.tick();
        assert!(m.over);
        assert!(m.boards[PLAYER_COUNT - 1].won);
        assert_eq!(m.winner(), Some(PLAYER_COUNT - 1));
    }

    #[test]
    fn won_and_lost_flags_are_one_way() {
        let mut m = Match::new(1, 7);
        for p in 0..PLAYER_COUNT - 1 {
            m.boards[p].lost = true;
        }
        m.tick();
        assert!(m.boards[3].won);
        m.tick();
        assert!(m.boards[3].won);
        assert!(m.boards[0].lost);
    }

    #[test]
    fn soft_drop_resets_the_forced_descent_clock() {
        let mut m = Match::new(1, 7);
        m.tick();
        m.boards[0].ticks_since_drop = 10;
        m.apply_move(0, MoveDir::Down);
        assert_eq!(m.boards[0].ticks_since_drop, 0);
    }

    #[test]
    fn lock_materializes_pending_garbage() {
        let mut m = Match::new(1, 7);
        m.tick();
        m.boards[0].pending_garbage = 2;
        // drive the couple to the floor until it locks
        for _ in 0..BOARD_HEIGHT {
            m.apply_move(0, MoveDir::Down);
        }
        assert!(m.couples[0].is_none(), "couple locked");
        assert_eq!(m.boards[0].pending_garbage, 0);
        assert_eq!(garbage_count(&m.boards[0]), 2);
    }

    #[test]
    fn particles_expire() {
        let mut m = Match::new(1, 7);
        let y = BOARD_HEIGHT - 2;
        for (x, cy) in [(2, y), (1, y), (3, y), (2, y + 1)] {
            m.boards[0].grid.place(x, cy, Piece::new(PieceColor::Purple));
        }
        let mut events = TickEvents::default();
        m.cascade(0, &mut events);
        assert_eq!(m.particles.len(), 16, "four sparks per cleared piece");
        for _ in 0..40 {
            m.tick_particles();
        }
        assert!(m.particles.is_empty());
    }

    #[test]
    fn same_seed_same_inputs_same_outcome() {
        let run = |seed: u64| {
            let mut m = Match::new(1, seed);
            for t in 0..600 {
                if t % 5 == 0 {
                    m.apply_move(0, MoveDir::Rotate);
                }
                if t % 3 == 0 {
                    m.apply_move(0, MoveDir::Left);
                }
                m.tick();
            }
            let mut occupied = Vec::new();
            for (p, board) in m.boards.iter().enumerate() {
                for x in 0..BOARD_WIDTH {
                    for y in 0..BOARD_HEIGHT {
                        if let Some(piece) = board.grid.get(x, y) {
                            occupied.push((p, x, y, piece.color));
                        }
                    }
                }
            }
            (occupied, m.boards.iter().map(|b| b.lost).collect::<Vec<_>>())
        };
        assert_eq!(run(42), run(42));
        // sanity: a different seed diverges somewhere
        assert_ne!(run(42), run(43));
    }
}
