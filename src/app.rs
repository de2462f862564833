//! App: terminal init, main loop, tick and key handling.

use crate::game::{Match, PlayerKind, TickEvents, PLAYER_COUNT};
use crate::input::{key_to_action, Action};
use crate::theme::Theme;
use crate::{Args, GameConfig};
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use rand::Rng;
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};
use tachyonfx::Effect;

/// DAS (Delayed Auto-Shift): delay before movement starts repeating when you hold a key.
const REPEAT_DELAY_MS: u64 = 170;
/// ARR (Auto-Repeat Rate): time between repeated moves while holding.
const REPEAT_INTERVAL_MS: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Menu,
    Playing,
    GameOver,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuState {
    pub humans: usize,
}

/// A chain clear being flashed: the cleared cells are painted bright and
/// faded back out by a TachyonFX effect created on first draw.
pub struct BoardFlash {
    pub player: usize,
    pub cells: Vec<(usize, usize)>,
    pub effect: Option<Effect>,
}

pub struct App {
    config: GameConfig,
    theme: Theme,
    state: Match,
    screen: Screen,
    paused: bool,
    menu_state: MenuState,
    last_tick: Instant,
    tick_interval: Duration,
    repeat_state: Option<(Action, Instant)>,
    last_repeat_fire: Option<Instant>,
    flashes: Vec<BoardFlash>,
    flash_process_time: Option<Instant>,
}

impl App {
    pub fn new(args: Args, config: GameConfig, theme: Theme) -> Result<Self> {
        let humans = config.humans;
        let state = Match::new(humans, Self::pick_seed(&config));
        let screen = if args.no_menu {
            Screen::Playing
        } else {
            Screen::Menu
        };
        let tick_interval = Duration::from_secs_f64(1.0 / config.tick_rate.max(1.0));
        Ok(Self {
            config,
            theme,
            state,
            screen,
            paused: false,
            menu_state: MenuState { humans },
            last_tick: Instant::now(),
            tick_interval,
            repeat_state: None,
            last_repeat_fire: None,
            flashes: Vec::new(),
            flash_process_time: None,
        })
    }

    fn pick_seed(config: &GameConfig) -> u64 {
        config.seed.unwrap_or_else(|| rand::rng().random())
    }

    fn reset_match(&mut self) {
        self.state = Match::new(self.menu_state.humans, Self::pick_seed(&self.config));
        self.screen = Screen::Playing;
        self.paused = false;
        self.last_tick = Instant::now();
        self.repeat_state = None;
        self.last_repeat_fire = None;
        self.flashes.clear();
        self.flash_process_time = None;
    }

    fn humans(&self) -> usize {
        self.menu_state.humans
    }

    fn note_events(&mut self, events: TickEvents) {
        if self.config.no_animation {
            return;
        }
        for chain in events.chains {
            self.flashes.push(BoardFlash {
                player: chain.player,
                cells: chain.cells,
                effect: None,
            });
        }
    }

    fn apply_action(&mut self, action: Action) {
        if let Action::Move(slot, dir) = action {
            if slot < PLAYER_COUNT && self.state.players[slot] == PlayerKind::Human {
                let events = self.state.apply_move(slot, dir);
                self.note_events(events);
            }
        }
    }

    fn tick_repeat(&mut self) {
        let now = Instant::now();
        let (action, first) = match self.repeat_state {
            Some(s) => s,
            None => return,
        };
        if !matches!(action, Action::Move(..)) {
            return;
        }
        if first.elapsed() < Duration::from_millis(REPEAT_DELAY_MS) {
            return;
        }
        let next = self.last_repeat_fire.unwrap_or(first) + Duration::from_millis(REPEAT_INTERVAL_MS);
        if now >= next {
            self.apply_action(action);
            self.last_repeat_fire = Some(now);
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags},
            execute,
            terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        // Release events let held movement keys stop repeating crisply
        let _ = execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        );

        let mut terminal = ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let result = self.run_loop(&mut terminal);

        let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        loop {
            let now = Instant::now();
            terminal.draw(|f| {
                crate::ui::draw(
                    f,
                    self.screen,
                    &self.state,
                    &self.theme,
                    self.paused,
                    &self.menu_state,
                    &mut self.flashes,
                    &mut self.flash_process_time,
                    now,
                );
            })?;
            self.flashes
                .retain(|f| f.effect.as_ref().is_none_or(|e| !e.done()));

            let frame_duration = Duration::from_millis(16);
            let timeout = frame_duration.saturating_sub(now.elapsed());

            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    if let Event::Key(key) = event::read()? {
                        let action = key_to_action(key, self.humans());

                        if key.kind != KeyEventKind::Press {
                            if key.kind == KeyEventKind::Release
                                && self.repeat_state.map(|(a, _)| a) == Some(action)
                            {
                                self.repeat_state = None;
                                self.last_repeat_fire = None;
                            }
                            continue;
                        }
                        // ignore OS key repeats for actions we auto-repeat ourselves
                        if self.repeat_state.map(|(a, _)| a) == Some(action) {
                            continue;
                        }

                        match self.screen {
                            Screen::Menu => match key.code {
                                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                                KeyCode::Left | KeyCode::Char('a') => {
                                    if self.menu_state.humans > 1 {
                                        self.menu_state.humans -= 1;
                                    }
                                }
                                KeyCode::Right | KeyCode::Char('d') => {
                                    if self.menu_state.humans < PLAYER_COUNT {
                                        self.menu_state.humans += 1;
                                    }
                                }
                                KeyCode::Enter | KeyCode::Char(' ') => self.reset_match(),
                                _ => {}
                            },
                            Screen::Playing => {
                                if self.paused {
                                    match action {
                                        Action::Pause => self.paused = false,
                                        Action::Quit => return Ok(()),
                                        _ => {}
                                    }
                                } else {
                                    match action {
                                        Action::Quit => return Ok(()),
                                        Action::Pause => self.paused = true,
                                        Action::Move(slot, _) => {
                                            self.apply_action(action);
                                            // auto-repeat only the primary human's held keys
                                            if slot == 0 {
                                                self.repeat_state = Some((action, Instant::now()));
                                                self.last_repeat_fire = None;
                                            }
                                        }
                                        Action::None => {}
                                    }
                                }
                            }
                            Screen::GameOver => match key.code {
                                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                                KeyCode::Char('r') | KeyCode::Char('R') => self.reset_match(),
                                KeyCode::Char('m') | KeyCode::Char('M') => {
                                    self.screen = Screen::Menu;
                                }
                                _ => {}
                            },
                        }
                    }
                }
            }

            if self.screen == Screen::Playing && !self.paused {
                self.tick_repeat();
                if self.last_tick.elapsed() >= self.tick_interval {
                    self.last_tick = Instant::now();
                    let events = self.state.tick();
                    self.note_events(events);
                    self.state.tick_particles();
                    if self.state.over && self.state.particles.is_empty() && self.flashes.is_empty()
                    {
                        self.screen = Screen::GameOver;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_seed_is_honoured() {
        let config = GameConfig {
            humans: 1,
            seed: Some(99),
            tick_rate: 60.0,
            no_animation: true,
        };
        assert_eq!(App::pick_seed(&config), 99);
    }
}
