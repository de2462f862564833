//! Puyotui — four-player Puyo-Puyo-style falling-block battle in the terminal.

mod app;
mod board;
mod couple;
mod game;
mod input;
mod theme;
mod ui;

use anyhow::Result;
use app::App;
use clap::{Parser, ValueEnum};

/// Options derived from CLI that affect match behaviour.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub humans: usize,
    pub seed: Option<u64>,
    pub tick_rate: f64,
    pub no_animation: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_default();
    let config = GameConfig {
        humans: (args.humans as usize).clamp(1, game::PLAYER_COUNT),
        seed: args.seed,
        tick_rate: args.tick_rate,
        no_animation: args.no_animation,
    };
    let mut app = App::new(args, config, theme)?;
    app.run()
}

/// Four-player Puyo-Puyo-style battle in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "puyotui",
    version,
    about = "Four-player Puyo-Puyo-style falling-block battle in the terminal. Link four of a colour to clear it and bury your neighbour in garbage.",
    long_about = "Puyotui is a terminal rendition of the classic four-board puyo battle.\n\n\
        Pairs of coloured pieces fall onto each board. Link four or more of one colour \
        (garbage rides along) to clear them; chains send garbage pieces to the next \
        surviving player. Last board standing wins.\n\n\
        CONTROLS (slot 1):\n  A / D    Move    W        Rotate    S    Soft drop\n  Arrows also steer slot 1 while slot 4 is a CPU.\n\n\
        Extra humans (--humans): slot 2 = G/H/J/Y, slot 3 = L/;/'/P, slot 4 = arrows.\n\
        P pauses (while fewer than 3 humans), Q or Esc quits.\n\n\
        Use --theme to load a btop-style theme (e.g. onedark.theme); --seed replays a match."
)]
pub struct Args {
    /// Number of human players (1-4); remaining slots are CPU-controlled.
    #[arg(short = 'H', long, default_value = "1", value_name = "N")]
    pub humans: u8,

    /// Path to theme file (btop-style theme[key]="value"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<std::path::PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// RNG seed: identical seeds and inputs replay identical matches.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Simulation ticks per second.
    #[arg(long, default_value = "60.0", value_name = "RATE")]
    pub tick_rate: f64,

    /// Disable the clear-flash animation.
    #[arg(long)]
    pub no_animation: bool,

    /// Skip main menu and start the match immediately.
    #[arg(long)]
    pub no_menu: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}
