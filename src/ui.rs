//! Layout and drawing: menu, the four boards, incoming counters, banners,
//! particles, pause and game-over popups.

use crate::app::{BoardFlash, MenuState, Screen};
use crate::board::{BOARD_HEIGHT, BOARD_WIDTH};
use crate::game::{Match, PlayerKind, PLAYER_COUNT};
use crate::theme::Theme;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Style, Stylize};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};
use ratatui::Frame;
use std::collections::HashSet;
use std::time::Instant;
use tachyonfx::{
    fx, ref_count, CellFilter, Duration as TfxDuration, EffectRenderer, Interpolation,
};

/// Two terminal columns per board cell.
const CELL_WIDTH: u16 = 2;
/// Board size in terminal cells including the border.
const BOARD_OUTER_W: u16 = BOARD_WIDTH as u16 * CELL_WIDTH + 2;
const BOARD_OUTER_H: u16 = BOARD_HEIGHT as u16 + 2;
/// Gap between neighbouring boards.
const BOARD_GAP: u16 = 2;
/// Row above each board for the incoming-garbage readout.
const STATUS_ROW_H: u16 = 1;

/// Duration of the chain clear flash (TachyonFX fade) in ms.
const CHAIN_FLASH_MS: u32 = 400;

fn boards_total_width() -> u16 {
    PLAYER_COUNT as u16 * BOARD_OUTER_W + (PLAYER_COUNT as u16 - 1) * BOARD_GAP
}

/// Outer rect (border included) of one player's board within `area`.
/// The row above it holds the incoming counter.
fn board_rect(area: Rect, player: usize) -> Rect {
    let total_w = boards_total_width();
    let x0 = area.x + area.width.saturating_sub(total_w) / 2;
    let y0 = area.y + area.height.saturating_sub(BOARD_OUTER_H + STATUS_ROW_H) / 2 + STATUS_ROW_H;
    Rect {
        x: x0 + player as u16 * (BOARD_OUTER_W + BOARD_GAP),
        y: y0,
        width: BOARD_OUTER_W,
        height: BOARD_OUTER_H,
    }
    .intersection(area)
}

/// Buffer positions covered by a board cell (both columns).
fn cell_positions(inner: Rect, x: usize, y: usize) -> [(u16, u16); 2] {
    let rx = inner.x + x as u16 * CELL_WIDTH;
    let ry = inner.y + y as u16;
    [(rx, ry), (rx + 1, ry)]
}

/// Draw current screen. Chain flashes are painted and faded here; the caller
/// keeps them alive until their effect reports done.
#[allow(clippy::too_many_arguments)]
pub fn draw(
    frame: &mut Frame,
    screen: Screen,
    state: &Match,
    theme: &Theme,
    paused: bool,
    menu_state: &MenuState,
    flashes: &mut [BoardFlash],
    flash_process_time: &mut Option<Instant>,
    now: Instant,
) {
    let area = frame.area();
    match screen {
        Screen::Menu => draw_menu(frame, theme, menu_state, area),
        Screen::Playing => {
            draw_match(frame, state, theme, area, flashes);
            apply_flash_effects(frame, theme, area, flashes, flash_process_time, now);
            if paused {
                draw_popup(
                    frame,
                    theme,
                    area,
                    " Paused ",
                    &["Press P to resume", "Q or Esc quits"],
                );
            }
        }
        Screen::GameOver => {
            draw_match(frame, state, theme, area, flashes);
            let headline = match state.winner() {
                Some(p) if state.players[p] == PlayerKind::Human => format!("Player {} wins!", p + 1),
                Some(p) => format!("CPU {} wins!", p + 1),
                None => "Nobody survived.".to_string(),
            };
            draw_popup(
                frame,
                theme,
                area,
                " Game over ",
                &[headline.as_str(), "", "R restarts, Q or Esc quits"],
            );
        }
    }
}

fn draw_match(
    frame: &mut Frame,
    state: &Match,
    theme: &Theme,
    area: Rect,
    flashes: &[BoardFlash],
) {
    Block::default()
        .style(Style::default().bg(theme.bg))
        .render(area, frame.buffer_mut());

    for p in 0..PLAYER_COUNT {
        draw_board(frame, state, theme, area, p, flashes);
    }
    draw_particles(frame, state, theme, area);

    // help line along the bottom
    if area.height > 1 {
        let help = Line::from(vec![
            Span::styled(" A/D move  W rotate  S drop", Style::default().fg(theme.main_fg)),
            Span::styled("   P pause  Q quit ", Style::default().fg(theme.inactive_fg)),
        ]);
        let help_area = Rect {
            x: area.x,
            y: area.y + area.height - 1,
            width: area.width,
            height: 1,
        };
        Paragraph::new(help)
            .alignment(Alignment::Center)
            .render(help_area, frame.buffer_mut());
    }
}

fn draw_board(
    frame: &mut Frame,
    state: &Match,
    theme: &Theme,
    area: Rect,
    player: usize,
    flashes: &[BoardFlash],
) {
    let outer = board_rect(area, player);
    if outer.width < 3 || outer.height < 3 {
        return;
    }
    let board = &state.boards[player];

    let tag = match state.players[player] {
        PlayerKind::Human => "you",
        PlayerKind::Cpu => "cpu",
    };
    let title = format!(" P{} {} ", player + 1, tag);
    let border_style = if board.lost {
        Style::default().fg(theme.inactive_fg).bg(theme.bg)
    } else {
        Style::default().fg(theme.div_line).bg(theme.bg)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(Span::styled(title, Style::default().fg(theme.title)));
    let inner = block.inner(outer);
    block.render(outer, frame.buffer_mut());

    // incoming-garbage readout on the row above the board
    if board.pending_garbage > 0 && outer.y > area.y {
        let label = format!(" incoming: {} ", board.pending_garbage);
        let style = Style::default().fg(theme.main_fg).bg(theme.bg).bold();
        frame
            .buffer_mut()
            .set_stringn(outer.x, outer.y - 1, label, outer.width as usize, style);
    }

    let flash_cells: HashSet<(usize, usize)> = flashes
        .iter()
        .filter(|f| f.player == player)
        .flat_map(|f| f.cells.iter().copied())
        .collect();

    let buf = frame.buffer_mut();
    for x in 0..BOARD_WIDTH {
        for y in 0..BOARD_HEIGHT {
            let (symbol, style) = if flash_cells.contains(&(x, y)) {
                ("█", Style::default().fg(Color::White).bg(theme.bg))
            } else {
                match board.grid.get(x, y) {
                    Some(piece) if piece.color.is_garbage() => (
                        "▒",
                        Style::default().fg(theme.puyo_color(piece.color.palette_index())).bg(theme.bg),
                    ),
                    Some(piece) => (
                        "█",
                        Style::default().fg(theme.puyo_color(piece.color.palette_index())).bg(theme.bg),
                    ),
                    None => (" ", Style::default().bg(theme.bg)),
                }
            };
            for (rx, ry) in cell_positions(inner, x, y) {
                if rx < inner.x + inner.width && ry < inner.y + inner.height {
                    buf[(rx, ry)].set_symbol(symbol).set_style(style);
                }
            }
        }
    }

    if board.lost {
        draw_banner(frame, theme, inner, " You lose. ");
    } else if board.won {
        draw_banner(frame, theme, inner, " You win! ");
    }
}

fn draw_banner(frame: &mut Frame, theme: &Theme, inner: Rect, text: &str) {
    let w = text.len() as u16;
    let bx = inner.x + inner.width.saturating_sub(w) / 2;
    let by = inner.y + inner.height / 2;
    let style = Style::default().fg(Color::White).bg(theme.inactive_fg).bold();
    frame
        .buffer_mut()
        .set_stringn(bx, by, text, inner.width as usize, style);
}

fn draw_particles(frame: &mut Frame, state: &Match, theme: &Theme, area: Rect) {
    let buf = frame.buffer_mut();
    for particle in &state.particles {
        let outer = board_rect(area, particle.player);
        if outer.width < 3 || outer.height < 3 {
            continue;
        }
        let inner = Rect {
            x: outer.x + 1,
            y: outer.y + 1,
            width: outer.width - 2,
            height: outer.height - 2,
        };
        let rx = inner.x as i32 + (particle.x * CELL_WIDTH as f32) as i32;
        let ry = inner.y as i32 + particle.y as i32;
        if rx >= inner.x as i32
            && ry >= inner.y as i32
            && rx < (inner.x + inner.width) as i32
            && ry < (inner.y + inner.height) as i32
        {
            let color = theme.puyo_color(particle.color.palette_index());
            buf[(rx as u16, ry as u16)]
                .set_symbol("•")
                .set_style(Style::default().fg(color));
        }
    }
}

/// Create or update the fade effect of each pending chain flash and render it
/// (TachyonFX: the white-painted cleared cells fade back to the board
/// background).
fn apply_flash_effects(
    frame: &mut Frame,
    theme: &Theme,
    area: Rect,
    flashes: &mut [BoardFlash],
    flash_process_time: &mut Option<Instant>,
    now: Instant,
) {
    if flashes.is_empty() {
        *flash_process_time = None;
        return;
    }
    let delta = flash_process_time
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
    let tfx_delta = TfxDuration::from_millis(delta_ms);
    *flash_process_time = Some(now);

    for flash in flashes {
        let outer = board_rect(area, flash.player);
        if outer.width < 3 || outer.height < 3 {
            continue;
        }
        let inner = Rect {
            x: outer.x + 1,
            y: outer.y + 1,
            width: outer.width - 2,
            height: outer.height - 2,
        };
        if flash.effect.is_none() {
            let mut positions: HashSet<(u16, u16)> = HashSet::new();
            for &(x, y) in &flash.cells {
                for (rx, ry) in cell_positions(inner, x, y) {
                    positions.insert((rx, ry));
                }
            }
            let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
                positions.contains(&(pos.x, pos.y))
            }));
            let bg = theme.bg;
            let effect = fx::fade_to(bg, bg, (CHAIN_FLASH_MS, Interpolation::Linear))
                .with_filter(filter)
                .with_area(inner);
            flash.effect = Some(effect);
        }
        if let Some(effect) = &mut flash.effect {
            frame.render_effect(effect, inner, tfx_delta);
        }
    }
}

fn draw_menu(frame: &mut Frame, theme: &Theme, menu_state: &MenuState, area: Rect) {
    Block::default()
        .style(Style::default().bg(theme.bg))
        .render(area, frame.buffer_mut());

    let popup = centered_rect(area, 46, 14);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(" Puyotui ", Style::default().fg(theme.title).bold()));
    let inner = block.inner(popup);
    block.render(popup, frame.buffer_mut());

    let selected = Style::default().fg(Color::Black).bg(theme.title).bold();
    let normal = Style::default().fg(theme.main_fg);
    let dim = Style::default().fg(theme.inactive_fg);

    let mut humans_line = vec![Span::styled("  humans  ", normal)];
    for n in 1..=PLAYER_COUNT {
        let style = if n == menu_state.humans { selected } else { normal };
        humans_line.push(Span::styled(format!(" {n} "), style));
        humans_line.push(Span::raw(" "));
    }

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "Link four of a colour. Bury your neighbour.",
            normal,
        )),
        Line::from(""),
        Line::from(humans_line),
        Line::from(""),
        Line::from(Span::styled("◀ ▶ choose   Enter start", normal)),
        Line::from(""),
        Line::from(Span::styled("slot 1: WASD   slot 2: YGHJ", dim)),
        Line::from(Span::styled("slot 3: P L ; '   slot 4: arrows", dim)),
        Line::from(""),
        Line::from(Span::styled("Q or Esc quits", dim)),
    ];
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(inner, frame.buffer_mut());
}

fn draw_popup(frame: &mut Frame, theme: &Theme, area: Rect, title: &str, body: &[&str]) {
    let h = body.len() as u16 + 4;
    let w = body
        .iter()
        .map(|l| l.len() as u16)
        .max()
        .unwrap_or(0)
        .max(title.len() as u16)
        + 6;
    let popup = centered_rect(area, w, h);
    // blank what's underneath so the popup reads cleanly
    for y in popup.y..popup.y + popup.height {
        for x in popup.x..popup.x + popup.width {
            frame.buffer_mut()[(x, y)].reset();
            frame.buffer_mut()[(x, y)].set_style(Style::default().bg(theme.bg));
        }
    }
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(title, Style::default().fg(theme.title).bold()));
    let inner = block.inner(popup);
    block.render(popup, frame.buffer_mut());
    let lines: Vec<Line> = std::iter::once(Line::from(""))
        .chain(
            body.iter()
                .map(|l| Line::from(Span::styled(*l, Style::default().fg(theme.main_fg)))),
        )
        .collect();
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(inner, frame.buffer_mut());
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let horiz = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(width.min(area.width)),
            Constraint::Fill(1),
        ])
        .split(area);
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(height.min(area.height)),
            Constraint::Fill(1),
        ])
        .split(horiz[1]);
    vert[1]
}
