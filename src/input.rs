//! Key bindings: up to four local players on one keyboard.

use crate::couple::MoveDir;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Action from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Movement command for a player slot.
    Move(usize, MoveDir),
    Pause,
    Quit,
    None,
}

/// Map key event to an action. Layouts follow the cabinet tradition of
/// cramming everyone onto one keyboard:
///
/// | slot | rotate | left | down | right |
/// |------|--------|------|------|-------|
/// | 1    | W      | A    | S    | D     |
/// | 2    | Y      | G    | H    | J     |
/// | 3    | P      | L    | ;    | '     |
/// | 4    | Up     | Left | Down | Right |
///
/// Arrows double as slot-1 controls while slot 4 is CPU-driven. `P` pauses
/// only while slot 3 is CPU-driven (a third human claims it for rotate).
pub fn key_to_action(key: KeyEvent, humans: usize) -> Action {
    let KeyEvent {
        code, modifiers, ..
    } = key;
    if !(modifiers.is_empty() || modifiers == KeyModifiers::SHIFT) {
        return Action::None;
    }
    match code {
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char('p') if humans < 3 => Action::Pause,

        KeyCode::Char('w') => Action::Move(0, MoveDir::Rotate),
        KeyCode::Char('a') => Action::Move(0, MoveDir::Left),
        KeyCode::Char('s') => Action::Move(0, MoveDir::Down),
        KeyCode::Char('d') => Action::Move(0, MoveDir::Right),

        KeyCode::Char('y') if humans > 1 => Action::Move(1, MoveDir::Rotate),
        KeyCode::Char('g') if humans > 1 => Action::Move(1, MoveDir::Left),
        KeyCode::Char('h') if humans > 1 => Action::Move(1, MoveDir::Down),
        KeyCode::Char('j') if humans > 1 => Action::Move(1, MoveDir::Right),

        KeyCode::Char('p') if humans > 2 => Action::Move(2, MoveDir::Rotate),
        KeyCode::Char('l') if humans > 2 => Action::Move(2, MoveDir::Left),
        KeyCode::Char(';') if humans > 2 => Action::Move(2, MoveDir::Down),
        KeyCode::Char('\'') if humans > 2 => Action::Move(2, MoveDir::Right),

        KeyCode::Up if humans > 3 => Action::Move(3, MoveDir::Rotate),
        KeyCode::Left if humans > 3 => Action::Move(3, MoveDir::Left),
        KeyCode::Down if humans > 3 => Action::Move(3, MoveDir::Down),
        KeyCode::Right if humans > 3 => Action::Move(3, MoveDir::Right),

        KeyCode::Up => Action::Move(0, MoveDir::Rotate),
        KeyCode::Left => Action::Move(0, MoveDir::Left),
        KeyCode::Down => Action::Move(0, MoveDir::Down),
        KeyCode::Right => Action::Move(0, MoveDir::Right),

        _ => Action::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventKind;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: crossterm::event::KeyEventState::NONE,
        }
    }

    #[test]
    fn wasd_drives_slot_one() {
        assert_eq!(
            key_to_action(press(KeyCode::Char('a')), 1),
            Action::Move(0, MoveDir::Left)
        );
        assert_eq!(
            key_to_action(press(KeyCode::Char('w')), 1),
            Action::Move(0, MoveDir::Rotate)
        );
    }

    #[test]
    fn arrows_fall_back_to_slot_one() {
        assert_eq!(
            key_to_action(press(KeyCode::Left), 1),
            Action::Move(0, MoveDir::Left)
        );
        assert_eq!(
            key_to_action(press(KeyCode::Left), 4),
            Action::Move(3, MoveDir::Left)
        );
    }

    #[test]
    fn second_player_keys_gated_on_human_count() {
        assert_eq!(key_to_action(press(KeyCode::Char('g')), 1), Action::None);
        assert_eq!(
            key_to_action(press(KeyCode::Char('g')), 2),
            Action::Move(1, MoveDir::Left)
        );
    }

    #[test]
    fn p_pauses_until_a_third_human_claims_it() {
        assert_eq!(key_to_action(press(KeyCode::Char('p')), 1), Action::Pause);
        assert_eq!(
            key_to_action(press(KeyCode::Char('p')), 3),
            Action::Move(2, MoveDir::Rotate)
        );
    }
}
