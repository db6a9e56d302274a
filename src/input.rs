use std::collections::HashSet;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};

use crate::navigation::Direction;
use crate::symbol::Digit;

/// What a key means while a run is in progress
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GridCommand {
    Move(Direction),
    Write(Digit),
    Clear,
    Submit,
}

pub fn grid_command(key: &KeyEvent) -> Option<GridCommand> {
    match key.code {
        KeyCode::Up => Some(GridCommand::Move(Direction::Up)),
        KeyCode::Down => Some(GridCommand::Move(Direction::Down)),
        KeyCode::Left => Some(GridCommand::Move(Direction::Left)),
        KeyCode::Right => Some(GridCommand::Move(Direction::Right)),
        KeyCode::Backspace | KeyCode::Delete | KeyCode::Char('0') => Some(GridCommand::Clear),
        KeyCode::Enter => Some(GridCommand::Submit),
        KeyCode::Char(c) => Digit::from_char(c).map(GridCommand::Write),
        _ => None,
    }
}

/// Collapses a held key into a single action.
///
/// Terminals that report key releases let us drop the extra presses an
/// auto-repeating key produces; terminals that don't report releases get one
/// action per press event.
#[derive(Debug, Default)]
pub struct KeyRepeatGuard {
    held: HashSet<KeyCode>,
    releases_seen: bool,
}

impl KeyRepeatGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the event is a fresh physical press that should be acted on
    pub fn accept(&mut self, key: &KeyEvent) -> bool {
        match key.kind {
            KeyEventKind::Repeat => false,
            KeyEventKind::Release => {
                self.releases_seen = true;
                self.held.remove(&key.code);
                false
            }
            KeyEventKind::Press => {
                if self.releases_seen && self.held.contains(&key.code) {
                    false
                } else {
                    self.held.insert(key.code);
                    true
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.held.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventState, KeyModifiers};

    fn key(code: KeyCode, kind: KeyEventKind) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn test_digit_keys_map_to_writes() {
        let cmd = grid_command(&KeyEvent::new(KeyCode::Char('7'), KeyModifiers::NONE));
        assert_eq!(cmd, Some(GridCommand::Write(Digit::new(7).unwrap())));
    }

    #[test]
    fn test_non_digit_keys_are_ignored() {
        for c in ['a', ' ', '-', '.'] {
            assert_eq!(
                grid_command(&KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)),
                None
            );
        }
    }

    #[test]
    fn test_arrows_and_edit_keys() {
        let map = |code| grid_command(&KeyEvent::new(code, KeyModifiers::NONE));
        assert_eq!(map(KeyCode::Left), Some(GridCommand::Move(Direction::Left)));
        assert_eq!(map(KeyCode::Down), Some(GridCommand::Move(Direction::Down)));
        assert_eq!(map(KeyCode::Backspace), Some(GridCommand::Clear));
        assert_eq!(map(KeyCode::Char('0')), Some(GridCommand::Clear));
        assert_eq!(map(KeyCode::Enter), Some(GridCommand::Submit));
    }

    #[test]
    fn test_repeat_events_are_dropped() {
        let mut guard = KeyRepeatGuard::new();
        assert!(guard.accept(&key(KeyCode::Char('3'), KeyEventKind::Press)));
        assert!(!guard.accept(&key(KeyCode::Char('3'), KeyEventKind::Repeat)));
        assert!(!guard.accept(&key(KeyCode::Char('3'), KeyEventKind::Repeat)));
    }

    #[test]
    fn test_held_key_presses_once_when_releases_reported() {
        let mut guard = KeyRepeatGuard::new();
        assert!(guard.accept(&key(KeyCode::Char('3'), KeyEventKind::Press)));
        assert!(!guard.accept(&key(KeyCode::Char('3'), KeyEventKind::Release)));
        assert!(guard.accept(&key(KeyCode::Char('3'), KeyEventKind::Press)));
        assert!(!guard.accept(&key(KeyCode::Char('3'), KeyEventKind::Press)));
        assert!(guard.accept(&key(KeyCode::Char('4'), KeyEventKind::Press)));
    }

    #[test]
    fn test_presses_pass_without_release_support() {
        let mut guard = KeyRepeatGuard::new();
        assert!(guard.accept(&key(KeyCode::Char('3'), KeyEventKind::Press)));
        assert!(guard.accept(&key(KeyCode::Char('3'), KeyEventKind::Press)));
    }
}
