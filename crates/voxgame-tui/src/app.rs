use std::collections::VecDeque;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use voxgame_core::config::GameConfig;
use voxgame_core::{GameCommand, UtteranceResult, WorkerState};

use crate::log_layer::LogBuffer;
use crate::player::Player;

/// Utterances kept for the "heard" panel.
const HEARD_CAPACITY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameAction {
    None,
    Quit,
}

/// One recognized utterance as shown to the player.
#[derive(Debug, Clone, PartialEq)]
pub struct Heard {
    pub transcript: String,
    pub intent: String,
    pub command: Option<GameCommand>,
    /// Time the service spent on the utterance, in milliseconds.
    pub duration_ms: i64,
}

pub struct Game {
    pub player: Player,
    pub heard: VecDeque<Heard>,
    pub worker_state: WorkerState,
    pub session_id: String,
    pub logs: LogBuffer,
    pub should_quit: bool,
    pub frames: u64,
}

impl Game {
    pub fn new(config: &GameConfig, session_id: impl Into<String>, logs: LogBuffer) -> Self {
        Self {
            player: Player::new(config),
            heard: VecDeque::with_capacity(HEARD_CAPACITY),
            worker_state: WorkerState::Idle,
            session_id: session_id.into(),
            logs,
            should_quit: false,
            frames: 0,
        }
    }

    /// Steer the player with a recognized utterance. Returns the command it
    /// mapped to; unknown intents leave the player alone.
    pub fn apply(&mut self, result: UtteranceResult) -> Option<GameCommand> {
        let intent = result.intent_name();
        let command = GameCommand::from_intent(intent);
        match command {
            Some(cmd) => {
                self.player.apply(cmd);
                tracing::debug!(intent, speed = self.player.speed, "command applied");
            }
            None => tracing::warn!(intent, "ignoring unknown intent"),
        }

        if self.heard.len() >= HEARD_CAPACITY {
            self.heard.pop_front();
        }
        self.heard.push_back(Heard {
            transcript: result.transcript().to_string(),
            intent: intent.to_string(),
            command,
            duration_ms: (result.end_time - result.start_time).num_milliseconds(),
        });
        command
    }

    pub fn set_worker_state(&mut self, state: WorkerState) {
        if state != self.worker_state {
            tracing::trace!(state = state.label(), "worker state changed");
            self.worker_state = state;
        }
    }

    /// Advance one frame.
    pub fn tick(&mut self) {
        self.player.update();
        self.frames += 1;
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> GameAction {
        let quit = match key.code {
            KeyCode::Char('q') | KeyCode::Esc => true,
            KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
            _ => false,
        };
        if quit {
            self.should_quit = true;
            GameAction::Quit
        } else {
            GameAction::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_layer::log_buffer;
    use chrono::{TimeDelta, Utc};
    use voxgame_core::{Intent, QueryResult};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn game() -> Game {
        Game::new(&GameConfig::default(), "session-1", log_buffer())
    }

    fn heard(intent: &str, text: &str) -> UtteranceResult {
        let start_time = Utc::now();
        UtteranceResult {
            start_time,
            end_time: start_time + TimeDelta::milliseconds(1500),
            raw_result: QueryResult {
                query_text: text.to_string(),
                intent: Intent {
                    display_name: intent.to_string(),
                    confidence: 0.9,
                },
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_game_initial_state() {
        let game = game();
        assert_eq!(game.worker_state, WorkerState::Idle);
        assert!(game.heard.is_empty());
        assert!(!game.should_quit);
        assert_eq!(game.session_id, "session-1");
    }

    #[test]
    fn test_apply_known_intent_moves_player() {
        let mut game = game();
        let cmd = game.apply(heard("Move_Right", "go right"));
        assert_eq!(cmd, Some(GameCommand::MoveRight));
        assert_eq!(game.player.dx, 2.0);

        let last = game.heard.back().unwrap();
        assert_eq!(last.transcript, "go right");
        assert_eq!(last.duration_ms, 1500);
    }

    #[test]
    fn test_apply_unknown_intent_is_recorded_but_ignored() {
        let mut game = game();
        let before = game.player.clone();
        assert_eq!(game.apply(heard("Default Welcome Intent", "hello")), None);
        assert_eq!(game.player, before);
        assert_eq!(game.heard.len(), 1);
        assert_eq!(game.heard[0].command, None);
    }

    #[test]
    fn test_heard_history_is_bounded() {
        let mut game = game();
        for i in 0..(HEARD_CAPACITY + 3) {
            game.apply(heard("Stop", &format!("stop {i}")));
        }
        assert_eq!(game.heard.len(), HEARD_CAPACITY);
        assert_eq!(game.heard[0].transcript, "stop 3");
    }

    #[test]
    fn test_tick_advances_player() {
        let mut game = game();
        game.apply(heard("Move_Down", "down"));
        game.tick();
        assert_eq!(game.player.y, 12.0);
        assert_eq!(game.frames, 1);
    }

    #[test]
    fn test_quit_keys() {
        for code in [KeyCode::Char('q'), KeyCode::Esc] {
            let mut game = game();
            assert_eq!(game.handle_key(key(code)), GameAction::Quit);
            assert!(game.should_quit);
        }
        let mut game = game();
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(game.handle_key(ctrl_c), GameAction::Quit);
    }

    #[test]
    fn test_other_keys_ignored() {
        let mut game = game();
        assert_eq!(game.handle_key(key(KeyCode::Char('c'))), GameAction::None);
        assert_eq!(game.handle_key(key(KeyCode::Up)), GameAction::None);
        assert!(!game.should_quit);
    }
}
