pub mod app;
pub mod log_layer;
pub mod player;
pub mod ui;

use std::time::Instant;

use crossterm::event::{self, Event, KeyEventKind};
use ratatui::DefaultTerminal;
use voxgame_core::config::GameConfig;
use voxgame_core::{UtteranceResult, WorkerState};

pub use app::{Game, GameAction};
pub use log_layer::{log_buffer, GameLogLayer, LogBuffer};
pub use player::Player;

/// Run the game at `config.fps` until the player quits.
///
/// Each frame takes at most one utterance from `poll` and reads the
/// worker's state through `state`. Neither may block.
pub fn run(
    config: &GameConfig,
    session_id: &str,
    logs: LogBuffer,
    mut poll: impl FnMut() -> Option<UtteranceResult>,
    state: impl Fn() -> WorkerState,
) -> std::io::Result<()> {
    let mut game = Game::new(config, session_id, logs);
    let mut terminal = ratatui::init();
    let result = run_loop(&mut terminal, &mut game, config, &mut poll, &state);
    ratatui::restore();
    tracing::info!(frames = game.frames, "game loop finished");
    result
}

fn run_loop(
    terminal: &mut DefaultTerminal,
    game: &mut Game,
    config: &GameConfig,
    poll: &mut dyn FnMut() -> Option<UtteranceResult>,
    state: &dyn Fn() -> WorkerState,
) -> std::io::Result<()> {
    let frame_interval = config.frame_interval();

    while !game.should_quit {
        let deadline = Instant::now() + frame_interval;

        game.set_worker_state(state());
        if let Some(result) = poll() {
            game.apply(result);
        }
        game.tick();
        terminal.draw(|frame| ui::draw(frame, game))?;

        // Handle input until the frame's time is used up.
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || !event::poll(remaining)? {
                break;
            }
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && game.handle_key(key) == GameAction::Quit {
                    break;
                }
            }
        }
    }

    Ok(())
}
