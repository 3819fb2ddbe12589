use chrono::{TimeDelta, Utc};
use ratatui::backend::TestBackend;
use ratatui::Terminal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;
use voxgame_core::config::GameConfig;
use voxgame_core::{Intent, QueryResult, UtteranceResult, WorkerState};
use voxgame_tui::{log_buffer, ui, Game, GameLogLayer};

fn buffer_text(buf: &ratatui::buffer::Buffer) -> String {
    let area = buf.area();
    let mut text = String::new();
    for y in area.y..area.y + area.height {
        for x in area.x..area.x + area.width {
            text.push_str(buf.cell((x, y)).map(|c| c.symbol()).unwrap_or(" "));
        }
        text.push('\n');
    }
    text
}

fn utterance(intent: &str, text: &str) -> UtteranceResult {
    let start_time = Utc::now();
    UtteranceResult {
        start_time,
        end_time: start_time + TimeDelta::milliseconds(900),
        raw_result: QueryResult {
            query_text: text.to_string(),
            intent: Intent {
                display_name: intent.to_string(),
                confidence: 1.0,
            },
            ..Default::default()
        },
    }
}

#[test]
fn test_draw_shows_status_and_heard() {
    let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
    let mut game = Game::new(&GameConfig::default(), "abc-123", log_buffer());
    game.set_worker_state(WorkerState::Listening);
    game.apply(utterance("Move_Right", "go right"));
    game.tick();

    terminal.draw(|frame| ui::draw(frame, &game)).unwrap();
    let text = buffer_text(terminal.backend().buffer());
    assert!(text.contains("listening"), "expected worker state:\n{text}");
    assert!(text.contains("abc-123"), "expected session id:\n{text}");
    assert!(text.contains("Move_Right"), "expected heard intent:\n{text}");
    assert!(text.contains("go right"), "expected transcript:\n{text}");
    assert!(text.contains("Speed:   2"), "expected speed:\n{text}");
}

#[test]
fn test_draw_follows_state_changes() {
    let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
    let mut game = Game::new(&GameConfig::default(), "s", log_buffer());

    game.set_worker_state(WorkerState::Publishing);
    terminal.draw(|frame| ui::draw(frame, &game)).unwrap();
    let text = buffer_text(terminal.backend().buffer());
    assert!(text.contains("waiting for game"), "{text}");

    game.set_worker_state(WorkerState::Stopped);
    terminal.draw(|frame| ui::draw(frame, &game)).unwrap();
    let text = buffer_text(terminal.backend().buffer());
    assert!(text.contains("stopped"), "{text}");
}

#[test]
fn test_logs_reach_the_panel() {
    let logs = log_buffer();
    let subscriber = Registry::default().with(GameLogLayer::new(logs.clone(), 50));
    let mut game = Game::new(&GameConfig::default(), "s", logs);

    tracing::subscriber::with_default(subscriber, || {
        game.apply(utterance("Jump", "jump"));
    });

    let mut terminal = Terminal::new(TestBackend::new(140, 30)).unwrap();
    terminal.draw(|frame| ui::draw(frame, &game)).unwrap();
    let text = buffer_text(terminal.backend().buffer());
    assert!(text.contains("ignoring unknown intent"), "{text}");
}

#[test]
fn test_draw_with_player_at_arena_edge() {
    let config = GameConfig::default();
    let mut game = Game::new(&config, "s", log_buffer());
    game.player.x = config.width;
    game.player.y = config.height;
    game.player.update();

    let mut terminal = Terminal::new(TestBackend::new(60, 20)).unwrap();
    terminal.draw(|frame| ui::draw(frame, &game)).unwrap();
    assert_eq!(game.player.x, config.width - voxgame_tui::player::PLAYER_SIZE);
}
