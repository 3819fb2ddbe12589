use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::Marker;
use ratatui::text::{Line, Span};
use ratatui::widgets::canvas::{Canvas, Points, Rectangle};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph};
use ratatui::Frame;
use voxgame_core::WorkerState;

use crate::app::Game;
use crate::log_layer::recent_lines;
use crate::player::PLAYER_SIZE;

const SIDE_PANEL_WIDTH: u16 = 50;
const LOG_PANEL_HEIGHT: u16 = 8;

pub fn draw(frame: &mut Frame, game: &Game) {
    let [top_area, logs_area] =
        Layout::vertical([Constraint::Fill(1), Constraint::Length(LOG_PANEL_HEIGHT)])
            .areas(frame.area());
    let [arena_area, side_area] = Layout::horizontal([
        Constraint::Fill(1),
        Constraint::Length(SIDE_PANEL_WIDTH),
    ])
    .areas(top_area);
    let [status_area, heard_area] =
        Layout::vertical([Constraint::Length(6), Constraint::Fill(1)]).areas(side_area);

    draw_arena(frame, game, arena_area);
    draw_status(frame, game, status_area);
    draw_heard(frame, game, heard_area);
    draw_logs(frame, game, logs_area);
}

/// Canvas y grows upward, the arena's grows downward.
fn player_points(game: &Game) -> Vec<(f64, f64)> {
    let (_, height) = game.player.arena();
    let left = game.player.x;
    let bottom = height - game.player.y - PLAYER_SIZE;
    let steps = 4;
    let step = PLAYER_SIZE / steps as f64;
    (0..=steps)
        .flat_map(|i| (0..=steps).map(move |j| (left + i as f64 * step, bottom + j as f64 * step)))
        .collect()
}

fn draw_arena(frame: &mut Frame, game: &Game, area: Rect) {
    let (width, height) = game.player.arena();
    let points = player_points(game);
    let player = &game.player;
    let canvas = Canvas::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("voxgame (say: up, down, left, right, stop, speed up, slow down)"),
        )
        .marker(Marker::HalfBlock)
        .x_bounds([0.0, width])
        .y_bounds([0.0, height])
        .paint(move |ctx| {
            ctx.draw(&Rectangle {
                x: player.x,
                y: height - player.y - PLAYER_SIZE,
                width: PLAYER_SIZE,
                height: PLAYER_SIZE,
                color: Color::Red,
            });
            ctx.draw(&Points {
                coords: &points,
                color: Color::Red,
            });
        });
    frame.render_widget(canvas, area);
}

fn state_color(state: WorkerState) -> Color {
    match state {
        WorkerState::Idle => Color::DarkGray,
        WorkerState::Listening => Color::Green,
        WorkerState::Recognizing => Color::Yellow,
        WorkerState::Publishing => Color::Cyan,
        WorkerState::Stopped => Color::Red,
    }
}

fn draw_status(frame: &mut Frame, game: &Game, area: Rect) {
    let player = &game.player;
    let lines = vec![
        Line::from(vec![
            Span::raw("Worker:  "),
            Span::styled(
                game.worker_state.label(),
                Style::default()
                    .fg(state_color(game.worker_state))
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(format!("Session: {}", game.session_id)),
        Line::from(format!(
            "Speed:   {:.0}  velocity ({:+.0}, {:+.0})",
            player.speed, player.dx, player.dy
        )),
        Line::from(format!("Pos:     ({:.0}, {:.0})", player.x, player.y)),
    ];
    let para = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Status (q to quit)"),
    );
    frame.render_widget(para, area);
}

fn draw_heard(frame: &mut Frame, game: &Game, area: Rect) {
    let items: Vec<ListItem> = game
        .heard
        .iter()
        .rev()
        .map(|h| {
            let style = if h.command.is_some() {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:<11}", h.intent), style),
                Span::raw(format!(" \"{}\" {}ms", h.transcript, h.duration_ms)),
            ]))
        })
        .collect();
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Heard"));
    frame.render_widget(list, area);
}

fn draw_logs(frame: &mut Frame, game: &Game, area: Rect) {
    let visible = area.height.saturating_sub(2) as usize;
    let items: Vec<ListItem> = recent_lines(&game.logs, visible)
        .into_iter()
        .map(|line| {
            let style = if line.contains("ERROR") {
                Style::default().fg(Color::Red)
            } else if line.contains("WARN") {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default()
            };
            ListItem::new(Span::styled(line, style))
        })
        .collect();
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Log"));
    frame.render_widget(list, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_layer::log_buffer;
    use voxgame_core::config::GameConfig;

    #[test]
    fn test_player_points_cover_square() {
        let game = Game::new(&GameConfig::default(), "s", log_buffer());
        let points = player_points(&game);
        assert_eq!(points.len(), 25);
        // player at (10, 10) in an 800-high arena
        assert!(points.contains(&(10.0, 780.0)));
        assert!(points.contains(&(20.0, 790.0)));
    }

    #[test]
    fn test_state_colors_distinct() {
        let states = [
            WorkerState::Idle,
            WorkerState::Listening,
            WorkerState::Recognizing,
            WorkerState::Publishing,
            WorkerState::Stopped,
        ];
        let mut colors: Vec<Color> = states.iter().map(|s| state_color(*s)).collect();
        colors.dedup();
        assert_eq!(colors.len(), states.len());
    }
}
