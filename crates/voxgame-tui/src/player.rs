use voxgame_core::config::GameConfig;
use voxgame_core::GameCommand;

/// Side length of the player's square, in arena units.
pub const PLAYER_SIZE: f64 = 10.0;

const START_POSITION: f64 = 10.0;

/// The square the player steers by voice. Coordinates grow right and down,
/// with the origin in the arena's top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub x: f64,
    pub y: f64,
    pub dx: f64,
    pub dy: f64,
    pub speed: f64,
    speed_step: f64,
    max_speed: f64,
    arena_width: f64,
    arena_height: f64,
}

impl Player {
    pub fn new(config: &GameConfig) -> Self {
        let max_speed = config.max_speed.max(0.0);
        Self {
            x: START_POSITION,
            y: START_POSITION,
            dx: 0.0,
            dy: 0.0,
            speed: config.speed.clamp(0.0, max_speed),
            speed_step: config.speed_step,
            max_speed,
            arena_width: config.width,
            arena_height: config.height,
        }
    }

    pub fn arena(&self) -> (f64, f64) {
        (self.arena_width, self.arena_height)
    }

    /// Moves add the current speed to the matching velocity component, so
    /// repeating a direction accelerates.
    pub fn apply(&mut self, command: GameCommand) {
        match command {
            GameCommand::MoveUp => self.dy = self.limit(self.dy - self.speed),
            GameCommand::MoveDown => self.dy = self.limit(self.dy + self.speed),
            GameCommand::MoveLeft => self.dx = self.limit(self.dx - self.speed),
            GameCommand::MoveRight => self.dx = self.limit(self.dx + self.speed),
            GameCommand::Stop => {
                self.dx = 0.0;
                self.dy = 0.0;
            }
            GameCommand::SlowDown => self.set_speed(self.speed - self.speed_step),
            GameCommand::SpeedUp => self.set_speed(self.speed + self.speed_step),
        }
    }

    fn set_speed(&mut self, speed: f64) {
        self.speed = speed.clamp(0.0, self.max_speed);
    }

    fn limit(&self, velocity: f64) -> f64 {
        velocity.clamp(-self.max_speed, self.max_speed)
    }

    /// Advance one frame. Hitting a wall stops motion along that axis.
    pub fn update(&mut self) {
        let max_x = (self.arena_width - PLAYER_SIZE).max(0.0);
        let max_y = (self.arena_height - PLAYER_SIZE).max(0.0);

        let x = self.x + self.dx;
        if !(0.0..=max_x).contains(&x) {
            self.dx = 0.0;
        }
        self.x = x.clamp(0.0, max_x);

        let y = self.y + self.dy;
        if !(0.0..=max_y).contains(&y) {
            self.dy = 0.0;
        }
        self.y = y.clamp(0.0, max_y);
    }

    pub fn is_moving(&self) -> bool {
        self.dx != 0.0 || self.dy != 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> Player {
        Player::new(&GameConfig::default())
    }

    #[test]
    fn test_player_starts_still_near_corner() {
        let p = player();
        assert_eq!((p.x, p.y), (10.0, 10.0));
        assert!(!p.is_moving());
        assert_eq!(p.speed, 2.0);
    }

    #[test]
    fn test_move_commands_accumulate_speed() {
        let mut p = player();
        p.apply(GameCommand::MoveRight);
        p.apply(GameCommand::MoveRight);
        assert_eq!(p.dx, 4.0);
        p.apply(GameCommand::MoveUp);
        assert_eq!(p.dy, -2.0);
        p.apply(GameCommand::MoveLeft);
        assert_eq!(p.dx, 2.0);
        p.apply(GameCommand::MoveDown);
        assert_eq!(p.dy, 0.0);
    }

    #[test]
    fn test_stop_zeroes_velocity_keeps_speed() {
        let mut p = player();
        p.apply(GameCommand::SpeedUp);
        p.apply(GameCommand::MoveDown);
        p.apply(GameCommand::Stop);
        assert!(!p.is_moving());
        assert_eq!(p.speed, 7.0);
    }

    #[test]
    fn test_speed_clamped() {
        let mut p = player();
        p.apply(GameCommand::SlowDown);
        assert_eq!(p.speed, 0.0);
        for _ in 0..20 {
            p.apply(GameCommand::SpeedUp);
        }
        assert_eq!(p.speed, 40.0);
    }

    #[test]
    fn test_velocity_clamped_to_max_speed() {
        let mut p = player();
        for _ in 0..20 {
            p.apply(GameCommand::SpeedUp);
        }
        p.apply(GameCommand::MoveLeft);
        p.apply(GameCommand::MoveLeft);
        assert_eq!(p.dx, -40.0);
    }

    #[test]
    fn test_update_moves_by_velocity() {
        let mut p = player();
        p.apply(GameCommand::MoveRight);
        p.apply(GameCommand::MoveDown);
        p.update();
        p.update();
        assert_eq!((p.x, p.y), (14.0, 14.0));
    }

    #[test]
    fn test_update_clamps_to_arena() {
        let mut p = player();
        p.apply(GameCommand::MoveUp);
        for _ in 0..10 {
            p.update();
        }
        assert_eq!(p.y, 0.0);
        assert_eq!(p.dy, 0.0);

        p.apply(GameCommand::SpeedUp);
        p.apply(GameCommand::MoveRight);
        for _ in 0..1000 {
            p.update();
        }
        assert_eq!(p.x, 800.0 - PLAYER_SIZE);
        assert!(!p.is_moving());
    }
}
