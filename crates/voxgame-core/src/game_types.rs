/// Where the background recognition worker currently is in its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    #[default]
    Idle,
    Listening,
    Recognizing,
    Publishing,
    Stopped,
}

impl WorkerState {
    pub fn as_u8(self) -> u8 {
        match self {
            WorkerState::Idle => 0,
            WorkerState::Listening => 1,
            WorkerState::Recognizing => 2,
            WorkerState::Publishing => 3,
            WorkerState::Stopped => 4,
        }
    }

    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => WorkerState::Listening,
            2 => WorkerState::Recognizing,
            3 => WorkerState::Publishing,
            4 => WorkerState::Stopped,
            _ => WorkerState::Idle,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WorkerState::Idle => "idle",
            WorkerState::Listening => "listening",
            WorkerState::Recognizing => "recognizing",
            WorkerState::Publishing => "waiting for game",
            WorkerState::Stopped => "stopped",
        }
    }
}

/// Player commands, keyed by the intent names configured in the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameCommand {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Stop,
    SlowDown,
    SpeedUp,
}

impl GameCommand {
    pub fn from_intent(intent: &str) -> Option<Self> {
        match intent {
            "Move_Up" => Some(GameCommand::MoveUp),
            "Move_Down" => Some(GameCommand::MoveDown),
            "Move_Left" => Some(GameCommand::MoveLeft),
            "Move_Right" => Some(GameCommand::MoveRight),
            "Stop" => Some(GameCommand::Stop),
            "Slow_Down" => Some(GameCommand::SlowDown),
            "Speed_Up" => Some(GameCommand::SpeedUp),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_state_default_idle() {
        assert_eq!(WorkerState::default(), WorkerState::Idle);
    }

    #[test]
    fn test_worker_state_u8_mapping() {
        for state in [
            WorkerState::Idle,
            WorkerState::Listening,
            WorkerState::Recognizing,
            WorkerState::Publishing,
            WorkerState::Stopped,
        ] {
            assert_eq!(WorkerState::from_u8(state.as_u8()), state);
        }
        assert_eq!(WorkerState::from_u8(200), WorkerState::Idle);
    }

    #[test]
    fn test_game_command_from_intent() {
        assert_eq!(GameCommand::from_intent("Move_Up"), Some(GameCommand::MoveUp));
        assert_eq!(GameCommand::from_intent("Move_Down"), Some(GameCommand::MoveDown));
        assert_eq!(GameCommand::from_intent("Move_Left"), Some(GameCommand::MoveLeft));
        assert_eq!(GameCommand::from_intent("Move_Right"), Some(GameCommand::MoveRight));
        assert_eq!(GameCommand::from_intent("Stop"), Some(GameCommand::Stop));
        assert_eq!(GameCommand::from_intent("Slow_Down"), Some(GameCommand::SlowDown));
        assert_eq!(GameCommand::from_intent("Speed_Up"), Some(GameCommand::SpeedUp));
    }

    #[test]
    fn test_game_command_unknown_intent() {
        assert_eq!(GameCommand::from_intent("Default Welcome Intent"), None);
        assert_eq!(GameCommand::from_intent("move_up"), None);
        assert_eq!(GameCommand::from_intent(""), None);
    }
}
