use std::fmt;

use crate::core::prelude::*;

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Loading,
    Playing,
    Paused,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Stopped => write!(f, "stopped"),
            PlaybackState::Loading => write!(f, "loading"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
        }
    }
}

/// What the play/pause control should ask the engine for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PlaybackRequest {
    Play,
    Pause,
    Stop,
}

/// Mirrors what the engine reports. Requests never move the state; only
/// [`PlaybackController::on_engine_state_changed`] does.
#[derive(Debug, Default)]
pub struct PlaybackController {
    state: PlaybackState,
}

impl PlaybackController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_state(&self) -> PlaybackState {
        self.state
    }

    /// Applies an engine-reported state. Returns whether it changed.
    pub fn on_engine_state_changed(&mut self, next: PlaybackState) -> bool {
        if next == self.state {
            return false;
        }

        if !Self::is_expected(self.state, next) {
            warn!("Unexpected playback transition {} -> {}", self.state, next);
        }

        debug!("Playback {} -> {}", self.state, next);
        self.state = next;
        true
    }

    pub fn request_play_pause(&self) -> PlaybackRequest {
        match self.state {
            PlaybackState::Playing => PlaybackRequest::Pause,
            PlaybackState::Paused | PlaybackState::Stopped => {
                PlaybackRequest::Play
            }
            PlaybackState::Loading => PlaybackRequest::Stop,
        }
    }

    /// Weight changes only mean something to an engine with an open stream.
    pub fn forwards_weights(&self) -> bool {
        self.state != PlaybackState::Stopped
    }

    fn is_expected(from: PlaybackState, to: PlaybackState) -> bool {
        use PlaybackState::*;
        matches!(
            (from, to),
            (_, Stopped)
                | (Stopped, Loading)
                | (Paused, Loading)
                | (Loading, Playing)
                | (Playing, Paused)
                | (Paused, Playing)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::PlaybackState::*;

    #[test]
    fn follows_engine_reports() {
        let mut controller = PlaybackController::new();
        assert_eq!(controller.current_state(), Stopped);

        for state in [Loading, Playing, Paused, Playing, Stopped] {
            assert!(controller.on_engine_state_changed(state));
            assert_eq!(controller.current_state(), state);
        }
    }

    #[test]
    fn repeated_report_is_not_a_change() {
        let mut controller = PlaybackController::new();
        controller.on_engine_state_changed(Loading);
        assert!(!controller.on_engine_state_changed(Loading));
    }

    #[test]
    fn engine_is_authoritative_even_for_odd_transitions() {
        let mut controller = PlaybackController::new();
        assert!(controller.on_engine_state_changed(Paused));
        assert_eq!(controller.current_state(), Paused);
    }

    #[test]
    fn play_pause_requests_do_not_move_state() {
        let mut controller = PlaybackController::new();
        assert_eq!(controller.request_play_pause(), PlaybackRequest::Play);
        assert_eq!(controller.current_state(), Stopped);

        controller.on_engine_state_changed(Loading);
        assert_eq!(controller.request_play_pause(), PlaybackRequest::Stop);

        controller.on_engine_state_changed(Playing);
        assert_eq!(controller.request_play_pause(), PlaybackRequest::Pause);

        controller.on_engine_state_changed(Paused);
        assert_eq!(controller.request_play_pause(), PlaybackRequest::Play);
    }

    #[test]
    fn stopped_does_not_forward_weights() {
        let mut controller = PlaybackController::new();
        assert!(!controller.forwards_weights());
        controller.on_engine_state_changed(Loading);
        assert!(controller.forwards_weights());
    }
}
