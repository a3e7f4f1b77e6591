//! Dictation session lifecycle state machine.

use std::fmt;

use thiserror::Error;

/// One lifecycle state for a dictation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Recording,
    Transcribing,
    Error,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Idle => "idle",
            State::Recording => "recording",
            State::Transcribing => "transcribing",
            State::Error => "error",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One transition trigger consumed by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Start,
    Stop,
    Cancel,
    Transcribed,
    Fail,
    Reset,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::Start => "start",
            Event::Stop => "stop",
            Event::Cancel => "cancel",
            Event::Transcribed => "transcribed",
            Event::Fail => "fail",
            Event::Reset => "reset",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected state/event combination. The state is left unchanged.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid transition: {state} --({event})--> ?")]
pub struct InvalidTransition {
    pub state: State,
    pub event: Event,
}

/// Validates and applies one state transition.
///
/// `Fail` is accepted from every state and always lands in [`State::Error`].
pub fn transition(current: State, event: Event) -> Result<State, InvalidTransition> {
    if event == Event::Fail {
        return Ok(State::Error);
    }

    match (current, event) {
        (State::Idle, Event::Start) => Ok(State::Recording),
        (State::Recording, Event::Stop) => Ok(State::Transcribing),
        (State::Recording, Event::Cancel) => Ok(State::Idle),
        (State::Transcribing, Event::Transcribed) => Ok(State::Idle),
        (State::Error, Event::Reset) => Ok(State::Idle),
        (state, event) => Err(InvalidTransition { state, event }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATES: [State; 4] = [
        State::Idle,
        State::Recording,
        State::Transcribing,
        State::Error,
    ];

    const ALL_EVENTS: [Event; 6] = [
        Event::Start,
        Event::Stop,
        Event::Cancel,
        Event::Transcribed,
        Event::Fail,
        Event::Reset,
    ];

    #[test]
    fn accepts_full_lifecycle() {
        let state = transition(State::Idle, Event::Start).unwrap();
        assert_eq!(state, State::Recording);
        let state = transition(state, Event::Stop).unwrap();
        assert_eq!(state, State::Transcribing);
        let state = transition(state, Event::Transcribed).unwrap();
        assert_eq!(state, State::Idle);
    }

    #[test]
    fn cancel_returns_to_idle_from_recording() {
        assert_eq!(
            transition(State::Recording, Event::Cancel).unwrap(),
            State::Idle
        );
    }

    #[test]
    fn fail_lands_in_error_from_every_state() {
        for state in ALL_STATES {
            assert_eq!(transition(state, Event::Fail).unwrap(), State::Error);
        }
    }

    #[test]
    fn only_reset_leaves_error() {
        for event in ALL_EVENTS {
            let result = transition(State::Error, event);
            match event {
                Event::Reset => assert_eq!(result.unwrap(), State::Idle),
                Event::Fail => assert_eq!(result.unwrap(), State::Error),
                _ => assert!(result.is_err()),
            }
        }
    }

    #[test]
    fn rejected_events_report_state_and_event() {
        let err = transition(State::Idle, Event::Stop).unwrap_err();
        assert_eq!(err.state, State::Idle);
        assert_eq!(err.event, Event::Stop);
        assert_eq!(err.to_string(), "invalid transition: idle --(stop)--> ?");
    }

    #[test]
    fn transition_table_is_exhaustive() {
        // Every combination either transitions or errors; no panics.
        for state in ALL_STATES {
            for event in ALL_EVENTS {
                let _ = transition(state, event);
            }
        }
    }
}
