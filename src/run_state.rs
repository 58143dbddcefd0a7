use std::fmt;

use tracing::debug;

use crate::types::StoppedEventReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RunState {
    #[default]
    NoRun,
    Running,
    Stopped,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunState::NoRun => "not running",
            RunState::Running => "running",
            RunState::Stopped => "stopped",
        })
    }
}

/// What happened to the debuggee, as far as its run-state is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// The `initialized` event was processed. `launched` tells whether the
    /// `launch` request succeeded before.
    Initialized { launched: bool },
    Stopped(StoppedEventReason),
    Exited,
    Terminated,
    /// A `continue` or step request was accepted.
    ResumeAccepted,
    /// The backend was killed or the connection was lost.
    ForcedStop,
}

/// A state change: `(from, to)`.
pub type Transition = (RunState, RunState);

#[derive(Debug, Default)]
pub struct RunStateMachine {
    state: RunState,
}

impl RunStateMachine {
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Applies `trigger` and returns the transition it caused, if any. Pairs
    /// outside the transition table leave the state alone.
    pub fn apply(&mut self, trigger: &Trigger) -> Option<Transition> {
        let from = self.state;
        let Some(to) = next_state(from, trigger) else {
            debug!("Ignoring {trigger:?} while {from}.");
            return None;
        };
        if from == to {
            return None;
        }
        self.state = to;
        Some((from, to))
    }
}

fn next_state(from: RunState, trigger: &Trigger) -> Option<RunState> {
    use RunState::*;
    match (from, trigger) {
        (NoRun, Trigger::Initialized { launched: true }) => Some(Running),
        (Running, Trigger::Stopped(reason)) if reason.moves_focus() => Some(Stopped),
        (Running | Stopped, Trigger::Stopped(reason)) if reason.is_fatal() => Some(NoRun),
        (Running | Stopped, Trigger::Exited | Trigger::Terminated) => Some(NoRun),
        (Stopped, Trigger::ResumeAccepted) => Some(Running),
        (_, Trigger::ForcedStop) => Some(NoRun),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATES: [RunState; 3] = [RunState::NoRun, RunState::Running, RunState::Stopped];

    fn triggers() -> Vec<Trigger> {
        vec![
            Trigger::Initialized { launched: true },
            Trigger::Initialized { launched: false },
            Trigger::Stopped(StoppedEventReason::Breakpoint),
            Trigger::Stopped(StoppedEventReason::Step),
            Trigger::Stopped(StoppedEventReason::SignalReceived),
            Trigger::Stopped(StoppedEventReason::Exception),
            Trigger::Stopped(StoppedEventReason::Pause),
            Trigger::Stopped(StoppedEventReason::String("custom".to_string())),
            Trigger::Exited,
            Trigger::Terminated,
            Trigger::ResumeAccepted,
            Trigger::ForcedStop,
        ]
    }

    fn allowed(from: RunState, to: RunState, trigger: &Trigger) -> bool {
        use RunState::*;
        match (from, to) {
            (NoRun, Running) => trigger == &Trigger::Initialized { launched: true },
            (Running, Stopped) => {
                matches!(trigger, Trigger::Stopped(reason) if reason.moves_focus())
            }
            (Running | Stopped, NoRun) => matches!(
                trigger,
                Trigger::Exited | Trigger::Terminated | Trigger::ForcedStop
            ) || matches!(trigger, Trigger::Stopped(reason) if reason.is_fatal()),
            (Stopped, Running) => trigger == &Trigger::ResumeAccepted,
            _ => false,
        }
    }

    #[test]
    fn only_table_transitions_happen() {
        for from in STATES {
            for trigger in triggers() {
                let mut machine = RunStateMachine { state: from };
                match machine.apply(&trigger) {
                    Some((before, after)) => {
                        assert_eq!(before, from);
                        assert_eq!(machine.state(), after);
                        assert!(
                            allowed(before, after, &trigger),
                            "{before:?} -> {after:?} on {trigger:?}"
                        );
                    }
                    None => assert_eq!(machine.state(), from, "{trigger:?}"),
                }
            }
        }
    }

    #[test]
    fn forced_stop_while_not_running_is_no_transition() {
        let mut machine = RunStateMachine::default();
        assert_eq!(machine.apply(&Trigger::ForcedStop), None);
    }

    #[test]
    fn breakpoint_hit_then_resume() {
        let mut machine = RunStateMachine::default();
        assert_eq!(
            machine.apply(&Trigger::Initialized { launched: true }),
            Some((RunState::NoRun, RunState::Running))
        );
        assert_eq!(
            machine.apply(&Trigger::Stopped(StoppedEventReason::BreakpointHit)),
            Some((RunState::Running, RunState::Stopped))
        );
        assert_eq!(
            machine.apply(&Trigger::Stopped(StoppedEventReason::Step)),
            None
        );
        assert_eq!(
            machine.apply(&Trigger::ResumeAccepted),
            Some((RunState::Stopped, RunState::Running))
        );
        assert_eq!(
            machine.apply(&Trigger::Exited),
            Some((RunState::Running, RunState::NoRun))
        );
    }
}
