//! The autopilot state machine.
//!
//! The enum encodes both "what the autopilot decided" and "a mutating
//! operation is in flight" (`Boosting`, `Decreasing`): the transition table
//! is the single source of truth for what may happen next, so no separate
//! in-flight flag exists.

use std::fmt;

/// Autopilot states.
///
/// Allowed transitions:
///
/// ```text
/// STAND_BY   → BOOSTING | DECREASING | STAND_BY
/// BOOSTING   → BOOSTED
/// BOOSTED    → DECREASING | STAND_BY | BOOSTED
/// DECREASING → STAND_BY | BOOSTED | DECREASING
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Running with the desired thread count, lag under control.
    StandBy,
    /// A thread addition is in flight.
    Boosting,
    /// Running with more threads than desired.
    Boosted,
    /// A thread removal is in flight.
    Decreasing,
}

impl State {
    /// The transitions allowed out of this state.
    pub fn valid_transitions(self) -> &'static [State] {
        match self {
            State::StandBy => &[State::Boosting, State::Decreasing, State::StandBy],
            State::Boosting => &[State::Boosted],
            State::Boosted => &[State::Decreasing, State::StandBy, State::Boosted],
            State::Decreasing => &[State::StandBy, State::Boosted, State::Decreasing],
        }
    }

    pub fn can_transition_to(self, next: State) -> bool {
        self.valid_transitions().contains(&next)
    }

    /// Whether any of `targets` is reachable from this state.
    pub fn can_transition_to_any(self, targets: &[State]) -> bool {
        targets.iter().any(|target| self.can_transition_to(*target))
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::StandBy => "STAND_BY",
            State::Boosting => "BOOSTING",
            State::Boosted => "BOOSTED",
            State::Decreasing => "DECREASING",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use State::*;

    const ALL: [State; 4] = [StandBy, Boosting, Boosted, Decreasing];

    #[test]
    fn test_full_transition_table() {
        let allowed: [(State, State); 10] = [
            (StandBy, Boosting),
            (StandBy, Decreasing),
            (StandBy, StandBy),
            (Boosting, Boosted),
            (Boosted, Decreasing),
            (Boosted, StandBy),
            (Boosted, Boosted),
            (Decreasing, StandBy),
            (Decreasing, Boosted),
            (Decreasing, Decreasing),
        ];

        for from in ALL {
            for to in ALL {
                let expected = allowed.contains(&(from, to));
                assert_eq!(
                    from.can_transition_to(to),
                    expected,
                    "{} -> {} should be {}",
                    from,
                    to,
                    expected
                );
            }
        }
    }

    #[test]
    fn test_boosting_only_resolves_to_boosted() {
        assert_eq!(Boosting.valid_transitions(), &[Boosted]);
        assert!(!Boosting.can_transition_to_any(&[StandBy, Boosting, Decreasing]));
    }

    #[test]
    fn test_can_transition_to_any() {
        assert!(StandBy.can_transition_to_any(&[Boosting, Decreasing, StandBy]));
        assert!(Boosted.can_transition_to_any(&[Boosting, Decreasing, StandBy]));
        assert!(Decreasing.can_transition_to_any(&[Boosting, Decreasing, StandBy]));
        assert!(!Boosting.can_transition_to_any(&[Boosting, Decreasing, StandBy]));
    }

    #[test]
    fn test_display_names() {
        assert_eq!(StandBy.to_string(), "STAND_BY");
        assert_eq!(Boosting.to_string(), "BOOSTING");
        assert_eq!(Boosted.to_string(), "BOOSTED");
        assert_eq!(Decreasing.to_string(), "DECREASING");
    }
}
