//! Verifier state machine: START -> S1 -> S2 -> S3 -> S4 -> ACCEPT, with any
//! stage able to transition to REJECT.

use crate::errors::DomainError;

/// State of one verification session's orchestrator loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifierState {
    Start,
    AfterStage1,
    AfterStage2,
    AfterStage3,
    Accepted,
    Rejected,
}

/// A stage passing, or any stage rejecting.
#[derive(Debug, Clone, Copy)]
pub enum VerifierTransition {
    Stage1Passed,
    Stage2Passed,
    Stage3Passed,
    Stage4Passed,
    Rejected,
}

pub struct VerifierStateMachine;

impl VerifierStateMachine {
    /// Validate and compute the next state for a verifier transition.
    pub fn transition(
        current: VerifierState,
        event: VerifierTransition,
    ) -> Result<VerifierState, DomainError> {
        use VerifierState::*;
        use VerifierTransition::*;

        match (current, event) {
            (Start, Stage1Passed) => Ok(AfterStage1),
            (AfterStage1, Stage2Passed) => Ok(AfterStage2),
            (AfterStage2, Stage3Passed) => Ok(AfterStage3),
            (AfterStage3, Stage4Passed) => Ok(Accepted),

            // Any non-terminal state rejects.
            (Start | AfterStage1 | AfterStage2 | AfterStage3, Rejected) => Ok(Rejected),

            (state, transition) => Err(DomainError::InvalidTransition {
                current_state: format!("{state:?}"),
                attempted_transition: format!("{transition:?}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use VerifierState::*;
    use VerifierTransition::*;

    #[test]
    fn happy_path_walks_all_four_stages() {
        let s = VerifierStateMachine::transition(Start, Stage1Passed).unwrap();
        assert_eq!(s, AfterStage1);
        let s = VerifierStateMachine::transition(s, Stage2Passed).unwrap();
        assert_eq!(s, AfterStage2);
        let s = VerifierStateMachine::transition(s, Stage3Passed).unwrap();
        assert_eq!(s, AfterStage3);
        let s = VerifierStateMachine::transition(s, Stage4Passed).unwrap();
        assert_eq!(s, Accepted);
    }

    #[test]
    fn any_stage_can_reject() {
        assert_eq!(
            VerifierStateMachine::transition(AfterStage2, Rejected).unwrap(),
            Rejected
        );
    }

    #[test]
    fn skipping_a_stage_is_invalid() {
        assert!(VerifierStateMachine::transition(Start, Stage3Passed).is_err());
    }

    #[test]
    fn terminal_states_accept_no_further_transitions() {
        assert!(VerifierStateMachine::transition(Accepted, Stage1Passed).is_err());
        assert!(VerifierStateMachine::transition(Rejected, Rejected).is_err());
    }
}
