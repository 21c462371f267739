//! Binding lifecycle states and legality predicates.
//!
//! ```text
//! NotConfigured → Configuring → Preparing → PreparingAddress
//!     [→ ResolvingHostName] → PreparingTransport [→ Connecting]
//!     → PreparingSecurity [→ EstablishingSession | WaitingSecurity] → Ready
//! ```
//!
//! Any preparing sub-state may fail to `Failed`. `Ready`, `Failed`, and
//! `NotConfigured` may move to `Closed` (terminal) or back to
//! `NotConfigured` via reset; reset also cancels a suspended preparation.

/// The state gating which binding calls are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    NotConfigured,
    Configuring,
    Preparing,
    PreparingAddress,
    ResolvingHostName,
    PreparingTransport,
    Connecting,
    PreparingSecurity,
    EstablishingSession,
    WaitingSecurity,
    Ready,
    Failed,
    Closed,
}

impl BindingState {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotConfigured => "NotConfigured",
            Self::Configuring => "Configuring",
            Self::Preparing => "Preparing",
            Self::PreparingAddress => "PreparingAddress",
            Self::ResolvingHostName => "ResolvingHostName",
            Self::PreparingTransport => "PreparingTransport",
            Self::Connecting => "Connecting",
            Self::PreparingSecurity => "PreparingSecurity",
            Self::EstablishingSession => "EstablishingSession",
            Self::WaitingSecurity => "WaitingSecurity",
            Self::Ready => "Ready",
            Self::Failed => "Failed",
            Self::Closed => "Closed",
        }
    }

    /// Whether the binding is in any preparation phase (suspended or not).
    #[must_use]
    pub fn is_preparing(&self) -> bool {
        matches!(
            self,
            Self::Preparing
                | Self::PreparingAddress
                | Self::ResolvingHostName
                | Self::PreparingTransport
                | Self::Connecting
                | Self::PreparingSecurity
                | Self::EstablishingSession
                | Self::WaitingSecurity
        )
    }

    /// `begin_configuration` is legal only from these states.
    #[must_use]
    pub fn can_begin_configuration(&self) -> bool {
        matches!(self, Self::NotConfigured | Self::Failed)
    }

    /// Reset is legal from anywhere except the terminal state.
    #[must_use]
    pub fn can_reset(&self) -> bool {
        !matches!(self, Self::Closed)
    }

    /// Close is legal from the settled states only; a suspended preparation
    /// must be reset first.
    #[must_use]
    pub fn can_close(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed | Self::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [BindingState; 13] = [
        BindingState::NotConfigured,
        BindingState::Configuring,
        BindingState::Preparing,
        BindingState::PreparingAddress,
        BindingState::ResolvingHostName,
        BindingState::PreparingTransport,
        BindingState::Connecting,
        BindingState::PreparingSecurity,
        BindingState::EstablishingSession,
        BindingState::WaitingSecurity,
        BindingState::Ready,
        BindingState::Failed,
        BindingState::Closed,
    ];

    #[test]
    fn begin_configuration_only_from_settled_states() {
        for state in ALL {
            let expected = matches!(state, BindingState::NotConfigured | BindingState::Failed);
            assert_eq!(state.can_begin_configuration(), expected, "{}", state.name());
        }
    }

    #[test]
    fn preparing_states_are_exactly_the_pipeline() {
        for state in ALL {
            let expected = !matches!(
                state,
                BindingState::NotConfigured
                    | BindingState::Configuring
                    | BindingState::Ready
                    | BindingState::Failed
                    | BindingState::Closed
            );
            assert_eq!(state.is_preparing(), expected, "{}", state.name());
        }
    }

    #[test]
    fn closed_is_terminal() {
        assert!(!BindingState::Closed.can_reset());
        assert!(!BindingState::Closed.can_close());
        assert!(!BindingState::Closed.can_begin_configuration());
    }

    #[test]
    fn close_from_settled_states_only() {
        for state in ALL {
            let expected = matches!(
                state,
                BindingState::Ready | BindingState::Failed | BindingState::NotConfigured
            );
            assert_eq!(state.can_close(), expected, "{}", state.name());
        }
    }

    #[test]
    fn every_state_has_a_name() {
        for state in ALL {
            assert!(!state.name().is_empty());
        }
    }
}
