//! Binding configuration options.

use weft_core::types::KeyId;

use crate::types::{ConnectionId, PeerAddress};

/// How the peer's address is determined during preparation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AddressingOption {
    /// Not chosen; acceptable only when an existing connection supplies the
    /// address.
    #[default]
    Unspecified,
    /// Synthesize the fabric address from the peer node id.
    FabricDefault,
    /// Synthesize the fabric address within a specific subnet.
    FabricSubnet(u16),
    /// Use this address verbatim.
    Explicit(PeerAddress),
    /// Resolve this hostname asynchronously.
    Hostname(String),
}

/// The transport an exchange created against the binding will use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportOption {
    #[default]
    Unspecified,
    Udp,
    /// UDP with reliable-messaging delivery tracking.
    ReliableUdp,
    Tcp,
    /// Reuse an already-established connection.
    Existing(ConnectionId),
}

/// The security applied to messages sent over the binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecurityOption {
    #[default]
    Unspecified,
    /// Unencrypted.
    None,
    /// Reserve a specific application key.
    Key(KeyId),
    /// Certificate-authenticated session establishment.
    Case,
    /// A CASE session shared with other bindings to the same peer.
    SharedCase,
    /// Passcode-authenticated session establishment.
    Pase,
    /// Token-authenticated session establishment.
    Take,
}

impl SecurityOption {
    /// The session-establishment request this option maps to, if any.
    #[must_use]
    pub fn session_kind(&self) -> Option<crate::traits::SessionKind> {
        use crate::traits::SessionKind;
        match self {
            Self::Case => Some(SessionKind::Case),
            Self::SharedCase => Some(SessionKind::SharedCase),
            Self::Pase => Some(SessionKind::Pase),
            Self::Take => Some(SessionKind::Take),
            Self::Unspecified | Self::None | Self::Key(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::SessionKind;

    #[test]
    fn session_kinds_map_only_session_options() {
        assert_eq!(SecurityOption::Case.session_kind(), Some(SessionKind::Case));
        assert_eq!(
            SecurityOption::SharedCase.session_kind(),
            Some(SessionKind::SharedCase)
        );
        assert_eq!(SecurityOption::Pase.session_kind(), Some(SessionKind::Pase));
        assert_eq!(SecurityOption::Take.session_kind(), Some(SessionKind::Take));
        assert_eq!(SecurityOption::None.session_kind(), None);
        assert_eq!(SecurityOption::Key(KeyId::new(1)).session_kind(), None);
        assert_eq!(SecurityOption::Unspecified.session_kind(), None);
    }
}
