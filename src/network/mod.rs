//! P2P networking layer (UDP gossip)

pub mod peer;
pub mod protocol;

pub use peer::{Peer, PeerTable};
pub use protocol::{Message, PeerAddress};
