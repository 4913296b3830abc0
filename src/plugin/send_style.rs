//! Client send style without recoding.

use crate::network::{MixMessage, NetworkMessage, TransportMessage};
use crate::plugin::{ClientOutbox, ClientSendStyle};
use crate::sim::VirtualTime;

/// Puts every request into its own mix message and unwraps replies as-is.
#[derive(Debug, Clone, Copy)]
pub struct PassThroughClientStyle {
    pub header_size: u64,
}

impl ClientSendStyle for PassThroughClientStyle {
    fn incoming_request_from_user(
        &mut self,
        request: TransportMessage,
        now: VirtualTime,
        outbox: &mut ClientOutbox,
    ) {
        let (owner, destination) = (request.header.owner, request.header.destination);
        outbox.send(MixMessage::bundle(
            vec![request],
            self.header_size,
            owner,
            destination,
            now,
        ));
    }

    fn incoming_decrypted_reply(&mut self, reply: NetworkMessage, outbox: &mut ClientOutbox) {
        for transport in reply.into_transports() {
            outbox.deliver(transport);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::network::{MessageHeader, NodeId};

    #[test]
    fn test_request_is_wrapped_and_dummy_reply_is_empty() {
        let mut style = PassThroughClientStyle { header_size: 10 };
        let header = MessageHeader::new(true, 90, NodeId(0), NodeId(2), Duration::ZERO);
        let mut outbox = ClientOutbox::default();
        style.incoming_request_from_user(
            TransportMessage::request(header, 0, 0, Vec::new()),
            Duration::from_millis(5),
            &mut outbox,
        );

        let dummy = MixMessage::dummy(false, 100, NodeId(0), NodeId(2), Duration::ZERO);
        style.incoming_decrypted_reply(NetworkMessage::Mix(dummy), &mut outbox);

        let (to_mixes, delivered) = outbox.into_parts();
        assert_eq!(to_mixes.len(), 1);
        assert_eq!(to_mixes[0].header.length, 100);
        assert_eq!(to_mixes[0].header.creation_time, Duration::from_millis(5));
        assert!(delivered.is_empty());
    }
}
