//! Server behind the distant proxy.

use crate::network::{MessageHeader, TransportMessage};
use crate::sim::{IdAllocator, VirtualTime};

/// Answers requests according to their reply schedule.
#[derive(Debug, Default, Clone, Copy)]
pub struct Server;

impl Server {
    /// Build every reply the request asks for, paired with the delay after
    /// which it is to be sent. Each reply is stamped with its send time.
    pub fn incoming_message(
        &self,
        request: &TransportMessage,
        now: VirtualTime,
        ids: &mut IdAllocator,
    ) -> Vec<(VirtualTime, TransportMessage)> {
        request
            .replies
            .iter()
            .enumerate()
            .map(|(index, spec)| {
                let header = MessageHeader::new(
                    false,
                    spec.size,
                    request.header.owner,
                    request.header.destination,
                    now + spec.delay,
                );
                let reply =
                    TransportMessage::reply(header, ids.message(), request.transaction_id, index);
                (spec.delay, reply)
            })
            .collect()
    }
}
