//! Mix output without batching or reordering.

use crate::network::{MixMessage, TransportMessage};
use crate::plugin::{MixOutbox, MixSendStyle, OutputStrategy};
use crate::sim::VirtualTime;

/// Forwards every message as soon as the mix finished processing it.
#[derive(Debug, Clone)]
pub struct PassThroughOutput {
    reply_style: PassThroughReplyStyle,
}

impl PassThroughOutput {
    pub fn new(header_size: u64) -> Self {
        Self {
            reply_style: PassThroughReplyStyle { header_size },
        }
    }
}

impl OutputStrategy for PassThroughOutput {
    fn incoming_request(&mut self, request: MixMessage, _now: VirtualTime, outbox: &mut MixOutbox) {
        outbox.push_request(request);
    }

    fn incoming_reply(&mut self, reply: MixMessage, _now: VirtualTime, outbox: &mut MixOutbox) {
        outbox.push_reply(reply);
    }

    fn mix_send_style(&mut self) -> Option<&mut dyn MixSendStyle> {
        Some(&mut self.reply_style)
    }
}

/// Wraps each server reply into its own mix message.
#[derive(Debug, Clone, Copy)]
pub struct PassThroughReplyStyle {
    pub header_size: u64,
}

impl MixSendStyle for PassThroughReplyStyle {
    fn incoming_data_from_server(
        &mut self,
        reply: TransportMessage,
        now: VirtualTime,
        outbox: &mut MixOutbox,
    ) {
        let (owner, destination) = (reply.header.owner, reply.header.destination);
        outbox.push_reply(MixMessage::bundle(
            vec![reply],
            self.header_size,
            owner,
            destination,
            now,
        ));
    }
}
