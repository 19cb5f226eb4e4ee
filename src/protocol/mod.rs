pub mod meitrack;
pub mod tk103;

pub use meitrack::Meitrack;
pub use tk103::Tk103;

use crate::config::Config;
use crate::device::IdentityResolver;
use crate::error::Result;
use crate::position::Position;
use crate::transport::ReplyChannel;

/// Collaborators injected into a decode call.
///
/// Identity and configuration are read-only lookups; the reply channel is
/// absent for connectionless or already-closed transports, in which case no
/// acknowledgment is written.
pub struct DecodeContext<'a> {
    pub identity: &'a dyn IdentityResolver,
    pub config: &'a dyn Config,
    pub reply: Option<&'a mut dyn ReplyChannel>,
}

impl<'a> DecodeContext<'a> {
    pub fn new(identity: &'a dyn IdentityResolver, config: &'a dyn Config) -> Self {
        Self {
            identity,
            config,
            reply: None,
        }
    }

    pub fn with_reply(
        identity: &'a dyn IdentityResolver,
        config: &'a dyn Config,
        reply: &'a mut dyn ReplyChannel,
    ) -> Self {
        Self {
            identity,
            config,
            reply: Some(reply),
        }
    }

    pub(crate) fn has_reply(&self) -> bool {
        self.reply.is_some()
    }

    /// Hand a reply frame to the transport, if one is attached.
    pub(crate) fn send(&mut self, frame: &[u8]) -> Result<()> {
        if let Some(reply) = self.reply.as_deref_mut() {
            reply.write_all(frame)?;
        }
        Ok(())
    }
}

/// Resolve a transmitted unique identifier, logging unknown devices.
///
/// Resolution failure aborts the decode of the message and no record is
/// produced.
pub(crate) fn resolve(
    identity: &dyn IdentityResolver,
    unique_id: &str,
) -> Option<crate::device::DeviceId> {
    let device_id = identity.resolve(unique_id);
    if device_id.is_none() {
        log::warn!("unknown device {unique_id}");
    }
    device_id
}

/// The protocols this crate decodes.
///
/// Each variant owns its compiled grammars; decoding one buffer is a pure,
/// synchronous transformation into zero or more records plus at most one
/// outbound acknowledgment.
pub enum Protocol {
    Tk103(Tk103),
    Meitrack(Meitrack),
}

impl Protocol {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tk103(_) => tk103::NAME,
            Self::Meitrack(_) => meitrack::NAME,
        }
    }

    /// Decode one inbound buffer.
    ///
    /// Malformed input yields an empty batch; `Err` is reserved for reply
    /// channel failures.
    pub fn decode(&self, buf: &[u8], ctx: &mut DecodeContext<'_>) -> Result<Vec<Position>> {
        match self {
            Self::Tk103(decoder) => decoder.decode(buf, ctx),
            Self::Meitrack(decoder) => decoder.decode(buf, ctx),
        }
    }
}
