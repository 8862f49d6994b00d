// src/protocol/identity_codec.rs

use crate::identity::ActorIdentity;
use crate::utils::binary_stream::BinaryStream;
use crate::utils::error::Result;

/// Serializes [`ActorIdentity`] into the payload of Hello/Welcome frames:
/// type string, name string, then a `u16` count of metadata pairs.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCodec;

impl IdentityCodec {
    pub fn new() -> Self {
        Self
    }

    pub fn encode(&self, identity: &ActorIdentity) -> Result<Vec<u8>> {
        let mut stream = BinaryStream::new();
        stream.put_string(identity.actor_type())?;
        stream.put_string(identity.name())?;
        stream.put_u16_be(identity.metadata().len() as u16);
        for (key, value) in identity.metadata() {
            stream.put_string(key)?;
            stream.put_string(value)?;
        }
        Ok(stream.into_inner())
    }

    pub fn decode(&self, payload: &[u8]) -> Result<ActorIdentity> {
        let mut stream = BinaryStream::from_slice(payload);
        let actor_type = stream.get_string()?;
        let name = stream.get_string()?;
        let pair_count = stream.get_u16_be()? as usize;
        let mut metadata = Vec::with_capacity(pair_count);
        for _ in 0..pair_count {
            let key = stream.get_string()?;
            let value = stream.get_string()?;
            metadata.push((key, value));
        }
        let mut identity = ActorIdentity::new(actor_type, name);
        identity.set_metadata(metadata);
        Ok(identity)
    }
}
