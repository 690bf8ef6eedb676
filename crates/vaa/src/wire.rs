//! The signed VAA wire format.
//!
//! ```text
//! version u8 | guardian_set_index u32 | sig_count u8 | sig_count * (guardian_index u8 | sig [65])
//! body: timestamp u32 | nonce u32 | emitter_chain u16 | emitter [32] | sequence u64
//!       | consistency_level u8 | payload ..
//! ```
//!
//! All integers are big-endian.

use alloy_primitives::{keccak256, Bytes, FixedBytes, B256};
use tbtc_relayer_primitives::chain::WormholeChainId;

use crate::{errors::WireError, message::MessageId};

/// The only VAA version in use.
pub const VAA_VERSION: u8 = 1;

/// A guardian's signature over the body digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardianSignature {
    /// Index of the guardian in the guardian set.
    pub index: u8,
    /// `r ‖ s ‖ v`.
    pub signature: FixedBytes<65>,
}

/// A decoded VAA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vaa {
    /// Envelope version, always 1.
    pub version: u8,
    /// The guardian set that signed the body.
    pub guardian_set_index: u32,
    /// Guardian signatures over the body digest.
    pub signatures: Vec<GuardianSignature>,
    /// Unix time, in seconds, of the block that published the message.
    pub timestamp: u32,
    /// Emitter-chosen nonce.
    pub nonce: u32,
    /// Chain the message was published on.
    pub emitter_chain: WormholeChainId,
    /// Emitting contract, left-padded to 32 bytes.
    pub emitter_address: B256,
    /// Per-emitter message sequence.
    pub sequence: u64,
    /// Finality the guardians waited for before signing.
    pub consistency_level: u8,
    /// The application payload.
    pub payload: Bytes,
}

/// Big-endian cursor over a byte slice.
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    pub(crate) const fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub(crate) fn take(&mut self, field: &'static str, n: usize) -> Result<&'a [u8], WireError> {
        if self.buf.len() < n {
            return Err(WireError::UnexpectedEnd {
                field,
                needed: n,
                remaining: self.buf.len(),
            });
        }

        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    pub(crate) fn array<const N: usize>(
        &mut self,
        field: &'static str,
    ) -> Result<[u8; N], WireError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(field, N)?);
        Ok(out)
    }

    pub(crate) fn u8(&mut self, field: &'static str) -> Result<u8, WireError> {
        Ok(self.array::<1>(field)?[0])
    }

    pub(crate) fn u16(&mut self, field: &'static str) -> Result<u16, WireError> {
        Ok(u16::from_be_bytes(self.array(field)?))
    }

    pub(crate) fn u32(&mut self, field: &'static str) -> Result<u32, WireError> {
        Ok(u32::from_be_bytes(self.array(field)?))
    }

    pub(crate) fn u64(&mut self, field: &'static str) -> Result<u64, WireError> {
        Ok(u64::from_be_bytes(self.array(field)?))
    }

    pub(crate) fn rest(&mut self) -> &'a [u8] {
        std::mem::take(&mut self.buf)
    }

    pub(crate) const fn remaining(&self) -> usize {
        self.buf.len()
    }
}

impl Vaa {
    /// Decodes a signed VAA.
    pub fn parse(bytes: &[u8]) -> Result<Self, WireError> {
        let mut r = Reader::new(bytes);

        let version = r.u8("version")?;
        if version != VAA_VERSION {
            return Err(WireError::UnsupportedVersion(version));
        }

        let guardian_set_index = r.u32("guardian_set_index")?;
        let sig_count = r.u8("signature count")?;
        let signatures = (0..sig_count)
            .map(|_| {
                Ok(GuardianSignature {
                    index: r.u8("guardian index")?,
                    signature: FixedBytes::from(r.array::<65>("signature")?),
                })
            })
            .collect::<Result<Vec<_>, WireError>>()?;

        Ok(Self {
            version,
            guardian_set_index,
            signatures,
            timestamp: r.u32("timestamp")?,
            nonce: r.u32("nonce")?,
            emitter_chain: WormholeChainId(r.u16("emitter_chain")?),
            emitter_address: B256::from(r.array::<32>("emitter_address")?),
            sequence: r.u64("sequence")?,
            consistency_level: r.u8("consistency_level")?,
            payload: Bytes::copy_from_slice(r.rest()),
        })
    }

    /// The signed body.
    pub fn body(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(51 + self.payload.len());
        body.extend_from_slice(&self.timestamp.to_be_bytes());
        body.extend_from_slice(&self.nonce.to_be_bytes());
        body.extend_from_slice(&self.emitter_chain.get().to_be_bytes());
        body.extend_from_slice(self.emitter_address.as_slice());
        body.extend_from_slice(&self.sequence.to_be_bytes());
        body.push(self.consistency_level);
        body.extend_from_slice(&self.payload);
        body
    }

    /// Re-encodes the VAA.
    pub fn serialize(&self) -> Bytes {
        let mut out = Vec::with_capacity(6 + 66 * self.signatures.len());
        out.push(self.version);
        out.extend_from_slice(&self.guardian_set_index.to_be_bytes());
        out.push(self.signatures.len() as u8);
        for sig in &self.signatures {
            out.push(sig.index);
            out.extend_from_slice(sig.signature.as_slice());
        }
        out.extend_from_slice(&self.body());
        out.into()
    }

    /// `keccak256(keccak256(body))`, the value guardians sign and token bridges key
    /// completed transfers by.
    pub fn digest(&self) -> B256 {
        keccak256(keccak256(self.body()))
    }

    /// The message this VAA attests.
    pub const fn message_id(&self) -> MessageId {
        MessageId {
            chain: self.emitter_chain,
            emitter: self.emitter_address,
            sequence: self.sequence,
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::hex;

    use super::*;
    use crate::testing::VaaBuilder;

    #[test]
    fn parses_hand_encoded_vaa() {
        let mut raw = vec![1u8];
        raw.extend_from_slice(&4u32.to_be_bytes());
        raw.push(1);
        raw.push(3);
        raw.extend_from_slice(&[0x11; 65]);
        raw.extend_from_slice(&0x6500_0000u32.to_be_bytes());
        raw.extend_from_slice(&7u32.to_be_bytes());
        raw.extend_from_slice(&2u16.to_be_bytes());
        raw.extend_from_slice(&[0xaa; 32]);
        raw.extend_from_slice(&42u64.to_be_bytes());
        raw.push(15);
        raw.extend_from_slice(&hex!("deadbeef"));

        let vaa = Vaa::parse(&raw).unwrap();

        assert_eq!(vaa.guardian_set_index, 4);
        assert_eq!(vaa.signatures.len(), 1);
        assert_eq!(vaa.signatures[0].index, 3);
        assert_eq!(vaa.emitter_chain, WormholeChainId::ETHEREUM);
        assert_eq!(vaa.emitter_address, B256::repeat_byte(0xaa));
        assert_eq!(vaa.sequence, 42);
        assert_eq!(vaa.consistency_level, 15);
        assert_eq!(vaa.payload.as_ref(), hex!("deadbeef"));
        assert_eq!(vaa.serialize().as_ref(), raw.as_slice());
    }

    #[test]
    fn digest_covers_body_only() {
        let vaa = VaaBuilder::transfer_with_payload().build();
        let mut resigned = vaa.clone();
        resigned.guardian_set_index += 1;
        resigned.signatures.clear();

        assert_eq!(vaa.digest(), resigned.digest());
        assert_eq!(vaa.digest(), keccak256(keccak256(vaa.body())));

        let mut other_sequence = vaa.clone();
        other_sequence.sequence += 1;
        assert_ne!(vaa.digest(), other_sequence.digest());
    }

    #[test]
    fn rejects_truncated_and_unknown_versions() {
        let bytes = VaaBuilder::transfer_with_payload().build().serialize();

        let truncated = Vaa::parse(&bytes[..20]).unwrap_err();
        assert!(matches!(truncated, WireError::UnexpectedEnd { .. }));

        let mut v2 = bytes.to_vec();
        v2[0] = 2;
        assert_eq!(Vaa::parse(&v2), Err(WireError::UnsupportedVersion(2)));
    }
}
