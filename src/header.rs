use std::io::Cursor;

use bitfield::bitfield;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::{instrument, warn};

use super::Networkable;
use crate::DnsError;

pub const HEADER_LEN: usize = 12;

pub const OPCODE_QUERY: u8 = 0;

pub const RCODE_NO_ERROR: u8 = 0;
pub const RCODE_SERVER_FAILURE: u8 = 2;
pub const RCODE_NOT_IMPLEMENTED: u8 = 4;

bitfield! {
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    pub struct Flags(u16);
    impl Debug;
    u8;
    // query or response
    pub qr, set_qr: 15;
    // query type
    pub opcode, set_opcode: 14, 11;
    // authoritative answerer
    pub aa, set_aa: 10;
    // truncation
    pub tc, set_tc: 9;
    // recursion desired
    pub rd, set_rd: 8;
    // recursion available
    pub ra, set_ra: 7;
    // reserved
    pub z, set_z: 6, 4;
    // response code
    pub rcode, set_rcode: 3, 0;
}

impl Flags {
    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn from_bits(bits: u16) -> Self {
        Self(bits)
    }
}

/// The fixed 12 byte message header.
///
/// The section counts mirror what was read off the wire. They are never set
/// by hand: [`crate::Message`] stamps them from its own sections whenever it
/// serializes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Header {
    pub id: u16,
    pub flags: Flags,
    pub(crate) num_questions: u16,
    pub(crate) num_answers: u16,
    pub(crate) num_authorities: u16,
    pub(crate) num_additionals: u16,
}

impl Header {
    pub fn new(id: u16, flags: Flags) -> Self {
        Self {
            id,
            flags,
            ..Default::default()
        }
    }

    /// Header for a reply to `request`: id, opcode and rd are mirrored, qr is
    /// set and everything else starts cleared.
    pub fn response_to(request: &Header) -> Self {
        let mut flags = Flags::default();
        flags.set_qr(true);
        flags.set_opcode(request.flags.opcode());
        flags.set_rd(request.flags.rd());

        Self::new(request.id, flags)
    }

    pub fn num_questions(&self) -> u16 {
        self.num_questions
    }

    pub fn num_answers(&self) -> u16 {
        self.num_answers
    }

    pub fn num_authorities(&self) -> u16 {
        self.num_authorities
    }

    pub fn num_additionals(&self) -> u16 {
        self.num_additionals
    }
}

impl Networkable for Header {
    #[instrument(level = "trace", skip_all)]
    fn to_bytes(&self) -> Bytes {
        let mut ret = BytesMut::with_capacity(HEADER_LEN);
        ret.put_u16(self.id);
        ret.put_u16(self.flags.bits());
        ret.put_u16(self.num_questions);
        ret.put_u16(self.num_answers);
        ret.put_u16(self.num_authorities);
        ret.put_u16(self.num_additionals);

        ret.freeze()
    }

    #[instrument(level = "trace", skip_all)]
    fn from_bytes(bytes: &mut Cursor<&[u8]>) -> Result<Self, DnsError> {
        if bytes.remaining() < HEADER_LEN {
            warn!(remaining = bytes.remaining(), "insufficient bytes for header");
            return Err(DnsError::TruncatedInput);
        }

        let id = bytes.get_u16();
        let flags = Flags::from_bits(bytes.get_u16());
        let num_questions = bytes.get_u16();
        let num_answers = bytes.get_u16();
        let num_authorities = bytes.get_u16();
        let num_additionals = bytes.get_u16();

        Ok(Self {
            id,
            flags,
            num_questions,
            num_answers,
            num_authorities,
            num_additionals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> Result<Header, DnsError> {
        Header::from_bytes(&mut Cursor::new(bytes))
    }

    #[test]
    fn decodes_query_header() {
        let header = decode(&[0x12, 0x34, 0x01, 0x00, 0, 1, 0, 0, 0, 0, 0, 0]).unwrap();

        assert_eq!(header.id, 0x1234);
        assert!(!header.flags.qr());
        assert_eq!(header.flags.opcode(), 0);
        assert!(header.flags.rd());
        assert!(!header.flags.ra());
        assert_eq!(header.flags.rcode(), 0);
        assert_eq!(header.num_questions(), 1);
        assert_eq!(header.num_answers(), 0);
    }

    #[test]
    fn places_every_flag_bit() {
        let mut flags = Flags::default();
        flags.set_qr(true);
        flags.set_opcode(0b1010);
        flags.set_aa(true);
        flags.set_tc(false);
        flags.set_rd(true);
        flags.set_ra(true);
        flags.set_rcode(4);

        let bytes = Header::new(0xbeef, flags).to_bytes();
        // QR | OPCODE=1010 | AA=1 | TC=0 | RD=1
        assert_eq!(bytes[2], 0b1101_0101);
        // RA=1 | Z=000 | RCODE=0100
        assert_eq!(bytes[3], 0b1000_0100);
    }

    #[test]
    fn round_trips() {
        let mut flags = Flags::default();
        flags.set_qr(true);
        flags.set_opcode(2);
        flags.set_tc(true);
        flags.set_z(5);
        flags.set_rcode(3);

        let header = Header {
            id: 7,
            flags,
            num_questions: 3,
            num_answers: 2,
            num_authorities: 1,
            num_additionals: 9,
        };

        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(decode(&bytes).unwrap(), header);
    }

    #[test]
    fn rejects_short_input() {
        assert!(matches!(
            decode(&[0x12, 0x34, 0x01]),
            Err(DnsError::TruncatedInput)
        ));
    }

    #[test]
    fn response_mirrors_request() {
        let mut flags = Flags::default();
        flags.set_opcode(5);
        flags.set_rd(true);
        flags.set_aa(true);
        let request = Header::new(99, flags);

        let response = Header::response_to(&request);
        assert_eq!(response.id, 99);
        assert!(response.flags.qr());
        assert!(response.flags.rd());
        assert!(!response.flags.aa());
        assert_eq!(response.flags.opcode(), 5);
        assert_eq!(response.flags.rcode(), 0);
    }
}
