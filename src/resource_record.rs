use std::io::Cursor;
use std::net::Ipv4Addr;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::instrument;

use super::{Name, Networkable};
use crate::record_type::CLASS_IN;
use crate::{DnsError, RecordType};

/// TTL given to answers the server makes up itself.
pub const LOCAL_TTL: u32 = 60;

/// An answer-section record. The rdata is kept opaque, and `rdlength` is
/// always its length.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRecord {
    pub name: Name,
    pub type_: u16,
    pub class: u16,
    pub ttl: u32,
    data: Bytes,
}

impl ResourceRecord {
    pub fn new(
        name: Name,
        type_: u16,
        class: u16,
        ttl: u32,
        data: Bytes,
    ) -> Result<Self, DnsError> {
        if data.len() > u16::MAX as usize {
            return Err(DnsError::RdataTooLong(data.len()));
        }

        Ok(Self {
            name,
            type_,
            class,
            ttl,
            data,
        })
    }

    /// An IN A record.
    pub fn a(name: Name, ttl: u32, addr: Ipv4Addr) -> Self {
        Self {
            name,
            type_: RecordType::A.to_int(),
            class: CLASS_IN,
            ttl,
            data: Bytes::copy_from_slice(&addr.octets()),
        }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn rd_length(&self) -> u16 {
        self.data.len() as u16
    }

    /// The address carried by an IN A record.
    pub fn ipv4(&self) -> Option<Ipv4Addr> {
        if self.type_ != RecordType::A.to_int() {
            return None;
        }

        let octets: [u8; 4] = self.data[..].try_into().ok()?;
        Some(Ipv4Addr::from(octets))
    }

    pub fn encoded_len(&self) -> usize {
        self.name.encoded_len() + 10 + self.data.len()
    }
}

impl Networkable for ResourceRecord {
    #[instrument(level = "trace", skip_all)]
    fn to_bytes(&self) -> Bytes {
        let mut ret = BytesMut::with_capacity(self.encoded_len());
        ret.extend_from_slice(&self.name.to_bytes());
        ret.put_u16(self.type_);
        ret.put_u16(self.class);
        ret.put_u32(self.ttl);
        ret.put_u16(self.rd_length());
        ret.extend_from_slice(&self.data);

        ret.freeze()
    }

    #[instrument(level = "trace", skip_all)]
    fn from_bytes(bytes: &mut Cursor<&[u8]>) -> Result<Self, DnsError> {
        let name = Name::from_bytes(bytes)?;

        if bytes.remaining() < 10 {
            return Err(DnsError::TruncatedInput);
        }

        let type_ = bytes.get_u16();
        let class = bytes.get_u16();
        let ttl = bytes.get_u32();
        let rd_length = bytes.get_u16() as usize;

        if bytes.remaining() < rd_length {
            return Err(DnsError::TruncatedInput);
        }

        let data = read_rdata(type_, bytes, rd_length)?;

        Ok(Self {
            name,
            type_,
            class,
            ttl,
            data,
        })
    }
}

/// Reads `rd_length` bytes of rdata. Names inside NS, CNAME, PTR, MX and SOA
/// rdata are expanded, so the result no longer refers to other parts of the
/// packet it was read from.
fn read_rdata(
    type_: u16,
    bytes: &mut Cursor<&[u8]>,
    rd_length: usize,
) -> Result<Bytes, DnsError> {
    // (fixed bytes before the names, names, fixed bytes after)
    let (leading, names, trailing) = match RecordType::from_int(type_) {
        Some(RecordType::Ns | RecordType::Cname | RecordType::Ptr) => (0, 1, 0),
        Some(RecordType::Mx) => (2, 1, 0),
        Some(RecordType::Soa) => (0, 2, 20),
        _ => return Ok(bytes.copy_to_bytes(rd_length)),
    };

    let end = bytes.position() as usize + rd_length;
    if rd_length < leading {
        return Err(DnsError::MalformedRdata);
    }

    let mut ret = BytesMut::with_capacity(rd_length);
    ret.extend_from_slice(&bytes.copy_to_bytes(leading));
    for _ in 0..names {
        let name = Name::from_bytes(bytes)?;
        if bytes.position() as usize > end {
            return Err(DnsError::MalformedRdata);
        }
        ret.extend_from_slice(&name.to_bytes());
    }

    if end - bytes.position() as usize != trailing {
        return Err(DnsError::MalformedRdata);
    }
    ret.extend_from_slice(&bytes.copy_to_bytes(trailing));

    Ok(ret.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_a_record() {
        let record = ResourceRecord::a(
            Name::new("example.com").unwrap(),
            LOCAL_TTL,
            Ipv4Addr::new(8, 8, 8, 8),
        );

        let bytes = record.to_bytes();
        let mut expected = b"\x07example\x03com\x00".to_vec();
        expected.extend_from_slice(&[0, 1, 0, 1, 0, 0, 0, 60, 0, 4, 8, 8, 8, 8]);
        assert_eq!(&bytes[..], &expected[..]);
        assert_eq!(record.ipv4(), Some(Ipv4Addr::new(8, 8, 8, 8)));
    }

    #[test]
    fn round_trips_opaque_data() {
        let record = ResourceRecord::new(
            Name::new("example.com").unwrap(),
            RecordType::Txt.to_int(),
            CLASS_IN,
            3600,
            Bytes::from_static(b"\x05hello"),
        )
        .unwrap();

        let bytes = record.to_bytes();
        let decoded = ResourceRecord::from_bytes(&mut Cursor::new(&bytes[..])).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(decoded.rd_length(), 6);
        assert_eq!(decoded.ipv4(), None);
    }

    #[test]
    fn decodes_compressed_owner() {
        // question for example.com, then an answer whose owner points at it
        let mut buf = b"\x07example\x03com\x00\x00\x01\x00\x01".to_vec();
        buf.extend_from_slice(&[0xc0, 0x00, 0, 1, 0, 1, 0, 0, 1, 0, 0, 4, 1, 2, 3, 4]);

        let mut cursor = Cursor::new(&buf[..]);
        cursor.set_position(17);
        let record = ResourceRecord::from_bytes(&mut cursor).unwrap();

        assert_eq!(record.name, Name::new("example.com").unwrap());
        assert_eq!(record.ttl, 256);
        assert_eq!(record.ipv4(), Some(Ipv4Addr::new(1, 2, 3, 4)));
        assert_eq!(cursor.position() as usize, buf.len());
    }

    #[test]
    fn expands_names_in_rdata() {
        // question for example.com, then www.example.com CNAME -> mail + pointer
        let mut buf = b"\x07example\x03com\x00\x00\x05\x00\x01".to_vec();
        buf.extend_from_slice(&[0xc0, 0x00, 0, 5, 0, 1, 0, 0, 0, 60, 0, 7]);
        buf.extend_from_slice(b"\x04mail\xc0\x00");

        let mut cursor = Cursor::new(&buf[..]);
        cursor.set_position(17);
        let record = ResourceRecord::from_bytes(&mut cursor).unwrap();

        assert_eq!(cursor.position() as usize, buf.len());
        assert_eq!(&record.data()[..], b"\x04mail\x07example\x03com\x00");
        assert_eq!(record.rd_length(), 18);

        // The expanded record stands on its own
        let alone = ResourceRecord::from_bytes(&mut Cursor::new(&record.to_bytes()[..])).unwrap();
        assert_eq!(alone, record);
    }

    #[test]
    fn expands_mx_and_soa_rdata() {
        let mut buf = b"\x07example\x03com\x00".to_vec();

        // MX 10 mx.example.com
        buf.extend_from_slice(&[0xc0, 0x00, 0, 15, 0, 1, 0, 0, 0, 60, 0, 7, 0, 10]);
        buf.extend_from_slice(b"\x02mx\xc0\x00");
        // SOA ns.example.com hostmaster.example.com, serial..minimum
        buf.extend_from_slice(&[0xc0, 0x00, 0, 6, 0, 1, 0, 0, 0, 60, 0, 38]);
        buf.extend_from_slice(b"\x02ns\xc0\x00\x0ahostmaster\xc0\x00");
        buf.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0, 4, 0, 0, 0, 5]);

        let mut cursor = Cursor::new(&buf[..]);
        cursor.set_position(13);
        let mx = ResourceRecord::from_bytes(&mut cursor).unwrap();
        let soa = ResourceRecord::from_bytes(&mut cursor).unwrap();
        assert_eq!(cursor.position() as usize, buf.len());

        assert_eq!(&mx.data()[..], b"\x00\x0a\x02mx\x07example\x03com\x00");

        let mut expected = b"\x02ns\x07example\x03com\x00".to_vec();
        expected.extend_from_slice(b"\x0ahostmaster\x07example\x03com\x00");
        expected.extend_from_slice(&buf[buf.len() - 20..]);
        assert_eq!(&soa.data()[..], &expected[..]);
    }

    #[test]
    fn rejects_names_overrunning_rdata() {
        // CNAME claiming 2 bytes of rdata around a 5 byte name
        let mut buf = b"\x00".to_vec();
        buf.extend_from_slice(&[0, 5, 0, 1, 0, 0, 0, 60, 0, 2]);
        buf.extend_from_slice(b"\x03com\x00");
        assert!(matches!(
            ResourceRecord::from_bytes(&mut Cursor::new(&buf[..])),
            Err(DnsError::MalformedRdata)
        ));

        // SOA missing its 20 fixed bytes
        let mut buf = b"\x00".to_vec();
        buf.extend_from_slice(&[0, 6, 0, 1, 0, 0, 0, 60, 0, 2, 0, 0]);
        assert!(matches!(
            ResourceRecord::from_bytes(&mut Cursor::new(&buf[..])),
            Err(DnsError::MalformedRdata)
        ));
    }

    #[test]
    fn rejects_short_rdata() {
        let mut buf = b"\x00".to_vec();
        buf.extend_from_slice(&[0, 1, 0, 1, 0, 0, 0, 60, 0, 4, 8, 8]);

        assert!(matches!(
            ResourceRecord::from_bytes(&mut Cursor::new(&buf[..])),
            Err(DnsError::TruncatedInput)
        ));
    }

    #[test]
    fn rejects_oversized_rdata() {
        let data = Bytes::from(vec![0; u16::MAX as usize + 1]);
        assert!(matches!(
            ResourceRecord::new(Name::root(), 16, CLASS_IN, 0, data),
            Err(DnsError::RdataTooLong(_))
        ));
    }
}
