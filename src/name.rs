use std::fmt::Display;
use std::hash::{Hash, Hasher};
use std::io::Cursor;
use std::str::FromStr;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{instrument, trace};

use super::Networkable;
use crate::DnsError;

pub const MAX_LABEL_LEN: usize = 63;

/// Length octets, label bytes and the terminating zero octet together.
pub const MAX_NAME_LEN: usize = 255;

/// Upper bound on compression pointers followed while decoding one name.
pub const MAX_POINTER_HOPS: usize = 128;

const POINTER_MASK: u8 = 0b1100_0000;

#[derive(Debug, Clone, Default)]
pub struct Name {
    /// Labels in wire order, case preserved.
    /// E.g. www.google.com is ["www", "google", "com"], the root is []
    labels: Vec<String>,
}

impl Name {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses a dotted name, with or without the trailing root dot.
    pub fn new(name: &str) -> Result<Self, DnsError> {
        let trimmed = name.strip_suffix('.').unwrap_or(name);
        if trimmed.is_empty() {
            return Ok(Self::root());
        }

        let labels = trimmed
            .split('.')
            .map(|label| {
                if label.is_empty() || label.len() > MAX_LABEL_LEN {
                    Err(DnsError::InvalidName(format!(
                        "label of {} bytes in {name:?}",
                        label.len()
                    )))
                } else if !label.is_ascii() {
                    Err(DnsError::InvalidName(format!("non-ascii label in {name:?}")))
                } else {
                    Ok(label.to_owned())
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let name = Self { labels };
        if name.encoded_len() > MAX_NAME_LEN {
            return Err(DnsError::InvalidName(format!(
                "{} bytes encoded, limit is {MAX_NAME_LEN}",
                name.encoded_len()
            )));
        }

        Ok(name)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    /// Size of the uncompressed wire form.
    pub fn encoded_len(&self) -> usize {
        self.labels.iter().map(|l| l.len() + 1).sum::<usize>() + 1
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.labels.len() == other.labels.len()
            && self
                .labels
                .iter()
                .zip(other.labels.iter())
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for label in self.labels.iter() {
            state.write_usize(label.len());
            for byte in label.bytes() {
                state.write_u8(byte.to_ascii_lowercase());
            }
        }
        state.write_usize(self.labels.len());
    }
}

impl FromStr for Name {
    type Err = DnsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_root() {
            return f.write_str(".");
        }

        f.write_str(&self.labels.join("."))
    }
}

impl Networkable for Name {
    fn to_bytes(&self) -> Bytes {
        let mut ret = BytesMut::with_capacity(self.encoded_len());

        for label in self.labels.iter() {
            ret.put_u8(label.len() as u8);
            ret.extend_from_slice(label.as_bytes());
        }

        ret.put_u8(0);

        ret.freeze()
    }

    /// Reads a name starting at the cursor position, following compression
    /// pointers into the rest of the buffer. The cursor ends up just past the
    /// name as it appears at the starting position (i.e. after the first
    /// pointer, if any).
    #[instrument(level = "trace", skip_all)]
    fn from_bytes(bytes: &mut Cursor<&[u8]>) -> Result<Self, DnsError> {
        let buf: &[u8] = *bytes.get_ref();
        let mut offset = bytes.position() as usize;

        let mut labels = Vec::new();
        let mut encoded_len = 1;
        let mut hops = 0;
        let mut resume_at = None;

        loop {
            let len = *buf.get(offset).ok_or(DnsError::TruncatedInput)?;

            if len == 0 {
                offset += 1;
                break;
            }

            match len & POINTER_MASK {
                POINTER_MASK => {
                    let low = *buf.get(offset + 1).ok_or(DnsError::TruncatedInput)?;
                    let target = (((len & !POINTER_MASK) as usize) << 8) | low as usize;

                    // Only strictly backwards pointers, a bounded number of times
                    if target >= offset {
                        trace!(offset, target, "non-backward compression pointer");
                        return Err(DnsError::MalformedName);
                    }
                    hops += 1;
                    if hops > MAX_POINTER_HOPS {
                        return Err(DnsError::MalformedName);
                    }

                    resume_at.get_or_insert(offset + 2);
                    offset = target;
                }
                0 => {
                    let len = len as usize;
                    let start = offset + 1;
                    let label = buf
                        .get(start..start + len)
                        .ok_or(DnsError::TruncatedInput)?;
                    if !label.is_ascii() {
                        return Err(DnsError::MalformedName);
                    }

                    encoded_len += len + 1;
                    if encoded_len > MAX_NAME_LEN {
                        return Err(DnsError::MalformedName);
                    }

                    let label = std::str::from_utf8(label).or(Err(DnsError::MalformedName))?;
                    labels.push(label.to_owned());
                    offset = start + len;
                }
                // 0b01 and 0b10 prefixes are reserved
                _ => return Err(DnsError::MalformedName),
            }
        }

        bytes.set_position(resume_at.unwrap_or(offset) as u64);

        Ok(Self { labels })
    }
}
