use std::io::Cursor;

use bytes::Bytes;

mod error;
pub use error::DnsError;

pub mod header;
pub use header::{Flags, Header};

mod name;
pub use name::Name;

mod message;
pub use message::{Message, MAX_UDP_LEN, PLACEHOLDER_ADDRESS};

mod question;
pub use question::Question;

mod resource_record;
pub use resource_record::{ResourceRecord, LOCAL_TTL};

pub mod record_type;
pub use record_type::RecordType;

pub mod config;
pub use config::Config;

pub mod forward;
pub use forward::{Forwarder, UdpUpstream, Upstream};

pub mod server;

pub trait Networkable: Sized {
    fn to_bytes(&self) -> Bytes;

    /// Decodes from the cursor position and leaves the cursor just past what
    /// was read. The whole underlying buffer stays reachable for compression
    /// pointers.
    fn from_bytes(bytes: &mut Cursor<&[u8]>) -> Result<Self, DnsError>;
}
