use thiserror::Error;

#[derive(Error, Debug)]
pub enum DnsError {
    #[error("input truncated")]
    TruncatedInput,

    #[error("malformed domain name")]
    MalformedName,

    #[error("invalid domain name: {0}")]
    InvalidName(String),

    #[error("record data does not fit its type")]
    MalformedRdata,

    #[error("record data too long: {0} bytes")]
    RdataTooLong(usize),

    #[error("upstream resolver timed out")]
    UpstreamTimeout,

    #[error("upstream resolver unreachable: {0}")]
    UpstreamUnreachable(std::io::Error),

    #[error("upstream reply does not match the query")]
    UpstreamMismatch,

    #[error("request cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
