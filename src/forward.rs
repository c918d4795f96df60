//! Forwarding to an upstream resolver.
//!
//! The upstream is asked one question per exchange. A request carrying several
//! questions is split into single-question sub-queries that run concurrently,
//! and their answers are merged back into one response in question order.

use std::io::Cursor;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::join_all;
use tokio::net::UdpSocket;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

use crate::header::{RCODE_NO_ERROR, RCODE_SERVER_FAILURE};
use crate::{
    DnsError, Header, Message, Networkable, Question, RecordType, ResourceRecord, MAX_UDP_LEN,
};

/// One request/reply exchange with an upstream resolver.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Sends an encoded query and returns the raw reply carrying the same
    /// transaction id.
    async fn exchange(&self, query: &[u8]) -> Result<Bytes, DnsError>;
}

/// Plain DNS over UDP, one ephemeral socket per exchange.
#[derive(Debug, Clone)]
pub struct UdpUpstream {
    addr: SocketAddr,
}

impl UdpUpstream {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

#[async_trait]
impl Upstream for UdpUpstream {
    async fn exchange(&self, query: &[u8]) -> Result<Bytes, DnsError> {
        let bind: SocketAddr = if self.addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let sock = UdpSocket::bind(bind)
            .await
            .map_err(DnsError::UpstreamUnreachable)?;
        // Connecting filters out datagrams from anyone but the upstream
        sock.connect(self.addr)
            .await
            .map_err(DnsError::UpstreamUnreachable)?;
        sock.send(query).await.map_err(DnsError::UpstreamUnreachable)?;

        let id = query.get(..2).ok_or(DnsError::TruncatedInput)?;
        let mut buf = [0; MAX_UDP_LEN];

        loop {
            let len = sock
                .recv(&mut buf)
                .await
                .map_err(DnsError::UpstreamUnreachable)?;

            if buf[..len].starts_with(id) {
                trace!(upstream = %self.addr, len, "upstream replied");
                return Ok(Bytes::copy_from_slice(&buf[..len]));
            }

            debug!(upstream = %self.addr, "discarding reply with a foreign id");
        }
    }
}

/// Outcome of one single-question exchange.
#[derive(Debug)]
struct SubAnswer {
    rcode: u8,
    answers: Vec<ResourceRecord>,
}

impl SubAnswer {
    fn failed() -> Self {
        Self {
            rcode: RCODE_SERVER_FAILURE,
            answers: Vec::new(),
        }
    }
}

#[derive(Clone)]
pub struct Forwarder {
    upstream: Arc<dyn Upstream>,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(upstream: Arc<dyn Upstream>, timeout: Duration) -> Self {
        Self { upstream, timeout }
    }

    pub fn udp(addr: SocketAddr, timeout: Duration) -> Self {
        Self::new(Arc::new(UdpUpstream::new(addr)), timeout)
    }

    /// Resolves every question of `request` through the upstream and merges
    /// the replies into one response.
    ///
    /// A failed sub-exchange only costs its own answers and turns the rcode
    /// into a server failure, the other questions are still answered. The
    /// merged rcode is the first non-zero one in question order.
    ///
    /// Returns [`DnsError::Cancelled`] if `cancel` fires first. Outstanding
    /// exchanges are dropped in that case.
    #[instrument(level = "debug", skip_all, fields(id = request.header.id, questions = request.questions.len()))]
    pub async fn forward(
        &self,
        request: &Message,
        cancel: &CancellationToken,
    ) -> Result<Message, DnsError> {
        let mut response = Message::new(Header::response_to(&request.header));
        response.header.flags.set_ra(true);
        response.questions = request.questions.clone();

        if request.questions.is_empty() {
            return Ok(response);
        }

        let exchanges = request
            .questions
            .iter()
            .map(|question| self.exchange_one(request, question));

        let outcomes = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("request abandoned while forwarding");
                return Err(DnsError::Cancelled);
            }
            outcomes = join_all(exchanges) => outcomes,
        };

        for (question, outcome) in request.questions.iter().zip(outcomes) {
            let sub = outcome.unwrap_or_else(|e| {
                warn!(name = %question.name, error = %e, "upstream exchange failed");
                SubAnswer::failed()
            });

            if sub.rcode != RCODE_NO_ERROR && response.rcode() == RCODE_NO_ERROR {
                response.header.flags.set_rcode(sub.rcode);
            }
            response.answers.extend(sub.answers);
        }

        Ok(response)
    }

    async fn exchange_one(
        &self,
        request: &Message,
        question: &Question,
    ) -> Result<SubAnswer, DnsError> {
        let mut query = Message::new(request.header.clone());
        query.add_question(question.clone());

        let raw = time::timeout(self.timeout, self.upstream.exchange(&query.to_bytes()))
            .await
            .map_err(|_| DnsError::UpstreamTimeout)??;

        let reply = Message::from_bytes(&mut Cursor::new(&raw[..]))?;
        if reply.header.id != request.header.id || !reply.header.flags.qr() {
            return Err(DnsError::UpstreamMismatch);
        }
        // Some error replies leave out the question section
        if !reply.questions.is_empty()
            && reply.questions.as_slice() != std::slice::from_ref(question)
        {
            return Err(DnsError::UpstreamMismatch);
        }

        let rcode = reply.rcode();
        let answers = reply
            .answers
            .into_iter()
            .filter(|record| record.type_ != RecordType::Opt.to_int())
            .collect();

        Ok(SubAnswer { rcode, answers })
    }
}
