use std::net::Ipv4Addr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::header::OPCODE_QUERY;
use crate::{Config, DnsError, Forwarder, Message, MAX_UDP_LEN};

/// Turns one inbound datagram into the message to send back, if any.
#[derive(Clone)]
pub struct Handler {
    forwarder: Option<Forwarder>,
    placeholder: Ipv4Addr,
}

impl Handler {
    pub fn new(config: &Config) -> Self {
        let forwarder = config
            .upstream
            .map(|addr| Forwarder::udp(addr, config.upstream_timeout));

        Self::with_forwarder(forwarder, config.placeholder)
    }

    pub fn with_forwarder(forwarder: Option<Forwarder>, placeholder: Ipv4Addr) -> Self {
        Self {
            forwarder,
            placeholder,
        }
    }

    /// `None` means the datagram gets no reply: it did not parse, it was a
    /// response rather than a query, or the request was cancelled.
    #[instrument(level = "debug", skip_all)]
    pub async fn handle(&self, data: &[u8], cancel: &CancellationToken) -> Option<Message> {
        let request = match Message::parse_query(data) {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, len = data.len(), "dropping undecodable request");
                return None;
            }
        };

        if request.header.flags.qr() {
            debug!(id = request.header.id, "discarding response sent as a request");
            return None;
        }

        match &self.forwarder {
            Some(forwarder) if request.header.flags.opcode() == OPCODE_QUERY => {
                match forwarder.forward(&request, cancel).await {
                    Ok(response) => Some(response),
                    Err(e) => {
                        debug!(id = request.header.id, error = %e, "forward abandoned");
                        None
                    }
                }
            }
            _ => Some(Message::local_response(&request, self.placeholder)),
        }
    }
}

/// Binds the configured address and serves until `shutdown` fires.
pub async fn run(config: Config, shutdown: CancellationToken) -> Result<(), DnsError> {
    let sock = UdpSocket::bind(config.bind).await?;

    info!(
        addr = %sock.local_addr()?,
        upstream = ?config.upstream,
        "listening"
    );

    let handler = Handler::new(&config);
    serve(Arc::new(sock), handler, config.max_in_flight, shutdown).await
}

/// Receive loop on an already bound socket. Each datagram is handled on its
/// own task, with at most `max_in_flight` of them running at once.
pub async fn serve(
    sock: Arc<UdpSocket>,
    handler: Handler,
    max_in_flight: usize,
    shutdown: CancellationToken,
) -> Result<(), DnsError> {
    let handler = Arc::new(handler);
    let permits = Arc::new(Semaphore::new(max_in_flight.max(1)));

    loop {
        let permit = tokio::select! {
            permit = Arc::clone(&permits).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
            _ = shutdown.cancelled() => break,
        };

        let mut buf = [0; MAX_UDP_LEN];
        let (len, peer) = tokio::select! {
            received = sock.recv_from(&mut buf) => match received {
                Ok(received) => received,
                Err(e) => {
                    warn!(error = %e, "failed to receive datagram");
                    continue;
                }
            },
            _ = shutdown.cancelled() => break,
        };

        let sock = Arc::clone(&sock);
        let handler = Arc::clone(&handler);
        let cancel = shutdown.child_token();

        tokio::spawn(async move {
            let _permit = permit;

            let Some(response) = handler.handle(&buf[..len], &cancel).await else {
                return;
            };

            debug!(
                %peer,
                id = response.header.id,
                rcode = response.rcode(),
                answers = response.answers.len(),
                "replying"
            );

            if let Err(e) = sock.send_to(&response.to_udp_bytes(MAX_UDP_LEN), peer).await {
                warn!(%peer, error = %e, "failed to send response");
            }
        });
    }

    info!("shutting down");
    Ok(())
}
