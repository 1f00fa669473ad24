//! DNS front end.
//!
//! A thin adapter over the manager's query API: `A` maps to v4, `AAAA` to
//! v6, and a leading `n<40 hex>` label narrows the answer to one
//! subnetwork. The seeder is authoritative for exactly one zone; everything
//! else is refused.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use tokio::net::{TcpListener, UdpSocket};
use trust_dns_server::authority::MessageResponseBuilder;
use trust_dns_server::proto::op::{Header, MessageType, OpCode, ResponseCode};
use trust_dns_server::proto::rr::{rdata, LowerName, Name, RData, Record, RecordType};
use trust_dns_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};
use trust_dns_server::ServerFuture;

use tunnels_wire::{NetAddress, SubnetworkId};

use crate::error::{SeederError, SeederResult};
use crate::manager::{AddressFamily, Manager};
use crate::shutdown::ShutdownToken;

/// TTL served on answer records.
const RECORD_TTL: u32 = 30;

/// Timeout for TCP DNS connections.
const TCP_TIMEOUT: Duration = Duration::from_secs(5);

/// Subnetwork selection derived from the query name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SubnetworkSelector {
    include_all: bool,
    subnetwork_id: Option<SubnetworkId>,
}

/// Request handler answering seed queries from the node table.
pub struct SeedHandler {
    manager: Arc<Manager>,
    zone: LowerName,
    zone_name: Name,
    nameserver: Name,
}

impl SeedHandler {
    /// Create a handler authoritative for `host`.
    pub fn new(manager: Arc<Manager>, host: &str, nameserver: &str) -> SeederResult<Self> {
        let zone_name = parse_fqdn(host)?;
        let nameserver = parse_fqdn(nameserver)?;
        Ok(Self {
            zone: LowerName::from(zone_name.clone()),
            zone_name,
            nameserver,
            manager,
        })
    }

    /// Derive the subnetwork filter from the query name.
    ///
    /// The apex serves every subnetwork; one extra label of the form
    /// `n<40 hex>` selects a single subnetwork; any other shape is unknown.
    fn parse_selector(&self, name: &LowerName) -> Option<SubnetworkSelector> {
        let name = Name::from(name.clone());
        let zone_labels = self.zone_name.num_labels();

        if name.num_labels() == zone_labels {
            return Some(SubnetworkSelector {
                include_all: true,
                subnetwork_id: None,
            });
        }
        if name.num_labels() != zone_labels + 1 {
            return None;
        }

        let label = name.iter().next()?;
        let label = std::str::from_utf8(label).ok()?;
        let hex = label.strip_prefix('n')?;
        let subnetwork_id = SubnetworkId::from_hex(hex)?;

        Some(SubnetworkSelector {
            include_all: false,
            subnetwork_id: Some(subnetwork_id),
        })
    }

    /// Addresses to serve for a query, shuffled so repeated queries rotate
    /// through the good set.
    fn answers(&self, qtype: RecordType, selector: SubnetworkSelector) -> Vec<NetAddress> {
        let family = match qtype {
            RecordType::A => Some(AddressFamily::V4),
            RecordType::AAAA => Some(AddressFamily::V6),
            _ => None,
        };
        let mut addrs =
            self.manager
                .good_addresses(family, selector.include_all, selector.subnetwork_id);
        addrs.shuffle(&mut rand::thread_rng());
        addrs
    }

    async fn respond<R: ResponseHandler>(
        &self,
        request: &Request,
        response_handle: &mut R,
    ) -> io::Result<ResponseInfo> {
        if request.op_code() != OpCode::Query || request.message_type() != MessageType::Query {
            return self
                .send_code(request, response_handle, ResponseCode::Refused)
                .await;
        }

        let query = request.query();
        let name = query.name();

        if !self.zone.zone_of(name) {
            return self
                .send_code(request, response_handle, ResponseCode::Refused)
                .await;
        }

        let selector = match self.parse_selector(name) {
            Some(selector) => selector,
            None => {
                return self
                    .send_code(request, response_handle, ResponseCode::NXDomain)
                    .await;
            }
        };

        let query_name = Name::from(name.clone());
        let records: Vec<Record> = if query.query_type() == RecordType::NS {
            if name == &self.zone {
                vec![Record::from_rdata(
                    self.zone_name.clone(),
                    RECORD_TTL,
                    RData::NS(rdata::NS(self.nameserver.clone())),
                )]
            } else {
                Vec::new()
            }
        } else {
            self.answers(query.query_type(), selector)
                .into_iter()
                .map(|addr| match addr.ip {
                    IpAddr::V4(ip) => {
                        Record::from_rdata(query_name.clone(), RECORD_TTL, RData::A(ip.into()))
                    }
                    IpAddr::V6(ip) => {
                        Record::from_rdata(query_name.clone(), RECORD_TTL, RData::AAAA(ip.into()))
                    }
                })
                .collect()
        };

        tracing::debug!(
            query = %query_name,
            qtype = ?query.query_type(),
            answers = records.len(),
            "Answering seed query"
        );

        let builder = MessageResponseBuilder::from_message_request(request);
        let mut header = Header::response_from_request(request.header());
        header.set_authoritative(true);
        let response = builder.build(header, records.iter(), &[], &[], &[]);
        response_handle.send_response(response).await
    }

    async fn send_code<R: ResponseHandler>(
        &self,
        request: &Request,
        response_handle: &mut R,
        code: ResponseCode,
    ) -> io::Result<ResponseInfo> {
        let builder = MessageResponseBuilder::from_message_request(request);
        let response = builder.error_msg(request.header(), code);
        response_handle.send_response(response).await
    }
}

#[async_trait::async_trait]
impl RequestHandler for SeedHandler {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
    ) -> ResponseInfo {
        match self.respond(request, &mut response_handle).await {
            Ok(info) => info,
            Err(e) => {
                tracing::error!(error = %e, "Failed to send DNS response");
                serve_failed()
            }
        }
    }
}

fn serve_failed() -> ResponseInfo {
    let mut header = Header::new();
    header.set_response_code(ResponseCode::ServFail);
    header.into()
}

fn parse_fqdn(host: &str) -> SeederResult<Name> {
    let mut name = Name::from_utf8(host)
        .map_err(|e| SeederError::Dns(format!("invalid hostname {host:?}: {e}")))?;
    name.set_fqdn(true);
    Ok(name)
}

/// The DNS server, bound and ready to run.
pub struct DnsServer {
    server: ServerFuture<SeedHandler>,
    listen: SocketAddr,
}

impl DnsServer {
    /// Bind UDP and TCP sockets and register the seed handler.
    ///
    /// Bind failures are returned so startup can treat them as fatal.
    pub async fn bind(
        manager: Arc<Manager>,
        listen: SocketAddr,
        host: &str,
        nameserver: &str,
    ) -> SeederResult<Self> {
        let handler = SeedHandler::new(manager, host, nameserver)?;
        let mut server = ServerFuture::new(handler);

        let udp = UdpSocket::bind(listen).await?;
        // With port 0 the OS picks; reuse the resolved port for TCP.
        let listen = udp.local_addr()?;
        server.register_socket(udp);

        let tcp = TcpListener::bind(listen).await?;
        server.register_listener(tcp, TCP_TIMEOUT);

        tracing::info!(%listen, "DNS server listening");
        Ok(Self { server, listen })
    }

    /// The address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.listen
    }

    /// Serve queries until shutdown.
    pub async fn run(mut self, shutdown: ShutdownToken) {
        tokio::select! {
            result = self.server.block_until_done() => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "DNS server failed");
                }
            }
            _ = shutdown.wait() => {
                tracing::info!("DNS server shutdown");
            }
        }
    }
}
