//! Entry points for running a swarm, either entirely within this process or
//! one node per process over TCP.

use {
    crate::{
        conf::Conf,
        error::*,
        manifest::PeerManifest,
        message::Message,
        peer::{Peer, PeerReport},
        tracker::{Tracker, TrackerState},
        transport::{self, net},
        NodeId, TRACKER_ID,
    },
    futures::future,
    std::net::SocketAddr,
    tokio::{net::TcpListener, task},
};

/// The outcome of a swarm run to completion.
#[derive(Debug)]
pub struct SwarmReport {
    pub tracker: TrackerState,
    /// The peers' reports, ordered by node id.
    pub peers: Vec<PeerReport>,
}

impl SwarmReport {
    pub fn peer(&self, id: NodeId) -> Option<&PeerReport> {
        self.peers.iter().find(|p| p.id == id)
    }
}

/// Runs a tracker and one peer per manifest in this process until the swarm
/// terminates. The peer with the manifest at index `i` is node `i + 1`.
pub async fn run_local_swarm(
    conf: Conf,
    manifests: Vec<PeerManifest>,
) -> Result<SwarmReport> {
    log::info!("Starting local swarm of {} peer(s)", manifests.len());
    let mut endpoints = transport::mesh(manifests.len() + 1).into_iter();
    let tracker_endpoint =
        endpoints.next().ok_or(Error::UnknownNode(TRACKER_ID))?;
    let tracker_router = tracker_endpoint.router.clone();
    let tracker = task::spawn(Tracker::new(tracker_endpoint).run());

    let peers = endpoints
        .zip(manifests)
        .map(|(endpoint, manifest)| {
            Peer::new(endpoint, manifest, conf.peer.clone()).run()
        });
    let peers = match future::try_join_all(peers).await {
        Ok(peers) => peers,
        Err(e) => {
            log::error!("Peer failed, stopping swarm: {}", e);
            tracker.abort();
            // release the uploaders of the peers still running
            for peer in 1..tracker_router.node_count() {
                if let Err(e) = tracker_router.send(peer, Message::Terminate) {
                    log::debug!("Peer {} already gone: {}", peer, e);
                }
            }
            return Err(e);
        }
    };
    let tracker = tracker.await??;

    log::info!("Local swarm done");
    Ok(SwarmReport { tracker, peers })
}

/// Runs the tracker as node 0 of the swarm whose node addresses are `addrs`,
/// accepting connections on `listener`.
pub async fn run_tracker_node(
    listener: TcpListener,
    addrs: &[SocketAddr],
    conf: &Conf,
) -> Result<TrackerState> {
    let (endpoint, net) =
        net::connect(listener, TRACKER_ID, addrs, &conf.net).await?;
    let state = Tracker::new(endpoint).run().await?;
    // the termination signals may still be queued
    net.shutdown().await?;
    Ok(state)
}

/// Runs the peer with the given id of the swarm whose node addresses are
/// `addrs`, accepting connections on `listener`.
pub async fn run_peer_node(
    listener: TcpListener,
    id: NodeId,
    addrs: &[SocketAddr],
    manifest: PeerManifest,
    conf: &Conf,
) -> Result<PeerReport> {
    if id == TRACKER_ID {
        return Err(Error::UnknownNode(id));
    }
    let (endpoint, net) = net::connect(listener, id, addrs, &conf.net).await?;
    let report = Peer::new(endpoint, manifest, conf.peer.clone()).run().await?;
    net.shutdown().await?;
    Ok(report)
}
