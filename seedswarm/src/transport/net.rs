//! The TCP transport.
//!
//! Every node listens on its own address and opens one outbound connection to
//! each remote node. Outbound connections are only ever written to and
//! inbound connections are only ever read from, so each direction of a node
//! pair is a single ordered byte stream.

use {
    super::{mailbox, Endpoint, FrameCodec, FrameReceiver, Link, Mailbox, Router},
    crate::{conf::NetConf, error::*, NodeId},
    futures::{SinkExt, StreamExt},
    std::net::SocketAddr,
    tokio::{
        net::{TcpListener, TcpStream},
        sync::mpsc,
        task, time,
    },
    tokio_util::codec::{FramedRead, FramedWrite},
};

/// Owns the background tasks of a node's TCP transport.
pub struct NetHandle {
    /// One writer per outbound link.
    writers: Vec<task::JoinHandle<()>>,
    /// The task accepting inbound connections.
    acceptor: task::JoinHandle<()>,
}

impl NetHandle {
    /// Waits until every frame sent through the node's router has been
    /// written out, then stops accepting connections.
    ///
    /// # Important
    ///
    /// The writers only finish once every clone of the node's router has been
    /// dropped, so this must be called after the node's tasks returned.
    pub async fn shutdown(self) -> Result<()> {
        log::info!("Flushing outbound links");
        for writer in self.writers {
            writer.await?;
        }
        self.acceptor.abort();
        Ok(())
    }
}

/// Joins the swarm whose node addresses are `addrs` as node `id`, accepting
/// inbound connections on `listener`.
///
/// Connecting to nodes that are not up yet is retried as configured in
/// `conf`.
pub async fn connect(
    listener: TcpListener,
    id: NodeId,
    addrs: &[SocketAddr],
    conf: &NetConf,
) -> Result<(Endpoint, NetHandle)> {
    if id >= addrs.len() {
        return Err(Error::UnknownNode(id));
    }

    let (mailbox, inbox) = mailbox();
    let acceptor = task::spawn(accept_loop(listener, id, mailbox.clone()));

    let mut links = Vec::with_capacity(addrs.len());
    let mut writers = Vec::with_capacity(addrs.len());
    for (remote, addr) in addrs.iter().enumerate() {
        if remote == id {
            links.push(Link::Local(mailbox.clone()));
            continue;
        }

        let socket = match connect_with_retry(*addr, conf).await {
            Ok(socket) => socket,
            Err(e) => {
                acceptor.abort();
                return Err(e);
            }
        };
        log::info!("Node {} connected to node {} at {}", id, remote, addr);

        let (chan, port) = mpsc::unbounded_channel();
        writers.push(task::spawn(write_loop(socket, id, remote, port)));
        links.push(Link::Remote(chan));
    }

    Ok((
        Endpoint {
            id,
            router: Router::new(id, links),
            inbox,
        },
        NetHandle { writers, acceptor },
    ))
}

async fn connect_with_retry(
    addr: SocketAddr,
    conf: &NetConf,
) -> Result<TcpStream> {
    let mut attempt = 1;
    loop {
        match TcpStream::connect(addr).await {
            Ok(socket) => {
                socket.set_nodelay(true)?;
                return Ok(socket);
            }
            Err(e) if attempt < conf.connect_attempts => {
                log::debug!(
                    "Connecting to {} failed (attempt {}): {}",
                    addr,
                    attempt,
                    e
                );
                attempt += 1;
                time::sleep(conf.connect_retry_interval).await;
            }
            Err(e) => {
                log::warn!("Giving up connecting to {}: {}", addr, e);
                return Err(e.into());
            }
        }
    }
}

async fn accept_loop(listener: TcpListener, id: NodeId, mailbox: Mailbox) {
    loop {
        match listener.accept().await {
            Ok((socket, addr)) => {
                log::debug!("Node {} accepted connection from {}", id, addr);
                task::spawn(read_loop(socket, addr, mailbox.clone()));
            }
            Err(e) => {
                log::warn!("Node {} stopped accepting connections: {}", id, e);
                return;
            }
        }
    }
}

// Decodes frames from an inbound connection and delivers them into the local
// inbox until the connection is closed.
async fn read_loop(socket: TcpStream, addr: SocketAddr, mailbox: Mailbox) {
    let mut frames = FramedRead::new(socket, FrameCodec);
    while let Some(frame) = frames.next().await {
        match frame {
            Ok(frame) => {
                if mailbox.deliver(frame).is_err() {
                    log::debug!("Inbox closed, dropping connection {}", addr);
                    return;
                }
            }
            Err(e) => {
                log::warn!("Invalid frame from {}: {}", addr, e);
                return;
            }
        }
    }
    log::debug!("Connection {} closed", addr);
}

// Writes the frames queued for a remote node to its connection until every
// sender of the queue is dropped.
async fn write_loop(
    socket: TcpStream,
    id: NodeId,
    remote: NodeId,
    mut port: FrameReceiver,
) {
    let mut sink = FramedWrite::new(socket, FrameCodec);
    while let Some(frame) = port.recv().await {
        if let Err(e) = sink.send(frame).await {
            log::warn!("Node {} failed to write to node {}: {}", id, remote, e);
            return;
        }
    }
    log::debug!("Node {} link to node {} closed", id, remote);
}
