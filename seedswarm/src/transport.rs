//! Reliable, ordered, addressable messaging between the nodes of a swarm.
//!
//! Every node owns an [`Inbox`] with one queue per logical [`Channel`], and
//! reaches every other node (itself included) through a [`Router`]. Whether
//! a link to another node is an in-process channel or a TCP connection is
//! hidden behind the router, so the tracker and peer tasks are oblivious to
//! the transport they run on.

mod codec;
pub mod net;

pub use codec::FrameCodec;

use {
    crate::{
        error::*,
        message::{Channel, Message},
        NodeId,
    },
    std::sync::Arc,
    tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
};

/// A message tagged with the id of the node that sent it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub from: NodeId,
    pub msg: Message,
}

type FrameSender = UnboundedSender<Frame>;
/// The queue on which a node receives the frames of one logical channel.
pub type FrameReceiver = UnboundedReceiver<Frame>;

/// The sending half of a node's inbox. Frames are routed to the queue of
/// the channel their message belongs to.
#[derive(Clone)]
pub(crate) struct Mailbox {
    control: FrameSender,
    requests: FrameSender,
    responses: FrameSender,
}

impl Mailbox {
    pub fn deliver(&self, frame: Frame) -> Result<()> {
        let chan = match frame.msg.channel() {
            Channel::Control => &self.control,
            Channel::Request => &self.requests,
            Channel::Response => &self.responses,
        };
        chan.send(frame).map_err(Error::from)
    }
}

/// The receiving queues of a node, one per logical channel.
pub struct Inbox {
    /// Tracker coordination messages.
    pub control: FrameReceiver,
    /// Segment requests and the termination signal.
    pub requests: FrameReceiver,
    /// Answers to our own segment requests.
    pub responses: FrameReceiver,
}

/// Creates a connected mailbox and inbox pair.
pub(crate) fn mailbox() -> (Mailbox, Inbox) {
    let (control, control_port) = mpsc::unbounded_channel();
    let (requests, request_port) = mpsc::unbounded_channel();
    let (responses, response_port) = mpsc::unbounded_channel();
    (
        Mailbox {
            control,
            requests,
            responses,
        },
        Inbox {
            control: control_port,
            requests: request_port,
            responses: response_port,
        },
    )
}

pub(crate) enum Link {
    /// The destination's inbox lives in this process.
    Local(Mailbox),
    /// Frames are handed to a task that writes them to the destination's
    /// connection.
    Remote(FrameSender),
}

/// The handle with which a node sends messages to any node of the swarm.
///
/// The router may be cloned an arbitrary number of times. The index of a link
/// is the node id of its destination.
#[derive(Clone)]
pub struct Router {
    id: NodeId,
    links: Arc<Vec<Link>>,
}

impl Router {
    pub(crate) fn new(id: NodeId, links: Vec<Link>) -> Self {
        Self {
            id,
            links: Arc::new(links),
        }
    }

    /// The id of the node this router sends on behalf of.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The number of nodes in the swarm, including the tracker.
    pub fn node_count(&self) -> usize {
        self.links.len()
    }

    /// Queues the message for delivery to the node with the given id.
    ///
    /// Delivery is reliable and ordered with respect to other messages sent to
    /// the same node.
    pub fn send(&self, to: NodeId, msg: Message) -> Result<()> {
        log::trace!("Node {} sending {} to node {}", self.id, msg, to);
        let link = self.links.get(to).ok_or(Error::UnknownNode(to))?;
        let frame = Frame { from: self.id, msg };
        match link {
            Link::Local(mailbox) => mailbox.deliver(frame),
            Link::Remote(chan) => chan.send(frame).map_err(Error::from),
        }
    }
}

/// Everything a node task needs to take part in the swarm.
pub struct Endpoint {
    pub id: NodeId,
    pub router: Router,
    pub inbox: Inbox,
}

/// Creates an in-process swarm of `node_count` fully connected nodes. The
/// endpoint at index `i` belongs to node `i`.
pub fn mesh(node_count: usize) -> Vec<Endpoint> {
    let (mailboxes, inboxes): (Vec<_>, Vec<_>) =
        (0..node_count).map(|_| mailbox()).unzip();
    inboxes
        .into_iter()
        .enumerate()
        .map(|(id, inbox)| {
            let links =
                mailboxes.iter().cloned().map(Link::Local).collect();
            Endpoint {
                id,
                router: Router::new(id, links),
                inbox,
            }
        })
        .collect()
}
