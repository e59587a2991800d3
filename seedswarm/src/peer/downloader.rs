use {
    super::store::OwnedSegments,
    crate::{
        disk::DiskHandle,
        error::*,
        message::{Message, Response, SwarmReply},
        transport::{Frame, FrameReceiver, Router},
        NodeId, SegmentId, TRACKER_ID,
    },
    std::collections::HashMap,
};

/// Statistics of a peer's single pass over its wanted files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DownloadStats {
    /// The number of segments some owner agreed to serve.
    pub acquired: usize,
    /// The number of segments every candidate owner refused.
    pub failed: usize,
    /// The number of wanted files skipped because their swarm was empty.
    pub skipped_files: usize,
}

/// Pulls the peer's wanted files from their swarms, one file and one segment
/// at a time.
pub(super) struct Downloader {
    id: NodeId,
    /// The files to download, in the order they are processed.
    wanted: Vec<String>,
    /// The manifests of the wanted files, cached on the first swarm reply.
    manifests: HashMap<String, Vec<SegmentId>>,
    store: OwnedSegments,
    router: Router,
    /// The port on which the tracker's messages arrive.
    control_port: FrameReceiver,
    /// The port on which answers to our segment requests arrive.
    response_port: FrameReceiver,
    disk: DiskHandle,
    /// See [`crate::conf::PeerConf::progress_interval`].
    progress_interval: u64,
    stats: DownloadStats,
}

impl Downloader {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: NodeId,
        wanted: Vec<String>,
        store: OwnedSegments,
        router: Router,
        control_port: FrameReceiver,
        response_port: FrameReceiver,
        disk: DiskHandle,
        progress_interval: u64,
    ) -> Self {
        Self {
            id,
            wanted,
            manifests: HashMap::new(),
            store,
            router,
            control_port,
            response_port,
            disk,
            progress_interval,
            stats: DownloadStats::default(),
        }
    }

    /// Waits for the tracker's go-ahead, then makes one pass over the wanted
    /// files and reports completion to the tracker.
    ///
    /// Refused segments and empty swarms are not errors, they only show up in
    /// the returned stats.
    pub async fn run(mut self) -> Result<DownloadStats> {
        self.wait_for_ready().await?;
        peer_info!(self, "Starting download of {} file(s)", self.wanted.len());

        let wanted = std::mem::take(&mut self.wanted);
        for file in wanted.iter() {
            self.download_file(file).await?;
        }

        peer_info!(
            self,
            "Done downloading (acquired: {}, failed: {}, skipped files: {})",
            self.stats.acquired,
            self.stats.failed,
            self.stats.skipped_files
        );
        self.router.send(TRACKER_ID, Message::AllFilesCompleted)?;
        Ok(self.stats)
    }

    /// The tracker's ready signal must be the first control message we
    /// receive.
    async fn wait_for_ready(&mut self) -> Result<()> {
        peer_debug!(self, "Waiting for ready signal");
        let Frame { from, msg } = self.recv_control().await?;
        if msg != Message::Ready {
            peer_warn!(
                self,
                "Expected ready signal, got {} from node {}",
                msg,
                from
            );
            return Err(Error::HandshakeFailed);
        }
        peer_debug!(self, "Received ready signal");
        Ok(())
    }

    async fn download_file(&mut self, file: &str) -> Result<()> {
        let mut owners = self.query_swarm(file).await?;
        if owners.is_empty() {
            peer_warn!(self, "Swarm of file {} is empty, skipping it", file);
            self.stats.skipped_files += 1;
            return Ok(());
        }

        let manifest = self.manifests.get(file).cloned().unwrap_or_default();
        peer_info!(
            self,
            "Downloading file {} ({} segment(s), {} owner(s))",
            file,
            manifest.len(),
            owners.len()
        );

        for (index, segment) in manifest.iter().enumerate() {
            if !self.acquire_segment(file, segment, index, &owners).await? {
                self.stats.failed += 1;
                peer_warn!(
                    self,
                    "Every owner refused segment {} of file {}",
                    segment,
                    file
                );
                continue;
            }

            self.stats.acquired += 1;
            if self.progress_interval > 0
                && self.stats.acquired as u64 % self.progress_interval == 0
            {
                peer_debug!(
                    self,
                    "Acquired {} segments, refreshing swarm of file {}",
                    self.stats.acquired,
                    file
                );
                self.router.send(
                    TRACKER_ID,
                    Message::PeerUpdate {
                        file: file.to_string(),
                    },
                )?;
                owners = self.query_swarm(file).await?;
            }
        }

        peer_info!(self, "Completed file {}", file);
        self.router.send(
            TRACKER_ID,
            Message::FileCompleted {
                file: file.to_string(),
            },
        )?;
        self.disk.save_file(file, self.store.segments(file).await)
    }

    /// Asks the tracker for the file's swarm and returns its owners. The
    /// file's manifest is cached on the first reply.
    async fn query_swarm(&mut self, file: &str) -> Result<Vec<NodeId>> {
        self.router.send(
            TRACKER_ID,
            Message::SwarmQuery {
                file: file.to_string(),
            },
        )?;
        let Frame { from, msg } = self.recv_control().await?;
        let SwarmReply { owners, segments } = match msg {
            Message::SwarmReply(reply) => reply,
            msg => {
                peer_warn!(
                    self,
                    "Expected swarm reply, got {} from node {}",
                    msg,
                    from
                );
                return Err(Error::UnexpectedMessage(msg.kind()));
            }
        };
        peer_debug!(self, "Swarm of file {}: {:?}", file, owners);
        self.manifests
            .entry(file.to_string())
            .or_insert(segments);
        Ok(owners)
    }

    /// Requests the segment from each candidate owner in turn until one
    /// agrees. Returns whether the segment was acquired.
    async fn acquire_segment(
        &mut self,
        file: &str,
        segment: &str,
        index: usize,
        owners: &[NodeId],
    ) -> Result<bool> {
        for owner in candidates(owners, index, self.id) {
            peer_trace!(
                self,
                "Requesting segment {} of file {} from peer {}",
                segment,
                file,
                owner
            );
            self.router.send(
                owner,
                Message::SegmentRequest {
                    file: file.to_string(),
                    segment: segment.to_string(),
                },
            )?;
            match self.recv_response(owner).await? {
                Response::Ack => {
                    if !self.store.insert(file, segment).await {
                        peer_debug!(
                            self,
                            "Segment {} of file {} was already owned",
                            segment,
                            file
                        );
                    }
                    return Ok(true);
                }
                Response::Nack => {
                    peer_trace!(
                        self,
                        "Peer {} refused segment {}",
                        owner,
                        segment
                    );
                }
            }
        }
        Ok(false)
    }

    /// Waits for the answer of the given node to our last request.
    async fn recv_response(&mut self, owner: NodeId) -> Result<Response> {
        loop {
            let Frame { from, msg } =
                self.response_port.recv().await.ok_or(Error::Channel)?;
            if from != owner {
                peer_warn!(
                    self,
                    "Ignoring response from node {}, waiting for node {}",
                    from,
                    owner
                );
                continue;
            }
            return match msg {
                Message::SegmentResponse(response) => Ok(response),
                msg => Err(Error::UnexpectedMessage(msg.kind())),
            };
        }
    }

    async fn recv_control(&mut self) -> Result<Frame> {
        self.control_port.recv().await.ok_or(Error::Channel)
    }
}

/// Returns the owners to ask for the segment at `index` of a file, in the
/// order they are to be asked.
///
/// The rotation starts at `owners[index % owners.len()]` and wraps around
/// the owner list once, so consecutive segments are requested from different
/// owners. The downloading peer itself is never a candidate.
pub(crate) fn candidates(
    owners: &[NodeId],
    index: usize,
    own_id: NodeId,
) -> impl Iterator<Item = NodeId> + '_ {
    let len = owners.len();
    (0..len)
        .map(move |k| owners[(index + k) % len])
        .filter(move |owner| *owner != own_id)
}
