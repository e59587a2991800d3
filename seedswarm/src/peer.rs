//! A peer runs two concurrent tasks: a downloader pulling the peer's wanted
//! files from other peers and an uploader serving other peers' requests from
//! the segments this peer owns. The two share the peer's owned-segment table.

#[macro_use]
mod peer_log;
mod downloader;
mod store;
mod uploader;

pub use {downloader::DownloadStats, uploader::UploadStats};

use {
    crate::{
        conf::PeerConf,
        disk::{self, Stats as DiskStats},
        error::*,
        manifest::PeerManifest,
        message::Message,
        transport::Endpoint,
        NodeId, SegmentId, TRACKER_ID,
    },
    downloader::Downloader,
    std::collections::HashMap,
    store::OwnedSegments,
    tokio::task,
    uploader::Uploader,
};

/// What a peer ended up with once the swarm was terminated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerReport {
    pub id: NodeId,
    /// The segments the peer owns per file, seeded and downloaded alike, in
    /// the order they were stored.
    pub owned: HashMap<String, Vec<SegmentId>>,
    pub download: DownloadStats,
    pub upload: UploadStats,
    pub disk: DiskStats,
}

/// A peer node, ready to join the swarm.
pub struct Peer {
    endpoint: Endpoint,
    manifest: PeerManifest,
    conf: PeerConf,
}

impl Peer {
    pub fn new(
        endpoint: Endpoint,
        manifest: PeerManifest,
        conf: PeerConf,
    ) -> Self {
        Self {
            endpoint,
            manifest,
            conf,
        }
    }

    /// Announces the peer's files to the tracker and runs the downloader and
    /// uploader until the tracker terminates the swarm.
    ///
    /// # Errors
    ///
    /// If the downloader fails, e.g. because the tracker's ready signal did
    /// not arrive, the uploader is stopped and the error is returned.
    pub async fn run(self) -> Result<PeerReport> {
        let Self {
            endpoint,
            manifest,
            conf,
        } = self;
        let Endpoint { id, router, inbox } = endpoint;
        let PeerManifest { owned, wanted } = manifest;

        let store = OwnedSegments::new(&owned);
        log::info!(
            "[Peer {}] Starting peer (seeds {} file(s), wants {} file(s))",
            id,
            owned.len(),
            wanted.len()
        );
        router.send(TRACKER_ID, Message::InitialOwnership(owned))?;

        let (disk_join_handle, disk) = disk::spawn(id, conf.output_dir)?;

        let downloader = Downloader::new(
            id,
            wanted,
            store.clone(),
            router.clone(),
            inbox.control,
            inbox.responses,
            disk.clone(),
            conf.progress_interval,
        );
        let uploader = Uploader::new(id, store.clone(), router, inbox.requests);
        let download_join_handle = task::spawn(downloader.run());
        let upload_join_handle = task::spawn(uploader.run());

        let download = match download_join_handle.await? {
            Ok(stats) => stats,
            Err(e) => {
                log::error!("[Peer {}] Download failed: {}", id, e);
                upload_join_handle.abort();
                // the disk task stops once it has no more handles
                return Err(e);
            }
        };
        let upload = upload_join_handle.await??;

        disk.shutdown()?;
        let disk = disk_join_handle.await?;

        log::info!("[Peer {}] Done", id);
        Ok(PeerReport {
            id,
            owned: store.snapshot().await,
            download,
            upload,
            disk,
        })
    }
}
