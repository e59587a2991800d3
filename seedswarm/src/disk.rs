use {
    crate::{error::*, NodeId, SegmentId},
    std::{fs, path::PathBuf},
    tokio::{
        sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
        task,
    },
};

/// Spawns a disk IO task that saves the files of the given peer under
/// `output_dir` and returns a tuple with the task join handle and the disk
/// handle used for sending commands.
pub(crate) fn spawn(
    peer: NodeId,
    output_dir: PathBuf,
) -> Result<(task::JoinHandle<Stats>, DiskHandle)> {
    log::info!("Spawning disk IO task for peer {}", peer);
    fs::create_dir_all(&output_dir)?;
    let (cmd_chan, cmd_port) = mpsc::unbounded_channel();
    let mut disk = Disk {
        peer,
        output_dir,
        cmd_port,
        stats: Stats::default(),
    };
    // spawn disk event loop on a new task
    let join_handle = task::spawn(async move { disk.start().await });
    Ok((join_handle, DiskHandle(cmd_chan)))
}

/// The handle for the disk task, used to persist completed files.
///
/// The handle may be copied an arbitrary number of times. It is an abstraction
/// over the means to communicate with the disk IO task.
#[derive(Clone)]
pub(crate) struct DiskHandle(CommandSender);

impl DiskHandle {
    /// Queues the segment list of a file for eventual writing to disk.
    pub fn save_file(&self, file: &str, segments: Vec<SegmentId>) -> Result<()> {
        log::trace!("Saving file {} ({} segments)", file, segments.len());
        self.0
            .send(Command::SaveFile {
                file: file.to_string(),
                segments,
            })
            .map_err(Error::from)
    }

    /// Shuts down the disk IO task once all queued files are written.
    pub fn shutdown(&self) -> Result<()> {
        log::trace!("Shutting down disk IO task");
        self.0.send(Command::Shutdown).map_err(Error::from)
    }
}

// The channel for sendng commands to the disk task.
type CommandSender = UnboundedSender<Command>;
// The channel the disk task uses to listen for commands.
type CommandReceiver = UnboundedReceiver<Command>;

enum Command {
    // Write the file's segments, one per line.
    SaveFile {
        file: String,
        segments: Vec<SegmentId>,
    },
    // Eventually shut down the disk task.
    Shutdown,
}

/// What the disk task did over its lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// The number of files successfully written.
    pub write_count: usize,
    /// The number of times we failed to write a file.
    pub write_failure_count: usize,
}

struct Disk {
    peer: NodeId,
    output_dir: PathBuf,
    cmd_port: CommandReceiver,
    stats: Stats,
}

impl Disk {
    // Runs until shutdown or until every handle is dropped.
    async fn start(&mut self) -> Stats {
        log::info!("Starting disk IO event loop of peer {}", self.peer);
        while let Some(cmd) = self.cmd_port.recv().await {
            match cmd {
                Command::SaveFile { file, segments } => {
                    let path =
                        self.output_dir.join(file_name(self.peer, &file));
                    // don't block the reactor with sync file writing
                    //
                    // NOTE: Do _NOT_ return on failure, a file that could not
                    // be saved doesn't affect the rest of the swarm, so just
                    // log it.
                    let write_result = task::spawn_blocking(move || {
                        write_file(path, &segments)
                    })
                    .await;
                    match write_result {
                        Ok(Ok(path)) => {
                            log::info!("Saved file {} to {:?}", file, path);
                            self.stats.write_count += 1;
                        }
                        Ok(Err(e)) => {
                            log::warn!("Failed to save file {}: {}", file, e);
                            self.stats.write_failure_count += 1;
                        }
                        Err(e) => {
                            log::warn!(
                                "Write task of file {} failed: {}",
                                file,
                                e
                            );
                            self.stats.write_failure_count += 1;
                        }
                    }
                }
                Command::Shutdown => {
                    log::info!("Shutting down disk event loop");
                    break;
                }
            }
        }
        self.stats
    }
}

// Creates or truncates the file at `path` and writes the segments one per
// line, without a trailing newline.
fn write_file(
    path: PathBuf,
    segments: &[SegmentId],
) -> std::io::Result<PathBuf> {
    fs::write(&path, segments.join("\n"))?;
    Ok(path)
}

/// The name of the file in which a peer's copy of a file is saved.
pub(crate) fn file_name(peer: NodeId, file: &str) -> String {
    format!("client{}_{}", peer, file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_files() {
        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().join("out");
        let (join_handle, disk) = spawn(2, output_dir.clone()).unwrap();

        disk.save_file("file1", vec!["h1".into(), "h2".into(), "h3".into()])
            .unwrap();
        disk.save_file("empty", Vec::new()).unwrap();
        disk.shutdown().unwrap();

        let stats = join_handle.await.unwrap();
        assert_eq!(
            stats,
            Stats {
                write_count: 2,
                write_failure_count: 0
            }
        );

        let saved = fs::read_to_string(output_dir.join("client2_file1"))
            .unwrap();
        assert_eq!(saved, "h1\nh2\nh3");
        let saved = fs::read_to_string(output_dir.join("client2_empty"))
            .unwrap();
        assert_eq!(saved, "");
    }

    // Tests that a failed write is counted but doesn't stop the disk task.
    #[tokio::test]
    async fn test_write_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (join_handle, disk) = spawn(1, dir.path().to_path_buf()).unwrap();

        // a directory in place of the target file makes the write fail
        fs::create_dir(dir.path().join("client1_blocked")).unwrap();
        disk.save_file("blocked", vec!["h1".into()]).unwrap();
        disk.save_file("ok", vec!["h1".into()]).unwrap();
        disk.shutdown().unwrap();

        let stats = join_handle.await.unwrap();
        assert_eq!(stats.write_count, 1);
        assert_eq!(stats.write_failure_count, 1);
        assert!(dir.path().join("client1_ok").is_file());
    }

    // Tests that writes run off the runtime thread still complete in the
    // order they were queued, even on a single threaded runtime where the
    // disk task shares the only worker with its callers.
    #[tokio::test(flavor = "current_thread")]
    async fn test_writes_keep_queue_order() {
        let dir = tempfile::tempdir().unwrap();
        let (join_handle, disk) = spawn(4, dir.path().to_path_buf()).unwrap();

        disk.save_file("f", vec!["h1".into()]).unwrap();
        disk.save_file("f", vec!["h1".into(), "h2".into()]).unwrap();
        disk.save_file("g", vec!["x".into()]).unwrap();
        disk.shutdown().unwrap();

        // the caller keeps running while the files are being written
        let ticker = tokio::spawn(async {
            for _ in 0..10 {
                tokio::task::yield_now().await;
            }
        });
        ticker.await.unwrap();

        let stats = join_handle.await.unwrap();
        assert_eq!(stats.write_count, 3);
        assert_eq!(stats.write_failure_count, 0);
        let saved = fs::read_to_string(dir.path().join("client4_f")).unwrap();
        assert_eq!(saved, "h1\nh2");
        let saved = fs::read_to_string(dir.path().join("client4_g")).unwrap();
        assert_eq!(saved, "x");
    }
}
