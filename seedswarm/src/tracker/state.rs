use std::collections::{HashMap, HashSet};

use crate::{message::SwarmReply, NodeId, OwnedFile, SegmentId};

/// Whether a swarm member has all or only some of a file's segments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Seed,
    Partial,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Member {
    pub id: NodeId,
    pub role: Role,
}

/// The nodes able to serve at least one segment of a file.
///
/// A node appears at most once and members are kept in the order they joined.
/// Nobody leaves a swarm, a partial member may only be promoted to seed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Swarm {
    members: Vec<Member>,
}

impl Swarm {
    /// Adds the node as a seed, or promotes it if it's already a partial
    /// member.
    fn add_seed(&mut self, id: NodeId) {
        match self.members.iter_mut().find(|m| m.id == id) {
            Some(member) => member.role = Role::Seed,
            None => self.members.push(Member {
                id,
                role: Role::Seed,
            }),
        }
    }

    /// Adds the node as a partial member unless it's already in the swarm.
    /// Returns whether the node was added.
    fn add_partial(&mut self, id: NodeId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.members.push(Member {
            id,
            role: Role::Partial,
        });
        true
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.members.iter().any(|m| m.id == id)
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// The ids of all members, in the order they joined.
    pub fn owners(&self) -> Vec<NodeId> {
        self.members.iter().map(|m| m.id).collect()
    }

    pub fn seeds(&self) -> Vec<NodeId> {
        self.with_role(Role::Seed)
    }

    pub fn partials(&self) -> Vec<NodeId> {
        self.with_role(Role::Partial)
    }

    fn with_role(&self, role: Role) -> Vec<NodeId> {
        self.members
            .iter()
            .filter(|m| m.role == role)
            .map(|m| m.id)
            .collect()
    }
}

/// All the cross-peer state of the swarm, owned by the tracker's event loop.
#[derive(Debug)]
pub struct TrackerState {
    /// The number of peer nodes in the swarm.
    peer_count: usize,
    /// Each file's canonical segment list. The first announcement of a file
    /// sets it and it never changes afterwards.
    manifests: HashMap<String, Vec<SegmentId>>,
    swarms: HashMap<String, Swarm>,
    /// The peers whose initial ownership we've registered.
    announced: HashSet<NodeId>,
    /// The peers that reported having processed all their wanted files.
    completed: HashSet<NodeId>,
}

impl TrackerState {
    pub fn new(peer_count: usize) -> Self {
        Self {
            peer_count,
            manifests: HashMap::new(),
            swarms: HashMap::new(),
            announced: HashSet::new(),
            completed: HashSet::new(),
        }
    }

    pub fn peer_count(&self) -> usize {
        self.peer_count
    }

    /// Registers the peer as a seed of each of the files. A file's manifest is
    /// taken from the first announcement that mentions it.
    pub fn register_initial_ownership(
        &mut self,
        peer: NodeId,
        files: Vec<OwnedFile>,
    ) {
        log::debug!(
            "Registering {} initial file(s) of peer {}",
            files.len(),
            peer
        );
        for OwnedFile { name, segments } in files {
            match self.manifests.get(&name) {
                Some(manifest) if *manifest != segments => {
                    log::warn!(
                        "Peer {} announced file {} with a different manifest, \
                        keeping the first one",
                        peer,
                        name
                    );
                }
                Some(_) => {}
                None => {
                    self.manifests.insert(name.clone(), segments);
                }
            }
            self.swarms.entry(name).or_default().add_seed(peer);
        }
        self.announced.insert(peer);
    }

    /// Whether every peer has announced its initial files.
    pub fn all_announced(&self) -> bool {
        self.announced.len() >= self.peer_count
    }

    pub fn has_announced(&self, peer: NodeId) -> bool {
        self.announced.contains(&peer)
    }

    /// Returns the file's current swarm and its manifest. Unknown files have an
    /// empty swarm and manifest.
    pub fn swarm_reply(&self, file: &str) -> SwarmReply {
        SwarmReply {
            owners: self.swarms.get(file).map(Swarm::owners).unwrap_or_default(),
            segments: self.manifests.get(file).cloned().unwrap_or_default(),
        }
    }

    /// Records that the peer holds at least one segment of the file. Returns
    /// whether the peer was new to the file's swarm.
    pub fn peer_progress(&mut self, peer: NodeId, file: &str) -> bool {
        self.swarms
            .entry(file.to_string())
            .or_default()
            .add_partial(peer)
    }

    /// Reclassifies the peer as a seed of the file.
    pub fn file_completed(&mut self, peer: NodeId, file: &str) {
        self.swarms
            .entry(file.to_string())
            .or_default()
            .add_seed(peer);
    }

    /// Records that the peer finished all its downloads and returns the number
    /// of peers that did so far.
    pub fn all_files_completed(&mut self, peer: NodeId) -> usize {
        if !self.completed.insert(peer) {
            log::warn!("Peer {} reported completion more than once", peer);
        }
        self.completed.len()
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    /// Whether every peer has finished, at which point the swarm can be shut
    /// down.
    pub fn is_done(&self) -> bool {
        self.completed.len() >= self.peer_count
    }

    pub fn manifest(&self, file: &str) -> Option<&[SegmentId]> {
        self.manifests.get(file).map(Vec::as_slice)
    }

    pub fn swarm(&self, file: &str) -> Option<&Swarm> {
        self.swarms.get(file)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn segments(ids: &[&str]) -> Vec<SegmentId> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    // Tests that once a file's manifest is established by the first
    // announcement, later announcements with a different segment list leave
    // it intact while still adding the announcer to the swarm.
    #[test]
    fn test_manifest_stability() {
        let mut state = TrackerState::new(3);
        state.register_initial_ownership(
            2,
            vec![OwnedFile::new("f", vec!["h1", "h2", "h3"])],
        );
        state.register_initial_ownership(
            1,
            vec![OwnedFile::new("f", vec!["x1", "x2"])],
        );
        state.register_initial_ownership(
            3,
            vec![OwnedFile::new("f", Vec::<String>::new())],
        );

        assert_eq!(state.manifest("f"), Some(&segments(&["h1", "h2", "h3"])[..]));
        let reply = state.swarm_reply("f");
        assert_eq!(reply.owners, vec![2, 1, 3]);
        assert_eq!(reply.segments, segments(&["h1", "h2", "h3"]));
        assert!(state.all_announced());
    }

    // Tests that progress updates only ever grow a swarm and never add the
    // same node twice.
    #[test]
    fn test_swarm_monotonic_growth() {
        let mut state = TrackerState::new(4);
        state.register_initial_ownership(
            1,
            vec![OwnedFile::new("f", vec!["h1"])],
        );

        let updates = [2, 3, 2, 1, 4, 3, 4];
        let mut prev_len = state.swarm_reply("f").owners.len();
        for peer in updates.iter() {
            state.peer_progress(*peer, "f");
            let owners = state.swarm_reply("f").owners;
            assert!(owners.len() >= prev_len);
            let unique: HashSet<_> = owners.iter().collect();
            assert_eq!(unique.len(), owners.len());
            prev_len = owners.len();
        }
        assert_eq!(state.swarm_reply("f").owners, vec![1, 2, 3, 4]);
    }

    // Tests that a progress update is accepted for a file whose swarm already
    // has members (and not just for files without a swarm).
    #[test]
    fn test_peer_progress_joins_existing_swarm() {
        let mut state = TrackerState::new(2);
        state.register_initial_ownership(
            1,
            vec![OwnedFile::new("f", vec!["h1"])],
        );
        assert!(state.peer_progress(2, "f"));
        assert!(!state.peer_progress(2, "f"));
        let swarm = state.swarm("f").unwrap();
        assert_eq!(swarm.seeds(), vec![1]);
        assert_eq!(swarm.partials(), vec![2]);
    }

    // Tests that completing a file promotes a partial member to seed in
    // place, and adds a peer that never reported progress as a seed.
    #[test]
    fn test_file_completed_reclassifies() {
        let mut state = TrackerState::new(3);
        state.register_initial_ownership(
            1,
            vec![OwnedFile::new("f", vec!["h1"])],
        );
        state.peer_progress(2, "f");
        state.file_completed(2, "f");
        state.file_completed(3, "f");

        let swarm = state.swarm("f").unwrap();
        assert_eq!(
            swarm.members(),
            &[
                Member {
                    id: 1,
                    role: Role::Seed
                },
                Member {
                    id: 2,
                    role: Role::Seed
                },
                Member {
                    id: 3,
                    role: Role::Seed
                },
            ]
        );
        assert!(swarm.partials().is_empty());
    }

    // Tests that unknown files have an empty swarm and manifest and that
    // querying them doesn't create state.
    #[test]
    fn test_unknown_file() {
        let state = TrackerState::new(1);
        assert_eq!(state.swarm_reply("g"), SwarmReply::default());
        assert!(state.swarm("g").is_none());
        assert!(state.manifest("g").is_none());
    }

    // Tests that the swarm is only done when every distinct peer reported
    // completion.
    #[test]
    fn test_completion_counter() {
        let mut state = TrackerState::new(3);
        assert!(!state.is_done());
        assert_eq!(state.all_files_completed(2), 1);
        // repeated reports are not double counted
        assert_eq!(state.all_files_completed(2), 1);
        assert_eq!(state.all_files_completed(3), 2);
        assert!(!state.is_done());
        assert_eq!(state.all_files_completed(1), 3);
        assert!(state.is_done());
        assert_eq!(state.completed_count(), 3);
    }

    #[test]
    fn test_announce_gate() {
        let mut state = TrackerState::new(2);
        assert!(!state.all_announced());
        // a peer without initial files still counts as having announced
        state.register_initial_ownership(2, Vec::new());
        assert!(state.has_announced(2));
        assert!(!state.all_announced());
        state.register_initial_ownership(1, Vec::new());
        assert!(state.all_announced());
    }
}
