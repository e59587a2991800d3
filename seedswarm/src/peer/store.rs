use {
    crate::{OwnedFile, SegmentId},
    std::{collections::HashMap, sync::Arc},
    tokio::sync::Mutex,
};

/// The segments a peer owns, per file, shared between the peer's downloader
/// and uploader.
///
/// A single lock guards the whole table. It is only ever held for one lookup
/// or one append, so the two tasks can't deadlock on it and never observe a
/// partially written entry. Entries are only ever appended, never removed.
#[derive(Clone, Default)]
pub(crate) struct OwnedSegments(Arc<Mutex<HashMap<String, Vec<SegmentId>>>>);

impl OwnedSegments {
    /// Creates the table pre-populated with the files the peer seeds from the
    /// start, in their manifest order.
    pub fn new(initial: &[OwnedFile]) -> Self {
        let mut table: HashMap<String, Vec<SegmentId>> = HashMap::new();
        for file in initial {
            let segments = table.entry(file.name.clone()).or_default();
            for segment in file.segments.iter() {
                if !segments.contains(segment) {
                    segments.push(segment.clone());
                }
            }
        }
        Self(Arc::new(Mutex::new(table)))
    }

    /// Appends the segment to the file's segments, unless it's already there.
    /// Returns whether the segment was added.
    pub async fn insert(&self, file: &str, segment: &str) -> bool {
        let mut table = self.0.lock().await;
        let segments = table.entry(file.to_string()).or_default();
        if segments.iter().any(|s| s == segment) {
            log::trace!("Segment {} of file {} already owned", segment, file);
            return false;
        }
        segments.push(segment.to_string());
        true
    }

    pub async fn contains(&self, file: &str, segment: &str) -> bool {
        self.0
            .lock()
            .await
            .get(file)
            .map(|segments| segments.iter().any(|s| s == segment))
            .unwrap_or(false)
    }

    /// Returns a copy of the file's segments in the order they were stored.
    pub async fn segments(&self, file: &str) -> Vec<SegmentId> {
        self.0.lock().await.get(file).cloned().unwrap_or_default()
    }

    /// Returns a copy of the whole table.
    pub async fn snapshot(&self) -> HashMap<String, Vec<SegmentId>> {
        self.0.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn test_initial_files() {
        let store = OwnedSegments::new(&[
            OwnedFile::new("f", vec!["h1", "h2", "h1"]),
            OwnedFile::new("g", Vec::<String>::new()),
        ]);
        assert_eq!(store.segments("f").await, vec!["h1", "h2"]);
        assert!(store.segments("g").await.is_empty());
        assert!(store.contains("f", "h2").await);
        assert!(!store.contains("g", "h1").await);
        assert!(!store.contains("unknown", "h1").await);
    }

    // Tests that a segment is stored at most once per file no matter how many
    // times it is inserted.
    #[tokio::test]
    async fn test_no_duplicate_segments() {
        let store = OwnedSegments::default();
        assert!(store.insert("f", "h1").await);
        assert!(store.insert("f", "h2").await);
        assert!(!store.insert("f", "h1").await);
        // the same segment id may belong to another file
        assert!(store.insert("g", "h1").await);
        assert_eq!(store.segments("f").await, vec!["h1", "h2"]);
        assert_eq!(store.snapshot().await.len(), 2);
    }

    // Tests that clones share the same table, as the downloader and uploader
    // do.
    #[tokio::test]
    async fn test_shared_between_tasks() {
        let store = OwnedSegments::default();
        let writer = store.clone();
        let handle = tokio::spawn(async move {
            for i in 0..100 {
                writer.insert("f", &format!("h{}", i)).await;
            }
        });
        handle.await.unwrap();
        assert_eq!(store.segments("f").await.len(), 100);
        assert!(store.contains("f", "h99").await);
    }
}
