use {
    crate::{error::*, OwnedFile, TERMINATE_SENTINEL},
    std::{fmt, fs, path::Path, str::SplitWhitespace},
};

/// What a peer starts out with: the files it seeds and the files it wants.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PeerManifest {
    /// The files the peer owns in full at startup, with their segments in
    /// manifest order.
    pub owned: Vec<OwnedFile>,
    /// The names of the files the peer downloads, in the order it downloads
    /// them.
    pub wanted: Vec<String>,
}

impl PeerManifest {
    /// Parses the whitespace separated manifest format:
    ///
    /// ```text
    /// <owned count>
    /// <file name> <segment count>
    /// <segment>
    /// ...
    /// <wanted count>
    /// <file name>
    /// ...
    /// ```
    ///
    /// Line breaks are insignificant. Anything after the last wanted file is
    /// ignored.
    pub fn parse(input: &str) -> Result<Self, ManifestError> {
        let mut tokens = input.split_whitespace();

        let owned_count = next_count(&mut tokens, "owned file count")?;
        let mut owned = Vec::new();
        for _ in 0..owned_count {
            let name = next_name(&mut tokens)?;
            let segment_count = next_count(&mut tokens, "segment count")?;
            let mut segments = Vec::new();
            for _ in 0..segment_count {
                segments.push(next_token(&mut tokens, "segment")?.to_string());
            }
            owned.push(OwnedFile { name, segments });
        }

        let wanted_count = next_count(&mut tokens, "wanted file count")?;
        let mut wanted = Vec::new();
        for _ in 0..wanted_count {
            wanted.push(next_name(&mut tokens)?);
        }

        Ok(Self { owned, wanted })
    }

    /// Reads and parses the manifest at the given path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Reading manifest {:?}", path);
        let input = fs::read_to_string(path)?;
        Ok(Self::parse(&input)?)
    }
}

/// The name of the input manifest of the peer with the given id.
pub fn file_name(peer: crate::NodeId) -> String {
    format!("in{}.txt", peer)
}

fn next_token<'a>(
    tokens: &mut SplitWhitespace<'a>,
    what: &'static str,
) -> Result<&'a str, ManifestError> {
    tokens.next().ok_or(ManifestError::UnexpectedEof(what))
}

fn next_count(
    tokens: &mut SplitWhitespace<'_>,
    what: &'static str,
) -> Result<usize, ManifestError> {
    let token = next_token(tokens, what)?;
    token
        .parse()
        .map_err(|_| ManifestError::InvalidNumber(token.to_string()))
}

fn next_name(tokens: &mut SplitWhitespace<'_>) -> Result<String, ManifestError> {
    let name = next_token(tokens, "file name")?;
    if name == TERMINATE_SENTINEL {
        return Err(ManifestError::ReservedName);
    }
    Ok(name.to_string())
}

#[derive(Debug, PartialEq, Eq)]
pub enum ManifestError {
    /// The input ended while the named item was expected.
    UnexpectedEof(&'static str),
    /// A count was not a non-negative integer.
    InvalidNumber(String),
    /// A file was named like the termination signal.
    ReservedName,
}

impl fmt::Display for ManifestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ManifestError::*;
        match self {
            UnexpectedEof(what) => {
                write!(f, "manifest ended while expecting {}", what)
            }
            InvalidNumber(token) => {
                write!(f, "expected a count in manifest, found {:?}", token)
            }
            ReservedName => {
                write!(f, "file name {} is reserved", TERMINATE_SENTINEL)
            }
        }
    }
}

impl std::error::Error for ManifestError {}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse() {
        let input = "2\nfile1 3\nh1\nh2\nh3\nfile2 1\nh4\n2\nfile3\nfile4\n";
        let manifest = PeerManifest::parse(input).unwrap();
        assert_eq!(
            manifest,
            PeerManifest {
                owned: vec![
                    OwnedFile::new("file1", vec!["h1", "h2", "h3"]),
                    OwnedFile::new("file2", vec!["h4"]),
                ],
                wanted: vec!["file3".to_string(), "file4".to_string()],
            }
        );
    }

    #[test]
    fn test_parse_empty_lists() {
        let manifest = PeerManifest::parse("0 0").unwrap();
        assert_eq!(manifest, PeerManifest::default());

        let manifest = PeerManifest::parse("0\n1\nfile1").unwrap();
        assert!(manifest.owned.is_empty());
        assert_eq!(manifest.wanted, vec!["file1"]);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            PeerManifest::parse(""),
            Err(ManifestError::UnexpectedEof("owned file count"))
        );
        assert_eq!(
            PeerManifest::parse("1 file1 3 h1 h2"),
            Err(ManifestError::UnexpectedEof("segment"))
        );
        assert_eq!(
            PeerManifest::parse("1 file1 2 h1 h2"),
            Err(ManifestError::UnexpectedEof("wanted file count"))
        );
        assert_eq!(
            PeerManifest::parse("0 2 file1"),
            Err(ManifestError::UnexpectedEof("file name"))
        );
        assert_eq!(
            PeerManifest::parse("1 file1 x"),
            Err(ManifestError::InvalidNumber("x".into()))
        );
        assert_eq!(
            PeerManifest::parse("-1"),
            Err(ManifestError::InvalidNumber("-1".into()))
        );
        assert_eq!(
            PeerManifest::parse("0 1 TERMINATE"),
            Err(ManifestError::ReservedName)
        );
        assert_eq!(
            PeerManifest::parse("1 TERMINATE 0 0"),
            Err(ManifestError::ReservedName)
        );
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(file_name(3));
        assert!(path.ends_with("in3.txt"));
        fs::write(&path, "1\nf 2\nh1\nh2\n0\n").unwrap();
        let manifest = PeerManifest::from_file(&path).unwrap();
        assert_eq!(manifest.owned, vec![OwnedFile::new("f", vec!["h1", "h2"])]);

        let missing = PeerManifest::from_file(dir.path().join("in9.txt"));
        assert!(matches!(missing, Err(Error::Io(_))));
        fs::write(&path, "1 f").unwrap();
        let invalid = PeerManifest::from_file(&path);
        assert!(matches!(invalid, Err(Error::Manifest(_))));
    }
}
