mod checksum;
pub mod selector;
pub mod version;

pub use checksum::{Checksum, ChecksumValidator};
pub use selector::{parse_selector, parse_selectors, PkgSelector};
pub use version::{test_version, Op, PkgVersion};

use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Where a repository lives. Shared by every record it contributed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepoInfo {
    pub kind: RepoKind,
    pub url: String,
    pub distribution: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepoKind {
    Deb,
    DebSrc,
}

impl RepoKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoKind::Deb => "deb",
            RepoKind::DebSrc => "deb-src",
        }
    }
}

/// One row of a Release hash table (`hash size path`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HashEntry {
    /// "md5", "sha1" or "sha256"
    pub kind: &'static str,
    pub hex: String,
    pub size: u64,
    pub path: String,
}

impl HashEntry {
    pub fn checksum(&self) -> anyhow::Result<Checksum> {
        Checksum::from_str(self.kind, &self.hex)
    }
}

/// The per-(component × architecture) Release fragment a package index
/// was loaded under.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReleaseFragment {
    pub version: Option<String>,
    pub component: Option<String>,
    pub origin: Option<String>,
    pub label: Option<String>,
    pub architecture: Option<String>,
    pub description: Option<String>,
}

/// Content digests declared on a package stanza.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PkgHashes {
    pub md5: Option<String>,
    pub sha1: Option<String>,
    pub sha256: Option<String>,
    pub sha512: Option<String>,
}

/// One concrete (package, version, architecture, repository) record.
///
/// Immutable after load, except for three write-once caches: the parsed
/// version, the expanded Provides selectors, and the dependency list the
/// resolver fills in during a recursive pass.
#[derive(Debug)]
pub struct PkgMeta {
    pub name: String,
    pub source: Option<String>,
    pub version: String,
    pub architecture: String,
    pub maintainer: Option<String>,
    pub priority: Option<String>,
    pub section: Option<String>,
    pub filename: Option<String>,
    pub size: u64,
    pub hashes: PkgHashes,
    pub description: Option<String>,
    /// Raw `Depends` entries, one selector expression each, in declared
    /// order.
    pub depends: Vec<String>,
    /// Raw `Provides` entries in declared order.
    pub provides: Vec<String>,
    pub repo: Arc<RepoInfo>,
    pub release: ReleaseFragment,

    parsed_version: OnceCell<Option<PkgVersion>>,
    parsed_provides: OnceCell<Vec<PkgSelector>>,
    pub(crate) dependencies: OnceCell<Vec<crate::solver::ResolvedPkg>>,
}

impl PkgMeta {
    pub fn new(repo: Arc<RepoInfo>, release: ReleaseFragment) -> Self {
        PkgMeta {
            name: String::new(),
            source: None,
            version: String::new(),
            architecture: String::new(),
            maintainer: None,
            priority: None,
            section: None,
            filename: None,
            size: 0,
            hashes: PkgHashes::default(),
            description: None,
            depends: Vec::new(),
            provides: Vec::new(),
            repo,
            release,
            parsed_version: OnceCell::new(),
            parsed_provides: OnceCell::new(),
            dependencies: OnceCell::new(),
        }
    }

    /// Parsed form of the version, computed once per record. `None` for
    /// versions that don't fit the dpkg shape.
    pub fn parsed_version(&self) -> Option<&PkgVersion> {
        self.parsed_version
            .get_or_init(|| PkgVersion::parse(&self.version))
            .as_ref()
    }

    /// Provides entries expanded into selectors, computed once. The raw
    /// list is treated as write-once, so the expansion never recomputes.
    pub fn parsed_provides(&self) -> &[PkgSelector] {
        self.parsed_provides
            .get_or_init(|| self.provides.iter().flat_map(|p| parse_selectors(p)).collect())
    }

    /// Resolved dependency list, present only after a recursive resolve
    /// pass reached this record.
    pub fn dependencies(&self) -> Option<&[crate::solver::ResolvedPkg]> {
        self.dependencies.get().map(|d| d.as_slice())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn test_repo() -> Arc<RepoInfo> {
        Arc::new(RepoInfo {
            kind: RepoKind::Deb,
            url: "http://deb.example.org/debian".to_string(),
            distribution: "stable".to_string(),
        })
    }

    #[test]
    fn provides_expansion_memoized() {
        let mut pkg = PkgMeta::new(test_repo(), ReleaseFragment::default());
        pkg.name = "real".to_string();
        pkg.version = "1.0".to_string();
        pkg.provides = vec!["virtual (= 1.0)".to_string(), "BAD!".to_string()];

        let first = pkg.parsed_provides();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].package, "virtual");
        assert_eq!(first[0].op, Some(Op::Eq));

        let first_ptr = pkg.parsed_provides().as_ptr();
        assert_eq!(first_ptr, pkg.parsed_provides().as_ptr());
    }

    #[test]
    fn version_memoized_and_idempotent() {
        let mut pkg = PkgMeta::new(test_repo(), ReleaseFragment::default());
        pkg.version = "1:2.0-3".to_string();
        let a = pkg.parsed_version().unwrap() as *const _;
        let b = pkg.parsed_version().unwrap() as *const _;
        assert_eq!(a, b);
        assert_eq!(pkg.parsed_version().unwrap().epoch, 1);
    }
}
