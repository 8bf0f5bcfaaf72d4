use crate::control::parse_control;
use crate::fetch::Fetcher;
use crate::pool::PkgPool;
use crate::types::{HashEntry, PkgHashes, PkgMeta, ReleaseFragment, RepoInfo, RepoKind};
use crate::{debug, warn};

use anyhow::{format_err, Context, Result};
use futures_util::future::try_join_all;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

lazy_static! {
    static ref SOURCE_ENTRY: Regex =
        Regex::new(r"^(deb|deb-src)\s+?(?:\[(.*?)\])?\s*(\S+)\s+(\S+)(?:\s+(.+))?$").unwrap();
    static ref HASH_ROW: Regex = Regex::new(r"^(\w+)\s+(\d+)\s+(.+)$").unwrap();
}

/// One line of a sources.list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepoEntry {
    pub kind: RepoKind,
    pub url: String,
    pub distribution: String,
    pub components: Vec<String>,
    /// From an `[arch=a,b]` option block. `None` means every
    /// architecture the Release advertises.
    pub architectures: Option<Vec<String>>,
}

/// Parse a single `deb`/`deb-src` source entry. Lines that don't fit
/// the grammar are dropped with a diagnostic.
pub fn parse_source_entry(line: &str) -> Option<RepoEntry> {
    let caps = match SOURCE_ENTRY.captures(line.trim()) {
        Some(caps) => caps,
        None => {
            warn!("Ignoring invalid source entry: {line}");
            return None;
        }
    };
    let kind = match &caps[1] {
        "deb-src" => RepoKind::DebSrc,
        _ => RepoKind::Deb,
    };
    let mut architectures = None;
    if let Some(options) = caps.get(2) {
        for option in options.as_str().split_whitespace() {
            if let Some(archs) = option.strip_prefix("arch=") {
                architectures =
                    Some(archs.split(',').map(|a| a.trim().to_string()).collect());
            }
        }
    }
    let components = caps
        .get(5)
        .map(|m| m.as_str().split_whitespace().map(|c| c.to_string()).collect())
        .unwrap_or_default();
    Some(RepoEntry {
        kind,
        url: caps[3].trim_end_matches('/').to_string(),
        distribution: caps[4].to_string(),
        components,
        architectures,
    })
}

/// Parse sources.list text, skipping blanks and `#` comments.
pub fn parse_source_list(text: &str) -> Vec<RepoEntry> {
    text.lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_source_entry)
        .collect()
}

/// The distribution-level Release stanza plus its hash tables.
#[derive(Clone, Debug, Default)]
pub struct ReleaseMeta {
    pub origin: Option<String>,
    pub label: Option<String>,
    pub codename: Option<String>,
    pub version: Option<String>,
    pub date: Option<String>,
    pub description: Option<String>,
    pub architectures: Vec<String>,
    pub components: Vec<String>,
    pub hash: Vec<HashEntry>,
}

impl ReleaseMeta {
    /// Hash rows whose path starts with the given prefix. Compressed
    /// variants of an index share its path prefix, so this returns the
    /// candidate set for one index file.
    pub fn rows_for<'a>(&'a self, prefix: &str) -> Vec<&'a HashEntry> {
        self.hash.iter().filter(|h| h.path.starts_with(prefix)).collect()
    }
}

fn parse_release(text: &str) -> Result<ReleaseMeta> {
    let stanza = parse_control(text)?
        .into_iter()
        .next()
        .ok_or_else(|| format_err!("Release file contains no stanza"))?;
    let mut meta = ReleaseMeta {
        origin: stanza.get("Origin").cloned(),
        label: stanza.get("Label").cloned(),
        codename: stanza.get("Codename").cloned(),
        version: stanza.get("Version").cloned(),
        date: stanza.get("Date").cloned(),
        description: stanza.get("Description").cloned(),
        architectures: stanza
            .get("Architectures")
            .map(|a| a.split_whitespace().map(|s| s.to_string()).collect())
            .unwrap_or_default(),
        components: stanza
            .get("Components")
            .map(|c| c.split_whitespace().map(|s| s.to_string()).collect())
            .unwrap_or_default(),
        hash: Vec::new(),
    };
    for (field, kind) in [("MD5Sum", "md5"), ("SHA1", "sha1"), ("SHA256", "sha256")] {
        let table = match stanza.get(field) {
            Some(table) => table,
            None => continue,
        };
        for line in table.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            // Rows that don't fit the `hash size path` shape are skipped
            let caps = match HASH_ROW.captures(line) {
                Some(caps) => caps,
                None => continue,
            };
            let size = match caps[2].parse() {
                Ok(size) => size,
                Err(_) => continue,
            };
            meta.hash.push(HashEntry {
                kind,
                hex: caps[1].to_string(),
                size,
                path: caps[3].to_string(),
            });
        }
    }
    Ok(meta)
}

/// One configured repository and, once loaded, its Release metadata.
pub struct Repository {
    pub entry: RepoEntry,
    pub info: Arc<RepoInfo>,
    pub release: Option<ReleaseMeta>,
}

impl Repository {
    pub fn new(entry: RepoEntry) -> Self {
        let info = Arc::new(RepoInfo {
            kind: entry.kind,
            url: entry.url.clone(),
            distribution: entry.distribution.clone(),
        });
        Repository {
            entry,
            info,
            release: None,
        }
    }

    fn base(&self) -> String {
        format!("{}/dists/{}", self.entry.url, self.entry.distribution)
    }

    pub async fn load_release(&mut self, fetcher: &Fetcher) -> Result<()> {
        let base = self.base();
        let text = fetcher
            .fetch_text(&base, "Release", &[])
            .await
            .with_context(|| format!("Failed to fetch Release for {base}"))?;
        let meta =
            parse_release(&text).with_context(|| format!("Failed to parse Release for {base}"))?;
        debug!(
            "{base}: {} {} ({} components, {} architectures)",
            meta.origin.as_deref().unwrap_or("unknown origin"),
            meta.codename
                .as_deref()
                .or(meta.version.as_deref())
                .unwrap_or(&self.entry.distribution),
            meta.components.len(),
            meta.architectures.len()
        );
        self.release = Some(meta);
        Ok(())
    }

    /// The components this entry selects, restricted to what the
    /// Release actually advertises.
    pub fn components(&self) -> Result<Vec<String>> {
        let release = self.release()?;
        Ok(self
            .entry
            .components
            .iter()
            .filter(|c| release.components.contains(c))
            .cloned()
            .collect())
    }

    /// Architectures to load, entry-filtered when an `[arch=...]` block
    /// was given.
    pub fn architectures(&self) -> Result<Vec<String>> {
        let release = self.release()?;
        Ok(match &self.entry.architectures {
            Some(archs) if !archs.is_empty() => archs
                .iter()
                .filter(|a| release.architectures.contains(a))
                .cloned()
                .collect(),
            _ => release.architectures.clone(),
        })
    }

    fn release(&self) -> Result<&ReleaseMeta> {
        self.release
            .as_ref()
            .ok_or_else(|| format_err!("Release for {} not loaded", self.base()))
    }

    /// Fetch every per-(component × architecture) index this entry
    /// selects and map its stanzas into package records.
    pub async fn fetch_indexes(&self, fetcher: &Fetcher) -> Result<Vec<PkgMeta>> {
        let release = self.release()?;
        let archives = match self.entry.kind {
            RepoKind::Deb => self
                .architectures()?
                .iter()
                .map(|a| format!("binary-{a}"))
                .collect(),
            RepoKind::DebSrc => vec!["source".to_string()],
        };
        let base = self.base();
        let mut jobs = Vec::new();
        for component in self.components()? {
            for archive in &archives {
                jobs.push(self.fetch_index(fetcher, release, &base, component.clone(), archive));
            }
        }
        let loaded = try_join_all(jobs).await?;
        Ok(loaded.into_iter().flatten().collect())
    }

    async fn fetch_index(
        &self,
        fetcher: &Fetcher,
        release: &ReleaseMeta,
        base: &str,
        component: String,
        archive: &str,
    ) -> Result<Vec<PkgMeta>> {
        let index = format!("{component}/{archive}");
        let fragment_name = format!("{index}/Release");
        let fragment = fetcher
            .fetch_text(base, &fragment_name, &release.rows_for(&fragment_name))
            .await
            .ok()
            .and_then(|text| parse_control(&text).ok())
            .and_then(|stanzas| stanzas.into_iter().next())
            .map(|stanza| ReleaseFragment {
                version: stanza.get("Version").cloned(),
                component: stanza.get("Component").cloned(),
                origin: stanza.get("Origin").cloned(),
                label: stanza.get("Label").cloned(),
                architecture: stanza.get("Architecture").cloned(),
                description: stanza.get("Description").cloned(),
            })
            .unwrap_or_default();

        let packages_name = format!("{index}/Packages");
        let text = fetcher
            .fetch_text(base, &packages_name, &release.rows_for(&packages_name))
            .await
            .with_context(|| format!("Failed to fetch {base}/{packages_name}"))?;
        let stanzas = parse_control(&text)
            .with_context(|| format!("Failed to parse {base}/{packages_name}"))?;
        Ok(stanzas
            .into_iter()
            .filter(|stanza| stanza.contains_key("Package"))
            .map(|stanza| self.to_meta(stanza, &fragment))
            .collect())
    }

    fn to_meta(&self, stanza: HashMap<String, String>, fragment: &ReleaseFragment) -> PkgMeta {
        let split_list = |value: Option<&String>| -> Vec<String> {
            value
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_default()
        };
        let mut pkg = PkgMeta::new(self.info.clone(), fragment.clone());
        pkg.name = stanza.get("Package").cloned().unwrap_or_default();
        pkg.source = stanza.get("Source").cloned();
        pkg.version = stanza.get("Version").cloned().unwrap_or_default();
        pkg.architecture = stanza.get("Architecture").cloned().unwrap_or_default();
        pkg.maintainer = stanza.get("Maintainer").cloned();
        pkg.priority = stanza.get("Priority").cloned();
        pkg.section = stanza.get("Section").cloned();
        pkg.filename = stanza.get("Filename").cloned();
        pkg.size = stanza
            .get("Size")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        pkg.hashes = PkgHashes {
            md5: stanza.get("MD5sum").cloned(),
            sha1: stanza.get("SHA1").cloned(),
            sha256: stanza.get("SHA256").cloned(),
            sha512: stanza.get("SHA512").cloned(),
        };
        pkg.description = stanza.get("Description").cloned();
        pkg.depends = split_list(stanza.get("Depends"));
        pkg.provides = split_list(stanza.get("Provides"));
        pkg
    }
}

/// Owns the configured repositories and drives the two-phase load:
/// every Release concurrently, then every index concurrently, then a
/// sequential merge into the pool.
#[derive(Default)]
pub struct RepoManager {
    repos: Vec<Repository>,
}

impl RepoManager {
    pub fn new() -> Self {
        RepoManager { repos: Vec::new() }
    }

    pub fn add(&mut self, entry: RepoEntry) {
        self.repos.push(Repository::new(entry));
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }

    pub fn repos(&self) -> &[Repository] {
        &self.repos
    }

    pub async fn load_releases(&mut self, fetcher: &Fetcher) -> Result<()> {
        try_join_all(self.repos.iter_mut().map(|repo| repo.load_release(fetcher))).await?;
        Ok(())
    }

    pub async fn load(&mut self, fetcher: &Fetcher, pool: &mut PkgPool) -> Result<()> {
        self.load_releases(fetcher).await?;
        let loaded =
            try_join_all(self.repos.iter().map(|repo| repo.fetch_indexes(fetcher))).await?;
        for pkg in loaded.into_iter().flatten() {
            pool.add(pkg);
        }
        Ok(())
    }
}
