use crate::fetch::Fetcher;
use crate::repo::Repository;
use crate::types::RepoKind;
use crate::{debug, warn};

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref HIT_KEY: Regex = Regex::new(r"\{\s*([\w.]+)\s*\}").unwrap();
}

/// One path match from a Contents index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentHit {
    pub package: String,
    pub section: String,
    pub path: String,
    pub architecture: String,
}

struct ContentsIndex {
    architecture: String,
    data: String,
}

/// Loaded `Contents-<arch>` indexes, searchable apt-file style.
#[derive(Default)]
pub struct ContentsDb {
    indexes: Vec<ContentsIndex>,
}

impl ContentsDb {
    /// Fetch the Contents index for every (component × architecture) the
    /// configured repositories select. Repositories without Contents
    /// indexes are skipped with a diagnostic.
    pub async fn load(repos: &[Repository], fetcher: &Fetcher) -> Result<Self> {
        let mut db = ContentsDb::default();
        for repo in repos {
            if repo.entry.kind == RepoKind::DebSrc {
                debug!("Skipping Contents for source entry {}", repo.entry.url);
                continue;
            }
            let release = match &repo.release {
                Some(release) => release,
                None => continue,
            };
            let base = format!("{}/dists/{}", repo.entry.url, repo.entry.distribution);
            for component in repo.components()? {
                for arch in repo.architectures()? {
                    let name = format!("{component}/Contents-{arch}");
                    let rows = release.rows_for(&name);
                    if rows.is_empty() {
                        warn!("No Contents index for {base}/{name}");
                        continue;
                    }
                    match fetcher.fetch_text(&base, &name, &rows).await {
                        Ok(data) => db.indexes.push(ContentsIndex {
                            architecture: arch,
                            data,
                        }),
                        Err(e) => {
                            warn!("Failed to fetch {base}/{name}: {e}");
                        }
                    }
                }
            }
        }
        Ok(db)
    }

    /// Scan every loaded index for paths matching the pattern. `^` and
    /// `$` anchor the path; otherwise the match is a substring match.
    pub fn find(&self, pattern: &str) -> Result<Vec<ContentHit>> {
        let regex = build_path_regex(pattern)?;
        let mut hits = Vec::new();
        for index in &self.indexes {
            for line in index.data.lines() {
                let caps = match regex.captures(line.trim_end()) {
                    Some(caps) => caps,
                    None => continue,
                };
                let path = caps[1].to_string();
                for target in caps[2].split(',') {
                    // Target column is `section/package`
                    let (section, package) = match target.split_once('/') {
                        Some(pair) => pair,
                        None => continue,
                    };
                    hits.push(ContentHit {
                        package: package.to_string(),
                        section: section.to_string(),
                        path: path.clone(),
                        architecture: index.architecture.clone(),
                    });
                }
            }
        }
        Ok(hits)
    }
}

/// Expand a `{key}` template against a content hit. Unknown keys render
/// as the empty string.
pub fn format_hit(hit: &ContentHit, format: &str) -> String {
    HIT_KEY
        .replace_all(format, |caps: &Captures| match &caps[1] {
            "package" => hit.package.clone(),
            "section" => hit.section.clone(),
            "path" => hit.path.clone(),
            "architecture" => hit.architecture.clone(),
            _ => String::new(),
        })
        .into_owned()
}

fn build_path_regex(pattern: &str) -> Result<Regex> {
    let mut pattern = pattern;
    // Unanchored searches float inside the path column; `\S` keeps the
    // greedy fill from swallowing the padding before the target column.
    let mut begin = r"\S*";
    let mut end = r"\S*";
    if let Some(stripped) = pattern.strip_suffix('$') {
        pattern = stripped;
        end = "";
    }
    if let Some(stripped) = pattern.strip_prefix('^') {
        pattern = stripped;
        begin = "";
    }
    Regex::new(&format!(r"^({begin}(?:{pattern}){end})\s+(\S+)$"))
        .with_context(|| format!("Invalid search pattern {pattern}"))
}

#[cfg(test)]
mod test {
    use super::*;

    fn db() -> ContentsDb {
        ContentsDb {
            indexes: vec![ContentsIndex {
                architecture: "amd64".to_string(),
                data: "usr/bin/foo                         utils/foo\n\
                       usr/bin/foobar                      utils/foobar,admin/foobar-extra\n\
                       usr/share/doc/foo/README            doc/foo\n"
                    .to_string(),
            }],
        }
    }

    #[test]
    fn substring_match() {
        let hits = db().find("bin/foo").unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].package, "foo");
        assert_eq!(hits[0].section, "utils");
        assert_eq!(hits[0].path, "usr/bin/foo");
        assert_eq!(hits[0].architecture, "amd64");
        // Comma-separated targets expand to one hit each
        assert_eq!(hits[2].package, "foobar-extra");
        assert_eq!(hits[2].section, "admin");
    }

    #[test]
    fn anchors_respected() {
        let hits = db().find("bin/foo$").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "usr/bin/foo");

        let hits = db().find("^usr/share").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].package, "foo");
        assert_eq!(hits[0].section, "doc");

        assert!(db().find("^usr/bin/foo$").unwrap().len() == 1);
    }

    #[test]
    fn hit_template() {
        let hit = ContentHit {
            package: "foo".to_string(),
            section: "utils".to_string(),
            path: "usr/bin/foo".to_string(),
            architecture: "amd64".to_string(),
        };
        assert_eq!(
            format_hit(&hit, "{package}:{architecture}: {path}"),
            "foo:amd64: usr/bin/foo"
        );
        assert_eq!(format_hit(&hit, "{section}{nope}"), "utils");
    }
}
