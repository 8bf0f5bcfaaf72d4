use super::ResolvedPkg;
use crate::pool::PkgPool;

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::HashSet;

lazy_static! {
    static ref FORMAT_KEY: Regex = Regex::new(r"\{\s*([\w.]+)\s*\}").unwrap();
}

#[derive(Clone, Debug)]
pub struct PrintOpts {
    pub format: String,
    pub indent: usize,
    /// When set, a node printed once is never repeated anywhere in the
    /// tree; when unset, a node may reappear on a sibling branch after
    /// its subtree finishes.
    pub unique: bool,
}

impl Default for PrintOpts {
    fn default() -> Self {
        PrintOpts {
            format: "{package}:{architecture} ({selector})".to_string(),
            indent: 2,
            unique: true,
        }
    }
}

/// Expand a `{key}` template against a resolved package. Keys walk a
/// fixed accessor set; unknown keys render as the empty string.
pub fn format_message(pool: &PkgPool, node: &ResolvedPkg, format: &str) -> String {
    FORMAT_KEY
        .replace_all(format, |caps: &Captures| {
            lookup(pool, node, &caps[1]).unwrap_or_default()
        })
        .into_owned()
}

fn lookup(pool: &PkgPool, node: &ResolvedPkg, key: &str) -> Option<String> {
    match key {
        "package" => return Some(node.package.clone()),
        "version" => return Some(node.version.clone()),
        "architecture" => return Some(node.architecture.clone()),
        "selector" => return Some(node.selector.clone()),
        _ => (),
    }
    // The remaining accessors live on the pool record; placeholders have
    // none of them.
    let meta = pool.get(node.id?)?;
    match key {
        "source" => meta.source.clone(),
        "maintainer" => meta.maintainer.clone(),
        "priority" => meta.priority.clone(),
        "section" => meta.section.clone(),
        "filename" => meta.filename.clone(),
        "size" => Some(meta.size.to_string()),
        "description" => meta.description.clone(),
        "hash.md5" => meta.hashes.md5.clone(),
        "hash.sha1" => meta.hashes.sha1.clone(),
        "hash.sha256" => meta.hashes.sha256.clone(),
        "hash.sha512" => meta.hashes.sha512.clone(),
        "metadata.version" => meta.release.version.clone(),
        "metadata.component" => meta.release.component.clone(),
        "metadata.origin" => meta.release.origin.clone(),
        "metadata.label" => meta.release.label.clone(),
        "metadata.architecture" => meta.release.architecture.clone(),
        "metadata.description" => meta.release.description.clone(),
        "repository.url" => Some(meta.repo.url.clone()),
        "repository.distribution" => Some(meta.repo.distribution.clone()),
        "repository.type" => Some(meta.repo.kind.as_str().to_string()),
        _ => None,
    }
}

/// Render a dependency tree depth-first, one line per node, indentation
/// growing with depth.
pub fn render_tree(pool: &PkgPool, root: &ResolvedPkg, opts: &PrintOpts) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    render(pool, root, 0, &mut seen, &mut out, opts);
    out
}

pub fn print_tree(pool: &PkgPool, root: &ResolvedPkg, opts: &PrintOpts) {
    for line in render_tree(pool, root, opts) {
        println!("{line}");
    }
}

fn render(
    pool: &PkgPool,
    node: &ResolvedPkg,
    depth: usize,
    seen: &mut HashSet<String>,
    out: &mut Vec<String>,
    opts: &PrintOpts,
) {
    out.push(format!(
        "{}{}",
        " ".repeat(opts.indent * depth),
        format_message(pool, node, &opts.format)
    ));
    let deps = match node.id.and_then(|id| pool.get(id)).and_then(|p| p.dependencies()) {
        Some(deps) => deps,
        None => return,
    };
    for dep in deps {
        let key = format!("{}:{}:{}", dep.package, dep.architecture, dep.version);
        if seen.insert(key.clone()) {
            render(pool, dep, depth + 1, seen, out, opts);
            if !opts.unique {
                seen.remove(&key);
            }
        }
    }
}
