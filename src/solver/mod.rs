pub mod format;

use crate::pool::PkgPool;
use crate::types::{test_version, PkgSelector};

use std::collections::HashSet;

/// Outcome of resolving one selector: a thin wrapper over a pool record
/// (or a synthesized placeholder when nothing matched and the caller
/// asked for one). The `selector` field describes how the record was
/// reached and lives on the wrapper, never on the shared record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedPkg {
    pub selector: String,
    /// Pool id of the matched record; `None` marks a missing-dependency
    /// placeholder, which carries no repository or hash data.
    pub id: Option<usize>,
    pub package: String,
    pub version: String,
    pub architecture: String,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ResolveOpts {
    /// Recursively resolve `Depends` and cache the subtree on each
    /// record reached.
    pub recursive: bool,
    /// Synthesize placeholder records for unresolvable selectors instead
    /// of returning nothing.
    pub missing: bool,
}

/// The dependency resolution engine. Works over a fully populated,
/// no-longer-mutated pool.
pub struct Solver<'a> {
    pool: &'a PkgPool,
    default_arch: Option<String>,
}

impl<'a> Solver<'a> {
    pub fn new(pool: &'a PkgPool, default_arch: Option<String>) -> Self {
        Solver { pool, default_arch }
    }

    /// Resolve a selector expression. Alternatives are tried in declared
    /// order and the first hit wins; `None` means no alternative matched
    /// (and `missing` was off).
    pub fn resolve(&self, selector: &str, opts: ResolveOpts) -> Option<ResolvedPkg> {
        let mut queue = HashSet::new();
        self.resolve_text(selector, &mut queue, None, opts)
    }

    fn resolve_text(
        &self,
        text: &str,
        queue: &mut HashSet<usize>,
        parent_arch: Option<&str>,
        opts: ResolveOpts,
    ) -> Option<ResolvedPkg> {
        for sel in crate::types::parse_selectors(text) {
            if let Some(pkg) = self.resolve_selector(&sel, queue, parent_arch, opts) {
                return Some(pkg);
            }
        }
        None
    }

    fn resolve_selector(
        &self,
        sel: &PkgSelector,
        queue: &mut HashSet<usize>,
        parent_arch: Option<&str>,
        opts: ResolveOpts,
    ) -> Option<ResolvedPkg> {
        // Architecture affinity: the selector's own pin wins, then the
        // architecture inherited from the parent, then the global default.
        let preferred = sel
            .architecture
            .as_deref()
            .or(parent_arch)
            .or(self.default_arch.as_deref());
        let scope_any = sel.architecture.as_deref().unwrap_or("any") == "any";

        let mut candidates: Vec<usize> = self
            .pool
            .iter()
            .filter(|(_, p)| {
                let name_match = p.name == sel.package
                    || p.parsed_provides().iter().any(|pr| pr.package == sel.package);
                name_match && (scope_any || Some(p.architecture.as_str()) == preferred)
            })
            .map(|(id, _)| id)
            .collect();

        // Unpinned selector: hoist records on the preferred architecture
        // to the front, keeping scan order within each group. The others
        // stay eligible as fallbacks.
        if scope_any {
            if let Some(preferred) = preferred {
                candidates.sort_by_key(|&id| {
                    self.pool.get(id).map_or(true, |p| p.architecture != preferred)
                });
            }
        }

        // First candidate satisfying the version constraint wins, either
        // with its own version or through a matching Provides entry.
        let sel_ver = sel.parsed_version();
        let found = candidates.into_iter().find(|&id| {
            let p = match self.pool.get(id) {
                Some(p) => p,
                None => return false,
            };
            test_version(p.parsed_version(), sel.op, sel_ver)
                || p.parsed_provides().iter().any(|pr| {
                    pr.package == sel.package
                        && test_version(pr.parsed_version(), sel.op, sel_ver)
                })
        });

        if let Some(id) = found {
            // A candidate still in flight means this edge closes a cycle;
            // the edge is dropped entirely rather than recorded unexpanded.
            if opts.recursive && queue.contains(&id) {
                return None;
            }
            let pkg = self.pool.get(id)?;
            if opts.recursive && pkg.dependencies.get().is_none() {
                queue.insert(id);
                // "all" packages take over the caller's architecture
                let child_arch = if pkg.architecture == "all" {
                    parent_arch
                } else {
                    Some(pkg.architecture.as_str())
                };
                let deps: Vec<ResolvedPkg> = pkg
                    .depends
                    .iter()
                    .filter_map(|d| self.resolve_text(d, queue, child_arch, opts))
                    .collect();
                // A concurrent pass may have claimed the cell first; its
                // list stands and ours is discarded.
                let _ = pkg.dependencies.set(deps);
                queue.remove(&id);
            }
            return Some(ResolvedPkg {
                selector: format!("={}", pkg.version),
                id: Some(id),
                package: pkg.name.clone(),
                version: pkg.version.clone(),
                architecture: pkg.architecture.clone(),
            });
        }

        if opts.missing {
            let version = sel.version.clone().unwrap_or_else(|| "any".to_string());
            let op = sel.op.map(|o| o.as_str()).unwrap_or("=");
            return Some(ResolvedPkg {
                selector: format!("{op}{version}"),
                id: None,
                package: sel.package.clone(),
                version,
                architecture: sel
                    .architecture
                    .clone()
                    .unwrap_or_else(|| "missing".to_string()),
            });
        }

        None
    }
}
