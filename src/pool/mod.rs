use crate::types::PkgMeta;

/// The flattened package index across all loaded repositories.
///
/// Records keep their insertion order; every query is a linear scan in
/// that order, which is also the resolver's tie-break order. The index
/// position is the stable identity the resolver uses for its cycle
/// guard and dependency caches.
#[derive(Default)]
pub struct PkgPool {
    pkgs: Vec<PkgMeta>,
}

impl PkgPool {
    pub fn new() -> Self {
        PkgPool { pkgs: Vec::new() }
    }

    pub fn add(&mut self, meta: PkgMeta) -> usize {
        self.pkgs.push(meta);
        self.pkgs.len() - 1
    }

    pub fn get(&self, id: usize) -> Option<&PkgMeta> {
        self.pkgs.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &PkgMeta)> {
        self.pkgs.iter().enumerate()
    }

    pub fn len(&self) -> usize {
        self.pkgs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pkgs.is_empty()
    }
}
