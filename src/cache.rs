//! The IP Cache & Resolver: owns every IP descriptor for the process
//! lifetime in a flat arena, keyed by `(vendor, name)`, and resolves
//! dependency/DUT edges to `IpId`s in a second pass after loading.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::ip::{DependencyEdge, DutBinding, Ip, IpId, IpOrigin, RawIp};

/// The in-memory IP registry. Everything outside this module refers to
/// IPs by `IpId`; only the cache ever indexes into its own arena directly.
#[derive(Debug, Default)]
pub struct IpCache {
    arena: Vec<Ip>,
    by_key: HashMap<(Option<String>, String), IpId>,
    by_name: HashMap<String, Vec<IpId>>,
}

impl IpCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walks `root` for `ip.yml` files, parses each, and inserts it into
    /// the arena unresolved. Call [`IpCache::resolve_all`] afterwards to
    /// turn dependency/DUT edges into `IpId`s, mirroring the original's
    /// `scan_and_load_ip_metadata()` followed by on-demand resolution.
    pub fn scan(&mut self, root: &Path, origin: IpOrigin) -> Result<()> {
        for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
            if entry.file_name() != "ip.yml" {
                continue;
            }
            let contents = std::fs::read_to_string(entry.path())?;
            let raw: RawIp = serde_yaml::from_str(&contents).map_err(|e| {
                Error::invalid_descriptor(entry.path(), format!("failed to parse ip.yml: {e}"))
            })?;
            let source_path = entry.path().parent().unwrap_or(root).to_path_buf();
            let ip = raw.into_ip(origin, source_path);
            self.insert(ip);
        }
        Ok(())
    }

    fn insert(&mut self, ip: Ip) -> IpId {
        let id = IpId(self.arena.len());
        self.by_key.insert((ip.vendor.clone(), ip.name.clone()), id);
        self.by_name.entry(ip.name.clone()).or_default().push(id);
        self.arena.push(ip);
        id
    }

    pub fn get_by_id(&self, id: IpId) -> &Ip {
        &self.arena[id.0]
    }

    pub fn get_by_id_mut(&mut self, id: IpId) -> &mut Ip {
        &mut self.arena[id.0]
    }

    /// Resolve a `(vendor, name)` lookup; fails with `NotFound` when
    /// `required` and absent.
    pub fn get(&self, vendor: Option<&str>, name: &str, required: bool) -> Result<Option<IpId>> {
        let key = (vendor.map(str::to_string), name.to_string());
        match self.by_key.get(&key) {
            Some(id) => Ok(Some(*id)),
            None if required => {
                Err(Error::not_found(match vendor {
                    Some(v) => format!("{v}/{name}"),
                    None => name.to_string(),
                }))
            }
            None => Ok(None),
        }
    }

    /// Resolve a name-only lookup; fails with `Ambiguous` when more than
    /// one IP shares that name, or `NotFound` when none do.
    pub fn get_anon(&self, name: &str, required: bool) -> Result<Option<IpId>> {
        match self.by_name.get(name).map(Vec::as_slice) {
            Some([single]) => Ok(Some(*single)),
            Some([_, ..]) => Err(Error::ambiguous(name)),
            _ if required => Err(Error::not_found(name)),
            _ => Ok(None),
        }
    }

    /// Resolve every `DependencyEdge::Unresolved` and `DutBinding::Ip`
    /// edge in the arena to a concrete `IpId`. Must run once, after every
    /// `scan()` call has populated the arena.
    pub fn resolve_all(&mut self) -> Result<()> {
        for idx in 0..self.arena.len() {
            let resolved_deps = self.resolve_edges(&self.arena[idx].dependencies)?;
            self.arena[idx].dependencies = resolved_deps;

            if let Some(DutBinding::Ip(edge)) = &self.arena[idx].dut {
                let resolved = self.resolve_edge(edge)?;
                self.arena[idx].dut = Some(DutBinding::Ip(DependencyEdge::Resolved(resolved)));
            }
        }
        Ok(())
    }

    fn resolve_edges(&self, edges: &[DependencyEdge]) -> Result<Vec<DependencyEdge>> {
        edges.iter().map(|e| self.resolve_edge(e).map(DependencyEdge::Resolved)).collect()
    }

    fn resolve_edge(&self, edge: &DependencyEdge) -> Result<IpId> {
        match edge {
            DependencyEdge::Resolved(id) => Ok(*id),
            DependencyEdge::Unresolved { vendor, name } => match vendor {
                Some(v) => self.get(Some(v), name, true)?.ok_or_else(|| Error::not_found(name)),
                None => self.get_anon(name, true)?.ok_or_else(|| Error::not_found(name)),
            },
        }
    }

    /// Post-order dependency ordering: for every dependency D of `ip`, D
    /// precedes `ip` in the returned sequence. Ties are broken by
    /// descriptor load order. `uvm` is always excluded (simulator-
    /// provided), matching `cmp_dependencies()`'s `if dep.name == "uvm":
    /// continue` in the original.
    pub fn ordered_deps(&self, ip: IpId) -> Result<Vec<IpId>> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut in_progress = HashSet::new();
        self.visit(ip, &mut order, &mut visited, &mut in_progress)?;
        // `ip` itself is appended by the recursion; callers that want only
        // the dependencies, not the IP itself, should drop the last entry.
        order.pop();
        Ok(order)
    }

    fn visit(
        &self,
        id: IpId,
        order: &mut Vec<IpId>,
        visited: &mut HashSet<IpId>,
        in_progress: &mut HashSet<IpId>,
    ) -> Result<()> {
        if visited.contains(&id) {
            return Ok(());
        }
        if !in_progress.insert(id) {
            return Err(Error::cyclic_dependency(self.arena[id.0].identifier()));
        }

        for edge in &self.arena[id.0].dependencies {
            if edge.is_resolved() {
                let dep_id = match edge {
                    DependencyEdge::Resolved(id) => *id,
                    DependencyEdge::Unresolved { .. } => unreachable!("edges are resolved by now"),
                };
                if self.arena[dep_id.0].name == "uvm" {
                    continue;
                }
                self.visit(dep_id, order, visited, in_progress)?;
            }
        }

        in_progress.remove(&id);
        visited.insert(id);
        order.push(id);
        Ok(())
    }

    /// Whether `ip` and every transitive dependency (excluding `uvm`) is
    /// marked compiled for `sim`.
    pub fn is_ip_installed(&self, vendor: Option<&str>, name: &str) -> bool {
        self.get(vendor, name, false).ok().flatten().is_some()
    }

    /// Dependencies of `ip` (excluding `uvm`) that are not present in the
    /// cache at all, i.e. never installed.
    pub fn get_deps_to_install(&self, ip: IpId) -> Vec<String> {
        self.arena[ip.0]
            .dependencies
            .iter()
            .filter_map(|edge| match edge {
                DependencyEdge::Resolved(_) => None,
                DependencyEdge::Unresolved { vendor, name } if name != "uvm" => {
                    debug!("dependency '{}' of '{}' is not installed", name, self.arena[ip.0].name);
                    Some(match vendor {
                        Some(v) => format!("{v}/{name}"),
                        None => name.clone(),
                    })
                }
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ip::{Flags, HdlSource, IpSubType, SimState};
    use std::path::PathBuf;

    fn bare_ip(vendor: Option<&str>, name: &str, deps: Vec<DependencyEdge>) -> Ip {
        Ip {
            origin: IpOrigin::Project,
            vendor: vendor.map(str::to_string),
            name: name.to_string(),
            source_path: PathBuf::from("/proj").join(name),
            scripts_path: None,
            dependencies: deps,
            dut: None,
            hdl: HdlSource::default(),
            flags: Flags { sub_type: IpSubType::Normal, ..Default::default() },
            compiled: SimState::default(),
            elaborated: SimState::default(),
        }
    }

    #[test]
    fn ordered_deps_places_dependencies_before_dependents() {
        let mut cache = IpCache::new();
        let a = cache.insert(bare_ip(Some("acme"), "a", vec![]));
        let b = cache.insert(bare_ip(
            Some("acme"),
            "b",
            vec![DependencyEdge::Resolved(a)],
        ));
        let order = cache.ordered_deps(b).unwrap();
        assert_eq!(order, vec![a]);
    }

    #[test]
    fn ordered_deps_excludes_uvm() {
        let mut cache = IpCache::new();
        let uvm = cache.insert(bare_ip(None, "uvm", vec![]));
        let top = cache.insert(bare_ip(
            Some("acme"),
            "top",
            vec![DependencyEdge::Resolved(uvm)],
        ));
        assert!(cache.ordered_deps(top).unwrap().is_empty());
    }

    #[test]
    fn cyclic_dependency_is_detected() {
        let mut cache = IpCache::new();
        let a_id = IpId(0);
        let b_id = IpId(1);
        cache.insert(bare_ip(Some("acme"), "a", vec![DependencyEdge::Resolved(b_id)]));
        cache.insert(bare_ip(Some("acme"), "b", vec![DependencyEdge::Resolved(a_id)]));
        assert!(cache.ordered_deps(a_id).is_err());
    }

    #[test]
    fn get_anon_fails_on_ambiguous_name() {
        let mut cache = IpCache::new();
        cache.insert(bare_ip(Some("acme"), "uart", vec![]));
        cache.insert(bare_ip(Some("other"), "uart", vec![]));
        assert!(matches!(cache.get_anon("uart", true), Err(Error::Ambiguous(_))));
    }

    #[test]
    fn get_anon_succeeds_on_unique_name() {
        let mut cache = IpCache::new();
        let id = cache.insert(bare_ip(Some("acme"), "uart", vec![]));
        assert_eq!(cache.get_anon("uart", true).unwrap(), Some(id));
    }
}
