//! The IP Descriptor data model: everything the cache loads from one
//! `ip.yml` file, plus the arena-index types that let dependency and DUT
//! references avoid owning cycles (spec.md §9 Design Notes).

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::simulator::Simulator;

/// An index into `cache::IpCache`'s arena. Cheap to copy, never dangling
/// once resolution has run, unlike a shared/cyclic handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IpId(pub usize);

/// Where an IP's descriptor came from, collapsing the `@global`/`@fsoc`
/// vendor sentinels of the original format into a proper enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpOrigin {
    Project,
    Global,
    FuseSoc,
}

/// One entry in an IP's dependency list, before or after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyEdge {
    Unresolved { vendor: Option<String>, name: String },
    Resolved(IpId),
}

impl DependencyEdge {
    pub fn name(&self) -> &str {
        match self {
            DependencyEdge::Unresolved { name, .. } => name,
            DependencyEdge::Resolved(_) => {
                unreachable!("name() on a resolved edge requires the cache to look it up")
            }
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, DependencyEdge::Resolved(_))
    }
}

/// What the DUT binds to: another IP, or an external FuseSoC core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DutBinding {
    Ip(DependencyEdge),
    FuseSocCore { name: String, full_name: String },
}

/// The IP's HDL source description.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HdlSource {
    #[serde(default)]
    pub top_constructs: Vec<String>,
    #[serde(default)]
    pub top_files: Vec<PathBuf>,
    #[serde(default)]
    pub include_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub tests_path: Option<PathBuf>,
    #[serde(default)]
    pub shared_objects: Vec<PathBuf>,
    #[serde(default)]
    pub prebuilt_filelists: HashMap<Simulator, PathBuf>,
    #[serde(default)]
    pub test_name_template: Option<String>,
}

/// What kind of IP this is, beyond a plain source-and-deps bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IpSubType {
    Normal,
    VivadoProject,
    Dv,
}

impl Default for IpSubType {
    fn default() -> Self {
        IpSubType::Normal
    }
}

#[derive(Debug, Clone, Default)]
pub struct Flags {
    pub is_global: bool,
    pub is_encrypted: bool,
    pub is_local: bool,
    pub has_dut: bool,
    pub sub_type: IpSubType,
}

/// Per-simulator compiled/elaborated state. A fixed six-entry array
/// indexed by `Simulator`'s position in `Simulator::ALL`, not a
/// `HashMap`, since the key domain is the closed six-variant set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimState {
    flags: [bool; 6],
}

impl SimState {
    fn index(sim: Simulator) -> usize {
        Simulator::ALL.iter().position(|s| *s == sim).expect("Simulator::ALL is exhaustive")
    }

    pub fn get(&self, sim: Simulator) -> bool {
        self.flags[Self::index(sim)]
    }

    pub fn set(&mut self, sim: Simulator, value: bool) {
        self.flags[Self::index(sim)] = value;
    }
}

/// One IP descriptor, as loaded from `ip.yml` (or a FuseSoC `.eda.yml`, via
/// `fsoc::into_ip`).
#[derive(Debug, Clone)]
pub struct Ip {
    pub origin: IpOrigin,
    pub vendor: Option<String>,
    pub name: String,
    pub source_path: PathBuf,
    pub scripts_path: Option<PathBuf>,
    pub dependencies: Vec<DependencyEdge>,
    pub dut: Option<DutBinding>,
    pub hdl: HdlSource,
    pub flags: Flags,
    pub compiled: SimState,
    pub elaborated: SimState,
}

impl Ip {
    /// The `<vendor>/<name>` or bare `<name>` identifier used as a job
    /// history key and in working-directory names.
    pub fn identifier(&self) -> String {
        match &self.vendor {
            Some(vendor) => format!("{vendor}/{}", self.name),
            None => self.name.clone(),
        }
    }

    pub fn qualifies_as_dv(&self) -> bool {
        matches!(self.flags.sub_type, IpSubType::Dv)
    }
}

/// On-disk shape of `ip.yml`, deserialized directly and then converted into
/// an `Ip` by `cache::IpCache::scan` once dependency edges are known to be
/// plain strings (resolution to `IpId` happens in a later pass).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawIp {
    #[serde(default)]
    pub vendor: Option<String>,
    pub name: String,
    #[serde(default)]
    pub source_path: Option<PathBuf>,
    #[serde(default)]
    pub scripts_path: Option<PathBuf>,
    #[serde(default)]
    pub dependencies: Vec<RawDependency>,
    #[serde(default)]
    pub dut: Option<RawDut>,
    #[serde(default)]
    pub hdl_source: HdlSource,
    #[serde(default)]
    pub is_encrypted: bool,
    #[serde(default)]
    pub sub_type: IpSubType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDependency {
    #[serde(default)]
    pub vendor: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawDut {
    Ip { vendor: Option<String>, name: String },
    FuseSocCore { fsoc_core: String, full_name: String },
}

impl RawIp {
    /// Converts into an `Ip` whose dependency/DUT edges are still
    /// unresolved `name`/`vendor` pairs; `cache::IpCache` resolves them to
    /// `IpId`s in its second loading pass.
    pub fn into_ip(self, origin: IpOrigin, source_path: PathBuf) -> Ip {
        let dependencies = self
            .dependencies
            .into_iter()
            .map(|d| DependencyEdge::Unresolved { vendor: d.vendor, name: d.name })
            .collect();

        let dut = self.dut.map(|d| match d {
            RawDut::Ip { vendor, name } => {
                DutBinding::Ip(DependencyEdge::Unresolved { vendor, name })
            }
            RawDut::FuseSocCore { fsoc_core, full_name } => {
                DutBinding::FuseSocCore { name: fsoc_core, full_name }
            }
        });

        Ip {
            origin,
            vendor: self.vendor,
            name: self.name,
            source_path: self.source_path.unwrap_or(source_path),
            scripts_path: self.scripts_path,
            dependencies,
            flags: Flags {
                is_global: matches!(origin, IpOrigin::Global),
                is_encrypted: self.is_encrypted,
                is_local: matches!(origin, IpOrigin::Project),
                has_dut: dut.is_some(),
                sub_type: self.sub_type,
            },
            dut,
            hdl: self.hdl_source,
            compiled: SimState::default(),
            elaborated: SimState::default(),
        }
    }
}
