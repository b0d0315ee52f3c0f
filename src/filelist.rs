//! The Filelist Synthesizer: produces a filesystem path to a filelist a
//! simulator's front end can consume, either by rewriting an IP's
//! prebuilt filelist or by rendering a per-simulator template.
//!
//! Template rendering follows the `tera` idiom shown in the pack's
//! regression-CI generator reference (one `Tera` instance built once, one
//! `Context` per render, `render(name, &context)`). The
//! `${MIO_<IPNAME>_SRC_PATH}` placeholder is left as literal template
//! output for simulators that resolve it via environment substitution at
//! tool-invocation time; only the Metrics (cloud) branch pre-resolves
//! directories to project-relative paths at render time, mirroring
//! `eal.py::compile_ip`'s `os.path.relpath` call in that branch.

use std::path::{Path, PathBuf};

use tera::{Context, Tera};

use crate::error::{Error, Result};
use crate::ip::Ip;
use crate::job::SimulationJob;
use crate::simulator::Simulator;

pub struct FilelistSynthesizer {
    tera: Tera,
}

/// This crate's own template set, used whenever a project does not supply
/// (or override) a `templates/` directory of its own.
const BUNDLED_TEMPLATES_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/templates");

impl FilelistSynthesizer {
    /// Compiles every `*.j2` template under `templates_dir` once, falling
    /// back to the bundled template set when a project supplies no
    /// overriding templates of its own (a bare `glob` over a directory that
    /// does not exist, or that exists but is empty, yields zero matches
    /// rather than an error, so that case must be detected explicitly).
    pub fn new(templates_dir: &Path) -> Result<Self> {
        let mut tera = Self::load_from(templates_dir)?;
        if tera.get_template_names().next().is_none() {
            tera = Self::load_from(Path::new(BUNDLED_TEMPLATES_DIR))?;
        }
        Ok(Self { tera })
    }

    fn load_from(dir: &Path) -> Result<Tera> {
        let glob = dir.join("**/*.j2");
        Tera::new(glob.to_str().ok_or_else(|| {
            Error::template_failure("templates directory path is not valid UTF-8")
        })?)
        .map_err(|e| Error::template_failure(e.to_string()))
    }

    /// Produces the filelist path for one dependency IP being compiled
    /// under `sim`, for `job`.
    pub fn synthesize(
        &self,
        ip: &Ip,
        sim: Simulator,
        job: &SimulationJob,
        project_root: &Path,
        uvm_home: Option<&Path>,
        out_path: &Path,
    ) -> Result<PathBuf> {
        if let Some(prebuilt) = ip.hdl.prebuilt_filelists.get(&sim) {
            return self.rewrite_prebuilt(ip, sim, prebuilt, project_root);
        }

        let rendered = self.render_dependency(ip, sim, job, project_root, uvm_home)?;
        std::fs::create_dir_all(out_path.parent().unwrap_or(Path::new(".")))?;
        std::fs::write(out_path, rendered)?;
        Ok(out_path.to_path_buf())
    }

    /// Resolves the on-disk filelist path `eal.py::get_ip_flist_path` would
    /// report for a prebuilt (already-supplied) filelist. Encrypted IPs
    /// keep their filelist beside a simulator-suffixed source sibling
    /// directory (`<src_path>.<sim>/`, since encrypted sources are vendored
    /// per-simulator); the Metrics (cloud) simulator additionally needs the
    /// path project-relative, since its compile sandbox has no concept of
    /// the project's absolute filesystem layout. Global and local IPs need
    /// neither adjustment.
    fn rewrite_prebuilt(
        &self,
        ip: &Ip,
        sim: Simulator,
        prebuilt: &Path,
        project_root: &Path,
    ) -> Result<PathBuf> {
        let mut path = prebuilt.to_path_buf();
        if ip.flags.is_encrypted {
            path = encrypted_sibling(&path, sim);
        }
        if sim == Simulator::Metrics {
            path = relative_to(&path, project_root);
        }
        Ok(path)
    }

    fn render_dependency(
        &self,
        ip: &Ip,
        sim: Simulator,
        job: &SimulationJob,
        project_root: &Path,
        uvm_home: Option<&Path>,
    ) -> Result<String> {
        if ip.hdl.top_files.is_empty() {
            return Err(Error::invalid_descriptor(&ip.source_path, "IP declares no top-files"));
        }
        if ip.hdl.include_dirs.is_empty() && ip.hdl.top_files.iter().all(|f| f.parent().is_none()) {
            return Err(Error::invalid_descriptor(
                &ip.source_path,
                "IP declares no include directories",
            ));
        }

        let mut context = Context::new();
        context.insert("target", &ip.identifier());
        context.insert("defines", &render_defines(sim, &job.cmp_args));
        context.insert("include_dirs", &self.source_dirs(ip, sim, project_root));
        context.insert("top_files", &ip.hdl.top_files);
        context.insert("is_dv", &ip.qualifies_as_dv());
        context.insert("uvm_dir", &self.uvm_source_dir(sim, uvm_home, project_root));

        let template_name = format!("{}.flist.j2", sim.short_code());
        self.tera
            .render(&template_name, &context)
            .map_err(|e| Error::template_failure(format!("{template_name}: {e}")))
    }

    /// Renders the master filelist for a target IP: its own filelist plus
    /// one entry per already-synthesized dependency filelist, in
    /// dependency order. Vivado-project IPs instead emit a project file,
    /// since Vivado's "project" sub-type has no flat filelist concept.
    pub fn synthesize_master(
        &self,
        target: &Ip,
        dependency_filelists: &[PathBuf],
        sim: Simulator,
        out_path: &Path,
    ) -> Result<PathBuf> {
        let mut context = Context::new();
        context.insert("target", &target.identifier());
        context.insert("dependency_filelists", dependency_filelists);
        context.insert("is_vivado_project", &matches!(target.flags.sub_type, crate::ip::IpSubType::VivadoProject));

        let template_name = format!("{}.mflist.j2", sim.short_code());
        let rendered = self
            .tera
            .render(&template_name, &context)
            .map_err(|e| Error::template_failure(format!("{template_name}: {e}")))?;

        std::fs::create_dir_all(out_path.parent().unwrap_or(Path::new(".")))?;
        std::fs::write(out_path, &rendered)?;
        Ok(out_path.to_path_buf())
    }

    /// The directory tokens a template uses for `ip`'s include/source
    /// directories: an environment-variable placeholder for local-path
    /// simulators, or a project-relative path for Metrics.
    fn source_dirs(&self, ip: &Ip, sim: Simulator, project_root: &Path) -> Vec<String> {
        if sim == Simulator::Metrics {
            ip.hdl
                .include_dirs
                .iter()
                .map(|d| relative_to(d, project_root).to_string_lossy().into_owned())
                .collect()
        } else {
            vec![format!("${{MIO_{}_SRC_PATH}}", ip.name.to_uppercase())]
        }
    }

    /// The UVM source directory token for a "DV" sub-type IP's filelist:
    /// a project-relative path for Metrics, or the `MIO_UVM_HOME`
    /// placeholder for every other simulator (set in the compile
    /// environment only when the target simulator is Questa, but the
    /// token is still valid for simulators that resolve it themselves via
    /// their own UVM installation's environment).
    fn uvm_source_dir(&self, sim: Simulator, uvm_home: Option<&Path>, project_root: &Path) -> String {
        match (sim, uvm_home) {
            (Simulator::Metrics, Some(home)) => relative_to(home, project_root).to_string_lossy().into_owned(),
            (Simulator::Metrics, None) => String::new(),
            _ => "${MIO_UVM_HOME}".to_string(),
        }
    }
}

/// Rewrites `<ip>/<src_path>/<flist>` to `<ip>/<src_path>.<sim>/<flist>`,
/// matching `get_ip_flist_path`'s encrypted branch (`ip.src_path` gets a
/// per-simulator suffix because encrypted source trees are vendored once
/// per simulator, not shared).
fn encrypted_sibling(path: &Path, sim: Simulator) -> PathBuf {
    let file_name = path.file_name().unwrap_or_default().to_os_string();
    let src_dir = path.parent().unwrap_or(Path::new(""));
    let src_dir_name = src_dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let ip_dir = src_dir.parent().unwrap_or(Path::new(""));
    ip_dir.join(format!("{src_dir_name}.{}", sim.short_code())).join(file_name)
}

fn render_defines(sim: Simulator, cmp_args: &std::collections::HashMap<String, String>) -> Vec<String> {
    let mut tokens: Vec<String> = cmp_args
        .iter()
        .map(|(name, value)| {
            if value.is_empty() {
                sim.define_token(name, None)
            } else {
                sim.define_token(name, Some(value))
            }
        })
        .collect();
    tokens.sort();
    tokens
}

/// Computes `path` relative to `root`, falling back to a manual `..`-walk
/// when `path` lies outside `root`'s tree (`Path::strip_prefix` alone
/// cannot express that case).
fn relative_to(path: &Path, root: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix(root) {
        return stripped.to_path_buf();
    }

    let mut root_components: Vec<_> = root.components().collect();
    let mut path_components: Vec<_> = path.components().collect();

    while !root_components.is_empty()
        && !path_components.is_empty()
        && root_components[0] == path_components[0]
    {
        root_components.remove(0);
        path_components.remove(0);
    }

    let mut result = PathBuf::new();
    for _ in 0..root_components.len() {
        result.push("..");
    }
    for component in path_components {
        result.push(component.as_os_str());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_to_handles_nested_path() {
        let result = relative_to(Path::new("/proj/ip/uart/src"), Path::new("/proj"));
        assert_eq!(result, Path::new("ip/uart/src"));
    }

    #[test]
    fn relative_to_walks_up_for_sibling_tree() {
        let result = relative_to(Path::new("/opt/global-ip/uart/src"), Path::new("/proj"));
        assert_eq!(result, Path::new("../opt/global-ip/uart/src"));
    }

    #[test]
    fn prebuilt_filelist_is_rewritten_only_for_metrics() {
        let synth = FilelistSynthesizer { tera: Tera::default() };
        let mut ip = test_ip();
        ip.hdl.prebuilt_filelists.insert(Simulator::Vivado, PathBuf::from("/proj/ip/uart/uart.flist"));
        let path = synth.rewrite_prebuilt(&ip, Simulator::Vivado, Path::new("/proj/ip/uart/uart.flist"), Path::new("/proj")).unwrap();
        assert_eq!(path, Path::new("/proj/ip/uart/uart.flist"));
    }

    #[test]
    fn prebuilt_filelist_is_rewritten_for_encrypted_ip() {
        let synth = FilelistSynthesizer { tera: Tera::default() };
        let mut ip = test_ip();
        ip.flags.is_encrypted = true;
        let prebuilt = PathBuf::from("/proj/ip/uart/src/uart.flist");
        let path = synth.rewrite_prebuilt(&ip, Simulator::Vivado, &prebuilt, Path::new("/proj")).unwrap();
        assert_eq!(path, Path::new("/proj/ip/uart/src.viv/uart.flist"));
    }

    #[test]
    fn prebuilt_filelist_is_both_encrypted_and_metrics_relative() {
        let synth = FilelistSynthesizer { tera: Tera::default() };
        let mut ip = test_ip();
        ip.flags.is_encrypted = true;
        let prebuilt = PathBuf::from("/proj/ip/uart/src/uart.flist");
        let path = synth.rewrite_prebuilt(&ip, Simulator::Metrics, &prebuilt, Path::new("/proj")).unwrap();
        assert_eq!(path, Path::new("ip/uart/src.mdc/uart.flist"));
    }

    #[test]
    fn uvm_source_dir_uses_env_placeholder_outside_metrics() {
        let synth = FilelistSynthesizer { tera: Tera::default() };
        let token = synth.uvm_source_dir(Simulator::Questa, Some(Path::new("/opt/uvm-1.2")), Path::new("/proj"));
        assert_eq!(token, "${MIO_UVM_HOME}");
    }

    #[test]
    fn uvm_source_dir_is_project_relative_for_metrics() {
        let synth = FilelistSynthesizer { tera: Tera::default() };
        let token = synth.uvm_source_dir(Simulator::Metrics, Some(Path::new("/proj/vendor/uvm-1.2")), Path::new("/proj"));
        assert_eq!(token, "vendor/uvm-1.2");
    }

    fn test_ip() -> Ip {
        use crate::ip::{Flags, HdlSource, IpOrigin, IpSubType, SimState};
        Ip {
            origin: IpOrigin::Project,
            vendor: Some("acme".into()),
            name: "uart".into(),
            source_path: PathBuf::from("/proj/ip/uart"),
            scripts_path: None,
            dependencies: vec![],
            dut: None,
            hdl: HdlSource::default(),
            flags: Flags { sub_type: IpSubType::Normal, ..Default::default() },
            compiled: SimState::default(),
            elaborated: SimState::default(),
        }
    }
}
