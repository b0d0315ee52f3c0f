//! FuseSoC `.eda.yml` core-descriptor reading, needed by the Orchestrator's
//! DUT-binding path when a target IP's DUT is an external `fsoc` core
//! rather than another mio IP (spec.md §3 "DUT binding", §6 "FuseSoC
//! core").
//!
//! Grounded on spec.md §6's field list (`files[*]`, `parameters[*]`,
//! `tool_options.xsim.xelab_options`); no equivalent module exists in the
//! retained original-source excerpt, so the shape here follows FuseSoC's
//! own `.eda.yml` convention as spec.md documents it, parsed the same way
//! `ip::RawIp` is (`serde_yaml` onto a plain struct, then a conversion
//! function) rather than inventing a new deserialization idiom.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::job::parse_raw_args;

#[derive(Debug, Clone, Deserialize)]
pub struct EdaFile {
    pub name: PathBuf,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub include_path: Option<PathBuf>,
    #[serde(default)]
    pub is_include_file: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EdaParameter {
    #[serde(default)]
    pub datatype: Option<String>,
    #[serde(default)]
    pub default: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct XelabOptions {
    #[serde(default)]
    pub xelab_options: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolOptions {
    #[serde(default)]
    pub xsim: XelabOptions,
}

/// On-disk shape of a FuseSoC `.eda.yml` core-description file.
#[derive(Debug, Clone, Deserialize)]
pub struct EdaYml {
    pub name: String,
    #[serde(default)]
    pub files: Vec<EdaFile>,
    #[serde(default)]
    pub parameters: std::collections::HashMap<String, EdaParameter>,
    #[serde(default)]
    pub tool_options: ToolOptions,
}

/// The subset of a parsed `.eda.yml` the rest of the pipeline needs: top
/// files, include directories, and compile-time defines extracted from
/// `tool_options.xsim.xelab_options`.
#[derive(Debug, Clone, Default)]
pub struct FuseSocCore {
    pub name: String,
    pub top_files: Vec<PathBuf>,
    pub include_dirs: Vec<PathBuf>,
    pub defines: std::collections::HashMap<String, String>,
}

impl EdaYml {
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&contents)
            .map_err(|e| Error::invalid_descriptor(path, format!("failed to parse .eda.yml: {e}")))
    }

    /// Converts the FuseSoC shape into the plain fields the Filelist
    /// Synthesizer and Tool Driver need, converting each
    /// `--define NAME[=VAL]` token in `xelab_options` via the same raw-arg
    /// parser the CLI's `+define+` path uses (spec.md §6: "converting
    /// `--define NAME[=VAL]` options").
    pub fn into_core(self) -> FuseSocCore {
        let mut top_files = Vec::new();
        let mut include_dirs = Vec::new();

        for file in &self.files {
            if file.is_include_file {
                if let Some(dir) = &file.include_path {
                    include_dirs.push(dir.clone());
                } else if let Some(parent) = file.name.parent() {
                    include_dirs.push(parent.to_path_buf());
                }
            } else {
                top_files.push(file.name.clone());
            }
        }

        let normalized: Vec<String> = self
            .tool_options
            .xsim
            .xelab_options
            .iter()
            .filter_map(|opt| dashdash_define_to_plus(opt))
            .collect();
        let (defines, _) = parse_raw_args(&normalized);

        FuseSocCore { name: self.name, top_files, include_dirs, defines }
    }
}

/// Rewrites a single `--define NAME[=VAL]` token into the `+define+`
/// syntax `job::parse_raw_args` already understands, so defines from
/// `.eda.yml` and defines from CLI raw args funnel through one parser
/// instead of two independent ones.
fn dashdash_define_to_plus(token: &str) -> Option<String> {
    let rest = token.strip_prefix("--define ")?;
    Some(format!("+define+{}", rest.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dashdash_define_converts_to_plus_syntax() {
        assert_eq!(dashdash_define_to_plus("--define FOO=1"), Some("+define+FOO=1".to_string()));
        assert_eq!(dashdash_define_to_plus("--define BAR"), Some("+define+BAR".to_string()));
        assert_eq!(dashdash_define_to_plus("-relax"), None);
    }

    #[test]
    fn into_core_splits_include_files_from_top_files() {
        let eda = EdaYml {
            name: "acme:lib:dma:1.0".into(),
            files: vec![
                EdaFile {
                    name: PathBuf::from("rtl/dma_top.sv"),
                    file_type: "systemVerilogSource".into(),
                    include_path: None,
                    is_include_file: false,
                },
                EdaFile {
                    name: PathBuf::from("rtl/inc/dma_defs.svh"),
                    file_type: "systemVerilogSource".into(),
                    include_path: Some(PathBuf::from("rtl/inc")),
                    is_include_file: true,
                },
            ],
            parameters: Default::default(),
            tool_options: ToolOptions {
                xsim: XelabOptions { xelab_options: vec!["--define DMA_DEPTH=16".into()] },
            },
        };
        let core = eda.into_core();
        assert_eq!(core.top_files, vec![PathBuf::from("rtl/dma_top.sv")]);
        assert_eq!(core.include_dirs, vec![PathBuf::from("rtl/inc")]);
        assert_eq!(core.defines.get("DMA_DEPTH"), Some(&"16".to_string()));
    }
}
