//! The fixed working-directory layout under `<project>/.mio/sim/`, as
//! specified in spec.md §4.3 "Working directories".

use std::path::{Path, PathBuf};

use crate::simulator::Simulator;

/// All filesystem locations the pipeline reads or writes, rooted at the
/// project directory. Constructing one does not touch the filesystem;
/// call [`Layout::ensure_all`] to create the directories.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self { root: project_root.into() }
    }

    pub fn project_root(&self) -> &Path {
        &self.root
    }

    pub fn mio_dir(&self) -> PathBuf {
        self.root.join(".mio")
    }

    pub fn sim_dir(&self) -> PathBuf {
        self.mio_dir().join("sim")
    }

    pub fn sim_output_dir(&self) -> PathBuf {
        self.sim_dir().join("out")
    }

    pub fn cmp_log_dir(&self) -> PathBuf {
        self.sim_dir().join("cmp")
    }

    pub fn elab_log_dir(&self) -> PathBuf {
        self.sim_dir().join("elab")
    }

    pub fn sim_results_dir(&self) -> PathBuf {
        self.mio_dir().join("results")
    }

    pub fn regr_results_dir(&self) -> PathBuf {
        self.mio_dir().join("regression_results")
    }

    pub fn job_history_file(&self) -> PathBuf {
        self.mio_dir().join("job_history.json")
    }

    pub fn metrics_workspace_marker(&self) -> PathBuf {
        self.mio_dir().join(".mdc")
    }

    pub fn cmp_log_path(&self, vendor: &str, name: &str, sim: Simulator) -> PathBuf {
        self.cmp_log_dir().join(format!("{vendor}__{name}.{}.cmp.log", sim.short_code()))
    }

    pub fn elab_log_path(&self, vendor: &str, name: &str, sim: Simulator) -> PathBuf {
        self.elab_log_dir().join(format!("{vendor}__{name}.{}.elab.log", sim.short_code()))
    }

    pub fn cmp_out_dir(&self, sim: Simulator, vendor: &str, name: &str) -> PathBuf {
        self.sim_output_dir()
            .join(sim.short_code())
            .join("cmp_out")
            .join(format!("{vendor}__{name}"))
    }

    pub fn cmp_wd_dir(&self, sim: Simulator, vendor: &str, name: &str) -> PathBuf {
        self.sim_output_dir()
            .join(sim.short_code())
            .join("cmp_wd")
            .join(format!("{vendor}__{name}"))
    }

    pub fn single_sim_elab_dir(&self, sim: Simulator, vendor: &str, name: &str) -> PathBuf {
        self.sim_output_dir()
            .join(sim.short_code())
            .join("elab_out")
            .join("single_sim")
            .join(format!("{vendor}__{name}"))
    }

    pub fn regression_elab_dir(
        &self,
        sim: Simulator,
        vendor: &str,
        name: &str,
        regression_name: &str,
    ) -> PathBuf {
        self.sim_output_dir()
            .join(sim.short_code())
            .join("elab_out")
            .join("regressions")
            .join(format!("{vendor}__{name}__{regression_name}"))
    }

    /// Per-IP compile filelist path, rendered by the Filelist Synthesizer
    /// and consumed via the Tool Driver's `-f`/`-F` argument.
    pub fn filelist_path(&self, sim: Simulator, vendor: &str, name: &str) -> PathBuf {
        self.cmp_wd_dir(sim, vendor, name).join(format!("{name}.flist"))
    }

    /// Master filelist combining a target's dependencies' filelists with
    /// its own, consumed by the elaborate stage.
    pub fn master_filelist_path(&self, sim: Simulator, vendor: &str, name: &str) -> PathBuf {
        self.sim_output_dir()
            .join(sim.short_code())
            .join(format!("{vendor}__{name}.top.{}.flist", sim.short_code()))
    }

    /// Create every directory in the fixed layout (idempotent), matching
    /// `sim.py::create_sim_directories`.
    pub fn ensure_all(&self) -> std::io::Result<()> {
        let mut dirs = vec![
            self.sim_dir(),
            self.sim_output_dir(),
            self.sim_dir().join("cmp"),
            self.sim_dir().join("elab"),
            self.regr_results_dir(),
            self.sim_results_dir(),
        ];
        for sim in Simulator::ALL {
            let base = self.sim_output_dir().join(sim.short_code());
            dirs.push(base.join("cov_wd"));
            dirs.push(base.join("cmp_out"));
            dirs.push(base.join("cmp_wd"));
            dirs.push(base.join("elab_out").join("regressions"));
            dirs.push(base.join("elab_out").join("single_sim"));
        }
        for dir in dirs {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
