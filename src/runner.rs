//! Generation runner that orchestrates a whole invocation.

use anyhow::Context;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::discover::markers::contains_markers;
use crate::evaluate::HelperEvaluator;
use crate::exec::{GoToolchain, Toolchain};
use crate::inject::{has_regions, inject_source};
use crate::project::ProjectContext;
use crate::report::{debug, RunReport};
use crate::rewrite::rewrite_source;

/// Runs generation over a project and its nested modules.
pub struct Runner {
    config: Config,
    toolchain: Box<dyn Toolchain>,
}

impl Runner {
    /// Create a runner using the `go` binary named in `config`.
    pub fn new(config: Config) -> Self {
        let toolchain = Box::new(GoToolchain::new(config.go_binary.clone()));
        Self { config, toolchain }
    }

    /// Replace the toolchain.
    pub fn with_toolchain(mut self, toolchain: Box<dyn Toolchain>) -> Self {
        self.toolchain = toolchain;
        self
    }

    /// Process `root` and every nested module below it.
    ///
    /// All projects are loaded first, so a load error aborts the run before
    /// any file is written.
    pub fn run(&self, root: &Path) -> anyhow::Result<RunReport> {
        let mut report = RunReport::new();
        let contexts = self.load_all(root, &mut report)?;
        for ctx in contexts {
            self.process_project(&ctx, &mut report)?;
        }
        Ok(report)
    }

    fn load_all(&self, root: &Path, report: &mut RunReport) -> anyhow::Result<Vec<ProjectContext>> {
        let mut pending: VecDeque<PathBuf> = VecDeque::from([root.to_path_buf()]);
        let mut contexts = Vec::new();
        while let Some(dir) = pending.pop_front() {
            let ctx = ProjectContext::load(&dir, &self.config, report)?;
            pending.extend(ctx.submodules().iter().cloned());
            contexts.push(ctx);
        }
        Ok(contexts)
    }

    fn process_project(&self, ctx: &ProjectContext, report: &mut RunReport) -> anyhow::Result<()> {
        report.projects += 1;
        let mut evaluator = HelperEvaluator::new(ctx, self.toolchain.as_ref(), &self.config);
        for path in ctx.sources() {
            self.process_file(ctx, &mut evaluator, path, report)?;
        }
        debug(format!(
            "project {}: {} driver runs",
            ctx.root().display(),
            evaluator.runs()
        ));
        Ok(())
    }

    fn process_file(
        &self,
        ctx: &ProjectContext,
        evaluator: &mut HelperEvaluator<'_>,
        path: &Path,
        report: &mut RunReport,
    ) -> anyhow::Result<()> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                report.warn(path, 0, format!("skipping unreadable file: {}", e), None);
                return Ok(());
            }
        };
        report.files_scanned += 1;
        if !contains_markers(&content) && !has_regions(&content) {
            return Ok(());
        }

        let depth = ctx.depth_of(path);
        let injected = match inject_source(path, &content, ctx, depth, report) {
            Ok(outcome) => outcome,
            Err(e) => {
                report.error(path, e.line(), e.to_string(), None);
                return Ok(());
            }
        };
        report.regions_injected += injected.regions;

        let rewritten = rewrite_source(path, &injected.text, depth, evaluator, report);
        report.placeholders_replaced += rewritten.replaced;

        if rewritten.text != content {
            fs::write(path, &rewritten.text).with_context(|| format!("writing {}", path.display()))?;
            report.files_rewritten += 1;
            debug(format!("rewrote {}", path.display()));
        }
        Ok(())
    }
}
