//! Placeholder evaluation: resolve, synthesize a driver, run it.

use crate::config::Config;
use crate::driver;
use crate::exec::{Executor, MemoKey, Toolchain};
use crate::project::{ProjectContext, Resolver, Target};
use crate::rewrite::{Evaluate, Evaluation, LiteralKind, Placeholder};

/// Evaluates placeholders against one project's helpers.
pub struct HelperEvaluator<'a> {
    ctx: &'a ProjectContext,
    resolver: Resolver<'a>,
    executor: Executor<'a>,
}

impl<'a> HelperEvaluator<'a> {
    pub fn new(ctx: &'a ProjectContext, toolchain: &'a dyn Toolchain, config: &Config) -> Self {
        Self {
            ctx,
            resolver: Resolver::new(ctx, toolchain),
            executor: Executor::new(toolchain, config),
        }
    }

    /// Driver processes started so far.
    pub fn runs(&self) -> usize {
        self.executor.runs()
    }
}

impl Evaluate for HelperEvaluator<'_> {
    fn evaluate(&mut self, placeholder: &Placeholder, depth: usize) -> Result<Evaluation, String> {
        let target = self
            .resolver
            .resolve(&placeholder.name, depth)
            .map_err(|e| e.to_string())?;

        if let Target::Helper(sym) = &target {
            if !sym.signature.accepts(placeholder.args.len()) {
                return Err(format!(
                    "{} takes {} argument{} ({}), placeholder passes {}",
                    sym.name,
                    sym.signature.params.len(),
                    if sym.signature.params.len() == 1 { "" } else { "s" },
                    sym.signature.param_types().join(", "),
                    placeholder.args.len()
                ));
            }
        }

        let args: Vec<String> = placeholder
            .args
            .iter()
            .enumerate()
            .map(|(i, arg)| arg.to_go(target.param_type_at(i)))
            .collect();

        // The same helper name can see different declarations at different
        // depths, so the depth is part of the identity.
        let key = MemoKey::new(format!("{}@{}", target.identity(), depth), &args);
        let output = match self.executor.cached(&key) {
            Some(hit) => hit.to_string(),
            None => {
                let program = driver::synthesize(self.ctx, &target, depth, &args);
                self.executor
                    .execute(self.ctx.workdir(), &program, key)
                    .map_err(|e| format!("{}: {}", program.call, e))?
            }
        };

        let kind = LiteralKind::from_type(target.output_type()).unwrap_or_else(|| LiteralKind::infer(&output));
        Ok(Evaluation { output, kind })
    }
}
