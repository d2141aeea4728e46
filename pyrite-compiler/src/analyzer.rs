use std::collections::HashMap;

use anyhow::{bail, Result};
use serde::Deserialize;

use crate::ast::Module;
use crate::checker::ModuleChecker;
use crate::diagnostics::Diagnostics;
use crate::poly::PolyTargets;
use crate::return_params::compute_return_param_idxs;
use crate::signatures::{build_sigs, collect_classes, merge_class_bases, ClassInfo, Sig};
use crate::typer::{TypeTable, TypingContext};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Name reported in diagnostics.
    pub file: String,
    /// Check arity and return contracts of dunder methods.
    pub validate_dunders: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            file: "<input>".to_string(),
            validate_dunders: true,
        }
    }
}

pub struct Analysis {
    pub sigs: HashMap<String, Sig>,
    pub classes: HashMap<String, ClassInfo>,
    pub ret_param_idxs: HashMap<String, usize>,
    pub poly: PolyTargets,
    pub types: TypeTable,
}

pub struct Analyzer {
    diagnostics: Diagnostics,
    options: AnalysisOptions,
}

impl Analyzer {
    pub fn new(options: AnalysisOptions) -> Self {
        Self {
            diagnostics: Diagnostics::new(),
            options,
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }

    /// Build signatures and class tables, then type every function body.
    /// Diagnostics stay available through [`Analyzer::diagnostics`] whether
    /// or not the analysis succeeds.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn analyze(&mut self, module: &Module) -> Result<Analysis> {
        let file = self.options.file.as_str();
        tracing::debug!(file, statements = module.body.len(), "analyzing module");

        let sigs = build_sigs(module);
        let (mut classes, class_diagnostics) =
            collect_classes(module, file, self.options.validate_dunders);
        self.diagnostics.extend(class_diagnostics);
        self.diagnostics.extend(merge_class_bases(&mut classes, file));

        let ret_param_idxs = compute_return_param_idxs(module);
        let poly = PolyTargets::collect(module, &sigs);

        let (diagnostics, types) = {
            let cx = TypingContext::new(file, &sigs, &ret_param_idxs)
                .with_classes(&classes)
                .with_poly(&poly);
            let mut checker = ModuleChecker::new(cx);
            checker.check_module(module);
            checker.into_parts()
        };
        self.diagnostics.extend(diagnostics);

        if self.diagnostics.has_errors() {
            bail!(
                "type inference failed for {file} with {} error(s)",
                self.diagnostics.error_count()
            );
        }
        tracing::debug!(nodes = types.len(), "analysis complete");

        Ok(Analysis {
            sigs,
            classes,
            ret_param_idxs,
            poly,
            types,
        })
    }
}
