use std::collections::{BTreeSet, HashMap};

use crate::ast::{Expression, ExpressionKind, Module, Statement, StatementKind};
use crate::signatures::Sig;

/// Possible callees of variables and attributes that hold functions.
///
/// Targets are gathered from `f = g` and `self.cb = g` assignments before
/// any body is checked; the expression typer only reads them.
#[derive(Debug, Clone, Default)]
pub struct PolyTargets {
    vars: HashMap<String, BTreeSet<String>>,
    attrs: HashMap<String, BTreeSet<String>>,
}

impl PolyTargets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan every assignment in the module, including function and method
    /// bodies, for functions stored in variables or attributes.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn collect(module: &Module, sigs: &HashMap<String, Sig>) -> Self {
        let mut targets = Self::new();
        targets.scan(&module.body, sigs);
        tracing::debug!(
            vars = targets.vars.len(),
            attrs = targets.attrs.len(),
            "collected call targets"
        );
        targets
    }

    fn scan(&mut self, statements: &[Statement], sigs: &HashMap<String, Sig>) {
        for statement in statements {
            match &statement.kind {
                StatementKind::Assign(assign) => {
                    for function in function_names(&assign.value, sigs) {
                        match &assign.target.kind {
                            ExpressionKind::Name(var) => self.add_var_target(var, function),
                            ExpressionKind::Attribute(attribute) => {
                                self.add_attr_target(&attribute.attr, function)
                            }
                            _ => {}
                        }
                    }
                }
                StatementKind::FunctionDef(def) => self.scan(&def.body, sigs),
                StatementKind::ClassDef(def) => self.scan(&def.body, sigs),
                StatementKind::If(conditional) => {
                    self.scan(&conditional.body, sigs);
                    self.scan(&conditional.orelse, sigs);
                }
                StatementKind::While(looped) => self.scan(&looped.body, sigs),
                StatementKind::For(looped) => self.scan(&looped.body, sigs),
                _ => {}
            }
        }
    }

    pub fn add_var_target(&mut self, var: &str, target: &str) {
        self.vars
            .entry(var.to_string())
            .or_default()
            .insert(target.to_string());
    }

    pub fn add_attr_target(&mut self, attr: &str, target: &str) {
        self.attrs
            .entry(attr.to_string())
            .or_default()
            .insert(target.to_string());
    }

    pub fn var_targets(&self, var: &str) -> Option<&BTreeSet<String>> {
        self.vars.get(var).filter(|targets| !targets.is_empty())
    }

    pub fn attr_targets(&self, attr: &str) -> Option<&BTreeSet<String>> {
        self.attrs.get(attr).filter(|targets| !targets.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty() && self.attrs.is_empty()
    }
}

/// Top-level functions an assigned value may evaluate to.
fn function_names<'e>(value: &'e Expression, sigs: &HashMap<String, Sig>) -> Vec<&'e str> {
    match &value.kind {
        ExpressionKind::Name(name) if sigs.contains_key(name.as_str()) => vec![name.as_str()],
        ExpressionKind::Conditional(conditional) => {
            let mut names = function_names(&conditional.body, sigs);
            names.extend(function_names(&conditional.orelse, sigs));
            names
        }
        _ => Vec::new(),
    }
}
