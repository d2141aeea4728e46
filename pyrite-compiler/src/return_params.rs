//! Detection of pass-through functions: functions whose every `return`
//! hands back the same formal parameter unchanged.

use std::collections::HashMap;

use crate::ast::{FunctionDef, Module, Statement, StatementKind};
use crate::signatures::method_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReturnState {
    NoneSeen,
    Param(usize),
    Inconsistent,
}

impl ReturnState {
    fn observe(self, index: Option<usize>) -> Self {
        match (self, index) {
            (ReturnState::Inconsistent, _) | (_, None) => ReturnState::Inconsistent,
            (ReturnState::NoneSeen, Some(index)) => ReturnState::Param(index),
            (ReturnState::Param(seen), Some(index)) if seen == index => self,
            (ReturnState::Param(_), Some(_)) => ReturnState::Inconsistent,
        }
    }
}

/// Index of the parameter every `return` of `function` yields, if any.
///
/// Only `return` and `if` statements are inspected; both branches of an `if`
/// are followed and every other statement kind is skipped.
pub fn infer_return_param(function: &FunctionDef) -> Option<usize> {
    let state = scan(&function.body, function, ReturnState::NoneSeen);
    match state {
        ReturnState::Param(index) => Some(index),
        _ => None,
    }
}

fn scan(statements: &[Statement], function: &FunctionDef, mut state: ReturnState) -> ReturnState {
    for statement in statements {
        if state == ReturnState::Inconsistent {
            break;
        }
        state = match &statement.kind {
            StatementKind::Return(value) => {
                let index = value.as_ref().and_then(|value| value.as_name()).and_then(|name| {
                    function
                        .parameters
                        .iter()
                        .position(|parameter| parameter.name == name)
                });
                state.observe(index)
            }
            StatementKind::If(conditional) => {
                let state = scan(&conditional.body, function, state);
                scan(&conditional.orelse, function, state)
            }
            _ => state,
        };
    }
    state
}

/// Pass-through parameter indices for every function and method of a module.
#[tracing::instrument(level = "debug", skip_all)]
pub fn compute_return_param_idxs(module: &Module) -> HashMap<String, usize> {
    let mut indices = HashMap::new();
    for function in module.functions() {
        if let Some(index) = infer_return_param(function) {
            indices.insert(function.name.clone(), index);
        }
    }
    for class in module.classes() {
        for method in class.methods() {
            if let Some(index) = infer_return_param(method) {
                indices.insert(method_key(&class.name, &method.name), index);
            }
        }
    }
    indices
}
