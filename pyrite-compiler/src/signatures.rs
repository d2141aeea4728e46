//! Calling contracts for functions and methods, and per-class method tables.

use std::collections::{HashMap, HashSet};

use crate::ast::{ClassDef, FunctionDef, Module, Parameter, ParameterKind, SourceSpan};
use crate::diagnostics::Diagnostics;
use crate::types::{resolve_annotation, TypeKind, TypeSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigParam {
    pub name: String,
    /// Declared kind; `None` when unannotated or annotated with a class.
    pub kind: Option<TypeKind>,
    pub is_var_arg: bool,
    pub is_kw_var_arg: bool,
    pub is_kw_only: bool,
    pub is_pos_only: bool,
    pub has_default: bool,
    /// Accepted kinds of a `Union[...]`/`Optional[...]` parameter.
    pub union_mask: TypeSet,
    /// Declared element kinds of a `list[T]` parameter.
    pub list_elem_mask: TypeSet,
}

impl SigParam {
    pub fn from_parameter(parameter: &Parameter) -> Self {
        let declared = parameter.annotation.as_ref().and_then(resolve_annotation);
        let (kind, union_mask, list_elem_mask) = match declared {
            Some(declared) if declared.kind.is_marker() => {
                (Some(declared.kind), declared.union_mask, TypeSet::empty())
            }
            Some(declared) => (
                Some(declared.kind),
                TypeSet::empty(),
                declared.list_elem_mask,
            ),
            None => (None, TypeSet::empty(), TypeSet::empty()),
        };
        Self {
            name: parameter.name.clone(),
            kind,
            is_var_arg: parameter.kind == ParameterKind::VarArgs,
            is_kw_var_arg: parameter.kind == ParameterKind::KwArgs,
            is_kw_only: parameter.kind == ParameterKind::KeywordOnly,
            is_pos_only: parameter.kind == ParameterKind::PositionalOnly,
            has_default: parameter.default.is_some(),
            union_mask,
            list_elem_mask,
        }
    }

    /// Whether this slot takes ordinary positional arguments.
    pub fn is_positional_slot(&self) -> bool {
        !self.is_var_arg && !self.is_kw_var_arg && !self.is_kw_only
    }

    pub fn is_variadic(&self) -> bool {
        self.is_var_arg || self.is_kw_var_arg
    }

    /// Whether an argument of mask `set` may bind to this parameter. An empty
    /// mask carries no information and is accepted.
    pub fn accepts(&self, set: TypeSet) -> bool {
        if set.is_empty() {
            return true;
        }
        if !self.union_mask.is_empty() {
            return set.intersects(self.union_mask);
        }
        if !self.list_elem_mask.is_empty() {
            return set == TypeSet::LIST;
        }
        match self.kind {
            Some(kind) if !kind.is_marker() => set.is_within(TypeSet::of(kind)),
            _ => true,
        }
    }

    pub fn describe_expected(&self) -> String {
        if !self.union_mask.is_empty() {
            return self.union_mask.describe();
        }
        if !self.list_elem_mask.is_empty() {
            return format!("list[{}]", self.list_elem_mask.describe());
        }
        self.kind
            .map(|kind| kind.describe().to_string())
            .unwrap_or_else(|| "any".to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sig {
    /// Declared return kind; `None` when unannotated.
    pub ret: Option<TypeKind>,
    /// Member kinds of a `Union`/`Optional` return.
    pub ret_union: TypeSet,
    /// Element kinds of a `list[T]` return.
    pub ret_list_elems: TypeSet,
    /// Legacy positional-only form, consulted only when `full` is empty.
    pub params: Vec<TypeKind>,
    pub full: Vec<SigParam>,
}

impl Sig {
    /// Hand-registered signature in the simple positional form.
    pub fn simple(params: Vec<TypeKind>, ret: Option<TypeKind>) -> Self {
        Self {
            ret,
            params,
            ..Self::default()
        }
    }

    pub fn from_function(function: &FunctionDef) -> Self {
        let mut sig = Sig {
            full: function
                .parameters
                .iter()
                .map(SigParam::from_parameter)
                .collect(),
            ..Sig::default()
        };
        if let Some(declared) = function.returns.as_ref().and_then(resolve_annotation) {
            sig.ret = Some(declared.kind);
            if declared.kind.is_marker() {
                sig.ret_union = declared.union_mask;
            }
            sig.ret_list_elems = declared.list_elem_mask;
        }
        sig
    }

    /// Mask of the declared return, empty when unknown.
    pub fn ret_set(&self) -> TypeSet {
        match self.ret {
            Some(kind) if kind.is_marker() => self.ret_union,
            Some(kind) => TypeSet::of(kind),
            None => TypeSet::empty(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassInfo {
    pub name: String,
    pub span: SourceSpan,
    pub bases: Vec<String>,
    pub methods: HashMap<String, Sig>,
}

/// Key under which a method signature is registered.
pub fn method_key(class_name: &str, method: &str) -> String {
    format!("{class_name}.{method}")
}

/// Signatures for every top-level function (keyed by name) and every method
/// (keyed by `Class.method`).
#[tracing::instrument(level = "debug", skip_all)]
pub fn build_sigs(module: &Module) -> HashMap<String, Sig> {
    let mut sigs = HashMap::new();
    for function in module.functions() {
        sigs.insert(function.name.clone(), Sig::from_function(function));
    }
    for class in module.classes() {
        for method in class.methods() {
            sigs.insert(
                method_key(&class.name, &method.name),
                Sig::from_function(method),
            );
        }
    }
    tracing::debug!(count = sigs.len(), "signatures built");
    sigs
}

/// Build one `ClassInfo` per class from its own body, validating dunder
/// contracts when `validate_dunders` is set.
#[tracing::instrument(level = "debug", skip_all)]
pub fn collect_classes(
    module: &Module,
    file: &str,
    validate_dunders: bool,
) -> (HashMap<String, ClassInfo>, Diagnostics) {
    let mut classes = HashMap::new();
    let mut diagnostics = Diagnostics::new();

    for class in module.classes() {
        if classes.contains_key(&class.name) {
            diagnostics.push_error(
                file,
                class.name_span,
                format!("duplicate class definition '{}'", class.name),
            );
            continue;
        }
        classes.insert(class.name.clone(), class_info(class));
        if validate_dunders {
            for method in class.methods() {
                validate_class_method(&class.name, method, file, &mut diagnostics);
            }
        }
    }

    (classes, diagnostics)
}

fn class_info(class: &ClassDef) -> ClassInfo {
    ClassInfo {
        name: class.name.clone(),
        span: class.name_span,
        bases: class.bases.clone(),
        methods: class
            .methods()
            .map(|method| (method.name.clone(), Sig::from_function(method)))
            .collect(),
    }
}

/// Copy inherited methods that a class does not override. Bases are searched
/// left to right, so the first base providing a method wins. Names that are
/// not user classes (`object`, builtin exceptions) contribute nothing.
#[tracing::instrument(level = "debug", skip_all)]
pub fn merge_class_bases(classes: &mut HashMap<String, ClassInfo>, file: &str) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();
    let mut resolved: HashMap<String, HashMap<String, Sig>> = HashMap::new();
    let mut reported = HashSet::new();

    let mut names: Vec<String> = classes.keys().cloned().collect();
    names.sort();
    for name in &names {
        let mut visiting = Vec::new();
        resolve_methods(
            name,
            classes,
            &mut resolved,
            &mut visiting,
            &mut reported,
            &mut diagnostics,
            file,
        );
    }

    for (name, methods) in resolved {
        if let Some(info) = classes.get_mut(&name) {
            info.methods = methods;
        }
    }
    diagnostics
}

fn resolve_methods(
    name: &str,
    classes: &HashMap<String, ClassInfo>,
    resolved: &mut HashMap<String, HashMap<String, Sig>>,
    visiting: &mut Vec<String>,
    reported: &mut HashSet<String>,
    diagnostics: &mut Diagnostics,
    file: &str,
) -> HashMap<String, Sig> {
    if let Some(methods) = resolved.get(name) {
        return methods.clone();
    }
    let Some(info) = classes.get(name) else {
        return HashMap::new();
    };
    if let Some(start) = visiting.iter().position(|entry| entry == name) {
        let mut cycle = visiting[start..].to_vec();
        cycle.push(name.to_string());
        tracing::debug!(class = name, "inheritance cycle detected");
        if reported.insert(name.to_string()) {
            diagnostics.push_error(
                file,
                info.span,
                format!("inheritance cycle detected: {}", cycle.join(" -> ")),
            );
        }
        return info.methods.clone();
    }

    visiting.push(name.to_string());
    let mut methods = info.methods.clone();
    for base in &info.bases {
        let inherited = resolve_methods(
            base,
            classes,
            resolved,
            visiting,
            reported,
            diagnostics,
            file,
        );
        for (method, sig) in inherited {
            methods.entry(method).or_insert(sig);
        }
    }
    visiting.pop();

    resolved.insert(name.to_string(), methods.clone());
    methods
}

/// Expected shape of a dunder method: parameter count including `self`,
/// whether extra parameters are allowed, and the required return kind.
fn dunder_contract(method: &str) -> Option<(usize, bool, Option<TypeKind>)> {
    let contract = match method {
        "__init__" => (1, true, Some(TypeKind::NoneType)),
        "__len__" => (1, false, Some(TypeKind::Int)),
        "__bool__" => (1, false, Some(TypeKind::Bool)),
        "__str__" | "__repr__" => (1, false, Some(TypeKind::Str)),
        "__get__" => (3, false, None),
        "__set__" => (3, false, Some(TypeKind::NoneType)),
        "__delete__" => (2, false, Some(TypeKind::NoneType)),
        "__getattr__" | "__getattribute__" => (2, false, None),
        "__setattr__" => (3, false, Some(TypeKind::NoneType)),
        "__delattr__" => (2, false, Some(TypeKind::NoneType)),
        _ => return None,
    };
    Some(contract)
}

/// Check the arity and declared return kind of a magic method. Returns
/// `false` after recording one diagnostic when the contract is violated.
pub fn validate_class_method(
    class_name: &str,
    method: &FunctionDef,
    file: &str,
    diagnostics: &mut Diagnostics,
) -> bool {
    let Some((arity, open_ended, ret)) = dunder_contract(&method.name) else {
        return true;
    };
    let qualified = method_key(class_name, &method.name);

    let count = method
        .parameters
        .iter()
        .filter(|parameter| {
            !matches!(
                parameter.kind,
                ParameterKind::VarArgs | ParameterKind::KwArgs
            )
        })
        .count();
    let arity_ok = if open_ended {
        count >= arity
    } else {
        count == arity
    };
    if !arity_ok {
        let expected = if open_ended {
            format!("at least {arity}")
        } else {
            arity.to_string()
        };
        diagnostics.push_error(
            file,
            method.name_span,
            format!("{qualified} must take {expected} parameter(s) including self, found {count}"),
        );
        return false;
    }

    if let (Some(required), Some(declared)) = (
        ret,
        method.returns.as_ref().and_then(resolve_annotation),
    ) {
        if declared.kind != required {
            diagnostics.push_error(
                file,
                method.name_span,
                format!(
                    "{qualified} must return {}, declared {}",
                    required.describe(),
                    declared.describe()
                ),
            );
            return false;
        }
    }
    true
}
