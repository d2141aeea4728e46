//! Recursive expression typing against a [`TypeEnv`].
//!
//! Every visit either produces a [`Typed`] result or records exactly one
//! diagnostic for the failing node and returns [`Reported`]; parents
//! propagate the failure with `?` and stop typing sibling children.

mod builtins;
mod calls;
mod comprehensions;
mod operators;
mod subscript;

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::ast::{
    AttributeExpression, ConditionalExpression, DictEntry, Expression, ExpressionKind, NodeId,
    SourceSpan,
};
use crate::diagnostics::Diagnostics;
use crate::env::TypeEnv;
use crate::poly::PolyTargets;
use crate::signatures::{ClassInfo, Sig};
use crate::types::{TypeKind, TypeSet};

pub use comprehensions::{bind_target, ComprehensionKind, Elements, TargetError};

/// Marker returned once a diagnostic has been recorded for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("expression could not be typed")]
pub struct Reported;

pub type TypeResult = Result<Typed, Reported>;

/// Container shape known for an expression's value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    List {
        elems: TypeSet,
        /// Per-index masks when every element is a tuple of the same arity.
        tuple_elems: Option<Vec<TypeSet>>,
    },
    Tuple(Vec<TypeSet>),
    Dict {
        keys: TypeSet,
        values: TypeSet,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Typed {
    pub kind: TypeKind,
    pub set: TypeSet,
    pub shape: Option<Shape>,
    pub key: Option<String>,
    /// Nominal tag of opaque values: a class name, `function`, `channel`.
    pub instance: Option<String>,
}

impl Typed {
    pub fn of(kind: TypeKind) -> Self {
        Self::from_set(TypeSet::of(kind))
    }

    pub fn from_set(set: TypeSet) -> Self {
        Self {
            kind: set.reported_kind(),
            set,
            shape: None,
            key: None,
            instance: None,
        }
    }

    /// No static information: reported as `NoneType` with an empty mask.
    pub fn unknown() -> Self {
        Self::from_set(TypeSet::empty())
    }

    pub fn instance(tag: &str) -> Self {
        Self {
            instance: Some(tag.to_string()),
            ..Self::unknown()
        }
    }

    pub fn list_of(elems: TypeSet) -> Self {
        Self::of(TypeKind::List).with_shape(Shape::List {
            elems,
            tuple_elems: None,
        })
    }

    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = Some(shape);
        self
    }

    pub fn with_key(mut self, key: Option<String>) -> Self {
        self.key = key;
        self
    }

    pub fn list_elems(&self) -> TypeSet {
        match &self.shape {
            Some(Shape::List { elems, .. }) => *elems,
            _ => TypeSet::empty(),
        }
    }
}

/// What the analysis attached to one expression node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeType {
    pub kind: TypeKind,
    pub key: Option<String>,
}

/// Side table of inferred kinds and canonical keys, keyed by node id.
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    entries: HashMap<NodeId, NodeType>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, id: NodeId, kind: TypeKind, key: Option<String>) {
        self.entries.insert(id, NodeType { kind, key });
    }

    pub fn get(&self, id: NodeId) -> Option<&NodeType> {
        self.entries.get(&id)
    }

    pub fn kind_of(&self, id: NodeId) -> Option<TypeKind> {
        self.entries.get(&id).map(|entry| entry.kind)
    }

    pub fn key_of(&self, id: NodeId) -> Option<&str> {
        self.entries.get(&id).and_then(|entry| entry.key.as_deref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &NodeType)> {
        self.entries.iter()
    }
}

/// Read-only inputs shared by every typer of one function body.
#[derive(Clone, Copy)]
pub struct TypingContext<'cx> {
    pub file: &'cx str,
    pub sigs: &'cx HashMap<String, Sig>,
    pub ret_param_idxs: &'cx HashMap<String, usize>,
    pub classes: Option<&'cx HashMap<String, ClassInfo>>,
    pub poly: Option<&'cx PolyTargets>,
    /// Enclosing scopes, innermost first.
    pub outers: &'cx [&'cx TypeEnv],
    /// Names assigned somewhere in the current function body.
    pub assigned_locals: Option<&'cx HashSet<String>>,
}

impl<'cx> TypingContext<'cx> {
    pub fn new(
        file: &'cx str,
        sigs: &'cx HashMap<String, Sig>,
        ret_param_idxs: &'cx HashMap<String, usize>,
    ) -> Self {
        Self {
            file,
            sigs,
            ret_param_idxs,
            classes: None,
            poly: None,
            outers: &[],
            assigned_locals: None,
        }
    }

    pub fn with_classes(mut self, classes: &'cx HashMap<String, ClassInfo>) -> Self {
        self.classes = Some(classes);
        self
    }

    pub fn with_poly(mut self, poly: &'cx PolyTargets) -> Self {
        self.poly = Some(poly);
        self
    }

    pub fn with_outers(mut self, outers: &'cx [&'cx TypeEnv]) -> Self {
        self.outers = outers;
        self
    }

    pub fn with_assigned_locals(mut self, locals: &'cx HashSet<String>) -> Self {
        self.assigned_locals = Some(locals);
        self
    }

    pub fn is_assigned_local(&self, name: &str) -> bool {
        self.assigned_locals.is_some_and(|locals| locals.contains(name))
    }

    pub fn class(&self, name: &str) -> Option<&'cx ClassInfo> {
        self.classes.and_then(|classes| classes.get(name))
    }
}

const STDLIB_MODULES: [&str; 3] = ["math", "subprocess", "sys"];

/// Type one expression, recording kinds and canonical keys in `table`.
pub fn infer_expr_type(
    expression: &Expression,
    env: &TypeEnv,
    cx: &TypingContext<'_>,
    diagnostics: &mut Diagnostics,
    table: &mut TypeTable,
) -> TypeResult {
    ExpressionTyper::new(env, cx, diagnostics, table).visit(expression)
}

pub struct ExpressionTyper<'a, 'cx> {
    env: &'a TypeEnv,
    cx: &'a TypingContext<'cx>,
    diagnostics: &'a mut Diagnostics,
    table: &'a mut TypeTable,
}

impl<'a, 'cx> ExpressionTyper<'a, 'cx> {
    pub fn new(
        env: &'a TypeEnv,
        cx: &'a TypingContext<'cx>,
        diagnostics: &'a mut Diagnostics,
        table: &'a mut TypeTable,
    ) -> Self {
        Self {
            env,
            cx,
            diagnostics,
            table,
        }
    }

    pub fn visit(&mut self, expression: &Expression) -> TypeResult {
        let typed = self.visit_kind(expression)?;
        self.table.record(expression.id, typed.kind, typed.key.clone());
        Ok(typed)
    }

    fn fail<T>(&mut self, span: SourceSpan, message: impl Into<String>) -> Result<T, Reported> {
        self.diagnostics.push_error(self.cx.file, span, message);
        Err(Reported)
    }

    fn visit_kind(&mut self, expression: &Expression) -> TypeResult {
        let span = expression.span;
        match &expression.kind {
            ExpressionKind::Int(value) => {
                Ok(Typed::of(TypeKind::Int).with_key(Some(format!("i:{value}"))))
            }
            ExpressionKind::Bool(value) => {
                let literal = if *value { "True" } else { "False" };
                Ok(Typed::of(TypeKind::Bool).with_key(Some(format!("b:{literal}"))))
            }
            ExpressionKind::Float(value) => {
                Ok(Typed::of(TypeKind::Float).with_key(Some(format!("f:{value:.16e}"))))
            }
            ExpressionKind::Str(value) => {
                Ok(Typed::of(TypeKind::Str).with_key(Some(format!("s:{value:?}"))))
            }
            ExpressionKind::Bytes(value) => Ok(Typed::of(TypeKind::Bytes)
                .with_key(Some(format!("y:\"{}\"", value.escape_ascii())))),
            ExpressionKind::NoneLiteral => {
                Ok(Typed::of(TypeKind::NoneType).with_key(Some("none".to_string())))
            }
            ExpressionKind::Name(name) => {
                let typed = self.visit_name(name, span)?;
                Ok(typed.with_key(Some(format!("n:{name}"))))
            }
            ExpressionKind::Attribute(attribute) => self.visit_attribute(attribute),
            ExpressionKind::Tuple(items) => self.visit_tuple(items),
            ExpressionKind::List(items) => self.visit_list(items),
            ExpressionKind::Set(items) => {
                let typed = self.visit_list(items)?;
                Ok(typed.with_key(None))
            }
            ExpressionKind::Dict(entries) => self.visit_dict(entries),
            ExpressionKind::Object(fields) => {
                for field in fields {
                    self.visit(field)?;
                }
                Ok(Typed::unknown().with_key(Some("obj".to_string())))
            }
            ExpressionKind::Unary(unary) => self.visit_unary(unary, span),
            ExpressionKind::Binary(binary) => self.visit_binary(binary, span),
            ExpressionKind::Call(call) => self.visit_call(call, span),
            ExpressionKind::Subscript(subscript) => self.visit_subscript(subscript, span),
            ExpressionKind::Slice(_) => self.fail(span, "slice is only valid inside a subscript"),
            ExpressionKind::Conditional(conditional) => {
                self.visit_conditional(conditional, span)
            }
            ExpressionKind::ListComp(comprehension) => {
                self.visit_comprehension(comprehension, ComprehensionKind::List)
            }
            ExpressionKind::SetComp(comprehension) => {
                self.visit_comprehension(comprehension, ComprehensionKind::Set)
            }
            ExpressionKind::GeneratorExp(comprehension) => {
                self.visit_comprehension(comprehension, ComprehensionKind::Generator)
            }
            ExpressionKind::DictComp(comprehension) => self.visit_dict_comprehension(comprehension),
            ExpressionKind::Await(_) => self.fail(span, "'await' is not supported"),
            ExpressionKind::Yield(_) => self.fail(span, "'yield' is not supported"),
        }
    }

    fn visit_name(&mut self, name: &str, span: SourceSpan) -> TypeResult {
        let set = self.env.get_set(name);
        if !set.is_empty() {
            return Ok(binding(self.env, name, set));
        }
        if let Some(tag) = self.env.instance_of(name) {
            return Ok(Typed::instance(tag));
        }
        if self.env.has(name) {
            return self.fail(
                span,
                format!("contradictory types for '{name}': branches bind it to disjoint types"),
            );
        }
        if self.cx.is_assigned_local(name) {
            return self.fail(
                span,
                format!("local variable '{name}' referenced before assignment"),
            );
        }

        let outers = self.cx.outers;
        if let Some(outer) = outers.iter().find(|outer| !outer.get_set(name).is_empty()) {
            return Ok(binding(outer, name, outer.get_set(name)));
        }
        if let Some(kind) = outers.iter().find_map(|outer| outer.get(name)) {
            return Ok(Typed::of(kind));
        }
        if let Some(tag) = outers.iter().find_map(|outer| outer.instance_of(name)) {
            return Ok(Typed::instance(tag));
        }

        if self.cx.sigs.contains_key(name)
            || self.cx.poly.and_then(|poly| poly.var_targets(name)).is_some()
        {
            return Ok(Typed::instance("function"));
        }
        if self.cx.class(name).is_some() || STDLIB_MODULES.contains(&name) {
            return Ok(Typed::unknown());
        }
        self.fail(span, format!("undefined name '{name}'"))
    }

    /// Whether `name` is bound in this scope or any enclosing one.
    fn is_bound(&self, name: &str) -> bool {
        let bound = |env: &TypeEnv| env.has(name) || env.instance_of(name).is_some();
        bound(self.env) || self.cx.outers.iter().any(|outer| bound(outer))
    }

    /// `math`, `sys` or `subprocess` not shadowed by a local binding.
    fn is_stdlib_module(&self, name: &str) -> bool {
        STDLIB_MODULES.contains(&name) && !self.is_bound(name)
    }

    /// Nominal tag of `name`, looking through enclosing scopes unless the
    /// current scope binds it to a mask.
    fn lookup_instance(&self, name: &str) -> Option<&'a str> {
        let env: &'a TypeEnv = self.env;
        if let Some(tag) = env.instance_of(name) {
            return Some(tag);
        }
        if env.has(name) {
            return None;
        }
        let outers: &'cx [&'cx TypeEnv] = self.cx.outers;
        outers.iter().find_map(|outer| outer.instance_of(name))
    }

    fn visit_attribute(&mut self, attribute: &AttributeExpression) -> TypeResult {
        if let Some(module) = attribute.value.as_name() {
            if self.is_stdlib_module(module) {
                return Ok(builtins::stdlib_attribute(module, &attribute.attr));
            }
        }

        self.visit(&attribute.value)?;
        if let Some(owner) = attribute.value.as_name() {
            let mut set = self.env.get_attr(owner, &attribute.attr);
            if set.is_empty() && !self.env.has(owner) {
                set = self
                    .cx
                    .outers
                    .iter()
                    .map(|outer| outer.get_attr(owner, &attribute.attr))
                    .find(|set| !set.is_empty())
                    .unwrap_or_default();
            }
            if !set.is_empty() {
                return Ok(Typed::from_set(set));
            }
        }
        Ok(Typed::unknown())
    }

    fn visit_children(&mut self, items: &[Expression]) -> Result<Vec<Typed>, Reported> {
        let mut typed = Vec::with_capacity(items.len());
        for item in items {
            typed.push(self.visit(item)?);
        }
        Ok(typed)
    }

    fn visit_tuple(&mut self, items: &[Expression]) -> TypeResult {
        let children = self.visit_children(items)?;
        let key = composite_key("t", &children);
        let shape = Shape::Tuple(children.iter().map(|child| child.set).collect());
        Ok(Typed::of(TypeKind::Tuple)
            .with_shape(shape)
            .with_key(key))
    }

    fn visit_list(&mut self, items: &[Expression]) -> TypeResult {
        let children = self.visit_children(items)?;
        let elems = children
            .iter()
            .fold(TypeSet::empty(), |acc, child| acc | child.set);
        let key = composite_key("l", &children);
        Ok(Typed::of(TypeKind::List)
            .with_shape(Shape::List {
                elems,
                tuple_elems: common_tuple_shape(&children),
            })
            .with_key(key))
    }

    fn visit_dict(&mut self, entries: &[DictEntry]) -> TypeResult {
        let mut keys = TypeSet::empty();
        let mut values = TypeSet::empty();
        for entry in entries {
            match &entry.key {
                Some(key) => {
                    keys |= self.visit(key)?.set;
                    values |= self.visit(&entry.value)?.set;
                }
                None => {
                    let unpacked = self.visit(&entry.value)?;
                    if !unpacked.set.is_empty() && unpacked.set != TypeSet::DICT {
                        return self.fail(
                            entry.value.span,
                            format!(
                                "dictionary unpacking requires a dict, found {}",
                                unpacked.set.describe()
                            ),
                        );
                    }
                    if let Some(Shape::Dict {
                        keys: inner_keys,
                        values: inner_values,
                    }) = unpacked.shape
                    {
                        keys |= inner_keys;
                        values |= inner_values;
                    }
                }
            }
        }
        Ok(Typed::of(TypeKind::Dict).with_shape(Shape::Dict { keys, values }))
    }

    fn visit_conditional(
        &mut self,
        conditional: &ConditionalExpression,
        span: SourceSpan,
    ) -> TypeResult {
        let test = self.visit(&conditional.test)?;
        if test.set != TypeSet::BOOL {
            return self.fail(
                span,
                format!(
                    "conditional expression test must be bool, found {}",
                    test.set.describe()
                ),
            );
        }
        let body = self.visit(&conditional.body)?;
        let orelse = self.visit(&conditional.orelse)?;
        let mut typed = Typed::from_set(body.set | orelse.set);
        if body.shape == orelse.shape {
            typed.shape = body.shape;
        }
        if body.instance == orelse.instance {
            typed.instance = body.instance;
        }
        Ok(typed)
    }
}

/// Result for a name bound in `env`, carrying any recorded container shape.
fn binding(env: &TypeEnv, name: &str, set: TypeSet) -> Typed {
    let typed = Typed::from_set(set);
    if set == TypeSet::LIST {
        let elems = env.get_list_elems(name);
        let tuple_elems = env.tuple_elems(name).map(<[TypeSet]>::to_vec);
        if !elems.is_empty() || tuple_elems.is_some() {
            return typed.with_shape(Shape::List { elems, tuple_elems });
        }
    } else if set == TypeSet::TUPLE {
        if let Some(elems) = env.tuple_elems(name) {
            return typed.with_shape(Shape::Tuple(elems.to_vec()));
        }
    } else if set == TypeSet::DICT {
        let keys = env.get_dict_keys(name);
        let values = env.get_dict_vals(name);
        if !keys.is_empty() || !values.is_empty() {
            return typed.with_shape(Shape::Dict { keys, values });
        }
    }
    typed
}

/// `tag:(k1,k2,...)` when every child has a key.
fn composite_key(tag: &str, children: &[Typed]) -> Option<String> {
    let keys = children
        .iter()
        .map(|child| child.key.as_deref())
        .collect::<Option<Vec<_>>>()?;
    Some(format!("{tag}:({})", keys.join(",")))
}

fn common_tuple_shape(children: &[Typed]) -> Option<Vec<TypeSet>> {
    let mut merged: Option<Vec<TypeSet>> = None;
    for child in children {
        let Some(Shape::Tuple(elems)) = &child.shape else {
            return None;
        };
        merged = match merged {
            None => Some(elems.clone()),
            Some(current) if current.len() == elems.len() => Some(
                current
                    .iter()
                    .zip(elems)
                    .map(|(left, right)| *left | *right)
                    .collect(),
            ),
            Some(_) => return None,
        };
    }
    merged
}
