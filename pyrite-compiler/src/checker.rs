//! Statement walker that drives the expression typer.
//!
//! Each function body is checked against its own [`TypeEnv`]; the module's
//! top-level bindings form the outermost enclosing scope. Branches are
//! checked on clones of the current env and joined afterwards, and guards of
//! the form `x is None`, `x is not None`, `isinstance(x, T)` and `not g`
//! narrow the clone of the branch they protect.

use std::collections::HashSet;

use crate::ast::{
    AnnAssignStatement, AssignStatement, AugAssignStatement, BinaryOperator, ClassDef,
    Expression, ExpressionKind, ForStatement, FunctionDef, IfStatement, Module, Parameter,
    ParameterKind, SourceSpan, Statement, StatementKind, TypeAnnotation, UnaryOperator,
    WhileStatement,
};
use crate::diagnostics::Diagnostics;
use crate::env::TypeEnv;
use crate::signatures::SigParam;
use crate::typer::{
    bind_target, infer_expr_type, Elements, ExpressionTyper, Shape, TypeTable, Typed,
    TypingContext,
};
use crate::types::{
    dict_annotation_shape, resolve_annotation, tuple_annotation_elems, Declared, TypeKind,
    TypeSet,
};

/// Tag for names bound to values nothing is known about.
const OPAQUE: &str = "object";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continues,
    /// Control never reaches the next statement (`return`, `raise`,
    /// `break`, `continue`).
    Exits,
}

/// Facts fixed for the duration of one function body.
struct Frame<'f> {
    cx: TypingContext<'f>,
    function: &'f str,
    returns: Option<Declared>,
}

pub struct ModuleChecker<'m> {
    cx: TypingContext<'m>,
    diagnostics: Diagnostics,
    table: TypeTable,
}

impl<'m> ModuleChecker<'m> {
    /// `cx` supplies the module-wide inputs; outer scopes and assigned
    /// locals are filled in per function.
    pub fn new(cx: TypingContext<'m>) -> Self {
        Self {
            cx,
            diagnostics: Diagnostics::new(),
            table: TypeTable::new(),
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn into_parts(self) -> (Diagnostics, TypeTable) {
        (self.diagnostics, self.table)
    }

    #[tracing::instrument(level = "debug", skip_all)]
    pub fn check_module(&mut self, module: &Module) {
        tracing::debug!(file = self.cx.file, statements = module.body.len(), "checking module");
        let mut module_env = TypeEnv::new();
        let frame = Frame {
            cx: self.cx,
            function: "<module>",
            returns: None,
        };
        for statement in &module.body {
            if !matches!(
                statement.kind,
                StatementKind::FunctionDef(_) | StatementKind::ClassDef(_)
            ) {
                self.check_statement(statement, &mut module_env, &frame);
            }
        }

        let outers = [&module_env];
        for statement in &module.body {
            match &statement.kind {
                StatementKind::FunctionDef(def) => self.check_function(def, &outers, None),
                StatementKind::ClassDef(class) => self.check_class(class, &outers),
                _ => {}
            }
        }
    }

    fn check_class(&mut self, class: &ClassDef, outers: &[&TypeEnv]) {
        for statement in &class.body {
            match &statement.kind {
                StatementKind::FunctionDef(method) => {
                    self.check_function(method, outers, Some(&class.name))
                }
                StatementKind::Pass => {}
                StatementKind::Expression(docstring)
                    if matches!(docstring.kind, ExpressionKind::Str(_)) => {}
                _ => self.diagnostics.push_error(
                    self.cx.file,
                    statement.span,
                    format!(
                        "class '{}' body may only contain method definitions",
                        class.name
                    ),
                ),
            }
        }
    }

    #[tracing::instrument(level = "debug", skip_all, fields(function = %function.name))]
    fn check_function(
        &mut self,
        function: &FunctionDef,
        outers: &[&TypeEnv],
        class: Option<&str>,
    ) {
        let locals = assigned_locals(&function.body);
        let outer_cx = self.cx.with_outers(outers);
        let cx = outer_cx.with_assigned_locals(&locals);

        let mut env = TypeEnv::new();
        for (index, parameter) in function.parameters.iter().enumerate() {
            let receiver = if index == 0 { class } else { None };
            self.bind_parameter(&mut env, parameter, receiver, &outer_cx);
        }

        let frame = Frame {
            cx,
            function: &function.name,
            returns: function.returns.as_ref().and_then(resolve_annotation),
        };
        self.check_block(&function.body, &mut env, &frame);
    }

    fn bind_parameter(
        &mut self,
        env: &mut TypeEnv,
        parameter: &Parameter,
        receiver: Option<&str>,
        outer_cx: &TypingContext<'_>,
    ) {
        if let Some(default) = &parameter.default {
            if let Some(typed) = self.type_expr(default, &TypeEnv::new(), outer_cx) {
                let param = SigParam::from_parameter(parameter);
                if !param.accepts(typed.set) {
                    self.diagnostics.push_error(
                        self.cx.file,
                        default.span,
                        format!(
                            "default value of parameter '{}' expects {}, found {}",
                            parameter.name,
                            param.describe_expected(),
                            typed.set.describe()
                        ),
                    );
                }
            }
        }

        let name = parameter.name.as_str();
        match parameter.kind {
            ParameterKind::VarArgs => {
                env.define_set(name, TypeSet::TUPLE, parameter.span);
                return;
            }
            ParameterKind::KwArgs => {
                env.define_set(name, TypeSet::DICT, parameter.span);
                env.set_dict_shape(name, TypeSet::STR, TypeSet::empty());
                return;
            }
            _ => {}
        }

        match &parameter.annotation {
            None => match receiver {
                Some(class) => env.define_instance_of(name, class),
                None => env.define_set(name, TypeSet::all(), parameter.span),
            },
            Some(TypeAnnotation::Name(class)) if self.cx.class(class).is_some() => {
                env.define_instance_of(name, class)
            }
            Some(annotation) => match resolve_annotation(annotation) {
                Some(declared) => bind_declared(env, name, annotation, declared, parameter.span),
                None => env.define_set(name, TypeSet::all(), parameter.span),
            },
        }
    }

    fn type_expr(
        &mut self,
        expression: &Expression,
        env: &TypeEnv,
        cx: &TypingContext<'_>,
    ) -> Option<Typed> {
        infer_expr_type(expression, env, cx, &mut self.diagnostics, &mut self.table).ok()
    }

    fn error(&mut self, span: SourceSpan, message: impl Into<String>) {
        self.diagnostics.push_error(self.cx.file, span, message);
    }

    fn check_block(
        &mut self,
        statements: &[Statement],
        env: &mut TypeEnv,
        frame: &Frame<'_>,
    ) -> Flow {
        for (index, statement) in statements.iter().enumerate() {
            if self.check_statement(statement, env, frame) == Flow::Exits {
                if let Some(next) = statements.get(index + 1) {
                    self.diagnostics.push_warning(self.cx.file, next.span, "unreachable code");
                }
                return Flow::Exits;
            }
        }
        Flow::Continues
    }

    fn check_statement(
        &mut self,
        statement: &Statement,
        env: &mut TypeEnv,
        frame: &Frame<'_>,
    ) -> Flow {
        let span = statement.span;
        match &statement.kind {
            StatementKind::FunctionDef(def) => {
                env.remove(&def.name);
                env.define_instance_of(&def.name, "function");
                let snapshot = env.clone();
                let chain: Vec<&TypeEnv> = std::iter::once(&snapshot)
                    .chain(frame.cx.outers.iter().copied())
                    .collect();
                self.check_function(def, &chain, None);
            }
            StatementKind::ClassDef(class) => {
                self.error(
                    class.name_span,
                    format!("class '{}' must be defined at module level", class.name),
                );
            }
            StatementKind::Return(value) => {
                self.check_return(value.as_ref(), span, env, frame);
                return Flow::Exits;
            }
            StatementKind::Assign(assign) => self.check_assign(assign, env, frame),
            StatementKind::AnnAssign(assign) => self.check_ann_assign(assign, span, env, frame),
            StatementKind::AugAssign(assign) => self.check_aug_assign(assign, span, env, frame),
            StatementKind::If(conditional) => return self.check_if(conditional, env, frame),
            StatementKind::While(looped) => self.check_while(looped, env, frame),
            StatementKind::For(looped) => self.check_for(looped, env, frame),
            StatementKind::Expression(expression) => {
                self.type_expr(expression, env, &frame.cx);
            }
            StatementKind::Raise(value) => {
                if let Some(value) = value {
                    self.type_expr(value, env, &frame.cx);
                }
                return Flow::Exits;
            }
            StatementKind::Break | StatementKind::Continue => return Flow::Exits,
            StatementKind::Pass => {}
        }
        Flow::Continues
    }

    fn check_return(
        &mut self,
        value: Option<&Expression>,
        span: SourceSpan,
        env: &TypeEnv,
        frame: &Frame<'_>,
    ) {
        let typed = match value {
            Some(value) => match self.type_expr(value, env, &frame.cx) {
                Some(typed) => typed,
                None => return,
            },
            None => Typed::of(TypeKind::NoneType),
        };
        let Some(declared) = &frame.returns else {
            return;
        };
        if !compatible(declared, &typed) {
            let span = value.map_or(span, |value| value.span);
            self.error(
                span,
                format!(
                    "'{}' must return {}, found {}",
                    frame.function,
                    declared.describe(),
                    describe_typed(&typed)
                ),
            );
        }
    }

    fn check_assign(&mut self, assign: &AssignStatement, env: &mut TypeEnv, frame: &Frame<'_>) {
        match self.type_expr(&assign.value, env, &frame.cx) {
            Some(typed) => self.assign_target(&assign.target, typed, env, frame),
            None => forget_target(&assign.target, env),
        }
    }

    fn assign_target(
        &mut self,
        target: &Expression,
        typed: Typed,
        env: &mut TypeEnv,
        frame: &Frame<'_>,
    ) {
        match &target.kind {
            ExpressionKind::Name(name) => {
                self.table.record(target.id, typed.kind, None);
                bind_value(env, name, typed, target.span);
            }
            ExpressionKind::Attribute(attribute) => {
                if self.type_expr(&attribute.value, env, &frame.cx).is_none() {
                    return;
                }
                if let Some(owner) = attribute.value.as_name() {
                    env.set_attr(owner, &attribute.attr, typed.set);
                }
                self.table.record(target.id, typed.kind, None);
            }
            ExpressionKind::Tuple(items) | ExpressionKind::List(items) => {
                let per_index = match &typed.shape {
                    Some(Shape::Tuple(elems)) => {
                        if elems.len() != items.len() {
                            self.error(
                                target.span,
                                format!(
                                    "cannot unpack {} values into {} targets",
                                    elems.len(),
                                    items.len()
                                ),
                            );
                            return;
                        }
                        elems.clone()
                    }
                    Some(Shape::List { elems, .. }) => vec![*elems; items.len()],
                    _ => vec![TypeSet::empty(); items.len()],
                };
                for (item, set) in items.iter().zip(per_index) {
                    self.assign_target(item, Typed::from_set(set), env, frame);
                }
            }
            ExpressionKind::Subscript(subscript) => {
                let Some(base) = self.type_expr(&subscript.value, env, &frame.cx) else {
                    return;
                };
                if self.type_expr(&subscript.index, env, &frame.cx).is_none() {
                    return;
                }
                self.check_item_store(&base, &typed, target.span);
            }
            _ => self.error(target.span, "unsupported assignment target"),
        }
    }

    fn check_item_store(&mut self, base: &Typed, value: &Typed, span: SourceSpan) {
        let stored = value.set;
        if base.set.is_empty() {
            return;
        }
        if base.set == TypeSet::LIST {
            let elems = base.list_elems();
            if !elems.is_empty() && !stored.is_empty() && !stored.is_within(elems) {
                self.error(
                    span,
                    format!(
                        "cannot store {} in list of {}",
                        stored.describe(),
                        elems.describe()
                    ),
                );
            }
            return;
        }
        if base.set == TypeSet::DICT {
            if let Some(Shape::Dict { values, .. }) = &base.shape {
                if !values.is_empty() && !stored.is_empty() && !stored.is_within(*values) {
                    self.error(
                        span,
                        format!(
                            "cannot store {} in dict of {} values",
                            stored.describe(),
                            values.describe()
                        ),
                    );
                }
            }
            return;
        }
        self.error(
            span,
            format!("{} does not support item assignment", base.set.describe()),
        );
    }

    fn check_ann_assign(
        &mut self,
        assign: &AnnAssignStatement,
        span: SourceSpan,
        env: &mut TypeEnv,
        frame: &Frame<'_>,
    ) {
        let name = assign.target.as_str();
        let typed = match &assign.value {
            Some(value) => match self.type_expr(value, env, &frame.cx) {
                Some(typed) => Some(typed),
                None => {
                    forget(env, name);
                    return;
                }
            },
            None => None,
        };

        let Some(declared) = resolve_annotation(&assign.annotation) else {
            match &assign.annotation {
                TypeAnnotation::Name(class) if self.cx.class(class).is_some() => {
                    env.remove(name);
                    env.define_instance_of(name, class);
                }
                _ => bind_value(env, name, typed.unwrap_or_else(Typed::unknown), span),
            }
            return;
        };

        if let Some(typed) = &typed {
            if !compatible(&declared, typed) {
                let at = assign.value.as_ref().map_or(span, |value| value.span);
                self.error(
                    at,
                    format!(
                        "cannot assign {} to '{name}' declared as {}",
                        describe_typed(typed),
                        declared.describe()
                    ),
                );
            }
        }
        bind_declared(env, name, &assign.annotation, declared, span);
        if let Some(Typed {
            set,
            shape: Some(shape),
            ..
        }) = typed
        {
            if set == declared.mask() && declared.list_elem_mask.is_empty() {
                record_shape(env, name, shape);
            }
        }
    }

    fn check_aug_assign(
        &mut self,
        assign: &AugAssignStatement,
        span: SourceSpan,
        env: &mut TypeEnv,
        frame: &Frame<'_>,
    ) {
        let result = {
            let mut typer =
                ExpressionTyper::new(env, &frame.cx, &mut self.diagnostics, &mut self.table);
            typer.visit_augmented(&assign.target, assign.operator, &assign.value, span)
        };
        let Ok(typed) = result else {
            return;
        };
        match &assign.target.kind {
            ExpressionKind::Name(name) => bind_value(env, name, typed, assign.target.span),
            ExpressionKind::Attribute(attribute) => {
                if let Some(owner) = attribute.value.as_name() {
                    env.set_attr(owner, &attribute.attr, typed.set);
                }
            }
            ExpressionKind::Subscript(subscript) => {
                if let Some(base) = self.type_expr(&subscript.value, env, &frame.cx) {
                    self.check_item_store(&base, &typed, assign.target.span);
                }
            }
            _ => self.error(assign.target.span, "unsupported assignment target"),
        }
    }

    /// Type a branch or loop guard. Guards must be `bool`; a bare name is
    /// accepted as a truthiness test.
    fn check_condition(&mut self, test: &Expression, env: &TypeEnv, frame: &Frame<'_>) {
        let Some(typed) = self.type_expr(test, env, &frame.cx) else {
            return;
        };
        let truthiness = matches!(test.kind, ExpressionKind::Name(_));
        if typed.set != TypeSet::BOOL && !typed.set.is_empty() && !truthiness {
            self.error(
                test.span,
                format!("condition must be bool, found {}", typed.set.describe()),
            );
        }
    }

    fn check_if(
        &mut self,
        conditional: &IfStatement,
        env: &mut TypeEnv,
        frame: &Frame<'_>,
    ) -> Flow {
        self.check_condition(&conditional.test, env, frame);
        let adopted = adopt_guarded(&conditional.test, env, frame);
        let mut body_env = env.clone();
        let mut orelse_env = env.clone();
        narrow(&conditional.test, &mut body_env, &mut orelse_env);

        let body_flow = self.check_block(&conditional.body, &mut body_env, frame);
        let orelse_flow = self.check_block(&conditional.orelse, &mut orelse_env, frame);
        match (body_flow, orelse_flow) {
            (Flow::Continues, Flow::Continues) => {
                env.intersect_from(&body_env, &orelse_env);
                for name in &adopted {
                    env.remove(name);
                }
            }
            (Flow::Exits, Flow::Continues) => env.apply_merged(&orelse_env),
            (Flow::Continues, Flow::Exits) => env.apply_merged(&body_env),
            (Flow::Exits, Flow::Exits) => return Flow::Exits,
        }
        tracing::debug!(
            function = frame.function,
            ?body_flow,
            ?orelse_flow,
            "joined branches"
        );
        Flow::Continues
    }

    fn check_while(&mut self, looped: &WhileStatement, env: &mut TypeEnv, frame: &Frame<'_>) {
        self.check_condition(&looped.test, env, frame);
        let adopted = adopt_guarded(&looped.test, env, frame);
        let mut body_env = env.clone();
        narrow(&looped.test, &mut body_env, &mut env.clone());
        self.check_block(&looped.body, &mut body_env, frame);
        let before = env.clone();
        env.intersect_from(&before, &body_env);
        for name in &adopted {
            env.remove(name);
        }
    }

    fn check_for(&mut self, looped: &ForStatement, env: &mut TypeEnv, frame: &Frame<'_>) {
        let Some(iterable) = self.type_expr(&looped.iter, env, &frame.cx) else {
            return;
        };
        let Some(elements) = Elements::of(&iterable) else {
            self.error(
                looped.iter.span,
                format!("{} is not iterable", iterable.set.describe()),
            );
            return;
        };
        let mut body_env = env.clone();
        let bound = bind_target(&mut body_env, &looped.target, elements, &mut self.table);
        if let Err(error) = bound {
            self.error(error.span(), error.to_string());
            return;
        }
        self.check_block(&looped.body, &mut body_env, frame);
        let before = env.clone();
        env.intersect_from(&before, &body_env);
    }
}

fn describe_typed(typed: &Typed) -> String {
    match &typed.instance {
        Some(tag) if typed.set.is_empty() => format!("'{tag}' object"),
        _ => typed.set.describe(),
    }
}

/// Whether a value may be stored under a declaration. Values nothing is
/// known about are accepted; functions, channels and class instances never
/// match a builtin kind.
fn compatible(declared: &Declared, typed: &Typed) -> bool {
    if typed.set.is_empty() {
        return typed.instance.as_deref().map_or(true, |tag| tag == OPAQUE);
    }
    if !typed.set.is_within(declared.mask()) {
        return false;
    }
    let elems = typed.list_elems();
    declared.list_elem_mask.is_empty()
        || elems.is_empty()
        || elems.is_within(declared.list_elem_mask)
}

fn bind_declared(
    env: &mut TypeEnv,
    name: &str,
    annotation: &TypeAnnotation,
    declared: Declared,
    span: SourceSpan,
) {
    env.remove(name);
    env.define_set(name, declared.mask(), span);
    if !declared.list_elem_mask.is_empty() {
        env.set_list_elems(name, declared.list_elem_mask);
    }
    if let Some(elems) = tuple_annotation_elems(annotation) {
        env.set_tuple_elems(name, elems);
    }
    if let Some((keys, values)) = dict_annotation_shape(annotation) {
        env.set_dict_shape(name, keys, values);
    }
}

/// Rebind `name` to an assigned value. Opaque values keep their nominal tag.
fn bind_value(env: &mut TypeEnv, name: &str, typed: Typed, span: SourceSpan) {
    env.remove(name);
    if let Some(tag) = &typed.instance {
        env.define_instance_of(name, tag);
        return;
    }
    if typed.set.is_empty() {
        env.define_instance_of(name, OPAQUE);
        return;
    }
    env.define_set(name, typed.set, span);
    if let Some(shape) = typed.shape {
        record_shape(env, name, shape);
    }
}

fn record_shape(env: &mut TypeEnv, name: &str, shape: Shape) {
    match shape {
        Shape::List { elems, tuple_elems } => {
            if !elems.is_empty() {
                env.set_list_elems(name, elems);
            }
            if let Some(per_index) = tuple_elems {
                env.set_tuple_elems(name, per_index);
            }
        }
        Shape::Tuple(elems) => env.set_tuple_elems(name, elems),
        Shape::Dict { keys, values } => env.set_dict_shape(name, keys, values),
    }
}

fn forget(env: &mut TypeEnv, name: &str) {
    env.remove(name);
    env.define_instance_of(name, OPAQUE);
}

/// Mark every name of a target whose value failed to type as opaque, so the
/// failure is reported once rather than at every later use.
fn forget_target(target: &Expression, env: &mut TypeEnv) {
    match &target.kind {
        ExpressionKind::Name(name) => forget(env, name),
        ExpressionKind::Tuple(items) | ExpressionKind::List(items) => {
            for item in items {
                forget_target(item, env);
            }
        }
        _ => {}
    }
}

/// Names a guard can narrow.
fn guarded_names<'e>(test: &'e Expression, names: &mut Vec<&'e str>) {
    match &test.kind {
        ExpressionKind::Unary(unary) if unary.operator == UnaryOperator::Not => {
            guarded_names(&unary.operand, names)
        }
        ExpressionKind::Binary(binary) => match binary.operator {
            BinaryOperator::Is | BinaryOperator::IsNot => names.extend(binary.left.as_name()),
            BinaryOperator::And | BinaryOperator::Or => {
                guarded_names(&binary.left, names);
                guarded_names(&binary.right, names);
            }
            _ => {}
        },
        ExpressionKind::Call(call) if call.callee.as_name() == Some("isinstance") => {
            names.extend(call.arguments.first().and_then(Expression::as_name));
        }
        ExpressionKind::Name(name) => names.push(name),
        _ => {}
    }
}

/// Copy outer bindings of the names `test` narrows into `env`. Returns the
/// adopted names; they are dropped again when both outcomes rejoin.
fn adopt_guarded(test: &Expression, env: &mut TypeEnv, frame: &Frame<'_>) -> Vec<String> {
    let mut names = Vec::new();
    guarded_names(test, &mut names);

    let mut adopted = Vec::new();
    for name in names {
        if env.has(name) || frame.cx.is_assigned_local(name) {
            continue;
        }
        let outer = frame.cx.outers.iter().find(|outer| outer.has(name));
        if let Some(outer) = outer {
            env.adopt(name, outer);
            adopted.push(name.to_string());
        }
    }
    adopted
}

/// Refine the envs of the two outcomes of `test`.
fn narrow(test: &Expression, when_true: &mut TypeEnv, when_false: &mut TypeEnv) {
    match &test.kind {
        ExpressionKind::Unary(unary) if unary.operator == UnaryOperator::Not => {
            narrow(&unary.operand, when_false, when_true)
        }
        ExpressionKind::Binary(binary) => match binary.operator {
            BinaryOperator::Is | BinaryOperator::IsNot => {
                let (Some(name), ExpressionKind::NoneLiteral) =
                    (binary.left.as_name(), &binary.right.kind)
                else {
                    return;
                };
                let (is_none, not_none) = if binary.operator == BinaryOperator::Is {
                    (when_true, when_false)
                } else {
                    (when_false, when_true)
                };
                is_none.restrict_to_kind(name, TypeKind::NoneType);
                not_none.exclude_kind(name, TypeKind::NoneType);
            }
            BinaryOperator::And => {
                let mut discarded = when_false.clone();
                narrow(&binary.left, when_true, &mut discarded);
                narrow(&binary.right, when_true, &mut discarded);
            }
            BinaryOperator::Or => {
                let mut discarded = when_true.clone();
                narrow(&binary.left, &mut discarded, when_false);
                narrow(&binary.right, &mut discarded, when_false);
            }
            _ => {}
        },
        ExpressionKind::Call(call) if call.callee.as_name() == Some("isinstance") => {
            let [subject, classinfo] = call.arguments.as_slice() else {
                return;
            };
            let Some(name) = subject.as_name() else {
                return;
            };
            let mask = isinstance_mask(classinfo);
            if mask.is_empty() {
                return;
            }
            when_true.restrict_to(name, mask);
            let remaining = when_false.get_set(name) - mask;
            when_false.restrict_to(name, remaining);
        }
        ExpressionKind::Name(name) => when_true.exclude_kind(name, TypeKind::NoneType),
        _ => {}
    }
}

fn isinstance_mask(classinfo: &Expression) -> TypeSet {
    match &classinfo.kind {
        ExpressionKind::Name(name) => resolve_annotation(&TypeAnnotation::Name(name.clone()))
            .map(|declared| declared.mask())
            .unwrap_or_default(),
        ExpressionKind::Tuple(items) => items
            .iter()
            .fold(TypeSet::empty(), |acc, item| acc | isinstance_mask(item)),
        _ => TypeSet::empty(),
    }
}

/// Names a function body binds, not descending into nested definitions.
pub fn assigned_locals(statements: &[Statement]) -> HashSet<String> {
    let mut names = HashSet::new();
    collect_assigned(statements, &mut names);
    names
}

fn collect_assigned(statements: &[Statement], names: &mut HashSet<String>) {
    for statement in statements {
        match &statement.kind {
            StatementKind::Assign(assign) => collect_target(&assign.target, names),
            StatementKind::AnnAssign(assign) => {
                if assign.value.is_some() {
                    names.insert(assign.target.clone());
                }
            }
            StatementKind::AugAssign(assign) => collect_target(&assign.target, names),
            StatementKind::FunctionDef(def) => {
                names.insert(def.name.clone());
            }
            StatementKind::If(conditional) => {
                collect_assigned(&conditional.body, names);
                collect_assigned(&conditional.orelse, names);
            }
            StatementKind::While(looped) => collect_assigned(&looped.body, names),
            StatementKind::For(looped) => {
                collect_target(&looped.target, names);
                collect_assigned(&looped.body, names);
            }
            _ => {}
        }
    }
}

fn collect_target(target: &Expression, names: &mut HashSet<String>) {
    match &target.kind {
        ExpressionKind::Name(name) => {
            names.insert(name.clone());
        }
        ExpressionKind::Tuple(items) | ExpressionKind::List(items) => {
            for item in items {
                collect_target(item, names);
            }
        }
        _ => {}
    }
}
