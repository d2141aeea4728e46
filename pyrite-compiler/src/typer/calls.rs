use std::collections::{BTreeSet, HashSet};

use crate::ast::{AttributeExpression, CallExpression, Expression, ExpressionKind, SourceSpan};
use crate::signatures::{method_key, Sig, SigParam};
use crate::types::{TypeKind, TypeSet};

use super::{builtins, ExpressionTyper, Reported, Shape, Typed, TypeResult, TypingContext};

/// A typed call argument, positional when `name` is `None` and `keyword` is
/// false; `name == None && keyword` is a `**mapping` unpack.
pub(super) struct Argument<'e> {
    pub name: Option<&'e str>,
    pub keyword: bool,
    pub typed: Typed,
    pub expression: &'e Expression,
}

impl<'a, 'cx> ExpressionTyper<'a, 'cx> {
    pub(super) fn visit_call(&mut self, call: &CallExpression, span: SourceSpan) -> TypeResult {
        match &call.callee.kind {
            ExpressionKind::Name(name) => {
                if builtins::is_builtin(name) && !self.is_bound(name) {
                    return self.builtin_call(name, call, span);
                }
                let arguments = self.visit_arguments(call)?;
                self.named_call(name, &arguments, span)
            }
            ExpressionKind::Attribute(attribute) => {
                if let Some(module) = attribute.value.as_name() {
                    if self.is_stdlib_module(module) {
                        return self.stdlib_call(module, &attribute.attr, call, span);
                    }
                }
                self.attribute_call(attribute, call, span)
            }
            _ => {
                self.visit(&call.callee)?;
                self.visit_arguments(call)?;
                Ok(Typed::unknown())
            }
        }
    }

    pub(super) fn visit_arguments<'e>(
        &mut self,
        call: &'e CallExpression,
    ) -> Result<Vec<Argument<'e>>, Reported> {
        let mut arguments = Vec::with_capacity(call.arguments.len() + call.keywords.len());
        for expression in &call.arguments {
            arguments.push(Argument {
                name: None,
                keyword: false,
                typed: self.visit(expression)?,
                expression,
            });
        }
        for keyword in &call.keywords {
            arguments.push(Argument {
                name: keyword.name.as_deref(),
                keyword: true,
                typed: self.visit(&keyword.value)?,
                expression: &keyword.value,
            });
        }
        Ok(arguments)
    }

    fn named_call(
        &mut self,
        name: &str,
        arguments: &[Argument<'_>],
        span: SourceSpan,
    ) -> TypeResult {
        if let Some(class) = self.cx.class(name) {
            return match class.methods.get("__init__") {
                Some(init) => {
                    let key = method_key(name, "__init__");
                    self.bind(&key, init, arguments, 1, span)?;
                    Ok(Typed::instance(name))
                }
                None if arguments.is_empty() => Ok(Typed::instance(name)),
                None => self.fail(span, format!("{name}() takes no arguments")),
            };
        }
        if let Some(sig) = self.cx.sigs.get(name) {
            let bound = self.bind(name, sig, arguments, 0, span)?;
            return Ok(self.call_result(name, sig, &bound, 0));
        }
        if let Some(targets) = self.cx.poly.and_then(|poly| poly.var_targets(name)) {
            return self.poly_call(targets, arguments, span);
        }
        if self.is_bound(name) {
            let found = self.env.get_set(name);
            if found.is_empty() {
                return Ok(Typed::unknown());
            }
            return self.fail(
                span,
                format!("'{name}' is not callable (bound to {})", found.describe()),
            );
        }
        self.fail(span, format!("unknown function '{name}'"))
    }

    fn attribute_call(
        &mut self,
        attribute: &AttributeExpression,
        call: &CallExpression,
        span: SourceSpan,
    ) -> TypeResult {
        let method = attribute.attr.as_str();
        if let Some(owner) = attribute.value.as_name() {
            let is_class = self.cx.class(owner).is_some()
                || self.cx.sigs.contains_key(&method_key(owner, method));
            if is_class && !self.is_bound(owner) {
                let arguments = self.visit_arguments(call)?;
                let key = method_key(owner, method);
                let Some(sig) = self.method_sig(owner, method) else {
                    return self.fail(span, format!("class '{owner}' has no method '{method}'"));
                };
                let bound = self.bind(&key, sig, &arguments, 0, span)?;
                let defining = self.defining_key(owner, method);
                return Ok(self.call_result(&defining, sig, &bound, 0));
            }

            if let Some(class) = self.lookup_instance(owner) {
                self.visit(&attribute.value)?;
                let arguments = self.visit_arguments(call)?;
                if let Some(sig) = self.method_sig(class, method) {
                    let key = method_key(class, method);
                    let bound = self.bind(&key, sig, &arguments, 1, span)?;
                    let defining = self.defining_key(class, method);
                    return Ok(self.call_result(&defining, sig, &bound, 1));
                }
                if let Some(targets) = self.cx.poly.and_then(|poly| poly.attr_targets(method)) {
                    return self.poly_call(targets, &arguments, span);
                }
                if self.cx.class(class).is_some() {
                    return self.fail(
                        span,
                        format!("'{class}' object has no method '{method}'"),
                    );
                }
                return Ok(Typed::unknown());
            }
        }

        let receiver = self.visit(&attribute.value)?;
        let arguments = self.visit_arguments(call)?;
        if let Some(targets) = self.cx.poly.and_then(|poly| poly.attr_targets(method)) {
            return self.poly_call(targets, &arguments, span);
        }
        if receiver.set.is_empty() {
            return Ok(Typed::unknown());
        }
        self.method_call(&receiver, method, &arguments, span)
    }

    /// Method signature from the merged class table, falling back to the
    /// module's qualified signatures.
    fn method_sig(&self, class: &str, method: &str) -> Option<&'cx Sig> {
        let cx: &TypingContext<'cx> = self.cx;
        cx.class(class)
            .and_then(|info| info.methods.get(method))
            .or_else(|| cx.sigs.get(&method_key(class, method)))
    }

    /// Signature key of the class that defines `method`: `class` itself or
    /// the first base providing it, searched left to right.
    fn defining_key(&self, class: &str, method: &str) -> String {
        let mut pending = vec![class];
        let mut seen = HashSet::new();
        while let Some(current) = pending.pop() {
            if !seen.insert(current) {
                continue;
            }
            let key = method_key(current, method);
            if self.cx.sigs.contains_key(&key) {
                return key;
            }
            if let Some(info) = self.cx.class(current) {
                pending.extend(info.bases.iter().rev().map(String::as_str));
            }
        }
        method_key(class, method)
    }

    fn poly_call(
        &mut self,
        targets: &BTreeSet<String>,
        arguments: &[Argument<'_>],
        span: SourceSpan,
    ) -> TypeResult {
        let mut result = TypeSet::empty();
        for target in targets {
            let Some(sig) = self.cx.sigs.get(target) else {
                return self.fail(span, format!("unknown call target '{target}'"));
            };
            let bound = self.bind(target, sig, arguments, 0, span)?;
            result |= self.call_result(target, sig, &bound, 0).set;
        }
        Ok(Typed::from_set(result))
    }

    /// Bind arguments to the parameters of `sig` (skipping the first `skip`
    /// parameters, e.g. `self`). Returns the argument bound to each remaining
    /// parameter slot.
    pub(super) fn bind(
        &mut self,
        key: &str,
        sig: &Sig,
        arguments: &[Argument<'_>],
        skip: usize,
        span: SourceSpan,
    ) -> Result<Vec<Option<Typed>>, Reported> {
        if sig.full.is_empty() {
            return self.bind_simple(key, sig, arguments, span);
        }

        let params = &sig.full[skip.min(sig.full.len())..];
        let mut bound: Vec<Option<Typed>> = vec![None; params.len()];
        let slots: Vec<usize> = params
            .iter()
            .enumerate()
            .filter(|(_, param)| param.is_positional_slot())
            .map(|(index, _)| index)
            .collect();
        let var_arg = params.iter().position(|param| param.is_var_arg);
        let kw_var_arg = params.iter().position(|param| param.is_kw_var_arg);

        let positional: Vec<&Argument<'_>> = arguments.iter().filter(|arg| !arg.keyword).collect();
        for (position, argument) in positional.iter().enumerate() {
            if let Some(&slot) = slots.get(position) {
                self.check_argument(key, &params[slot], argument)?;
                bound[slot] = Some(argument.typed.clone());
            } else if let Some(variadic) = var_arg {
                self.check_argument(key, &params[variadic], argument)?;
            } else {
                return self.fail(
                    argument.expression.span,
                    format!(
                        "{key}() takes {} positional argument(s) but {} were given",
                        slots.len(),
                        positional.len()
                    ),
                );
            }
        }

        let mut unpacked_mapping = false;
        for argument in arguments.iter().filter(|arg| arg.keyword) {
            let Some(name) = argument.name else {
                let set = argument.typed.set;
                if !set.is_empty() && set != TypeSet::DICT {
                    return self.fail(
                        argument.expression.span,
                        format!("argument after ** must be a dict, found {}", set.describe()),
                    );
                }
                unpacked_mapping = true;
                continue;
            };
            let named = params
                .iter()
                .position(|param| param.name == name && !param.is_variadic());
            match named {
                Some(index) => {
                    if params[index].is_pos_only {
                        return self.fail(
                            argument.expression.span,
                            format!(
                                "{key}() got positional-only argument '{name}' passed as keyword"
                            ),
                        );
                    }
                    if bound[index].is_some() {
                        return self.fail(
                            argument.expression.span,
                            format!("{key}() got multiple values for argument '{name}'"),
                        );
                    }
                    self.check_argument(key, &params[index], argument)?;
                    bound[index] = Some(argument.typed.clone());
                }
                None => match kw_var_arg {
                    Some(variadic) => self.check_argument(key, &params[variadic], argument)?,
                    None => {
                        return self.fail(
                            argument.expression.span,
                            format!("{key}() got an unexpected keyword argument '{name}'"),
                        )
                    }
                },
            }
        }

        if !unpacked_mapping {
            let missing = params
                .iter()
                .zip(&bound)
                .find(|(param, slot)| !param.is_variadic() && slot.is_none() && !param.has_default);
            if let Some((param, _)) = missing {
                return self.fail(
                    span,
                    format!("{key}() missing required argument '{}'", param.name),
                );
            }
        }
        Ok(bound)
    }

    fn bind_simple(
        &mut self,
        key: &str,
        sig: &Sig,
        arguments: &[Argument<'_>],
        span: SourceSpan,
    ) -> Result<Vec<Option<Typed>>, Reported> {
        if let Some(keyword) = arguments.iter().find(|arg| arg.keyword) {
            return self.fail(
                keyword.expression.span,
                format!("{key}() takes no keyword arguments"),
            );
        }
        if arguments.len() != sig.params.len() {
            return self.fail(
                span,
                format!(
                    "{key}() takes {} argument(s) but {} were given",
                    sig.params.len(),
                    arguments.len()
                ),
            );
        }
        for (position, (kind, argument)) in sig.params.iter().zip(arguments).enumerate() {
            let set = argument.typed.set;
            let expected = TypeSet::of(*kind);
            if !set.is_empty() && !kind.is_marker() && !set.is_within(expected) {
                return self.fail(
                    argument.expression.span,
                    format!(
                        "argument {} of {key}() expects {}, found {}",
                        position + 1,
                        kind.describe(),
                        set.describe()
                    ),
                );
            }
        }
        Ok(arguments.iter().map(|arg| Some(arg.typed.clone())).collect())
    }

    fn check_argument(
        &mut self,
        key: &str,
        param: &SigParam,
        argument: &Argument<'_>,
    ) -> Result<(), Reported> {
        if param.accepts(argument.typed.set) {
            return Ok(());
        }
        self.fail(
            argument.expression.span,
            format!(
                "argument '{}' of {key}() expects {}, found {}",
                param.name,
                param.describe_expected(),
                argument.typed.set.describe()
            ),
        )
    }

    /// Type of a resolved call: the declared return, or for unannotated
    /// pass-through functions the type of the argument handed back.
    fn call_result(&self, key: &str, sig: &Sig, bound: &[Option<Typed>], skip: usize) -> Typed {
        if let Some(kind) = sig.ret {
            let typed = Typed::from_set(sig.ret_set());
            if kind == TypeKind::List && !sig.ret_list_elems.is_empty() {
                return typed.with_shape(Shape::List {
                    elems: sig.ret_list_elems,
                    tuple_elems: None,
                });
            }
            return typed;
        }
        let passed = self
            .cx
            .ret_param_idxs
            .get(key)
            .and_then(|index| index.checked_sub(skip))
            .and_then(|index| bound.get(index).cloned().flatten());
        match passed {
            Some(typed) => typed.with_key(None),
            None => Typed::unknown(),
        }
    }
}
