//! Builtin functions, the supported standard-library modules, and the
//! methods of builtin container types.

use crate::ast::{CallExpression, ExpressionKind, SourceSpan};
use crate::types::{TypeKind, TypeSet};

use super::calls::Argument;
use super::{ExpressionTyper, Reported, Shape, Typed, TypeResult};

use self::StdArity::{Exact, Range};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StdArity {
    Exact(usize),
    Range { min: usize, max: usize },
}

impl StdArity {
    fn allows(self, count: usize) -> bool {
        match self {
            Exact(expected) => expected == count,
            Range { min, max } => (min..=max).contains(&count),
        }
    }

    fn describe(self) -> String {
        match self {
            Exact(expected) => format!("exactly {expected}"),
            Range { min, max } => format!("{min} to {max}"),
        }
    }
}

/// Function of `math`, `sys` or `subprocess`. An empty `ret` marks an opaque
/// result.
struct StdFunction {
    module: &'static str,
    name: &'static str,
    arity: StdArity,
    params: &'static [TypeSet],
    ret: TypeSet,
}

const COMMAND: &[TypeSet] = &[TypeSet::STR.union(TypeSet::LIST)];
const ONE_NUMBER: &[TypeSet] = &[TypeSet::NUMERIC];
const TWO_NUMBERS: &[TypeSet] = &[TypeSet::NUMERIC, TypeSet::NUMERIC];
const EXIT_STATUS: &[TypeSet] = &[TypeSet::INT.union(TypeSet::STR)];

const fn std_function(
    module: &'static str,
    name: &'static str,
    arity: StdArity,
    params: &'static [TypeSet],
    ret: TypeSet,
) -> StdFunction {
    StdFunction {
        module,
        name,
        arity,
        params,
        ret,
    }
}

const fn math(name: &'static str, params: &'static [TypeSet], ret: TypeSet) -> StdFunction {
    std_function("math", name, Exact(params.len()), params, ret)
}

const STDLIB: &[StdFunction] = &[
    math("sqrt", ONE_NUMBER, TypeSet::FLOAT),
    math("sin", ONE_NUMBER, TypeSet::FLOAT),
    math("cos", ONE_NUMBER, TypeSet::FLOAT),
    math("tan", ONE_NUMBER, TypeSet::FLOAT),
    math("exp", ONE_NUMBER, TypeSet::FLOAT),
    std_function("math", "log", Range { min: 1, max: 2 }, TWO_NUMBERS, TypeSet::FLOAT),
    math("log2", ONE_NUMBER, TypeSet::FLOAT),
    math("log10", ONE_NUMBER, TypeSet::FLOAT),
    math("fabs", ONE_NUMBER, TypeSet::FLOAT),
    math("pow", TWO_NUMBERS, TypeSet::FLOAT),
    math("atan2", TWO_NUMBERS, TypeSet::FLOAT),
    math("hypot", TWO_NUMBERS, TypeSet::FLOAT),
    math("floor", ONE_NUMBER, TypeSet::INT),
    math("ceil", ONE_NUMBER, TypeSet::INT),
    math("trunc", ONE_NUMBER, TypeSet::INT),
    math("isnan", ONE_NUMBER, TypeSet::BOOL),
    math("isinf", ONE_NUMBER, TypeSet::BOOL),
    std_function("sys", "exit", Range { min: 0, max: 1 }, EXIT_STATUS, TypeSet::NONE_TYPE),
    std_function("sys", "getrecursionlimit", Exact(0), &[], TypeSet::INT),
    std_function("sys", "setrecursionlimit", Exact(1), &[TypeSet::INT], TypeSet::NONE_TYPE),
    std_function("subprocess", "call", Exact(1), COMMAND, TypeSet::INT),
    std_function("subprocess", "check_call", Exact(1), COMMAND, TypeSet::INT),
    std_function("subprocess", "check_output", Exact(1), COMMAND, TypeSet::STR),
    std_function("subprocess", "getoutput", Exact(1), &[TypeSet::STR], TypeSet::STR),
    std_function("subprocess", "run", Exact(1), COMMAND, TypeSet::empty()),
];

const BUILTINS: [&str; 15] = [
    "len", "eval", "exec", "obj_get", "chan_new", "chan_send", "chan_recv", "print", "str", "int",
    "float", "bool", "abs", "range", "isinstance",
];

pub(super) fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// Attribute of a standard-library module, e.g. `math.pi`.
pub(super) fn stdlib_attribute(module: &str, attr: &str) -> Typed {
    match (module, attr) {
        ("math", "pi" | "e" | "tau" | "inf" | "nan") => Typed::of(TypeKind::Float),
        ("sys", "maxsize") => Typed::of(TypeKind::Int),
        ("sys", "platform" | "version") => Typed::of(TypeKind::Str),
        ("sys", "argv") => Typed::list_of(TypeSet::STR),
        _ => Typed::unknown(),
    }
}

impl<'a, 'cx> ExpressionTyper<'a, 'cx> {
    fn expect_arity(
        &mut self,
        name: &str,
        call: &CallExpression,
        arity: StdArity,
        span: SourceSpan,
    ) -> Result<(), Reported> {
        if let Some(keyword) = call.keywords.first() {
            return self.fail(
                keyword.value.span,
                format!("{name}() takes no keyword arguments"),
            );
        }
        if !arity.allows(call.arguments.len()) {
            return self.fail(
                span,
                format!(
                    "{name}() takes {} argument(s), {} given",
                    arity.describe(),
                    call.arguments.len()
                ),
            );
        }
        Ok(())
    }

    fn require(
        &mut self,
        typed: &Typed,
        allowed: TypeSet,
        span: SourceSpan,
        what: &str,
    ) -> Result<(), Reported> {
        if typed.set.is_empty() || typed.set.is_within(allowed) {
            return Ok(());
        }
        self.fail(
            span,
            format!(
                "{what} must be {}, found {}",
                allowed.describe(),
                typed.set.describe()
            ),
        )
    }

    pub(super) fn builtin_call(
        &mut self,
        name: &str,
        call: &CallExpression,
        span: SourceSpan,
    ) -> TypeResult {
        let args = &call.arguments;
        match name {
            "len" => {
                self.expect_arity(name, call, Exact(1), span)?;
                let arg = self.visit(&args[0])?;
                self.require(&arg, TypeSet::SIZED, args[0].span, "len() argument")?;
                Ok(Typed::of(TypeKind::Int))
            }
            "eval" | "exec" => {
                self.expect_arity(name, call, Exact(1), span)?;
                if !matches!(args[0].kind, ExpressionKind::Str(_)) {
                    return self.fail(
                        args[0].span,
                        format!("{name}() only accepts a string literal argument"),
                    );
                }
                self.visit(&args[0])?;
                if name == "exec" {
                    Ok(Typed::of(TypeKind::NoneType))
                } else {
                    Ok(Typed::unknown())
                }
            }
            "obj_get" => {
                self.expect_arity(name, call, Exact(2), span)?;
                self.visit(&args[0])?;
                let index = self.visit(&args[1])?;
                if index.set != TypeSet::INT {
                    return self.fail(
                        args[1].span,
                        format!("obj_get() index must be int, found {}", index.set.describe()),
                    );
                }
                Ok(Typed::of(TypeKind::Str))
            }
            "chan_new" => {
                self.expect_arity(name, call, Exact(1), span)?;
                let capacity = self.visit(&args[0])?;
                if !capacity.set.is_within(TypeSet::INT | TypeSet::BOOL) {
                    return self.fail(
                        args[0].span,
                        format!(
                            "chan_new() capacity must be int or bool, found {}",
                            capacity.set.describe()
                        ),
                    );
                }
                Ok(Typed::instance("channel"))
            }
            "chan_send" => {
                self.expect_arity(name, call, Exact(2), span)?;
                self.visit(&args[0])?;
                let payload = self.visit(&args[1])?;
                let bytes_literal = matches!(args[1].kind, ExpressionKind::Bytes(_));
                let scalar =
                    payload.set.is_single() && payload.set.is_within(TypeSet::IMMUTABLE_SCALAR);
                if !bytes_literal && !scalar {
                    return self.fail(
                        args[1].span,
                        format!(
                            "chan_send() payload must be an immutable scalar (int, float, bool, str) or a bytes literal, found {}",
                            payload.set.describe()
                        ),
                    );
                }
                Ok(Typed::of(TypeKind::NoneType))
            }
            "chan_recv" => {
                self.expect_arity(name, call, Exact(1), span)?;
                self.visit(&args[0])?;
                Ok(Typed::unknown())
            }
            "print" => {
                self.visit_arguments(call)?;
                Ok(Typed::of(TypeKind::NoneType))
            }
            "str" | "bool" => {
                self.expect_arity(name, call, Range { min: 0, max: 1 }, span)?;
                if let Some(arg) = args.first() {
                    self.visit(arg)?;
                }
                let kind = if name == "str" {
                    TypeKind::Str
                } else {
                    TypeKind::Bool
                };
                Ok(Typed::of(kind))
            }
            "int" | "float" => {
                self.expect_arity(name, call, Range { min: 0, max: 1 }, span)?;
                if let Some(arg) = args.first() {
                    let typed = self.visit(arg)?;
                    let convertible = TypeSet::NUMERIC | TypeSet::STR | TypeSet::BOOL;
                    self.require(&typed, convertible, arg.span, &format!("{name}() argument"))?;
                }
                let kind = if name == "int" {
                    TypeKind::Int
                } else {
                    TypeKind::Float
                };
                Ok(Typed::of(kind))
            }
            "abs" => {
                self.expect_arity(name, call, Exact(1), span)?;
                let typed = self.visit(&args[0])?;
                match typed.set {
                    set if set == TypeSet::INT || set == TypeSet::FLOAT => Ok(Typed::from_set(set)),
                    set => self.fail(
                        args[0].span,
                        format!("abs() requires an int or float, found {}", set.describe()),
                    ),
                }
            }
            "range" => {
                self.expect_arity(name, call, Range { min: 1, max: 3 }, span)?;
                for arg in args {
                    let typed = self.visit(arg)?;
                    if typed.set != TypeSet::INT {
                        return self.fail(
                            arg.span,
                            format!(
                                "range() arguments must be int, found {}",
                                typed.set.describe()
                            ),
                        );
                    }
                }
                Ok(Typed::list_of(TypeSet::INT))
            }
            "isinstance" => {
                self.expect_arity(name, call, Exact(2), span)?;
                self.visit(&args[0])?;
                Ok(Typed::of(TypeKind::Bool))
            }
            _ => self.fail(span, format!("unknown builtin '{name}'")),
        }
    }

    pub(super) fn stdlib_call(
        &mut self,
        module: &str,
        function: &str,
        call: &CallExpression,
        span: SourceSpan,
    ) -> TypeResult {
        let Some(entry) = STDLIB
            .iter()
            .find(|entry| entry.module == module && entry.name == function)
        else {
            return self.fail(
                span,
                format!("module '{module}' has no function '{function}'"),
            );
        };
        let qualified = format!("{module}.{function}");
        self.expect_arity(&qualified, call, entry.arity, span)?;
        for (arg, allowed) in call.arguments.iter().zip(entry.params) {
            let typed = self.visit(arg)?;
            self.require(&typed, *allowed, arg.span, &format!("{qualified}() argument"))?;
        }
        if entry.ret.is_empty() {
            return Ok(Typed::instance(function));
        }
        Ok(Typed::from_set(entry.ret))
    }

    /// Methods of `str`, `list` and `dict` receivers.
    pub(super) fn method_call(
        &mut self,
        receiver: &Typed,
        method: &str,
        arguments: &[Argument<'_>],
        span: SourceSpan,
    ) -> TypeResult {
        let set = receiver.set;
        let result = if set == TypeSet::STR {
            str_method(method)
        } else if set == TypeSet::LIST {
            self.list_method(receiver, method, arguments)?
        } else if set == TypeSet::DICT {
            dict_method(receiver, method, arguments.len())
        } else {
            None
        };
        match result {
            Some(typed) => Ok(typed),
            None => self.fail(
                span,
                format!("{} has no method '{method}'", set.describe()),
            ),
        }
    }

    fn list_method(
        &mut self,
        receiver: &Typed,
        method: &str,
        arguments: &[Argument<'_>],
    ) -> Result<Option<Typed>, Reported> {
        let elems = receiver.list_elems();
        let typed = match method {
            "append" | "insert" | "remove" => {
                if let Some(item) = arguments.last() {
                    let set = item.typed.set;
                    if !elems.is_empty() && !set.is_empty() && !set.is_within(elems) {
                        return self.fail(
                            item.expression.span,
                            format!(
                                "cannot {method} {} to list of {}",
                                set.describe(),
                                elems.describe()
                            ),
                        );
                    }
                }
                Typed::of(TypeKind::NoneType)
            }
            "extend" | "clear" | "sort" | "reverse" => Typed::of(TypeKind::NoneType),
            "pop" => Typed::from_set(elems),
            "index" | "count" => Typed::of(TypeKind::Int),
            "copy" => {
                let mut copy = Typed::of(TypeKind::List);
                copy.shape = receiver.shape.clone();
                copy
            }
            _ => return Ok(None),
        };
        Ok(Some(typed))
    }
}

fn str_method(method: &str) -> Option<Typed> {
    let typed = match method {
        "upper" | "lower" | "strip" | "lstrip" | "rstrip" | "replace" | "join" | "format"
        | "capitalize" | "title" => Typed::of(TypeKind::Str),
        "split" | "splitlines" => Typed::list_of(TypeSet::STR),
        "startswith" | "endswith" | "isdigit" | "isalpha" | "isspace" => {
            Typed::of(TypeKind::Bool)
        }
        "find" | "count" | "index" => Typed::of(TypeKind::Int),
        "encode" => Typed::of(TypeKind::Bytes),
        _ => return None,
    };
    Some(typed)
}

fn dict_method(receiver: &Typed, method: &str, argument_count: usize) -> Option<Typed> {
    let (keys, values) = match &receiver.shape {
        Some(Shape::Dict { keys, values }) => (*keys, *values),
        _ => (TypeSet::empty(), TypeSet::empty()),
    };
    let typed = match method {
        "get" if argument_count < 2 && !values.is_empty() => {
            Typed::from_set(values | TypeSet::NONE_TYPE)
        }
        "get" | "pop" | "setdefault" => Typed::from_set(values),
        "keys" => Typed::list_of(keys),
        "values" => Typed::list_of(values),
        "items" => Typed::of(TypeKind::List).with_shape(Shape::List {
            elems: TypeSet::TUPLE,
            tuple_elems: Some(vec![keys, values]),
        }),
        "clear" | "update" => Typed::of(TypeKind::NoneType),
        "copy" => {
            let mut copy = Typed::of(TypeKind::Dict);
            copy.shape = receiver.shape.clone();
            copy
        }
        _ => return None,
    };
    Some(typed)
}
