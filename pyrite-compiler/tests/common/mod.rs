//! Syntax tree builders and typing harnesses shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use pyrite_compiler::{
    build_sigs, collect_classes, compute_return_param_idxs, infer_expr_type, merge_class_bases,
    Analysis, AnalysisOptions, Analyzer, AnnAssignStatement, AssignStatement,
    AttributeExpression, AugAssignStatement, BinaryExpression, BinaryOperator, CallExpression,
    ClassDef, ClassInfo, Comprehension, ComprehensionClause, ConditionalExpression,
    DictComprehension, DictEntry, Diagnostics, Expression, ExpressionKind, ForStatement,
    FunctionDef, IfStatement, KeywordArgument, Module, NodeId, Parameter, ParameterKind,
    PolyTargets, Sig, SliceExpression, SourceSpan, Statement, StatementKind, SubscriptExpression,
    TypeAnnotation, TypeEnv, TypeKind, TypeResult, TypeTable, Typed, TypingContext,
    UnaryExpression, UnaryOperator, WhileStatement,
};

pub const FILE: &str = "test.py";

static NEXT_ID: AtomicU32 = AtomicU32::new(1);

pub fn next_id() -> NodeId {
    NodeId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

pub fn span() -> SourceSpan {
    SourceSpan::new(1, 1, 1, 1)
}

pub fn expr(kind: ExpressionKind) -> Expression {
    Expression::new(next_id(), span(), kind)
}

pub fn int(value: i64) -> Expression {
    expr(ExpressionKind::Int(value))
}

pub fn float(value: f64) -> Expression {
    expr(ExpressionKind::Float(value))
}

pub fn string(value: &str) -> Expression {
    expr(ExpressionKind::Str(value.to_string()))
}

pub fn bytes(value: &[u8]) -> Expression {
    expr(ExpressionKind::Bytes(value.to_vec()))
}

pub fn boolean(value: bool) -> Expression {
    expr(ExpressionKind::Bool(value))
}

pub fn none() -> Expression {
    expr(ExpressionKind::NoneLiteral)
}

pub fn name(value: &str) -> Expression {
    expr(ExpressionKind::Name(value.to_string()))
}

pub fn attr(value: Expression, attr: &str) -> Expression {
    expr(ExpressionKind::Attribute(AttributeExpression {
        value: Box::new(value),
        attr: attr.to_string(),
    }))
}

pub fn tuple(items: Vec<Expression>) -> Expression {
    expr(ExpressionKind::Tuple(items))
}

pub fn list(items: Vec<Expression>) -> Expression {
    expr(ExpressionKind::List(items))
}

pub fn set_literal(items: Vec<Expression>) -> Expression {
    expr(ExpressionKind::Set(items))
}

pub fn dict(entries: Vec<(Expression, Expression)>) -> Expression {
    let entries = entries
        .into_iter()
        .map(|(key, value)| DictEntry {
            key: Some(key),
            value,
        })
        .collect();
    expr(ExpressionKind::Dict(entries))
}

pub fn dict_unpack(value: Expression) -> Expression {
    expr(ExpressionKind::Dict(vec![DictEntry { key: None, value }]))
}

pub fn unary(operator: UnaryOperator, operand: Expression) -> Expression {
    expr(ExpressionKind::Unary(UnaryExpression {
        operator,
        operand: Box::new(operand),
    }))
}

pub fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Expression {
    expr(ExpressionKind::Binary(BinaryExpression {
        operator,
        left: Box::new(left),
        right: Box::new(right),
    }))
}

pub fn call(callee: Expression, arguments: Vec<Expression>) -> Expression {
    call_kw(callee, arguments, Vec::new())
}

pub fn call_kw(
    callee: Expression,
    arguments: Vec<Expression>,
    keywords: Vec<(&str, Expression)>,
) -> Expression {
    let keywords = keywords
        .into_iter()
        .map(|(keyword, value)| KeywordArgument {
            name: Some(keyword.to_string()),
            value,
        })
        .collect();
    expr(ExpressionKind::Call(CallExpression {
        callee: Box::new(callee),
        arguments,
        keywords,
    }))
}

/// `callee(**mapping)`
pub fn call_unpacked(callee: Expression, mapping: Expression) -> Expression {
    expr(ExpressionKind::Call(CallExpression {
        callee: Box::new(callee),
        arguments: Vec::new(),
        keywords: vec![KeywordArgument {
            name: None,
            value: mapping,
        }],
    }))
}

pub fn call_named(function: &str, arguments: Vec<Expression>) -> Expression {
    call(name(function), arguments)
}

pub fn method(receiver: Expression, method: &str, arguments: Vec<Expression>) -> Expression {
    call(attr(receiver, method), arguments)
}

pub fn subscript(value: Expression, index: Expression) -> Expression {
    expr(ExpressionKind::Subscript(SubscriptExpression {
        value: Box::new(value),
        index: Box::new(index),
    }))
}

pub fn slice(
    lower: Option<Expression>,
    upper: Option<Expression>,
    step: Option<Expression>,
) -> Expression {
    expr(ExpressionKind::Slice(SliceExpression {
        lower: lower.map(Box::new),
        upper: upper.map(Box::new),
        step: step.map(Box::new),
    }))
}

pub fn conditional(test: Expression, body: Expression, orelse: Expression) -> Expression {
    expr(ExpressionKind::Conditional(ConditionalExpression {
        test: Box::new(test),
        body: Box::new(body),
        orelse: Box::new(orelse),
    }))
}

pub fn clause(target: Expression, iter: Expression, ifs: Vec<Expression>) -> ComprehensionClause {
    ComprehensionClause { target, iter, ifs }
}

pub fn list_comp(element: Expression, clauses: Vec<ComprehensionClause>) -> Expression {
    expr(ExpressionKind::ListComp(Comprehension {
        element: Box::new(element),
        clauses,
    }))
}

pub fn generator(element: Expression, clauses: Vec<ComprehensionClause>) -> Expression {
    expr(ExpressionKind::GeneratorExp(Comprehension {
        element: Box::new(element),
        clauses,
    }))
}

pub fn dict_comp(
    key: Expression,
    value: Expression,
    clauses: Vec<ComprehensionClause>,
) -> Expression {
    expr(ExpressionKind::DictComp(DictComprehension {
        key: Box::new(key),
        value: Box::new(value),
        clauses,
    }))
}

pub fn stmt(kind: StatementKind) -> Statement {
    Statement { span: span(), kind }
}

pub fn assign(target: Expression, value: Expression) -> Statement {
    stmt(StatementKind::Assign(AssignStatement { target, value }))
}

pub fn assign_name(target: &str, value: Expression) -> Statement {
    assign(name(target), value)
}

pub fn ann_assign(
    target: &str,
    annotation: TypeAnnotation,
    value: Option<Expression>,
) -> Statement {
    stmt(StatementKind::AnnAssign(AnnAssignStatement {
        target: target.to_string(),
        annotation,
        value,
    }))
}

pub fn aug_assign(target: Expression, operator: BinaryOperator, value: Expression) -> Statement {
    stmt(StatementKind::AugAssign(AugAssignStatement {
        target,
        operator,
        value,
    }))
}

pub fn ret(value: Expression) -> Statement {
    stmt(StatementKind::Return(Some(value)))
}

pub fn ret_none() -> Statement {
    stmt(StatementKind::Return(None))
}

pub fn if_(test: Expression, body: Vec<Statement>, orelse: Vec<Statement>) -> Statement {
    stmt(StatementKind::If(IfStatement { test, body, orelse }))
}

pub fn while_(test: Expression, body: Vec<Statement>) -> Statement {
    stmt(StatementKind::While(WhileStatement { test, body }))
}

pub fn for_(target: Expression, iter: Expression, body: Vec<Statement>) -> Statement {
    stmt(StatementKind::For(ForStatement { target, iter, body }))
}

pub fn expr_stmt(expression: Expression) -> Statement {
    stmt(StatementKind::Expression(expression))
}

pub fn pass() -> Statement {
    stmt(StatementKind::Pass)
}

pub fn ty(annotation: &str) -> TypeAnnotation {
    TypeAnnotation::Name(annotation.to_string())
}

pub fn generic(base: &str, arguments: Vec<TypeAnnotation>) -> TypeAnnotation {
    TypeAnnotation::Generic {
        base: base.to_string(),
        arguments,
    }
}

pub fn optional(inner: TypeAnnotation) -> TypeAnnotation {
    generic("Optional", vec![inner])
}

pub fn param(parameter: &str, annotation: Option<TypeAnnotation>) -> Parameter {
    Parameter {
        name: parameter.to_string(),
        span: span(),
        kind: ParameterKind::Normal,
        annotation,
        default: None,
    }
}

pub fn typed_param(parameter: &str, annotation: &str) -> Parameter {
    param(parameter, Some(ty(annotation)))
}

pub fn param_kind(
    parameter: &str,
    annotation: Option<TypeAnnotation>,
    kind: ParameterKind,
) -> Parameter {
    Parameter {
        kind,
        ..param(parameter, annotation)
    }
}

pub fn with_default(parameter: Parameter, default: Expression) -> Parameter {
    Parameter {
        default: Some(default),
        ..parameter
    }
}

pub fn function_def(
    function: &str,
    parameters: Vec<Parameter>,
    returns: Option<TypeAnnotation>,
    body: Vec<Statement>,
) -> FunctionDef {
    FunctionDef {
        name: function.to_string(),
        name_span: span(),
        parameters,
        returns,
        body,
    }
}

pub fn function(
    function: &str,
    parameters: Vec<Parameter>,
    returns: Option<TypeAnnotation>,
    body: Vec<Statement>,
) -> Statement {
    stmt(StatementKind::FunctionDef(function_def(
        function, parameters, returns, body,
    )))
}

pub fn class(class_name: &str, bases: &[&str], body: Vec<Statement>) -> Statement {
    stmt(StatementKind::ClassDef(ClassDef {
        name: class_name.to_string(),
        name_span: span(),
        bases: bases.iter().map(|base| base.to_string()).collect(),
        body,
    }))
}

/// Method taking an unannotated `self` followed by `parameters`.
pub fn method_def(
    method: &str,
    parameters: Vec<Parameter>,
    returns: Option<TypeAnnotation>,
    body: Vec<Statement>,
) -> Statement {
    let mut all = vec![param("self", None)];
    all.extend(parameters);
    function(method, all, returns, body)
}

pub fn module(body: Vec<Statement>) -> Module {
    Module::new(body)
}

/// Result of typing one expression in isolation.
pub struct Outcome {
    pub result: TypeResult,
    pub diagnostics: Diagnostics,
    pub table: TypeTable,
}

impl Outcome {
    pub fn typed(&self) -> &Typed {
        match &self.result {
            Ok(typed) => typed,
            Err(_) => panic!(
                "expected expression to type, found {:?}",
                self.diagnostics.messages()
            ),
        }
    }

    pub fn kind(&self) -> TypeKind {
        self.typed().kind
    }

    /// The single diagnostic of a failed typing.
    pub fn error(&self) -> &str {
        assert!(self.result.is_err(), "expected typing to fail");
        assert_eq!(
            self.diagnostics.len(),
            1,
            "expected exactly one diagnostic, found {:?}",
            self.diagnostics.messages()
        );
        &self.diagnostics.entries()[0].message
    }
}

pub fn infer_with(expression: &Expression, env: &TypeEnv, cx: &TypingContext<'_>) -> Outcome {
    let mut diagnostics = Diagnostics::new();
    let mut table = TypeTable::new();
    let result = infer_expr_type(expression, env, cx, &mut diagnostics, &mut table);
    Outcome {
        result,
        diagnostics,
        table,
    }
}

/// Type `expression` with no user functions or classes in scope.
pub fn infer(expression: &Expression, env: &TypeEnv) -> Outcome {
    let sigs = Default::default();
    let ret_param_idxs = Default::default();
    let cx = TypingContext::new(FILE, &sigs, &ret_param_idxs);
    infer_with(expression, env, &cx)
}

/// Signatures, classes and call targets of a module, for typing
/// expressions against its declarations.
pub struct Scope {
    pub sigs: HashMap<String, Sig>,
    pub ret_param_idxs: HashMap<String, usize>,
    pub classes: HashMap<String, ClassInfo>,
    pub poly: PolyTargets,
}

impl Scope {
    pub fn of(module: &Module) -> Self {
        let sigs = build_sigs(module);
        let (mut classes, _) = collect_classes(module, FILE, true);
        merge_class_bases(&mut classes, FILE);
        Self {
            ret_param_idxs: compute_return_param_idxs(module),
            poly: PolyTargets::collect(module, &sigs),
            sigs,
            classes,
        }
    }

    pub fn infer(&self, expression: &Expression, env: &TypeEnv) -> Outcome {
        let cx = TypingContext::new(FILE, &self.sigs, &self.ret_param_idxs)
            .with_classes(&self.classes)
            .with_poly(&self.poly);
        infer_with(expression, env, &cx)
    }
}

pub fn analyze(module: &Module) -> (anyhow::Result<Analysis>, Diagnostics) {
    let mut analyzer = Analyzer::new(AnalysisOptions {
        file: FILE.to_string(),
        ..AnalysisOptions::default()
    });
    let result = analyzer.analyze(module);
    (result, analyzer.into_diagnostics())
}

/// Analyze `module`, asserting that no diagnostics were produced.
pub fn analyze_clean(module: &Module) -> Analysis {
    let (result, diagnostics) = analyze(module);
    assert!(
        diagnostics.is_empty(),
        "expected no diagnostics, found {:?}",
        diagnostics.messages()
    );
    match result {
        Ok(analysis) => analysis,
        Err(err) => panic!("analysis failed: {err:#}"),
    }
}

/// Messages of an analysis that must fail.
pub fn analyze_errors(module: &Module) -> Vec<String> {
    let (result, diagnostics) = analyze(module);
    assert!(result.is_err(), "expected analysis to fail");
    diagnostics
        .messages()
        .into_iter()
        .map(str::to_string)
        .collect()
}
