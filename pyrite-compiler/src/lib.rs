mod analyzer;
mod ast;
mod checker;
mod diagnostics;
mod env;
mod poly;
mod return_params;
mod signatures;
mod typer;
mod types;

pub use crate::analyzer::{Analysis, AnalysisOptions, Analyzer};
pub use crate::ast::{
    AnnAssignStatement, AssignStatement, AstError, AttributeExpression, AugAssignStatement,
    BinaryExpression, BinaryOperator, CallExpression, ClassDef, Comprehension,
    ComprehensionClause, ConditionalExpression, DictComprehension, DictEntry, Expression,
    ExpressionKind, ForStatement, FunctionDef, IfStatement, KeywordArgument, Module, NodeId,
    Parameter, ParameterKind, SliceExpression, SourceSpan, Statement, StatementKind,
    SubscriptExpression, TypeAnnotation, UnaryExpression, UnaryOperator, WhileStatement,
};
pub use crate::checker::{assigned_locals, ModuleChecker};
pub use crate::diagnostics::{Diagnostic, DiagnosticLevel, Diagnostics};
pub use crate::env::TypeEnv;
pub use crate::poly::PolyTargets;
pub use crate::return_params::{compute_return_param_idxs, infer_return_param};
pub use crate::signatures::{
    build_sigs, collect_classes, merge_class_bases, method_key, validate_class_method, ClassInfo,
    Sig, SigParam,
};
pub use crate::typer::{
    bind_target, infer_expr_type, ComprehensionKind, Elements, ExpressionTyper, NodeType,
    Reported, Shape, TargetError, TypeResult, TypeTable, Typed, TypingContext,
};
pub use crate::types::{
    dict_annotation_shape, resolve_annotation, tuple_annotation_elems, Declared, TypeKind,
    TypeSet,
};
