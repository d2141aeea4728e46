use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AstError {
    #[error("malformed AST at line {line}, column {column}: {source}")]
    Malformed {
        line: usize,
        column: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    pub line: usize,
    pub column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl SourceSpan {
    pub fn new(line: usize, column: usize, end_line: usize, end_column: usize) -> Self {
        Self {
            line,
            column,
            end_line,
            end_column,
        }
    }
}

impl Default for SourceSpan {
    fn default() -> Self {
        Self {
            line: 0,
            column: 0,
            end_line: 0,
            end_column: 0,
        }
    }
}

/// Parser-assigned identity of an expression node. Analysis results are keyed
/// by it rather than stored on the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Module {
    pub body: Vec<Statement>,
}

impl Module {
    pub fn new(body: Vec<Statement>) -> Self {
        Self { body }
    }

    /// Load a module serialized by the external parser.
    pub fn from_json(text: &str) -> Result<Self, AstError> {
        serde_json::from_str(text).map_err(|source| AstError::Malformed {
            line: source.line(),
            column: source.column(),
            source,
        })
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionDef> {
        self.body.iter().filter_map(|statement| match &statement.kind {
            StatementKind::FunctionDef(def) => Some(def),
            _ => None,
        })
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDef> {
        self.body.iter().filter_map(|statement| match &statement.kind {
            StatementKind::ClassDef(def) => Some(def),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    pub span: SourceSpan,
    pub kind: StatementKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    FunctionDef(FunctionDef),
    ClassDef(ClassDef),
    Return(Option<Expression>),
    Assign(AssignStatement),
    AnnAssign(AnnAssignStatement),
    AugAssign(AugAssignStatement),
    If(IfStatement),
    While(WhileStatement),
    For(ForStatement),
    Expression(Expression),
    Raise(Option<Expression>),
    Pass,
    Break,
    Continue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub name_span: SourceSpan,
    pub parameters: Vec<Parameter>,
    pub returns: Option<TypeAnnotation>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    #[default]
    Normal,
    PositionalOnly,
    KeywordOnly,
    VarArgs,
    KwArgs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub span: SourceSpan,
    #[serde(default)]
    pub kind: ParameterKind,
    pub annotation: Option<TypeAnnotation>,
    pub default: Option<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,
    pub name_span: SourceSpan,
    pub bases: Vec<String>,
    pub body: Vec<Statement>,
}

impl ClassDef {
    pub fn methods(&self) -> impl Iterator<Item = &FunctionDef> {
        self.body.iter().filter_map(|statement| match &statement.kind {
            StatementKind::FunctionDef(def) => Some(def),
            _ => None,
        })
    }
}

/// Surface type annotation, e.g. `int`, `list[int]`, `Optional[str]`, `int | None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeAnnotation {
    Name(String),
    Generic {
        base: String,
        arguments: Vec<TypeAnnotation>,
    },
    Or(Vec<TypeAnnotation>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignStatement {
    pub target: Expression,
    pub value: Expression,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnAssignStatement {
    pub target: String,
    pub annotation: TypeAnnotation,
    pub value: Option<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AugAssignStatement {
    pub target: Expression,
    pub operator: BinaryOperator,
    pub value: Expression,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IfStatement {
    pub test: Expression,
    pub body: Vec<Statement>,
    pub orelse: Vec<Statement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhileStatement {
    pub test: Expression,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForStatement {
    pub target: Expression,
    pub iter: Expression,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOperator {
    Negative,
    Positive,
    Invert,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    FloorDivide,
    Modulo,
    Power,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Is,
    IsNot,
    In,
    NotIn,
    And,
    Or,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::FloorDivide => "//",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Power => "**",
            BinaryOperator::BitAnd => "&",
            BinaryOperator::BitOr => "|",
            BinaryOperator::BitXor => "^",
            BinaryOperator::ShiftLeft => "<<",
            BinaryOperator::ShiftRight => ">>",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::Less => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::Is => "is",
            BinaryOperator::IsNot => "is not",
            BinaryOperator::In => "in",
            BinaryOperator::NotIn => "not in",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
        }
    }

    /// Short tag used in canonical keys.
    pub fn key_tag(self) -> &'static str {
        match self {
            BinaryOperator::Add => "add",
            BinaryOperator::Subtract => "sub",
            BinaryOperator::Multiply => "mul",
            BinaryOperator::Divide => "div",
            BinaryOperator::FloorDivide => "floordiv",
            BinaryOperator::Modulo => "mod",
            BinaryOperator::Power => "pow",
            BinaryOperator::BitAnd => "band",
            BinaryOperator::BitOr => "bor",
            BinaryOperator::BitXor => "bxor",
            BinaryOperator::ShiftLeft => "shl",
            BinaryOperator::ShiftRight => "shr",
            BinaryOperator::Equal => "eq",
            BinaryOperator::NotEqual => "ne",
            BinaryOperator::Less => "lt",
            BinaryOperator::LessEqual => "le",
            BinaryOperator::Greater => "gt",
            BinaryOperator::GreaterEqual => "ge",
            BinaryOperator::Is => "is",
            BinaryOperator::IsNot => "isnot",
            BinaryOperator::In => "in",
            BinaryOperator::NotIn => "notin",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expression {
    pub id: NodeId,
    pub span: SourceSpan,
    pub kind: ExpressionKind,
}

impl Expression {
    pub fn new(id: NodeId, span: SourceSpan, kind: ExpressionKind) -> Self {
        Self { id, span, kind }
    }

    pub fn as_name(&self) -> Option<&str> {
        match &self.kind {
            ExpressionKind::Name(name) => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpressionKind {
    Int(i64),
    Bool(bool),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    NoneLiteral,
    Name(String),
    Attribute(AttributeExpression),
    Tuple(Vec<Expression>),
    List(Vec<Expression>),
    Set(Vec<Expression>),
    Dict(Vec<DictEntry>),
    Object(Vec<Expression>),
    Unary(UnaryExpression),
    Binary(BinaryExpression),
    Call(CallExpression),
    Subscript(SubscriptExpression),
    Slice(SliceExpression),
    Conditional(ConditionalExpression),
    ListComp(Comprehension),
    SetComp(Comprehension),
    GeneratorExp(Comprehension),
    DictComp(DictComprehension),
    Await(Box<Expression>),
    Yield(Option<Box<Expression>>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeExpression {
    pub value: Box<Expression>,
    pub attr: String,
}

/// A `key: value` entry, or a `**mapping` unpack when `key` is absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DictEntry {
    pub key: Option<Expression>,
    pub value: Expression,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnaryExpression {
    pub operator: UnaryOperator,
    pub operand: Box<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryExpression {
    pub operator: BinaryOperator,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallExpression {
    pub callee: Box<Expression>,
    pub arguments: Vec<Expression>,
    pub keywords: Vec<KeywordArgument>,
}

/// `name=value`, or a `**mapping` unpack when `name` is absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordArgument {
    pub name: Option<String>,
    pub value: Expression,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptExpression {
    pub value: Box<Expression>,
    pub index: Box<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceExpression {
    pub lower: Option<Box<Expression>>,
    pub upper: Option<Box<Expression>>,
    pub step: Option<Box<Expression>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalExpression {
    pub test: Box<Expression>,
    pub body: Box<Expression>,
    pub orelse: Box<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComprehensionClause {
    pub target: Expression,
    pub iter: Expression,
    pub ifs: Vec<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comprehension {
    pub element: Box<Expression>,
    pub clauses: Vec<ComprehensionClause>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DictComprehension {
    pub key: Box<Expression>,
    pub value: Box<Expression>,
    pub clauses: Vec<ComprehensionClause>,
}
