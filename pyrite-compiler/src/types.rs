//! Type kinds and the bitmask lattice the inference engine works in.
//!
//! A [`TypeSet`] carries one bit per concrete [`TypeKind`]. A set with a single
//! bit collapses to an exact kind, several bits mean the value may be any of
//! them at runtime, and an empty set means either "nothing known" or, after an
//! intersection, a contradiction.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::ast::TypeAnnotation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Int,
    Bool,
    Float,
    Str,
    Bytes,
    NoneType,
    Tuple,
    List,
    Dict,
    /// Annotation marker; expanded to `T | None` before storage.
    Optional,
    /// Annotation marker; expanded to its member bits before storage.
    Union,
}

impl TypeKind {
    pub fn is_marker(self) -> bool {
        matches!(self, TypeKind::Optional | TypeKind::Union)
    }

    pub fn describe(self) -> &'static str {
        match self {
            TypeKind::Int => "int",
            TypeKind::Bool => "bool",
            TypeKind::Float => "float",
            TypeKind::Str => "str",
            TypeKind::Bytes => "bytes",
            TypeKind::NoneType => "None",
            TypeKind::Tuple => "tuple",
            TypeKind::List => "list",
            TypeKind::Dict => "dict",
            TypeKind::Optional => "Optional",
            TypeKind::Union => "Union",
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

bitflags! {
    /// Set of concrete kinds a value may have at runtime.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeSet: u16 {
        const NONE_TYPE = 1 << 0;
        const INT = 1 << 1;
        const BOOL = 1 << 2;
        const FLOAT = 1 << 3;
        const STR = 1 << 4;
        const LIST = 1 << 5;
        const TUPLE = 1 << 6;
        const DICT = 1 << 7;
        const BYTES = 1 << 8;
    }
}

const CONCRETE: [(TypeSet, TypeKind); 9] = [
    (TypeSet::NONE_TYPE, TypeKind::NoneType),
    (TypeSet::INT, TypeKind::Int),
    (TypeSet::BOOL, TypeKind::Bool),
    (TypeSet::FLOAT, TypeKind::Float),
    (TypeSet::STR, TypeKind::Str),
    (TypeSet::LIST, TypeKind::List),
    (TypeSet::TUPLE, TypeKind::Tuple),
    (TypeSet::DICT, TypeKind::Dict),
    (TypeSet::BYTES, TypeKind::Bytes),
];

impl TypeSet {
    pub const NUMERIC: Self = Self::INT.union(Self::FLOAT);
    pub const SIZED: Self = Self::STR
        .union(Self::LIST)
        .union(Self::TUPLE)
        .union(Self::DICT);
    /// Scalars that may cross a channel.
    pub const IMMUTABLE_SCALAR: Self = Self::INT
        .union(Self::FLOAT)
        .union(Self::BOOL)
        .union(Self::STR);

    /// Mask for a concrete kind; markers have no bit of their own.
    pub fn of(kind: TypeKind) -> Self {
        CONCRETE
            .iter()
            .find(|(_, candidate)| *candidate == kind)
            .map(|(set, _)| *set)
            .unwrap_or_else(Self::empty)
    }

    #[inline]
    pub fn is_single(self) -> bool {
        self.bits().count_ones() == 1
    }

    /// The exact kind of a singular set.
    pub fn kind(self) -> Option<TypeKind> {
        if !self.is_single() {
            return None;
        }
        CONCRETE
            .iter()
            .find(|(set, _)| *set == self)
            .map(|(_, kind)| *kind)
    }

    /// Kind to report for an expression with this set: the exact kind when
    /// singular, `Optional`/`Union` when ambiguous, `NoneType` when unknown.
    pub fn reported_kind(self) -> TypeKind {
        if let Some(kind) = self.kind() {
            return kind;
        }
        if self.is_empty() {
            return TypeKind::NoneType;
        }
        if self.contains(Self::NONE_TYPE) && (self - Self::NONE_TYPE).is_single() {
            TypeKind::Optional
        } else {
            TypeKind::Union
        }
    }

    /// Non-empty and entirely inside `other`.
    #[inline]
    pub fn is_within(self, other: Self) -> bool {
        !self.is_empty() && other.contains(self)
    }

    pub fn kinds(self) -> impl Iterator<Item = TypeKind> {
        CONCRETE
            .into_iter()
            .filter(move |(set, _)| self.contains(*set))
            .map(|(_, kind)| kind)
    }

    pub fn describe(self) -> String {
        if self.is_empty() {
            return "unknown".to_string();
        }
        self.kinds()
            .map(TypeKind::describe)
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

/// A resolved annotation: the declared kind plus the refinement masks that
/// `Union[...]`/`Optional[...]` and `list[T]` carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Declared {
    pub kind: TypeKind,
    pub union_mask: TypeSet,
    pub list_elem_mask: TypeSet,
}

impl Declared {
    fn plain(kind: TypeKind) -> Self {
        Self {
            kind,
            union_mask: TypeSet::empty(),
            list_elem_mask: TypeSet::empty(),
        }
    }

    /// Every kind a value of this declaration may have.
    pub fn mask(&self) -> TypeSet {
        if self.kind.is_marker() {
            self.union_mask
        } else {
            TypeSet::of(self.kind)
        }
    }

    pub fn describe(&self) -> String {
        if self.kind.is_marker() {
            self.union_mask.describe()
        } else if !self.list_elem_mask.is_empty() {
            format!("list[{}]", self.list_elem_mask.describe())
        } else {
            self.kind.describe().to_string()
        }
    }
}

fn kind_for_name(name: &str) -> Option<TypeKind> {
    let kind = match name {
        "int" => TypeKind::Int,
        "bool" => TypeKind::Bool,
        "float" => TypeKind::Float,
        "str" => TypeKind::Str,
        "bytes" => TypeKind::Bytes,
        "None" | "NoneType" => TypeKind::NoneType,
        "list" | "List" => TypeKind::List,
        "tuple" | "Tuple" => TypeKind::Tuple,
        "dict" | "Dict" => TypeKind::Dict,
        _ => return None,
    };
    Some(kind)
}

/// Mask of every concrete kind an annotation admits; empty for annotations
/// naming classes or other opaque types.
fn annotation_mask(annotation: &TypeAnnotation) -> TypeSet {
    match resolve_annotation(annotation) {
        Some(declared) => declared.mask(),
        None => TypeSet::empty(),
    }
}

/// Resolve a surface annotation. Returns `None` for names outside the closed
/// kind set (user classes, `Any`, ...), which the engine leaves unconstrained.
pub fn resolve_annotation(annotation: &TypeAnnotation) -> Option<Declared> {
    match annotation {
        TypeAnnotation::Name(name) => kind_for_name(name).map(Declared::plain),
        TypeAnnotation::Generic { base, arguments } => match base.as_str() {
            "Optional" => {
                let inner = arguments.first().map(annotation_mask).unwrap_or_default();
                Some(Declared {
                    kind: TypeKind::Optional,
                    union_mask: inner | TypeSet::NONE_TYPE,
                    list_elem_mask: TypeSet::empty(),
                })
            }
            "Union" => Some(union_of(arguments)),
            "list" | "List" => Some(Declared {
                kind: TypeKind::List,
                union_mask: TypeSet::empty(),
                list_elem_mask: arguments.first().map(annotation_mask).unwrap_or_default(),
            }),
            other => kind_for_name(other).map(Declared::plain),
        },
        TypeAnnotation::Or(members) => Some(union_of(members)),
    }
}

fn union_of(members: &[TypeAnnotation]) -> Declared {
    let mask = members
        .iter()
        .fold(TypeSet::empty(), |acc, member| acc | annotation_mask(member));
    let kind = if mask.contains(TypeSet::NONE_TYPE) && (mask - TypeSet::NONE_TYPE).is_single() {
        TypeKind::Optional
    } else {
        TypeKind::Union
    };
    Declared {
        kind,
        union_mask: mask,
        list_elem_mask: TypeSet::empty(),
    }
}

/// Element masks of `tuple[A, B, ...]` annotations, used to seed tuple shapes.
pub fn tuple_annotation_elems(annotation: &TypeAnnotation) -> Option<Vec<TypeSet>> {
    match annotation {
        TypeAnnotation::Generic { base, arguments } if base == "tuple" || base == "Tuple" => {
            Some(arguments.iter().map(annotation_mask).collect())
        }
        _ => None,
    }
}

/// Key and value masks of `dict[K, V]` annotations.
pub fn dict_annotation_shape(annotation: &TypeAnnotation) -> Option<(TypeSet, TypeSet)> {
    match annotation {
        TypeAnnotation::Generic { base, arguments }
            if (base == "dict" || base == "Dict") && arguments.len() == 2 =>
        {
            Some((annotation_mask(&arguments[0]), annotation_mask(&arguments[1])))
        }
        _ => None,
    }
}
