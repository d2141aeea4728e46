use thiserror::Error;

use crate::ast::{
    Comprehension, ComprehensionClause, DictComprehension, Expression, ExpressionKind, SourceSpan,
};
use crate::env::TypeEnv;
use crate::types::{TypeKind, TypeSet};

use super::{ExpressionTyper, Reported, Shape, TypeTable, Typed, TypeResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComprehensionKind {
    List,
    Set,
    Generator,
}

/// What iterating a value yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Elements {
    pub set: TypeSet,
    /// Per-index masks when every element is a tuple of one arity.
    pub tuple_elems: Option<Vec<TypeSet>>,
}

impl Elements {
    fn of_set(set: TypeSet) -> Self {
        Self {
            set,
            tuple_elems: None,
        }
    }

    /// Elements of an iterable, `None` when the value cannot be iterated.
    /// Unknown values and containers of unknown shape yield an empty mask.
    pub fn of(iterable: &Typed) -> Option<Self> {
        let set = iterable.set;
        let elements = match &iterable.shape {
            _ if set.is_empty() => Self::of_set(TypeSet::empty()),
            Some(Shape::List { elems, tuple_elems }) if set == TypeSet::LIST => Self {
                set: *elems,
                tuple_elems: tuple_elems.clone(),
            },
            Some(Shape::Tuple(elems)) if set == TypeSet::TUPLE => {
                Self::of_set(elems.iter().fold(TypeSet::empty(), |acc, elem| acc | *elem))
            }
            Some(Shape::Dict { keys, .. }) if set == TypeSet::DICT => Self::of_set(*keys),
            _ if set == TypeSet::STR => Self::of_set(TypeSet::STR),
            _ if set == TypeSet::BYTES => Self::of_set(TypeSet::INT),
            _ if set == TypeSet::LIST || set == TypeSet::TUPLE || set == TypeSet::DICT => {
                Self::of_set(TypeSet::empty())
            }
            _ => return None,
        };
        Some(elements)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("cannot unpack tuple of length {found} into {expected} targets")]
    Arity {
        span: SourceSpan,
        found: usize,
        expected: usize,
    },
    #[error("unsupported loop target")]
    Unsupported { span: SourceSpan },
}

impl TargetError {
    pub fn span(&self) -> SourceSpan {
        match self {
            TargetError::Arity { span, .. } | TargetError::Unsupported { span } => *span,
        }
    }
}

/// Bind a loop target into `env`: a name takes the element mask (`int` when
/// nothing is known), a tuple pattern is destructured per index.
pub fn bind_target(
    env: &mut TypeEnv,
    target: &Expression,
    elements: Elements,
    table: &mut TypeTable,
) -> Result<(), TargetError> {
    match &target.kind {
        ExpressionKind::Name(name) => {
            let bound = if elements.set.is_empty() {
                TypeSet::INT
            } else {
                elements.set
            };
            env.remove(name);
            env.define_set(name, bound, target.span);
            if let Some(per_index) = elements.tuple_elems.filter(|_| bound == TypeSet::TUPLE) {
                env.set_tuple_elems(name, per_index);
            }
            table.record(target.id, bound.reported_kind(), None);
            Ok(())
        }
        ExpressionKind::Tuple(items) => {
            if let Some(per_index) = &elements.tuple_elems {
                if per_index.len() != items.len() {
                    return Err(TargetError::Arity {
                        span: target.span,
                        found: per_index.len(),
                        expected: items.len(),
                    });
                }
            }
            for (position, item) in items.iter().enumerate() {
                let set = elements
                    .tuple_elems
                    .as_ref()
                    .and_then(|per_index| per_index.get(position))
                    .copied()
                    .unwrap_or_default();
                bind_target(env, item, Elements::of_set(set), table)?;
            }
            table.record(target.id, TypeKind::Tuple, None);
            Ok(())
        }
        _ => Err(TargetError::Unsupported { span: target.span }),
    }
}

impl<'a, 'cx> ExpressionTyper<'a, 'cx> {
    pub(super) fn visit_comprehension(
        &mut self,
        comprehension: &Comprehension,
        kind: ComprehensionKind,
    ) -> TypeResult {
        let mut local = self.env.clone();
        self.bind_clauses(&mut local, &comprehension.clauses, kind)?;
        let mut inner =
            ExpressionTyper::new(&local, self.cx, &mut *self.diagnostics, &mut *self.table);
        let element = inner.visit(&comprehension.element)?;
        Ok(Typed::list_of(element.set))
    }

    pub(super) fn visit_dict_comprehension(
        &mut self,
        comprehension: &DictComprehension,
    ) -> TypeResult {
        let mut local = self.env.clone();
        self.bind_clauses(&mut local, &comprehension.clauses, ComprehensionKind::List)?;
        let mut inner =
            ExpressionTyper::new(&local, self.cx, &mut *self.diagnostics, &mut *self.table);
        let keys = inner.visit(&comprehension.key)?.set;
        let values = inner.visit(&comprehension.value)?.set;
        Ok(Typed::of(TypeKind::Dict).with_shape(Shape::Dict { keys, values }))
    }

    /// Type each `for` clause in order, binding its target into `local` before
    /// the guards and later clauses are typed.
    fn bind_clauses(
        &mut self,
        local: &mut TypeEnv,
        clauses: &[ComprehensionClause],
        kind: ComprehensionKind,
    ) -> Result<(), Reported> {
        for clause in clauses {
            let iterable = {
                let mut inner =
                    ExpressionTyper::new(local, self.cx, &mut *self.diagnostics, &mut *self.table);
                inner.visit(&clause.iter)?
            };
            let Some(elements) = Elements::of(&iterable) else {
                return self.fail(
                    clause.iter.span,
                    format!("{} is not iterable", iterable.set.describe()),
                );
            };
            let bound = bind_target(local, &clause.target, elements, &mut *self.table);
            if let Err(error) = bound {
                return self.fail(error.span(), error.to_string());
            }

            let mut inner =
                ExpressionTyper::new(local, self.cx, &mut *self.diagnostics, &mut *self.table);
            for guard in &clause.ifs {
                let typed = inner.visit(guard)?;
                if typed.set == TypeSet::BOOL {
                    continue;
                }
                let numeric_name = kind == ComprehensionKind::Generator
                    && matches!(guard.kind, ExpressionKind::Name(_))
                    && typed.set.is_within(TypeSet::NUMERIC);
                if !numeric_name {
                    return inner.fail(
                        guard.span,
                        format!(
                            "comprehension condition must be bool, found {}",
                            typed.set.describe()
                        ),
                    );
                }
            }
        }
        Ok(())
    }
}
