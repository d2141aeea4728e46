use crate::ast::{
    Expression, ExpressionKind, SliceExpression, SourceSpan, SubscriptExpression, UnaryOperator,
};
use crate::types::{TypeKind, TypeSet};

use super::{ExpressionTyper, Reported, Shape, Typed, TypeResult};

/// Integer value of `3` or `-3` literals used as tuple indices.
fn literal_index(expression: &Expression) -> Option<i64> {
    match &expression.kind {
        ExpressionKind::Int(value) => Some(*value),
        ExpressionKind::Unary(unary) if unary.operator == UnaryOperator::Negative => {
            match &unary.operand.kind {
                ExpressionKind::Int(value) => value.checked_neg(),
                _ => None,
            }
        }
        _ => None,
    }
}

impl<'a, 'cx> ExpressionTyper<'a, 'cx> {
    pub(super) fn visit_subscript(
        &mut self,
        subscript: &SubscriptExpression,
        span: SourceSpan,
    ) -> TypeResult {
        let base = self.visit(&subscript.value)?;
        if let ExpressionKind::Slice(slice) = &subscript.index.kind {
            self.visit_slice_bounds(slice)?;
            self.table.record(subscript.index.id, TypeKind::NoneType, None);
            return self.slice_of(base, span);
        }

        let index = self.visit(&subscript.index)?;
        let target = base.set;
        if target.is_empty() {
            return Ok(Typed::unknown());
        }

        if target == TypeSet::DICT {
            let (keys, values) = match &base.shape {
                Some(Shape::Dict { keys, values }) => (*keys, *values),
                _ => (TypeSet::empty(), TypeSet::empty()),
            };
            if !keys.is_empty() && !index.set.is_empty() && !index.set.intersects(keys) {
                return self.fail(
                    subscript.index.span,
                    format!(
                        "dict key {} does not match key type {}",
                        index.set.describe(),
                        keys.describe()
                    ),
                );
            }
            return Ok(Typed::from_set(values));
        }

        let indexable = [TypeSet::STR, TypeSet::BYTES, TypeSet::LIST, TypeSet::TUPLE];
        if !indexable.contains(&target) {
            return self.fail(span, format!("{} is not subscriptable", target.describe()));
        }
        if !index.set.is_empty() && index.set != TypeSet::INT {
            return self.fail(
                subscript.index.span,
                format!(
                    "{} indices must be int, found {}",
                    target.describe(),
                    index.set.describe()
                ),
            );
        }

        match target {
            set if set == TypeSet::STR => Ok(Typed::of(TypeKind::Str)),
            set if set == TypeSet::BYTES => Ok(Typed::of(TypeKind::Int)),
            set if set == TypeSet::LIST => Ok(list_element(&base)),
            _ => self.tuple_element(&base, &subscript.index),
        }
    }

    fn visit_slice_bounds(&mut self, slice: &SliceExpression) -> Result<(), Reported> {
        let bounds = [&slice.lower, &slice.upper, &slice.step];
        for bound in bounds.into_iter().flatten() {
            let typed = self.visit(bound)?;
            let allowed = TypeSet::INT | TypeSet::NONE_TYPE;
            if !typed.set.is_empty() && !typed.set.is_within(allowed) {
                return self.fail(
                    bound.span,
                    format!("slice bounds must be int, found {}", typed.set.describe()),
                );
            }
        }
        Ok(())
    }

    fn slice_of(&mut self, base: Typed, span: SourceSpan) -> TypeResult {
        match base.set {
            set if set.is_empty() => Ok(Typed::unknown()),
            set if set == TypeSet::STR => Ok(Typed::of(TypeKind::Str)),
            set if set == TypeSet::BYTES => Ok(Typed::of(TypeKind::Bytes)),
            set if set == TypeSet::LIST => {
                let mut typed = Typed::of(TypeKind::List);
                typed.shape = base.shape;
                Ok(typed)
            }
            set if set == TypeSet::TUPLE => Ok(Typed::of(TypeKind::Tuple)),
            set => self.fail(span, format!("{} cannot be sliced", set.describe())),
        }
    }

    fn tuple_element(&mut self, base: &Typed, index: &Expression) -> TypeResult {
        let Some(Shape::Tuple(elems)) = &base.shape else {
            return Ok(Typed::unknown());
        };
        let Some(position) = literal_index(index) else {
            let union = elems.iter().fold(TypeSet::empty(), |acc, set| acc | *set);
            return Ok(Typed::from_set(union));
        };
        let len = elems.len() as i64;
        let normalized = if position < 0 { position + len } else { position };
        if normalized < 0 || normalized >= len {
            return self.fail(
                index.span,
                format!("tuple index {position} out of range for tuple of length {len}"),
            );
        }
        Ok(Typed::from_set(elems[normalized as usize]))
    }
}

fn list_element(base: &Typed) -> Typed {
    match &base.shape {
        Some(Shape::List { elems, tuple_elems }) => {
            let typed = Typed::from_set(*elems);
            match tuple_elems {
                Some(per_index) if *elems == TypeSet::TUPLE => {
                    typed.with_shape(Shape::Tuple(per_index.clone()))
                }
                _ => typed,
            }
        }
        _ => Typed::unknown(),
    }
}
