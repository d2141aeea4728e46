use crate::ast::{
    BinaryExpression, BinaryOperator, Expression, SourceSpan, UnaryExpression, UnaryOperator,
};
use crate::types::{TypeKind, TypeSet};

use super::{ExpressionTyper, Typed, TypeResult};

/// Result of offering an operator to one handler category: `None` means the
/// category does not own the operator.
type Claim = Option<TypeResult>;

impl<'a, 'cx> ExpressionTyper<'a, 'cx> {
    pub(super) fn visit_unary(&mut self, unary: &UnaryExpression, span: SourceSpan) -> TypeResult {
        let operand = self.visit(&unary.operand)?;
        let (kind, tag) = match unary.operator {
            UnaryOperator::Negative | UnaryOperator::Positive => {
                let symbol = if unary.operator == UnaryOperator::Negative {
                    "-"
                } else {
                    "+"
                };
                let kind = match operand.set {
                    set if set == TypeSet::INT => TypeKind::Int,
                    set if set == TypeSet::FLOAT => TypeKind::Float,
                    set => {
                        return self.fail(
                            span,
                            format!(
                                "unary '{symbol}' requires an int or float operand, found {}",
                                set.describe()
                            ),
                        )
                    }
                };
                let tag = if unary.operator == UnaryOperator::Negative {
                    "neg"
                } else {
                    "pos"
                };
                (kind, tag)
            }
            UnaryOperator::Invert => {
                if operand.set != TypeSet::INT {
                    return self.fail(
                        span,
                        format!(
                            "unary '~' requires an int operand, found {}",
                            operand.set.describe()
                        ),
                    );
                }
                (TypeKind::Int, "inv")
            }
            UnaryOperator::Not => {
                if operand.set != TypeSet::BOOL {
                    return self.fail(
                        span,
                        format!(
                            "'not' requires a bool operand, found {}",
                            operand.set.describe()
                        ),
                    );
                }
                (TypeKind::Bool, "not")
            }
        };
        let key = operand.key.map(|key| format!("{tag}:({key})"));
        Ok(Typed::of(kind).with_key(key))
    }

    pub(super) fn visit_binary(
        &mut self,
        binary: &BinaryExpression,
        span: SourceSpan,
    ) -> TypeResult {
        let left = self.visit(&binary.left)?;
        let right = self.visit(&binary.right)?;
        self.combine(binary.operator, &left, &right, span)
    }

    /// `target op= value`: typed exactly like `target op value`.
    pub fn visit_augmented(
        &mut self,
        target: &Expression,
        operator: BinaryOperator,
        value: &Expression,
        span: SourceSpan,
    ) -> TypeResult {
        let left = self.visit(target)?;
        let right = self.visit(value)?;
        self.combine(operator, &left, &right, span)
    }

    fn combine(
        &mut self,
        operator: BinaryOperator,
        left: &Typed,
        right: &Typed,
        span: SourceSpan,
    ) -> TypeResult {
        let claimed = self
            .arithmetic(operator, left, right, span)
            .or_else(|| self.bitwise(operator, left, right, span))
            .or_else(|| self.comparison(operator, left, right, span))
            .or_else(|| self.membership(operator, left, right, span))
            .or_else(|| self.logical(operator, left, right, span));

        match claimed {
            Some(result) => {
                let key = match (&left.key, &right.key) {
                    (Some(l), Some(r)) => Some(format!("{}:({l},{r})", operator.key_tag())),
                    _ => None,
                };
                Ok(result?.with_key(key))
            }
            None => self.fail(
                span,
                format!("unsupported binary operator '{}'", operator.symbol()),
            ),
        }
    }

    fn arithmetic(
        &mut self,
        operator: BinaryOperator,
        left: &Typed,
        right: &Typed,
        span: SourceSpan,
    ) -> Claim {
        use BinaryOperator::*;
        if !matches!(
            operator,
            Add | Subtract | Multiply | Divide | FloorDivide | Modulo | Power
        ) {
            return None;
        }
        let symbol = operator.symbol();
        let (l, r) = (left.set, right.set);

        if operator == Add && l == TypeSet::STR && r == TypeSet::STR {
            return Some(Ok(Typed::of(TypeKind::Str)));
        }
        if l == TypeSet::INT && r == TypeSet::INT {
            return Some(Ok(Typed::of(TypeKind::Int)));
        }
        if l == TypeSet::FLOAT && r == TypeSet::FLOAT {
            if operator == Modulo {
                return Some(self.fail(span, "'%' is not supported for float operands"));
            }
            return Some(Ok(Typed::of(TypeKind::Float)));
        }
        if l.is_within(TypeSet::NUMERIC) && r.is_within(TypeSet::NUMERIC) {
            return Some(self.fail(
                span,
                format!(
                    "ambiguous numeric types for '{symbol}': {} and {}",
                    l.describe(),
                    r.describe()
                ),
            ));
        }
        Some(self.fail(
            span,
            format!(
                "operands of '{symbol}' must both be int or both float, found {} and {}",
                l.describe(),
                r.describe()
            ),
        ))
    }

    fn bitwise(
        &mut self,
        operator: BinaryOperator,
        left: &Typed,
        right: &Typed,
        span: SourceSpan,
    ) -> Claim {
        use BinaryOperator::*;
        if !matches!(operator, BitAnd | BitOr | BitXor | ShiftLeft | ShiftRight) {
            return None;
        }
        if left.set == TypeSet::INT && right.set == TypeSet::INT {
            return Some(Ok(Typed::of(TypeKind::Int)));
        }
        Some(self.fail(
            span,
            format!(
                "operator '{}' requires int operands, found {} and {}",
                operator.symbol(),
                left.set.describe(),
                right.set.describe()
            ),
        ))
    }

    fn comparison(
        &mut self,
        operator: BinaryOperator,
        left: &Typed,
        right: &Typed,
        span: SourceSpan,
    ) -> Claim {
        use BinaryOperator::*;
        if !matches!(
            operator,
            Equal | NotEqual | Less | LessEqual | Greater | GreaterEqual | Is | IsNot
        ) {
            return None;
        }
        let (l, r) = (left.set, right.set);
        let against_none = l == TypeSet::NONE_TYPE || r == TypeSet::NONE_TYPE;
        if against_none && matches!(operator, Equal | NotEqual | Is | IsNot) {
            return Some(Ok(Typed::of(TypeKind::Bool)));
        }
        let comparable = l == r && (l == TypeSet::STR || l == TypeSet::INT || l == TypeSet::FLOAT);
        if comparable {
            return Some(Ok(Typed::of(TypeKind::Bool)));
        }
        Some(self.fail(
            span,
            format!(
                "cannot compare {} with {} using '{}'",
                l.describe(),
                r.describe(),
                operator.symbol()
            ),
        ))
    }

    fn membership(
        &mut self,
        operator: BinaryOperator,
        left: &Typed,
        right: &Typed,
        span: SourceSpan,
    ) -> Claim {
        if !matches!(operator, BinaryOperator::In | BinaryOperator::NotIn) {
            return None;
        }
        let symbol = operator.symbol();
        if right.set == TypeSet::STR {
            if left.set.is_within(TypeSet::STR) {
                return Some(Ok(Typed::of(TypeKind::Bool)));
            }
            return Some(self.fail(
                span,
                format!(
                    "'{symbol}' on a str requires a str operand, found {}",
                    left.set.describe()
                ),
            ));
        }
        if right.set == TypeSet::LIST {
            let elems = right.list_elems();
            if elems.is_empty() || left.set.is_empty() || left.set.is_within(elems) {
                return Some(Ok(Typed::of(TypeKind::Bool)));
            }
            return Some(self.fail(
                span,
                format!(
                    "'{symbol}' operand {} does not match list elements {}",
                    left.set.describe(),
                    elems.describe()
                ),
            ));
        }
        Some(self.fail(
            span,
            format!("unsupported membership target {}", right.set.describe()),
        ))
    }

    fn logical(
        &mut self,
        operator: BinaryOperator,
        left: &Typed,
        right: &Typed,
        span: SourceSpan,
    ) -> Claim {
        if !matches!(operator, BinaryOperator::And | BinaryOperator::Or) {
            return None;
        }
        if left.set.is_within(TypeSet::BOOL) && right.set.is_within(TypeSet::BOOL) {
            return Some(Ok(Typed::of(TypeKind::Bool)));
        }
        Some(self.fail(
            span,
            format!(
                "operands of '{}' must be bool, found {} and {}",
                operator.symbol(),
                left.set.describe(),
                right.set.describe()
            ),
        ))
    }
}
