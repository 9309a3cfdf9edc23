//! Mapping from source operator kinds to RTL operator constructors.
//!
//! The mapping is closed: a kind without an entry is a hard error at the
//! point of use. `is` / `is not` alias equality; the membership tests and
//! matrix multiplication have no hardware meaning.

use silica_rtl::{BinaryOp, UnaryOp};

use crate::ast::{BinOpKind, BoolOpKind, CmpOpKind, UnaryOpKind};

/// RTL operator for a binary source operator, if one exists.
pub fn binop(kind: BinOpKind) -> Option<BinaryOp> {
    match kind {
        BinOpKind::Add => Some(BinaryOp::Plus),
        BinOpKind::Sub => Some(BinaryOp::Minus),
        BinOpKind::Mult => Some(BinaryOp::Times),
        BinOpKind::Div => Some(BinaryOp::Divide),
        BinOpKind::FloorDiv => Some(BinaryOp::IntDivide),
        BinOpKind::Mod => Some(BinaryOp::Mod),
        BinOpKind::Pow => Some(BinaryOp::Power),
        BinOpKind::BitAnd => Some(BinaryOp::And),
        BinOpKind::BitOr => Some(BinaryOp::Or),
        BinOpKind::BitXor => Some(BinaryOp::Xor),
        BinOpKind::LShift => Some(BinaryOp::Sll),
        BinOpKind::RShift => Some(BinaryOp::Srl),
        BinOpKind::MatMult => None,
    }
}

/// RTL operator for a unary source operator.
pub fn unaryop(kind: UnaryOpKind) -> UnaryOp {
    match kind {
        UnaryOpKind::UAdd => UnaryOp::Uplus,
        UnaryOpKind::USub => UnaryOp::Uminus,
        UnaryOpKind::Invert => UnaryOp::Unot,
        UnaryOpKind::Not => UnaryOp::Ulnot,
    }
}

/// RTL operator for a boolean source operator.
pub fn boolop(kind: BoolOpKind) -> BinaryOp {
    match kind {
        BoolOpKind::And => BinaryOp::Land,
        BoolOpKind::Or => BinaryOp::Lor,
    }
}

/// RTL operator for a comparison source operator, if one exists.
pub fn cmpop(kind: CmpOpKind) -> Option<BinaryOp> {
    match kind {
        CmpOpKind::Eq | CmpOpKind::Is => Some(BinaryOp::Eq),
        CmpOpKind::NotEq | CmpOpKind::IsNot => Some(BinaryOp::NotEq),
        CmpOpKind::Lt => Some(BinaryOp::LessThan),
        CmpOpKind::LtE => Some(BinaryOp::LessEq),
        CmpOpKind::Gt => Some(BinaryOp::GreaterThan),
        CmpOpKind::GtE => Some(BinaryOp::GreaterEq),
        CmpOpKind::In | CmpOpKind::NotIn => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic_mapping() {
        assert_eq!(binop(BinOpKind::Add), Some(BinaryOp::Plus));
        assert_eq!(binop(BinOpKind::FloorDiv), Some(BinaryOp::IntDivide));
        assert_eq!(binop(BinOpKind::Pow), Some(BinaryOp::Power));
    }

    #[test]
    fn test_identity_aliases_equality() {
        assert_eq!(cmpop(CmpOpKind::Is), Some(BinaryOp::Eq));
        assert_eq!(cmpop(CmpOpKind::IsNot), Some(BinaryOp::NotEq));
    }

    #[test]
    fn test_unmapped_operators() {
        assert_eq!(binop(BinOpKind::MatMult), None);
        assert_eq!(cmpop(CmpOpKind::In), None);
        assert_eq!(cmpop(CmpOpKind::NotIn), None);
    }
}
