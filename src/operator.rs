//! Operator method tags.
//!
//! Script classes bind operators under fixed symbolic signatures. The closed
//! [`Operator`] enum names every supported operator together with its
//! signature text, its declaration stub line, and its fixed argument count.
//! Registration validates the callable against that count up front.

use std::fmt;

/// Operators a script class can overload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Binary `+`
    Add,
    /// Binary `-`
    Sub,
    /// Binary `*`
    Mul,
    /// Binary `/`
    Div,
    /// Binary `%`
    Mod,
    /// Unary `-`
    Neg,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    LtEq,
    /// `>=`
    GtEq,
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// Bitwise `&`
    BitAnd,
    /// Bitwise `|`
    BitOr,
    /// Bitwise `^`
    BitXor,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// Subscript read `[...]`
    GetIndex,
    /// Subscript write `[...] = value`
    SetIndex,
}

impl Operator {
    /// The signature this operator resolves under.
    pub fn signature(&self) -> &'static str {
        match self {
            Operator::Add => "+(_)",
            Operator::Sub => "-(_)",
            Operator::Mul => "*(_)",
            Operator::Div => "/(_)",
            Operator::Mod => "%(_)",
            Operator::Neg => "-",
            Operator::Lt => "<(_)",
            Operator::Gt => ">(_)",
            Operator::LtEq => "<=(_)",
            Operator::GtEq => ">=(_)",
            Operator::Eq => "==(_)",
            Operator::NotEq => "!=(_)",
            Operator::BitAnd => "&(_)",
            Operator::BitOr => "|(_)",
            Operator::BitXor => "^(_)",
            Operator::Shl => "<<(_)",
            Operator::Shr => ">>(_)",
            Operator::GetIndex => "[_]",
            Operator::SetIndex => "[_]=(_)",
        }
    }

    /// Argument count the operator's callable must take, receiver excluded.
    pub fn arity(&self) -> usize {
        match self {
            Operator::Neg => 0,
            Operator::SetIndex => 2,
            Operator::GetIndex => 1,
            _ => 1,
        }
    }

    /// Declaration stub line for class source synthesis.
    pub fn declaration(&self) -> &'static str {
        match self {
            Operator::Add => "foreign +(rhs)",
            Operator::Sub => "foreign -(rhs)",
            Operator::Mul => "foreign *(rhs)",
            Operator::Div => "foreign /(rhs)",
            Operator::Mod => "foreign %(rhs)",
            Operator::Neg => "foreign -",
            Operator::Lt => "foreign <(rhs)",
            Operator::Gt => "foreign >(rhs)",
            Operator::LtEq => "foreign <=(rhs)",
            Operator::GtEq => "foreign >=(rhs)",
            Operator::Eq => "foreign ==(rhs)",
            Operator::NotEq => "foreign !=(rhs)",
            Operator::BitAnd => "foreign &(rhs)",
            Operator::BitOr => "foreign |(rhs)",
            Operator::BitXor => "foreign ^(rhs)",
            Operator::Shl => "foreign <<(rhs)",
            Operator::Shr => "foreign >>(rhs)",
            Operator::GetIndex => "foreign [index]",
            Operator::SetIndex => "foreign [index]=(rhs)",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.signature())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_operators_take_one_argument() {
        assert_eq!(Operator::Add.arity(), 1);
        assert_eq!(Operator::Eq.arity(), 1);
        assert_eq!(Operator::Shl.arity(), 1);
    }

    #[test]
    fn negation_is_unary() {
        assert_eq!(Operator::Neg.arity(), 0);
        assert_eq!(Operator::Neg.signature(), "-");
    }

    #[test]
    fn subscript_signatures() {
        assert_eq!(Operator::GetIndex.signature(), "[_]");
        assert_eq!(Operator::GetIndex.arity(), 1);
        assert_eq!(Operator::SetIndex.signature(), "[_]=(_)");
        assert_eq!(Operator::SetIndex.arity(), 2);
    }

    #[test]
    fn display_matches_signature() {
        assert_eq!(Operator::Add.to_string(), "+(_)");
    }
}
