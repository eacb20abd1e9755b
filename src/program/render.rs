//! Canonical rule text.
//!
//! Calls render as `name(x, args...)`, literals as `'0'`/`'1'`, parameters
//! as bare integers, and pass-through nodes as their child. Two programs
//! are the same rule exactly when their renderings are equal.

use std::fmt;

use super::Expr;
use crate::grammar::Op;

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op() {
            Op::Pass => write!(f, "{}", self.children()[0]),
            Op::Literal(bit) => write!(f, "'{bit}'"),
            Op::Int(n) => write!(f, "{n}"),
            call => {
                f.write_str(call.name().unwrap_or_default())?;
                f.write_str("(")?;
                let mut first = true;
                if call.takes_input() {
                    f.write_str("x")?;
                    first = false;
                }
                for child in self.children() {
                    if !first {
                        f.write_str(", ")?;
                    }
                    write!(f, "{child}")?;
                    first = false;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::grammar::Grammar;

    #[test]
    fn test_canonical_spacing() {
        let g = Grammar::standard();
        let e = g.parse("else_( invert_(streak_(x,2)) ,patternCont_( x ))").unwrap_err();
        // patternCont_ cannot terminate a chain: PRE_END only allows get_ and literals.
        assert!(e.to_string().contains("cannot be derived"));

        let e = g.parse("else_( invert_(streak_(x,2)) ,get_( x ,0))").unwrap();
        assert_eq!(e.to_string(), "else_(invert_(streak_(x, 2)), get_(x, 0))");
    }

    #[test]
    fn test_literal_and_pattern_rendering() {
        let g = Grammar::standard();
        let e = g.parse("else_(patternCont_(x), \"1\")").unwrap();
        assert_eq!(e.to_string(), "else_(patternCont_(x), '1')");
    }
}
