//! Typed rule programs.
//!
//! A program is the derivation tree produced by the [`Grammar`]: every node
//! remembers the nonterminal it expands and the production it used, so the
//! prior can be recomputed exactly and any subtree can be regenerated from
//! its own nonterminal. Evaluation walks the tree directly; rule text is a
//! pure rendering of the tree and [`Grammar::parse`] is its inverse.
//!
//! [`Grammar`]: crate::grammar::Grammar
//! [`Grammar::parse`]: crate::grammar::Grammar::parse

mod parser;
mod render;

pub use parser::ParseError;

use std::str::FromStr;

use crate::grammar::{Grammar, Nonterminal, Op};
use crate::primitives::{self, Answer};
use crate::types::History;

/// One node of a derivation tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Expr {
    nt: Nonterminal,
    rule: usize,
    op: Op,
    children: Vec<Expr>,
}

impl Expr {
    pub fn new(nt: Nonterminal, rule: usize, op: Op, children: Vec<Expr>) -> Self {
        Self {
            nt,
            rule,
            op,
            children,
        }
    }

    /// The nonterminal this node expands.
    pub fn nonterminal(&self) -> Nonterminal {
        self.nt
    }

    /// Index of the production used, within the grammar that built it.
    pub fn rule(&self) -> usize {
        self.rule
    }

    pub fn op(&self) -> Op {
        self.op
    }

    pub fn children(&self) -> &[Expr] {
        &self.children
    }

    /// Preorder traversal, matching the left-to-right order of rule text.
    pub fn iter(&self) -> Preorder<'_> {
        Preorder { stack: vec![self] }
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(Expr::size).sum::<usize>()
    }

    /// The `index`-th node in preorder.
    pub fn nth(&self, index: usize) -> Option<&Expr> {
        self.iter().nth(index)
    }

    /// Mutable access to the `index`-th node in preorder.
    pub fn nth_mut(&mut self, mut index: usize) -> Option<&mut Expr> {
        if index == 0 {
            return Some(self);
        }
        index -= 1;
        for child in &mut self.children {
            let n = child.size();
            if index < n {
                return child.nth_mut(index);
            }
            index -= n;
        }
        None
    }

    /// Integer parameter held by this node.
    ///
    /// # Panics
    ///
    /// Panics if the node is not an integer terminal. The grammar only
    /// places integer nonterminals in parameter positions.
    pub fn param(&self) -> usize {
        match self.op {
            Op::Int(n) => n as usize,
            other => panic!("expected integer parameter, found {other:?} at {}", self.nt),
        }
    }

    /// Evaluate against a history. `None` means no rule in this subtree applied.
    pub fn answer(&self, x: &History) -> Answer {
        match self.op {
            Op::Pass => self.children[0].answer(x),
            Op::Else => primitives::or_else(self.children[0].answer(x), self.children[1].answer(x)),
            Op::Invert => primitives::invert(self.children[0].answer(x)),
            Op::Get => Some(primitives::get(x, self.children[0].param())),
            Op::Streak => primitives::streak(x, self.children[0].param()),
            Op::Balance => primitives::balance(x, self.children[0].param()),
            Op::Conform => primitives::conform(x, self.children[0].param()),
            Op::PatternCont => primitives::pattern_continuation(x),
            Op::Literal(bit) => Some(bit),
            Op::Int(_) => panic!("integer parameter evaluated as a rule at {}", self.nt),
        }
    }

    /// Primitive and combinator calls in textual order (`else_`, `invert_`,
    /// `get_`, ...), skipping pass-through nodes and terminals.
    pub fn calls(&self) -> impl Iterator<Item = Op> + '_ {
        self.iter().map(Expr::op).filter(|op| op.name().is_some())
    }
}

impl FromStr for Expr {
    type Err = ParseError;

    /// Parse against the standard grammar.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Grammar::standard().parse(s)
    }
}

/// Preorder iterator over a derivation tree.
pub struct Preorder<'a> {
    stack: Vec<&'a Expr>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = &'a Expr;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}
