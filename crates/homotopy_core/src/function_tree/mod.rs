//! Expression trees for polynomial and analytic functions.
//!
//! A [`Node`] is a reference-counted handle to one vertex of an expression
//! graph. Variables and numbers are freely shared between parents; operators
//! reference their children downward only, so the graph never has cycles.
//! Every node keeps a small evaluation cache keyed by numeric type, working
//! precision and differentiation variable. Bumping the node's generation
//! (through [`Node::reset`] or [`Node::set_precision`]) invalidates it.

mod degree;
mod differentiate;
mod display;
mod eval;
mod homogenize;
mod linear_product;
mod number;
mod ops;

pub use linear_product::LinearProduct;
pub use number::Number;
pub use ops::{acos, asin, atan, cos, e, exp, i, log, pi, pow, sin, sqrt, tan};

pub(crate) use degree::Selection;

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::HashSet;
use std::rc::Rc;

use rug::Rational;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::numeric::{default_precision, Scalar, ValueSlot};
use eval::CacheEntry;

/// Unary operators, both the polynomial negation and the transcendental functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Negate,
    Sqrt,
    Sin,
    Cos,
    Tan,
    Exp,
    Log,
    ArcSin,
    ArcCos,
    ArcTan,
}

impl UnaryOp {
    pub fn name(&self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::Sqrt => "sqrt",
            UnaryOp::Sin => "sin",
            UnaryOp::Cos => "cos",
            UnaryOp::Tan => "tan",
            UnaryOp::Exp => "exp",
            UnaryOp::Log => "log",
            UnaryOp::ArcSin => "asin",
            UnaryOp::ArcCos => "acos",
            UnaryOp::ArcTan => "atan",
        }
    }
}

/// One summand together with its sign.
#[derive(Debug, Clone)]
pub struct Term {
    pub node: Node,
    pub positive: bool,
}

impl Term {
    pub fn plus(node: Node) -> Self {
        Self { node, positive: true }
    }

    pub fn minus(node: Node) -> Self {
        Self { node, positive: false }
    }
}

/// One factor of a product, either multiplied or divided.
#[derive(Debug, Clone)]
pub struct Factor {
    pub node: Node,
    pub divide: bool,
}

impl Factor {
    pub fn times(node: Node) -> Self {
        Self { node, divide: false }
    }

    pub fn over(node: Node) -> Self {
        Self { node, divide: true }
    }
}

/// A named variable and its current values.
#[derive(Debug)]
pub struct VariableData {
    name: String,
    value: RefCell<ValueSlot>,
}

impl VariableData {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// The closed set of node kinds.
#[derive(Debug)]
pub enum NodeKind {
    Variable(VariableData),
    Number(Number),
    /// `d(variable)`: evaluates to one when differentiating with respect to
    /// the wrapped variable and to zero otherwise.
    Differential(Node),
    Unary(UnaryOp, Node),
    Sum(Vec<Term>),
    Product(Vec<Factor>),
    IntegerPower(Node, i32),
    Power(Node, Node),
    LinearProduct(LinearProduct),
}

impl NodeKind {
    fn children(&self) -> Vec<Node> {
        match self {
            NodeKind::Variable(_) | NodeKind::Number(_) => Vec::new(),
            NodeKind::Differential(v) => vec![v.clone()],
            NodeKind::Unary(_, operand) => vec![operand.clone()],
            NodeKind::Sum(terms) => terms.iter().map(|t| t.node.clone()).collect(),
            NodeKind::Product(factors) => factors.iter().map(|f| f.node.clone()).collect(),
            NodeKind::IntegerPower(base, _) => vec![base.clone()],
            NodeKind::Power(base, exponent) => vec![base.clone(), exponent.clone()],
            NodeKind::LinearProduct(lp) => lp.referenced_variables(),
        }
    }
}

struct NodeCell {
    kind: RefCell<NodeKind>,
    precision: Cell<u32>,
    generation: Cell<u64>,
    has_differential: bool,
    cache: RefCell<Vec<CacheEntry>>,
}

/// Shared handle to an expression node.
#[derive(Clone)]
pub struct Node(Rc<NodeCell>);

impl Node {
    fn new(kind: NodeKind) -> Self {
        let has_differential = match &kind {
            NodeKind::Differential(_) => true,
            other => other.children().iter().any(|c| c.0.has_differential),
        };
        Node(Rc::new(NodeCell {
            kind: RefCell::new(kind),
            precision: Cell::new(default_precision()),
            generation: Cell::new(0),
            has_differential,
            cache: RefCell::new(Vec::new()),
        }))
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Node::new(NodeKind::Variable(VariableData {
            name: name.into(),
            value: RefCell::new(ValueSlot::default()),
        }))
    }

    pub fn integer(value: i64) -> Self {
        Node::new(NodeKind::Number(Number::Integer(value)))
    }

    pub fn rational(re: Rational, im: Rational) -> Self {
        Node::new(NodeKind::Number(Number::Rational { re, im }))
    }

    /// A decimal constant, kept exactly as written.
    pub fn float(re: &str, im: &str) -> Result<Self> {
        Ok(Node::new(NodeKind::Number(Number::float(re, im)?)))
    }

    pub fn number(number: Number) -> Self {
        Node::new(NodeKind::Number(number))
    }

    pub fn unary(op: UnaryOp, operand: Node) -> Self {
        Node::new(NodeKind::Unary(op, operand))
    }

    pub fn sum(terms: Vec<Term>) -> Self {
        Node::new(NodeKind::Sum(terms))
    }

    pub fn product(factors: Vec<Factor>) -> Self {
        Node::new(NodeKind::Product(factors))
    }

    pub fn integer_power(base: Node, exponent: i32) -> Self {
        Node::new(NodeKind::IntegerPower(base, exponent))
    }

    pub fn power(base: Node, exponent: Node) -> Self {
        Node::new(NodeKind::Power(base, exponent))
    }

    /// The differential `d(variable)`; fails if `variable` is not a variable.
    pub fn differential(variable: &Node) -> Result<Self> {
        variable.expect_variable()?;
        Ok(Node::new(NodeKind::Differential(variable.clone())))
    }

    pub fn linear_product(product: LinearProduct) -> Self {
        Node::new(NodeKind::LinearProduct(product))
    }

    /// Borrow of this node's kind, for pattern dispatch.
    pub fn kind(&self) -> Ref<'_, NodeKind> {
        self.0.kind.borrow()
    }

    pub(crate) fn kind_mut(&self) -> RefMut<'_, NodeKind> {
        self.0.kind.borrow_mut()
    }

    /// Identity of the underlying node; two handles share an id exactly when
    /// they point at the same node.
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_variable(&self) -> bool {
        matches!(&*self.kind(), NodeKind::Variable(_))
    }

    pub(crate) fn expect_variable(&self) -> Result<()> {
        if self.is_variable() {
            Ok(())
        } else {
            Err(Error::NotAVariable(self.to_string()))
        }
    }

    /// Name of a variable node.
    pub fn name(&self) -> Option<String> {
        match &*self.kind() {
            NodeKind::Variable(v) => Some(v.name.clone()),
            _ => None,
        }
    }

    /// Sets the current value of a variable; has no effect on other kinds.
    pub fn set_value<T: Scalar>(&self, value: T) {
        if let NodeKind::Variable(v) = &*self.kind() {
            v.value.borrow_mut().set(value);
        }
    }

    /// Current value of a variable, or `None` for other kinds.
    pub fn value<T: Scalar>(&self) -> Option<T> {
        match &*self.kind() {
            NodeKind::Variable(v) => Some(v.value.borrow().get::<T>()),
            _ => None,
        }
    }

    /// Direct children, with shared leaves repeated as often as they occur.
    pub fn children(&self) -> Vec<Node> {
        self.kind().children()
    }

    pub(crate) fn has_differential(&self) -> bool {
        self.0.has_differential
    }

    /// True for a numeric constant equal to zero.
    pub fn is_zero_constant(&self) -> bool {
        matches!(&*self.kind(), NodeKind::Number(n) if n.is_zero())
    }

    pub fn is_one_constant(&self) -> bool {
        matches!(&*self.kind(), NodeKind::Number(n) if n.is_one())
    }

    /// Working precision, in digits, used for multiple precision evaluation.
    pub fn precision(&self) -> u32 {
        self.0.precision.get()
    }

    /// Sets the working precision of the whole subtree and invalidates its caches.
    pub fn set_precision(&self, digits: u32) {
        self.for_each_distinct(|node| {
            node.0.precision.set(digits);
            node.invalidate();
            if let NodeKind::Variable(v) = &*node.kind() {
                v.value.borrow_mut().set_precision(digits);
            }
        });
    }

    /// Invalidates every cached value in the subtree.
    pub fn reset(&self) {
        self.for_each_distinct(Node::invalidate);
    }

    /// Visits every distinct node of the subtree once, parents before children.
    pub(crate) fn for_each_distinct(&self, mut visit: impl FnMut(&Node)) {
        let mut seen = HashSet::new();
        let mut stack = vec![self.clone()];
        while let Some(node) = stack.pop() {
            if !seen.insert(node.id()) {
                continue;
            }
            visit(&node);
            stack.extend(node.children());
        }
    }

    fn invalidate(&self) {
        self.0.generation.set(self.0.generation.get().wrapping_add(1));
    }
}

/// A variable group: an ordered list of variable nodes.
pub type VariableGroup = Vec<Node>;
