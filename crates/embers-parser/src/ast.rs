/// Abstract Syntax Tree types for the scriptlet language
///
/// The tree owns its strings so a compiled template can keep its program
/// without borrowing from the generated code.

/// A complete program
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

/// Block of statements: `{ stmt1; stmt2; ... }`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Variable declaration: `var x` or `let x = expr`
    VarDecl { name: String, init: Option<Expr> },
    /// Assignment to an existing variable: `x = expr`
    Assign { name: String, value: Expr },
    /// Expression used as statement
    Expr(Expr),
    /// `if expr { ... } else { ... }`; `else if` nests another `If` in the else block
    If {
        condition: Expr,
        then_block: Block,
        else_block: Option<Block>,
    },
    /// `for var x in expr { ... }` or `for var x, i in expr { ... }`
    ForIn {
        var: String,
        index: Option<String>,
        iter: Expr,
        body: Block,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Identifier(String),
    Number(f64),
    String(String),
    True,
    False,
    Null,
    Array(Vec<Expr>),
    /// Object literal: `{ key: value, ... }`
    Object(Vec<(String, Expr)>),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    /// Call of an intrinsic or filter by name: `f(a, b)`
    Call { callee: String, args: Vec<Expr> },
    /// `recv.f(a)`, evaluated as `f(recv, a)`
    MethodCall {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    /// Field access: `obj.field`
    Member { object: Box<Expr>, field: String },
    /// Index access: `obj[expr]`
    Index { object: Box<Expr>, index: Box<Expr> },
    /// `cond ? a : b`
    Conditional {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
}

impl Expr {
    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }
}
