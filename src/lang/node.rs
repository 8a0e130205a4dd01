use serde::{Deserialize, Serialize};

/// A statement in a Monkey program.
///
/// Statements never leave a value on the stack once executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statement {
    /// Bind a name to a value in a global slot: `let x = 5;`
    ///
    /// Stack effect: `( -- )`
    Let {
        /// Bound name.
        name: String,
        /// Bound expression.
        value: Expression,
    },

    /// Evaluate an expression and discard its value: `1 + 2;`
    ///
    /// Stack effect: `( -- )`, the value is remembered as the last popped.
    Expression(Expression),

    /// A nested block of statements.
    Block(BlockStatement),
}

/// A braced sequence of statements: `{ ... }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockStatement {
    pub statements: Vec<Statement>,
}

/// An expression in a Monkey program.
///
/// Every expression leaves exactly one value on the stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    // ───────────────────────────── Literals ─────────────────────────────
    /// Integer literal.
    ///
    /// Stack effect: `( -- n )`
    Integer(i64),

    /// Boolean literal.
    ///
    /// Stack effect: `( -- bool )`
    Boolean(bool),

    // ───────────────────────────── Variables ────────────────────────────
    /// Reference to a previously bound name.
    ///
    /// Stack effect: `( -- x )`
    Identifier(String),

    // ───────────────────────────── Operators ────────────────────────────
    /// Prefix operator application: `-x`, `!x`.
    ///
    /// Stack effect: `( x -- y )`
    Prefix {
        operator: String,
        right: Box<Expression>,
    },

    /// Infix operator application: `a + b`, `a < b`, `a == b`.
    ///
    /// Stack effect: `( a b -- c )`
    Infix {
        left: Box<Expression>,
        operator: String,
        right: Box<Expression>,
    },

    // ──────────────────────────── Control flow ──────────────────────────
    /// Conditional expression: `if (cond) { ... } else { ... }`.
    ///
    /// Yields the value of the taken branch, or `null` when the condition is
    /// falsy and there is no alternative.
    If {
        condition: Box<Expression>,
        consequence: BlockStatement,
        #[serde(default)]
        alternative: Option<BlockStatement>,
    },
}

impl Statement {
    pub fn let_(name: &str, value: Expression) -> Self {
        Statement::Let {
            name: name.to_string(),
            value,
        }
    }

    pub fn expr(expression: Expression) -> Self {
        Statement::Expression(expression)
    }
}

impl BlockStatement {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }
}

impl Expression {
    pub fn int(value: i64) -> Self {
        Expression::Integer(value)
    }

    pub fn bool(value: bool) -> Self {
        Expression::Boolean(value)
    }

    pub fn ident(name: &str) -> Self {
        Expression::Identifier(name.to_string())
    }

    pub fn prefix(operator: &str, right: Expression) -> Self {
        Expression::Prefix {
            operator: operator.to_string(),
            right: Box::new(right),
        }
    }

    pub fn infix(left: Expression, operator: &str, right: Expression) -> Self {
        Expression::Infix {
            left: Box::new(left),
            operator: operator.to_string(),
            right: Box::new(right),
        }
    }

    pub fn if_(
        condition: Expression,
        consequence: Vec<Statement>,
        alternative: Option<Vec<Statement>>,
    ) -> Self {
        Expression::If {
            condition: Box::new(condition),
            consequence: BlockStatement::new(consequence),
            alternative: alternative.map(BlockStatement::new),
        }
    }
}
