use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    VarDeclaration {
        identifier: String,
        value: Option<Expr>,
        is_constant: bool,
    },
    FunctionDeclaration(FunctionDeclaration),
    Return(Expr),
    If(IfStmt),
    Import { module: String },
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDeclaration {
    pub name: String,
    pub parameters: Vec<String>,
    // Shared with every function value created from this declaration.
    pub body: Rc<Vec<Stmt>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_branch: Vec<Stmt>,
    pub elif_branches: Vec<ElifBranch>,
    pub else_branch: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElifBranch {
    pub condition: Expr,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Identifier(String),
    NumericLiteral(f64),
    StringLiteral(String),
    Object(Vec<Property>),
    Binary {
        left: Box<Expr>,
        right: Box<Expr>,
        operator: ArithmeticOperator,
    },
    Relational {
        left: Box<Expr>,
        right: Box<Expr>,
        operator: RelationalOperator,
    },
    Logical {
        left: Box<Expr>,
        right: Box<Expr>,
        operator: LogicalOperator,
    },
    Assignment {
        assignee: Box<Expr>,
        value: Box<Expr>,
    },
    CompoundAssignment {
        assignee: Box<Expr>,
        operator: ArithmeticOperator,
        value: Box<Expr>,
    },
    Call {
        caller: Box<Expr>,
        args: Vec<Expr>,
    },
    Member {
        object: Box<Expr>,
        property: Box<Expr>,
        computed: bool,
    },
    Null,
}

/// An object literal entry. A missing `value` is shorthand for a lookup of `key`.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub key: String,
    pub value: Option<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithmeticOperator {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "+" => Some(Self::Add),
            "-" => Some(Self::Sub),
            "*" => Some(Self::Mul),
            "/" => Some(Self::Div),
            "%" => Some(Self::Mod),
            _ => None,
        }
    }

    pub fn apply(self, left: f64, right: f64) -> f64 {
        match self {
            Self::Add => left + right,
            Self::Sub => left - right,
            Self::Mul => left * right,
            Self::Div => left / right,
            Self::Mod => left % right,
        }
    }
}

/// Numeric comparisons; both operands must be numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationalOperator {
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Equals,
    NotEquals,
}

impl RelationalOperator {
    pub fn compare(self, left: f64, right: f64) -> bool {
        match self {
            Self::GreaterThan => left > right,
            Self::GreaterThanOrEqual => left >= right,
            Self::LessThan => left < right,
            Self::LessThanOrEqual => left <= right,
            Self::Equals => left == right,
            Self::NotEquals => left != right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    pub fn apply(self, left: bool, right: bool) -> bool {
        match self {
            Self::And => left && right,
            Self::Or => left || right,
        }
    }
}

impl Expr {
    /// Node name used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Identifier(_) => "Identifier",
            Self::NumericLiteral(_) => "NumericLiteral",
            Self::StringLiteral(_) => "StringLiteral",
            Self::Object(_) => "ObjectLiteral",
            Self::Binary { .. } => "BinaryExpr",
            Self::Relational { .. } => "RelationalExpr",
            Self::Logical { .. } => "LogicalExpr",
            Self::Assignment { .. } => "AssignmentExpr",
            Self::CompoundAssignment { .. } => "CompoundAssignmentExpr",
            Self::Call { .. } => "CallExpr",
            Self::Member { .. } => "MemberExpr",
            Self::Null => "NullExpr",
        }
    }
}
