//! 计算表达式求值器
//!
//! 支持的输入：
//! - 数字字面量: `2`、`3.25`、`.5`（不支持指数形式）
//! - 常量: `pi`、`e`
//! - 度量标记变量: `M1`、`M2` ...
//! - 运算符: `+ - * / ^` 与一元负号
//! - 单参数函数: `sin cos tan asin acos atan abs ceil floor exp ln sqrt sgn`
//! - 多参数函数: `min max`（两个及以上）、`atan2`（两个）
//!
//! 解析得到的 [`Expr`] 可以用不同的变量表反复求值，无需重新解析。
//! 定义域错误（如 `ln(0)`、`sqrt(-1)`）和非有限结果返回 `None`，不报错。

mod lexer;
mod parser;

use std::collections::{BTreeSet, HashMap};

/// 表达式错误
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    #[error("Empty expression")]
    Empty,

    #[error("Unexpected character '{character}' at position {position}")]
    UnexpectedCharacter { character: char, position: usize },

    #[error("Malformed number '{text}' at position {position}")]
    MalformedNumber { text: String, position: usize },

    #[error("Missing operator before position {position}")]
    MissingOperator { position: usize },

    #[error("Missing operand at position {position} (found {found})")]
    MissingOperand { found: String, position: usize },

    #[error("Missing matching parenthesis for position {position}")]
    MissingParenthesis { position: usize },

    #[error("Missing '(' after function '{function}' at position {position}")]
    MissingFunctionParenthesis { function: String, position: usize },

    #[error("Unexpected token '{token}' at position {position}")]
    UnexpectedToken { token: String, position: usize },

    #[error("Function '{function}' does not take {found} argument(s)")]
    WrongArgumentCount { function: String, found: usize },

    #[error("Undefined variable '{0}'")]
    UndefinedVariable(String),
}

/// 二元运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
}

impl BinaryOp {
    fn apply(self, left: f64, right: f64) -> f64 {
        match self {
            BinaryOp::Add => left + right,
            BinaryOp::Subtract => left - right,
            BinaryOp::Multiply => left * right,
            BinaryOp::Divide => left / right,
            BinaryOp::Power => left.powf(right),
        }
    }
}

/// 内置函数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Abs,
    Ceil,
    Floor,
    Exp,
    Ln,
    Sqrt,
    Sgn,
    Min,
    Max,
    Atan2,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "sin" => Function::Sin,
            "cos" => Function::Cos,
            "tan" => Function::Tan,
            "asin" => Function::Asin,
            "acos" => Function::Acos,
            "atan" => Function::Atan,
            "abs" => Function::Abs,
            "ceil" => Function::Ceil,
            "floor" => Function::Floor,
            "exp" => Function::Exp,
            "ln" => Function::Ln,
            "sqrt" => Function::Sqrt,
            "sgn" => Function::Sgn,
            "min" => Function::Min,
            "max" => Function::Max,
            "atan2" => Function::Atan2,
            _ => return None,
        })
    }

    /// 参数个数范围 `(最少, 最多)`
    pub fn arity(self) -> (usize, Option<usize>) {
        match self {
            Function::Min | Function::Max => (2, None),
            Function::Atan2 => (2, Some(2)),
            _ => (1, Some(1)),
        }
    }

    fn apply(self, args: &[f64]) -> f64 {
        let x = args[0];
        match self {
            Function::Sin => x.sin(),
            Function::Cos => x.cos(),
            Function::Tan => x.tan(),
            Function::Asin => x.asin(),
            Function::Acos => x.acos(),
            Function::Atan => x.atan(),
            Function::Abs => x.abs(),
            Function::Ceil => x.ceil(),
            Function::Floor => x.floor(),
            Function::Exp => x.exp(),
            Function::Ln => {
                if x > 0.0 {
                    x.ln()
                } else {
                    f64::NAN
                }
            }
            Function::Sqrt => {
                if x >= 0.0 {
                    x.sqrt()
                } else {
                    f64::NAN
                }
            }
            Function::Sgn => {
                if x > 0.0 {
                    1.0
                } else if x < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
            Function::Min => args.iter().copied().fold(f64::INFINITY, f64::min),
            Function::Max => args.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Function::Atan2 => x.atan2(args[1]),
        }
    }
}

/// 语法树
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Constant { name: &'static str, value: f64 },
    Variable(String),
    Negate(Box<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call { function: Function, args: Vec<Expr> },
}

impl Expr {
    pub(crate) fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// 求值；结果非有限时返回 `None`
    pub fn evaluate(&self, variables: &HashMap<String, f64>) -> Result<Option<f64>, ExprError> {
        let value = self.eval(variables)?;
        Ok(value.is_finite().then_some(value))
    }

    fn eval(&self, variables: &HashMap<String, f64>) -> Result<f64, ExprError> {
        Ok(match self {
            Expr::Number(value) => *value,
            Expr::Constant { value, .. } => *value,
            Expr::Variable(name) => *variables
                .get(name)
                .ok_or_else(|| ExprError::UndefinedVariable(name.clone()))?,
            Expr::Negate(inner) => -inner.eval(variables)?,
            Expr::Binary { op, left, right } => {
                op.apply(left.eval(variables)?, right.eval(variables)?)
            }
            Expr::Call { function, args } => {
                let values = args
                    .iter()
                    .map(|arg| arg.eval(variables))
                    .collect::<Result<Vec<_>, _>>()?;
                function.apply(&values)
            }
        })
    }

    /// 表达式引用的变量名
    pub fn variables(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables(&self, names: &mut BTreeSet<String>) {
        match self {
            Expr::Variable(name) => {
                names.insert(name.clone());
            }
            Expr::Negate(inner) => inner.collect_variables(names),
            Expr::Binary { left, right, .. } => {
                left.collect_variables(names);
                right.collect_variables(names);
            }
            Expr::Call { args, .. } => args.iter().for_each(|arg| arg.collect_variables(names)),
            Expr::Number(_) | Expr::Constant { .. } => {}
        }
    }
}

/// 解析表达式
pub fn parse(source: &str) -> Result<Expr, ExprError> {
    let tokens = lexer::tokenize(source)?;
    parser::Parser::new(tokens, source.chars().count()).parse()
}

/// 解析并在空变量表下求值
pub fn evaluate(source: &str) -> Result<Option<f64>, ExprError> {
    parse(source)?.evaluate(&HashMap::new())
}
