//! 核心错误定义
//!
//! 致命错误（编程错误、脚本损坏）用 [`GraphError`] / [`OpcodeError`] 传播；
//! 用户可恢复的情况用 [`Alert`] 表示，由命令构建器在修改图之前返回。

use crate::expression::ExprError;
use crate::node::NodeId;
use thiserror::Error;

/// 依赖图错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Registering {child} under {parent} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },

    #[error("Node not found: {0}")]
    MissingNode(NodeId),

    #[error("Node {0} already exists")]
    Occupied(NodeId),

    #[error("Node {0} still has children")]
    HasChildren(NodeId),

    #[error("Duplicate node name: {0}")]
    DuplicateName(String),
}

/// 操作码解析错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OpcodeError {
    #[error("Unknown opcode: {0}")]
    UnknownOpcode(String),

    #[error("Opcode {opcode} is missing attribute '{key}'")]
    MissingAttribute { opcode: String, key: String },

    #[error("Unknown node name: {0}")]
    UnknownName(String),

    #[error("Bad value for '{key}': {value}")]
    BadValue { key: String, value: String },

    #[error("Malformed escape sequence in '{0}'")]
    BadEscape(String),

    #[error("Expression error: {0}")]
    Expression(#[from] ExprError),
}

/// 命令执行错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Opcode(#[from] OpcodeError),
}

/// 可恢复的用户提示
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Alert {
    #[error("Measurement already exists as {0}")]
    DuplicateMeasurement(String),

    #[error("Antipode of {0} is already displayed")]
    AntipodeExists(String),

    #[error("Undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("Expression error: {0}")]
    Expression(ExprError),

    #[error("Unsupported objects: {0}")]
    UnsupportedOperands(String),
}

/// 构造上下文错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConstructionError {
    #[error(transparent)]
    Alert(#[from] Alert),

    #[error(transparent)]
    Command(#[from] CommandError),
}

impl From<GraphError> for ConstructionError {
    fn from(err: GraphError) -> Self {
        ConstructionError::Command(CommandError::Graph(err))
    }
}

impl From<OpcodeError> for ConstructionError {
    fn from(err: OpcodeError) -> Self {
        ConstructionError::Command(CommandError::Opcode(err))
    }
}

pub type GraphResult<T> = Result<T, GraphError>;
pub type CommandResult<T> = Result<T, CommandError>;
