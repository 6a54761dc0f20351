//! 撤销/重做日志
//!
//! 撤销栈保存可逆的内存命令；操作码只在生成脚本时才序列化。

use super::Command;
use crate::error::CommandResult;
use crate::graph::Graph;
use crate::update::{UpdateMode, UpdateReport};
use tracing::debug;

#[derive(Debug, Default)]
pub struct CommandLog {
    undo_stack: Vec<Command>,
    redo_stack: Vec<Command>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 执行命令并完整更新，入撤销栈，清空重做栈
    pub fn execute(&mut self, mut command: Command, graph: &mut Graph) -> CommandResult<UpdateReport> {
        debug!("execute {}", command.description());
        command.save_state(graph)?;
        if let Err(err) = command.perform(graph) {
            // 失败的命令已回滚，恢复的节点仍需重算
            graph.update_all(UpdateMode::Full)?;
            return Err(err.into());
        }
        let report = graph.update_all(UpdateMode::Full)?;
        self.undo_stack.push(command);
        self.redo_stack.clear();
        Ok(report)
    }

    /// 撤销最近的命令；栈空时返回 `false`
    pub fn undo(&mut self, graph: &mut Graph) -> CommandResult<bool> {
        let Some(mut command) = self.undo_stack.pop() else {
            return Ok(false);
        };
        debug!("undo {}", command.description());
        command.restore_state(graph)?;
        graph.update_all(UpdateMode::Full)?;
        self.redo_stack.push(command);
        Ok(true)
    }

    /// 重做最近撤销的命令；栈空时返回 `false`
    pub fn redo(&mut self, graph: &mut Graph) -> CommandResult<bool> {
        let Some(mut command) = self.redo_stack.pop() else {
            return Ok(false);
        };
        debug!("redo {}", command.description());
        command.save_state(graph)?;
        command.perform(graph)?;
        graph.update_all(UpdateMode::Full)?;
        self.undo_stack.push(command);
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// 撤销栈中的命令，最早的在前
    pub fn commands(&self) -> &[Command] {
        &self.undo_stack
    }

    pub fn last(&self) -> Option<&Command> {
        self.undo_stack.last()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// 把撤销栈序列化为操作码脚本
    pub fn to_script(&self, graph: &Graph) -> Vec<String> {
        self.undo_stack
            .iter()
            .map(|command| command.to_opcode(graph))
            .collect()
    }
}
