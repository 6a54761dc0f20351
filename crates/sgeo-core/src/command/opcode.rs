//! 操作码编解码
//!
//! 格式：`Name&key=value&key=value`。值中的 `%` `=` `&` `/` `,` 以及换行符
//! 写成 `%<十进制码>;`，例如 `,` 写成 `%44;`，换行写成 `%10;`，所以一条
//! 操作码总在一行内。`/` 用于分隔向量分量，`,` 用于
//! 分隔列表元素，两者都先逐个转义元素再拼接。

use crate::error::OpcodeError;
use crate::graph::Graph;
use crate::math::Vector3;
use crate::node::NodeId;
use std::fmt::Write as _;

const RESERVED: [char; 7] = ['%', '=', '&', '/', ',', '\n', '\r'];

/// 转义单个值
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if RESERVED.contains(&c) {
            let _ = write!(out, "%{};", c as u32);
        } else {
            out.push(c);
        }
    }
    out
}

/// 反转义
pub fn unescape(value: &str) -> Result<String, OpcodeError> {
    let bad = || OpcodeError::BadEscape(value.to_string());
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find('%') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let end = tail.find(';').ok_or_else(bad)?;
        let code: u32 = tail[..end].parse().map_err(|_| bad())?;
        out.push(char::from_u32(code).ok_or_else(bad)?);
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// 操作码构建器
#[derive(Debug, Clone)]
pub struct OpcodeWriter {
    text: String,
}

impl OpcodeWriter {
    pub fn new(name: &str) -> Self {
        Self {
            text: name.to_string(),
        }
    }

    fn raw(mut self, key: &str, value: &str) -> Self {
        self.text.push('&');
        self.text.push_str(key);
        self.text.push('=');
        self.text.push_str(value);
        self
    }

    pub fn text(self, key: &str, value: &str) -> Self {
        let value = escape(value);
        self.raw(key, &value)
    }

    pub fn number(self, key: &str, value: f64) -> Self {
        self.raw(key, &value.to_string())
    }

    pub fn flag(self, key: &str, value: bool) -> Self {
        self.raw(key, if value { "true" } else { "false" })
    }

    pub fn vector(self, key: &str, v: &Vector3) -> Self {
        let value = format!("{}/{}/{}", v.x, v.y, v.z);
        self.raw(key, &value)
    }

    pub fn list<S: AsRef<str>>(self, key: &str, items: &[S]) -> Self {
        let value = items
            .iter()
            .map(|item| escape(item.as_ref()))
            .collect::<Vec<_>>()
            .join(",");
        self.raw(key, &value)
    }

    /// 按ID写入节点名称（已删除节点使用历史名称）
    pub fn node(self, key: &str, graph: &Graph, id: NodeId) -> Self {
        let name = node_name(graph, id);
        self.text(key, &name)
    }

    pub fn nodes(self, key: &str, graph: &Graph, ids: &[NodeId]) -> Self {
        let names: Vec<String> = ids.iter().map(|id| node_name(graph, *id)).collect();
        self.list(key, &names)
    }

    pub fn finish(self) -> String {
        self.text
    }
}

fn node_name(graph: &Graph, id: NodeId) -> String {
    graph
        .name_of(id)
        .map(str::to_string)
        .unwrap_or_else(|| id.to_string())
}

/// 解析后的操作码
#[derive(Debug, Clone, PartialEq)]
pub struct Opcode {
    pub name: String,
    attributes: Vec<(String, String)>,
}

impl Opcode {
    pub fn parse(token: &str) -> Result<Self, OpcodeError> {
        let mut parts = token.trim().split('&');
        let name = parts.next().unwrap_or_default().to_string();
        if name.is_empty() {
            return Err(OpcodeError::UnknownOpcode(token.to_string()));
        }
        let attributes = parts
            .map(|part| {
                part.split_once('=')
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .ok_or_else(|| OpcodeError::BadValue {
                        key: part.to_string(),
                        value: String::new(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { name, attributes })
    }

    pub fn has(&self, key: &str) -> bool {
        self.raw(key).is_some()
    }

    fn raw(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn required(&self, key: &str) -> Result<&str, OpcodeError> {
        self.raw(key).ok_or_else(|| OpcodeError::MissingAttribute {
            opcode: self.name.clone(),
            key: key.to_string(),
        })
    }

    fn bad(key: &str, value: &str) -> OpcodeError {
        OpcodeError::BadValue {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    pub fn text(&self, key: &str) -> Result<String, OpcodeError> {
        unescape(self.required(key)?)
    }

    pub fn optional_text(&self, key: &str) -> Result<Option<String>, OpcodeError> {
        self.raw(key).map(unescape).transpose()
    }

    pub fn number(&self, key: &str) -> Result<f64, OpcodeError> {
        let value = self.required(key)?;
        value.parse().map_err(|_| Self::bad(key, value))
    }

    pub fn index(&self, key: &str) -> Result<u8, OpcodeError> {
        let value = self.required(key)?;
        value.parse().map_err(|_| Self::bad(key, value))
    }

    pub fn flag(&self, key: &str) -> Result<bool, OpcodeError> {
        match self.raw(key) {
            None | Some("false") => Ok(false),
            Some("true") => Ok(true),
            Some(other) => Err(Self::bad(key, other)),
        }
    }

    pub fn vector(&self, key: &str) -> Result<Vector3, OpcodeError> {
        let value = self.required(key)?;
        let parts = value
            .split('/')
            .map(|p| p.parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| Self::bad(key, value))?;
        match parts.as_slice() {
            [x, y, z] => Ok(Vector3::new(*x, *y, *z)),
            _ => Err(Self::bad(key, value)),
        }
    }

    pub fn list(&self, key: &str) -> Result<Vec<String>, OpcodeError> {
        let value = self.required(key)?;
        if value.is_empty() {
            return Ok(Vec::new());
        }
        value.split(',').map(unescape).collect()
    }

    pub fn optional_list(&self, key: &str) -> Result<Vec<String>, OpcodeError> {
        if self.has(key) {
            self.list(key)
        } else {
            Ok(Vec::new())
        }
    }

    /// 在存活名称表中解析节点
    pub fn node(&self, key: &str, graph: &Graph) -> Result<NodeId, OpcodeError> {
        resolve(graph, &self.text(key)?)
    }

    pub fn nodes(&self, key: &str, graph: &Graph) -> Result<Vec<NodeId>, OpcodeError> {
        self.list(key)?
            .iter()
            .map(|name| resolve(graph, name))
            .collect()
    }

    /// 恰好两个节点的列表
    pub fn node_pair(&self, key: &str, graph: &Graph) -> Result<(NodeId, NodeId), OpcodeError> {
        match self.nodes(key, graph)?.as_slice() {
            [a, b] => Ok((*a, *b)),
            _ => Err(Self::bad(key, self.raw(key).unwrap_or_default())),
        }
    }
}

pub fn resolve(graph: &Graph, name: &str) -> Result<NodeId, OpcodeError> {
    graph
        .find(name)
        .ok_or_else(|| OpcodeError::UnknownName(name.to_string()))
}
