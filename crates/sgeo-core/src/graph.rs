//! 依赖图
//!
//! 节点存放在按 [`NodeId`] 下标的竞技场中，父子关系用下标列表双向维护，
//! 构成有向无环图。名称和度量标记各有一张符号表，只包含存活节点；
//! 已删除节点的名称保留在历史表中，生成脚本时仍能引用。

use crate::config::Settings;
use crate::error::{GraphError, GraphResult};
use crate::node::{Node, NodeId, NodeKind};
use crate::plottable::{NullFactory, Plottable, PlottableFactory};
use crate::properties::Style;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// 构造依赖图
pub struct Graph {
    nodes: Vec<Option<Node>>,
    next_id: u32,
    /// 存活节点名称 -> ID
    names: HashMap<String, NodeId>,
    /// 存活度量标记 -> ID
    tokens: HashMap<String, NodeId>,
    /// 所有出现过的节点名称（含已删除）
    history_names: HashMap<NodeId, String>,
    /// 自动命名计数器，按前缀
    counters: HashMap<String, u32>,
    plottables: HashMap<NodeId, Box<dyn Plottable>>,
    factory: Box<dyn PlottableFactory>,
    settings: Settings,
}

impl Graph {
    pub fn new(settings: Settings) -> Self {
        Self::with_factory(settings, Box::new(NullFactory))
    }

    pub fn with_factory(settings: Settings, factory: Box<dyn PlottableFactory>) -> Self {
        Self {
            nodes: Vec::new(),
            next_id: 0,
            names: HashMap::new(),
            tokens: HashMap::new(),
            history_names: HashMap::new(),
            counters: HashMap::new(),
            plottables: HashMap::new(),
            factory,
            settings,
        }
    }

    /// 清空所有节点和计数器，保留配置和工厂
    pub fn clear(&mut self) {
        for plottable in self.plottables.values_mut() {
            plottable.remove_from_display();
        }
        self.plottables.clear();
        self.nodes.clear();
        self.next_id = 0;
        self.names.clear();
        self.tokens.clear();
        self.history_names.clear();
        self.counters.clear();
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    pub fn set_factory(&mut self, factory: Box<dyn PlottableFactory>) {
        self.factory = factory;
    }

    // ========== 标识与命名 ==========

    /// 分配新的节点ID
    pub fn allocate_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// 按前缀生成下一个未被占用的名称
    pub fn next_name(&mut self, prefix: &str) -> String {
        loop {
            let counter = self.counters.entry(prefix.to_string()).or_insert(0);
            *counter += 1;
            let name = format!("{}{}", prefix, counter);
            if !self.names.contains_key(&name) && !self.tokens.contains_key(&name) {
                return name;
            }
        }
    }

    /// 下一个度量标记 `M1, M2, …`
    pub fn next_token(&mut self) -> String {
        self.next_name("M")
    }

    /// 显式名称推进对应前缀的计数器，避免自动命名与之冲突
    fn note_name(&mut self, name: &str) {
        let split = name
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(name.len());
        let (prefix, digits) = name.split_at(split);
        if let Ok(number) = digits.parse::<u32>() {
            let counter = self.counters.entry(prefix.to_string()).or_insert(0);
            *counter = (*counter).max(number);
        }
    }

    // ========== 查询 ==========

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(|slot| slot.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index()).and_then(|slot| slot.as_mut())
    }

    pub fn node(&self, id: NodeId) -> GraphResult<&Node> {
        self.get(id).ok_or(GraphError::MissingNode(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> GraphResult<&mut Node> {
        self.get_mut(id).ok_or(GraphError::MissingNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// 按名称查找存活节点
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// 按度量标记查找
    pub fn find_token(&self, token: &str) -> Option<NodeId> {
        self.tokens.get(token).copied()
    }

    /// 节点名称，已删除的节点也能查到
    pub fn name_of(&self, id: NodeId) -> Option<&str> {
        self.history_names.get(&id).map(String::as_str)
    }

    /// 按ID顺序遍历存活节点
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().flatten()
    }

    pub fn ids(&self) -> Vec<NodeId> {
        self.iter().map(|node| node.id).collect()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 按创建顺序列出一维对象
    pub fn one_dimensional(&self) -> Vec<NodeId> {
        self.iter()
            .filter(|node| node.kind.is_one_dimensional())
            .map(|node| node.id)
            .collect()
    }

    /// 当前所有度量值（变量表）
    pub fn measurement_values(&self) -> HashMap<String, f64> {
        self.iter()
            .filter_map(|node| Some((node.kind.token()?.to_string(), node.value()?)))
            .collect()
    }

    /// 查找某点的对径点
    pub fn antipode_of(&self, id: NodeId) -> Option<NodeId> {
        let node = self.get(id)?;
        node.children.iter().copied().find(|child| {
            matches!(
                self.get(*child).map(|n| &n.kind),
                Some(NodeKind::Antipode { source }) if *source == id
            )
        })
    }

    // ========== 插入与删除 ==========

    /// 插入节点，按类型注册父节点
    ///
    /// 节点的父子列表和过期标记会被重置；重新插入被删除的节点（撤销删除、
    /// 重做创建）时沿用原来的ID和名称。
    pub fn insert(&mut self, mut node: Node) -> GraphResult<NodeId> {
        let id = node.id;
        if self.contains(id) {
            return Err(GraphError::Occupied(id));
        }
        if self.names.contains_key(&node.name) {
            return Err(GraphError::DuplicateName(node.name));
        }
        if let Some(token) = node.kind.token() {
            if self.tokens.contains_key(token) {
                return Err(GraphError::DuplicateName(token.to_string()));
            }
        }
        let parents = node.kind.dependencies();
        for parent in &parents {
            self.node(*parent)?;
        }

        node.parents.clear();
        node.children.clear();
        node.stale = true;

        if id.index() >= self.nodes.len() {
            self.nodes.resize_with(id.index() + 1, || None);
        }
        self.next_id = self.next_id.max(id.0 + 1);
        self.names.insert(node.name.clone(), id);
        if let Some(token) = node.kind.token() {
            self.tokens.insert(token.to_string(), id);
            self.note_name(token);
        }
        self.history_names.insert(id, node.name.clone());
        self.note_name(&node.name);

        let plottable = node.kind.is_displayable().then(|| {
            let mut plottable = self.factory.create(&node);
            plottable.set_style(&node.style);
            plottable.add_to_display();
            plottable
        });
        self.nodes[id.index()] = Some(node);
        if let Some(plottable) = plottable {
            self.plottables.insert(id, plottable);
        }

        for parent in parents {
            self.register_child(parent, id)?;
        }
        Ok(id)
    }

    /// 删除没有子节点的节点，返回被删除的节点
    pub fn remove(&mut self, id: NodeId) -> GraphResult<Node> {
        let node = self.node(id)?;
        if !node.children.is_empty() {
            return Err(GraphError::HasChildren(id));
        }
        for parent in node.parents.clone() {
            self.unregister_child(parent, id)?;
        }

        let node = self.nodes[id.index()]
            .take()
            .ok_or(GraphError::MissingNode(id))?;
        if self.names.get(&node.name) == Some(&id) {
            self.names.remove(&node.name);
        }
        if let Some(token) = node.kind.token() {
            if self.tokens.get(token) == Some(&id) {
                self.tokens.remove(token);
            }
        }
        if let Some(mut plottable) = self.plottables.remove(&id) {
            plottable.remove_from_display();
        }
        Ok(node)
    }

    // ========== 父子链接 ==========

    /// 注册父子关系；会形成环时报错
    pub fn register_child(&mut self, parent: NodeId, child: NodeId) -> GraphResult<()> {
        self.node(child)?;
        if parent == child || self.is_descendant(parent, child) {
            return Err(GraphError::Cycle { parent, child });
        }
        let parent_node = self.node_mut(parent)?;
        if !parent_node.children.contains(&child) {
            parent_node.children.push(child);
        }
        let child_node = self.node_mut(child)?;
        if !child_node.parents.contains(&parent) {
            child_node.parents.push(parent);
        }
        Ok(())
    }

    pub fn unregister_child(&mut self, parent: NodeId, child: NodeId) -> GraphResult<()> {
        self.node_mut(parent)?.children.retain(|c| *c != child);
        if let Some(child_node) = self.get_mut(child) {
            child_node.parents.retain(|p| *p != parent);
        }
        Ok(())
    }

    /// `target` 是否为 `ancestor` 的后代
    fn is_descendant(&self, target: NodeId, ancestor: NodeId) -> bool {
        let mut stack = vec![ancestor];
        let mut seen = HashSet::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(node) = self.get(id) {
                for child in &node.children {
                    if *child == target {
                        return true;
                    }
                    stack.push(*child);
                }
            }
        }
        false
    }

    /// 把节点及其所有后代标记为过期，不重算
    pub fn mark_kids_out_of_date(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.get_mut(current) {
                node.stale = true;
                stack.extend(node.children.iter().copied());
            }
        }
    }

    /// 所有传递后代，最深的在前（逆拓扑序），不含节点本身
    pub fn descendants_deepest_first(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        self.post_order(id, &mut visited, &mut order);
        order.pop();
        order
    }

    fn post_order(&self, id: NodeId, visited: &mut HashSet<NodeId>, order: &mut Vec<NodeId>) {
        if !visited.insert(id) {
            return;
        }
        if let Some(node) = self.get(id) {
            for child in &node.children {
                self.post_order(*child, visited, order);
            }
        }
        order.push(id);
    }

    // ========== 显示状态 ==========

    pub fn set_style(&mut self, id: NodeId, style: Style) -> GraphResult<()> {
        self.node_mut(id)?.style = style;
        if let Some(plottable) = self.plottables.get_mut(&id) {
            plottable.set_style(&style);
        }
        Ok(())
    }

    pub fn set_showing(&mut self, id: NodeId, showing: bool) -> GraphResult<()> {
        let node = self.node_mut(id)?;
        node.showing = showing;
        let visible = node.is_visible();
        if let Some(plottable) = self.plottables.get_mut(&id) {
            plottable.set_visible(visible);
        }
        Ok(())
    }

    pub(crate) fn plottable_mut(&mut self, id: NodeId) -> Option<&mut (dyn Plottable + 'static)> {
        self.plottables.get_mut(&id).map(|p| p.as_mut())
    }

    pub fn has_plottable(&self, id: NodeId) -> bool {
        self.plottables.contains_key(&id)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.len())
            .field("next_id", &self.next_id)
            .field("settings", &self.settings)
            .finish()
    }
}
