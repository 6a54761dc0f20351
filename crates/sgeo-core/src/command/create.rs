//! 创建节点命令
//!
//! 创建一维对象时，同时为它与每个已有一维对象（按创建顺序）的每个候选
//! 槽位创建一个隐藏的交点。第一次执行后ID和名称都记录在命令里，重做时
//! 原样复用。

use super::opcode::{Opcode, OpcodeWriter};
use super::style::{parse_style, write_style};
use crate::config::Settings;
use crate::error::{GraphResult, OpcodeError};
use crate::expression;
use crate::graph::Graph;
use crate::intersection::slot_count;
use crate::node::{Axis, Calculation, MeasureRule, Node, NodeId, NodeKind};
use crate::properties::Style;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct CreateNode {
    kind: NodeKind,
    id: Option<NodeId>,
    name: Option<String>,
    showing: bool,
    style: Option<Style>,
    intersection_ids: Vec<NodeId>,
    intersection_names: Vec<String>,
}

impl CreateNode {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            id: None,
            name: None,
            showing: true,
            style: None,
            intersection_ids: Vec::new(),
            intersection_names: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = Some(style);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.showing = false;
        self
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// 第一次执行后才有值
    pub fn id(&self) -> Option<NodeId> {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// 自动创建的交点
    pub fn intersections(&self) -> &[NodeId] {
        &self.intersection_ids
    }

    pub fn perform(&mut self, graph: &mut Graph) -> GraphResult<()> {
        if let NodeKind::Measurement { token, .. } = &mut self.kind {
            if token.is_empty() {
                *token = graph.next_token();
            }
        }
        let id = *self.id.get_or_insert_with(|| graph.allocate_id());
        if self.name.is_none() {
            self.name = Some(match self.kind.token() {
                Some(token) => token.to_string(),
                None => graph.next_name(self.kind.name_prefix()),
            });
        }
        let name = self.name.clone().unwrap_or_default();
        let style = *self
            .style
            .get_or_insert_with(|| default_style(graph.settings(), &self.kind));

        let mut pairs = Vec::new();
        if self.kind.is_one_dimensional() {
            for other in graph.one_dimensional() {
                let slots = slot_count(graph.node(other)?.kind.is_ellipse(), self.kind.is_ellipse());
                pairs.push((other, slots));
            }
        }

        let node = Node::new(id, name.clone(), self.kind.clone(), style).with_showing(self.showing);
        graph.insert(node)?;

        if let Err(err) = self.insert_intersections(graph, id, pairs) {
            if let Err(undo_err) = self.restore_state(graph) {
                warn!("rollback of {} failed: {}", name, undo_err);
            }
            return Err(err);
        }
        Ok(())
    }

    fn insert_intersections(
        &mut self,
        graph: &mut Graph,
        id: NodeId,
        pairs: Vec<(NodeId, usize)>,
    ) -> GraphResult<()> {
        let point_style = graph.settings().point_style;
        let mut k = 0;
        for (other, slots) in pairs {
            for index in 0..slots {
                let ix_id = match self.intersection_ids.get(k) {
                    Some(ix_id) => *ix_id,
                    None => {
                        let ix_id = graph.allocate_id();
                        self.intersection_ids.push(ix_id);
                        ix_id
                    }
                };
                let ix_name = match self.intersection_names.get(k) {
                    Some(ix_name) => ix_name.clone(),
                    None => {
                        let ix_name = graph.next_name("P");
                        self.intersection_names.push(ix_name.clone());
                        ix_name
                    }
                };
                let kind = NodeKind::Intersection {
                    first: other,
                    second: id,
                    index: index as u8,
                    user_created: false,
                };
                graph.insert(Node::new(ix_id, ix_name, kind, point_style).with_showing(false))?;
                k += 1;
            }
        }

        debug!(
            "created {} {} with {} intersection(s)",
            self.kind.type_name(),
            id,
            k
        );
        Ok(())
    }

    pub fn restore_state(&mut self, graph: &mut Graph) -> GraphResult<()> {
        for ix_id in self.intersection_ids.iter().rev() {
            if graph.contains(*ix_id) {
                graph.remove(*ix_id)?;
            }
        }
        if let Some(id) = self.id {
            graph.remove(id)?;
        }
        Ok(())
    }

    pub fn to_opcode(&self, graph: &Graph) -> String {
        let mut w = OpcodeWriter::new("Create")
            .text("kind", self.kind.type_name())
            .text("name", self.name.as_deref().unwrap_or_default());
        w = match &self.kind {
            NodeKind::FreePoint { position } => w.vector("pos", position),
            NodeKind::PointOnObject { object, position } => {
                w.node("on", graph, *object).vector("pos", position)
            }
            NodeKind::Intersection {
                first,
                second,
                index,
                user_created,
            } => w
                .nodes("of", graph, &[*first, *second])
                .number("index", f64::from(*index))
                .flag("user", *user_created),
            NodeKind::Antipode { source } => w.node("of", graph, *source),
            NodeKind::Line { first, second } => w.nodes("points", graph, &[*first, *second]),
            NodeKind::Segment {
                start,
                end,
                long_arc,
            } => w
                .nodes("points", graph, &[*start, *end])
                .flag("long", *long_arc),
            NodeKind::Circle { center, through } => w
                .node("center", graph, *center)
                .node("through", graph, *through),
            NodeKind::Ellipse {
                focus1,
                focus2,
                through,
            } => w
                .nodes("foci", graph, &[*focus1, *focus2])
                .node("through", graph, *through),
            NodeKind::Measurement { token, rule } => {
                let w = w
                    .text("token", token)
                    .text("rule", rule_name(rule))
                    .nodes("of", graph, &rule.operands());
                match rule {
                    MeasureRule::Coordinate { axis, .. } => w.text("axis", axis.name()),
                    MeasureRule::Calculation(calc) => w.text("expr", &calc.source),
                    _ => w,
                }
            }
            NodeKind::Label { target } => w.node("of", graph, *target),
        };
        if let Some(style) = &self.style {
            w = write_style(w, style);
        }
        if !self.showing {
            w = w.flag("hidden", true);
        }
        if !self.intersection_names.is_empty() {
            w = w.list("ix", &self.intersection_names);
        }
        w.finish()
    }

    pub fn parse(op: &Opcode, graph: &Graph) -> Result<Self, OpcodeError> {
        let kind_name = op.text("kind")?;
        let kind = match kind_name.as_str() {
            "Point" => NodeKind::FreePoint {
                position: op.vector("pos")?,
            },
            "PointOnObject" => NodeKind::PointOnObject {
                object: op.node("on", graph)?,
                position: op.vector("pos")?,
            },
            "IntersectionPoint" => {
                let (first, second) = op.node_pair("of", graph)?;
                NodeKind::Intersection {
                    first,
                    second,
                    index: op.index("index")?,
                    user_created: op.flag("user")?,
                }
            }
            "AntipodalPoint" => NodeKind::Antipode {
                source: op.node("of", graph)?,
            },
            "Line" => {
                let (first, second) = op.node_pair("points", graph)?;
                NodeKind::Line { first, second }
            }
            "Segment" => {
                let (start, end) = op.node_pair("points", graph)?;
                NodeKind::Segment {
                    start,
                    end,
                    long_arc: op.flag("long")?,
                }
            }
            "Circle" => NodeKind::Circle {
                center: op.node("center", graph)?,
                through: op.node("through", graph)?,
            },
            "Ellipse" => {
                let (focus1, focus2) = op.node_pair("foci", graph)?;
                NodeKind::Ellipse {
                    focus1,
                    focus2,
                    through: op.node("through", graph)?,
                }
            }
            "Measurement" | "Calculation" => NodeKind::Measurement {
                token: op.text("token")?,
                rule: parse_rule(op, graph)?,
            },
            "Label" => NodeKind::Label {
                target: op.node("of", graph)?,
            },
            other => return Err(OpcodeError::UnknownOpcode(format!("Create/{}", other))),
        };

        let mut create = CreateNode::new(kind).with_name(op.text("name")?);
        if op.has("stroke") {
            create.style = Some(parse_style(op)?);
        }
        create.showing = !op.flag("hidden")?;
        create.intersection_names = op.optional_list("ix")?;
        Ok(create)
    }
}

fn default_style(settings: &Settings, kind: &NodeKind) -> Style {
    match kind {
        NodeKind::Label { .. } | NodeKind::Measurement { .. } => settings.label_style,
        kind if kind.is_point() => settings.point_style,
        _ => settings.curve_style,
    }
}

fn rule_name(rule: &MeasureRule) -> &'static str {
    match rule {
        MeasureRule::SegmentLength { .. } => "SegmentLength",
        MeasureRule::Distance { .. } => "Distance",
        MeasureRule::Angle { .. } => "Angle",
        MeasureRule::LineAngle { .. } => "LineAngle",
        MeasureRule::CircleRadius { .. } => "CircleRadius",
        MeasureRule::Coordinate { .. } => "Coordinate",
        MeasureRule::Calculation(_) => "Calculation",
    }
}

fn parse_rule(op: &Opcode, graph: &Graph) -> Result<MeasureRule, OpcodeError> {
    let rule = op.text("rule")?;
    let bad = || OpcodeError::BadValue {
        key: "of".to_string(),
        value: op.optional_text("of").ok().flatten().unwrap_or_default(),
    };
    Ok(match rule.as_str() {
        "SegmentLength" => MeasureRule::SegmentLength {
            segment: op.node("of", graph)?,
        },
        "Distance" => {
            let (first, second) = op.node_pair("of", graph)?;
            MeasureRule::Distance { first, second }
        }
        "Angle" => match op.nodes("of", graph)?.as_slice() {
            [first, vertex, second] => MeasureRule::Angle {
                first: *first,
                vertex: *vertex,
                second: *second,
            },
            _ => return Err(bad()),
        },
        "LineAngle" => {
            let (first, second) = op.node_pair("of", graph)?;
            MeasureRule::LineAngle { first, second }
        }
        "CircleRadius" => MeasureRule::CircleRadius {
            circle: op.node("of", graph)?,
        },
        "Coordinate" => {
            let axis_name = op.text("axis")?;
            MeasureRule::Coordinate {
                point: op.node("of", graph)?,
                axis: Axis::from_name(&axis_name).ok_or(OpcodeError::BadValue {
                    key: "axis".to_string(),
                    value: axis_name.clone(),
                })?,
            }
        }
        "Calculation" => {
            let source = op.text("expr")?;
            MeasureRule::Calculation(Calculation {
                expr: expression::parse(&source)?,
                source,
                references: op.nodes("of", graph)?,
            })
        }
        other => {
            return Err(OpcodeError::BadValue {
                key: "rule".to_string(),
                value: other.to_string(),
            })
        }
    })
}
