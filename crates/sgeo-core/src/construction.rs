//! 构造上下文
//!
//! [`Construction`] 拥有一张依赖图和一对撤销/重做栈。交互层只通过这里的
//! 构建方法创建并执行命令；构建方法先做可恢复检查，检查失败时返回
//! [`Alert`]，图保持不变。

use crate::command::{
    set_stored_position, stored_position, Command, CommandGroup, CommandLog, CreateNode,
    DeleteNode, MoveNode, PromoteIntersection, RotateNodes, SetStyle, SetVisibility,
};
use crate::config::Settings;
use crate::error::{Alert, ConstructionError};
use crate::expression;
use crate::graph::Graph;
use crate::math::{normalize, Vector3};
use crate::node::{Calculation, MeasureRule, NodeId, NodeKind};
use crate::plottable::PlottableFactory;
use crate::properties::Style;
use crate::update::{UpdateMode, UpdateReport};
use tracing::{debug, warn};

pub type ConstructionResult<T> = Result<T, ConstructionError>;

#[derive(Debug)]
pub struct Construction {
    graph: Graph,
    log: CommandLog,
}

impl Default for Construction {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl Construction {
    pub fn new(settings: Settings) -> Self {
        Self {
            graph: Graph::new(settings),
            log: CommandLog::new(),
        }
    }

    pub fn with_factory(settings: Settings, factory: Box<dyn PlottableFactory>) -> Self {
        Self {
            graph: Graph::with_factory(settings, factory),
            log: CommandLog::new(),
        }
    }

    /// 由操作码脚本重建
    pub fn from_script<I, S>(settings: Settings, lines: I) -> ConstructionResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut construction = Self::new(settings);
        construction.replay(lines)?;
        Ok(construction)
    }

    /// 清空图和撤销/重做栈
    pub fn init(&mut self) {
        self.graph.clear();
        self.log.clear();
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn log(&self) -> &CommandLog {
        &self.log
    }

    pub fn settings(&self) -> &Settings {
        self.graph.settings()
    }

    /// 执行任意命令
    pub fn execute(&mut self, command: Command) -> ConstructionResult<UpdateReport> {
        Ok(self.log.execute(command, &mut self.graph)?)
    }

    pub fn undo(&mut self) -> ConstructionResult<bool> {
        Ok(self.log.undo(&mut self.graph)?)
    }

    pub fn redo(&mut self) -> ConstructionResult<bool> {
        Ok(self.log.redo(&mut self.graph)?)
    }

    /// 当前撤销栈的操作码脚本
    pub fn script(&self) -> Vec<String> {
        self.log.to_script(&self.graph)
    }

    /// 按顺序解析并执行操作码；空行和 `#` 开头的行被忽略
    pub fn replay<I, S>(&mut self, lines: I) -> ConstructionResult<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut count = 0;
        for line in lines {
            let line = line.as_ref().trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let command = Command::parse(line, &self.graph)?;
            self.log.execute(command, &mut self.graph)?;
            count += 1;
        }
        self.graph.update_all(UpdateMode::Full)?;
        debug!("replayed {} command(s)", count);
        Ok(count)
    }

    // ========== 查询 ==========

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.graph.find(name)
    }

    /// 两个对象之间的交点，按交点索引排序
    pub fn intersection_points(&self, a: NodeId, b: NodeId) -> Vec<NodeId> {
        let mut points: Vec<(u8, NodeId)> = self
            .graph
            .iter()
            .filter_map(|node| match node.kind {
                NodeKind::Intersection {
                    first,
                    second,
                    index,
                    ..
                } if (first == a && second == b) || (first == b && second == a) => {
                    Some((index, node.id))
                }
                _ => None,
            })
            .collect();
        points.sort();
        points.into_iter().map(|(_, id)| id).collect()
    }

    // ========== 构建方法 ==========

    fn alert(alert: Alert) -> ConstructionError {
        warn!("{}", alert);
        ConstructionError::Alert(alert)
    }

    fn create(&mut self, kind: NodeKind) -> ConstructionResult<NodeId> {
        let id = self.graph.allocate_id();
        self.execute(CreateNode::new(kind).with_id(id).into())?;
        Ok(id)
    }

    fn kind_of(&self, id: NodeId) -> ConstructionResult<&NodeKind> {
        Ok(&self.graph.node(id)?.kind)
    }

    fn require(&self, id: NodeId, ok: impl Fn(&NodeKind) -> bool, what: &str) -> ConstructionResult<()> {
        let node = self.graph.node(id)?;
        if ok(&node.kind) {
            Ok(())
        } else {
            Err(Self::alert(Alert::UnsupportedOperands(format!(
                "{} is not {}",
                node.name, what
            ))))
        }
    }

    fn require_points(&self, ids: &[NodeId]) -> ConstructionResult<()> {
        for id in ids {
            self.require(*id, NodeKind::is_point, "a point")?;
        }
        Ok(())
    }

    pub fn add_point(&mut self, position: Vector3) -> ConstructionResult<NodeId> {
        let position = normalize(&position, self.settings().tolerance)
            .ok_or_else(|| Self::alert(Alert::UnsupportedOperands("zero vector".to_string())))?;
        self.create(NodeKind::FreePoint { position })
    }

    pub fn add_point_on(&mut self, object: NodeId, position: Vector3) -> ConstructionResult<NodeId> {
        self.require(object, NodeKind::is_one_dimensional, "a curve")?;
        self.create(NodeKind::PointOnObject { object, position })
    }

    /// 显示某点的对径点；已隐藏存在时改为显示
    pub fn add_antipode(&mut self, point: NodeId) -> ConstructionResult<NodeId> {
        self.require_points(&[point])?;
        if let Some(existing) = self.graph.antipode_of(point) {
            let node = self.graph.node(existing)?;
            if node.showing {
                let name = self.graph.node(point)?.name.clone();
                return Err(Self::alert(Alert::AntipodeExists(name)));
            }
            self.execute(SetVisibility::new(existing, true).into())?;
            return Ok(existing);
        }
        self.create(NodeKind::Antipode { source: point })
    }

    pub fn add_line(&mut self, first: NodeId, second: NodeId) -> ConstructionResult<NodeId> {
        self.require_points(&[first, second])?;
        self.create(NodeKind::Line { first, second })
    }

    pub fn add_segment(
        &mut self,
        start: NodeId,
        end: NodeId,
        long_arc: bool,
    ) -> ConstructionResult<NodeId> {
        self.require_points(&[start, end])?;
        self.create(NodeKind::Segment {
            start,
            end,
            long_arc,
        })
    }

    pub fn add_circle(&mut self, center: NodeId, through: NodeId) -> ConstructionResult<NodeId> {
        self.require_points(&[center, through])?;
        self.create(NodeKind::Circle { center, through })
    }

    pub fn add_ellipse(
        &mut self,
        focus1: NodeId,
        focus2: NodeId,
        through: NodeId,
    ) -> ConstructionResult<NodeId> {
        self.require_points(&[focus1, focus2, through])?;
        self.create(NodeKind::Ellipse {
            focus1,
            focus2,
            through,
        })
    }

    fn check_duplicate(&self, rule: &MeasureRule) -> ConstructionResult<()> {
        let existing = self.graph.iter().find_map(|node| match &node.kind {
            NodeKind::Measurement { token, rule: other } if other.same_quantity(rule) => {
                Some(token.clone())
            }
            _ => None,
        });
        match existing {
            Some(token) => Err(Self::alert(Alert::DuplicateMeasurement(token))),
            None => Ok(()),
        }
    }

    /// 新建度量
    pub fn measure(&mut self, rule: MeasureRule) -> ConstructionResult<NodeId> {
        let is_segment = |k: &NodeKind| matches!(k, NodeKind::Segment { .. });
        let is_straight = |k: &NodeKind| matches!(k, NodeKind::Line { .. } | NodeKind::Segment { .. });
        let is_circle = |k: &NodeKind| matches!(k, NodeKind::Circle { .. });
        match &rule {
            MeasureRule::SegmentLength { segment } => self.require(*segment, is_segment, "a segment")?,
            MeasureRule::Distance { first, second } => self.require_points(&[*first, *second])?,
            MeasureRule::Angle {
                first,
                vertex,
                second,
            } => self.require_points(&[*first, *vertex, *second])?,
            MeasureRule::LineAngle { first, second } => {
                self.require(*first, is_straight, "a line")?;
                self.require(*second, is_straight, "a line")?;
            }
            MeasureRule::CircleRadius { circle } => self.require(*circle, is_circle, "a circle")?,
            MeasureRule::Coordinate { point, .. } => self.require_points(&[*point])?,
            MeasureRule::Calculation(calc) => return self.add_calculation(&calc.source),
        }
        self.check_duplicate(&rule)?;
        self.create(NodeKind::Measurement {
            token: String::new(),
            rule,
        })
    }

    /// 新建计算，变量是已有度量的标记
    pub fn add_calculation(&mut self, source: &str) -> ConstructionResult<NodeId> {
        let expr = expression::parse(source).map_err(|err| Self::alert(Alert::Expression(err)))?;
        let mut references = Vec::new();
        for variable in expr.variables() {
            let id = self
                .graph
                .find_token(&variable)
                .ok_or_else(|| Self::alert(Alert::UndefinedVariable(variable.clone())))?;
            references.push(id);
        }
        let rule = MeasureRule::Calculation(Calculation {
            source: source.trim().to_string(),
            expr,
            references,
        });
        self.check_duplicate(&rule)?;
        self.create(NodeKind::Measurement {
            token: String::new(),
            rule,
        })
    }

    pub fn add_label(&mut self, target: NodeId) -> ConstructionResult<NodeId> {
        self.graph.node(target)?;
        self.create(NodeKind::Label { target })
    }

    /// 删除节点；有后代时作为一个命令组，最深的后代先删
    pub fn delete(&mut self, id: NodeId) -> ConstructionResult<()> {
        let name = self.graph.node(id)?.name.clone();
        let descendants = self.graph.descendants_deepest_first(id);
        let command: Command = if descendants.is_empty() {
            DeleteNode::new(id).into()
        } else {
            let mut commands: Vec<Command> = descendants
                .into_iter()
                .map(|d| DeleteNode::new(d).into())
                .collect();
            commands.push(DeleteNode::new(id).into());
            CommandGroup::new(format!("Delete {}", name), commands).into()
        };
        self.execute(command)?;
        Ok(())
    }

    fn require_free(&self, id: NodeId) -> ConstructionResult<()> {
        self.require(id, NodeKind::is_free, "movable")
    }

    pub fn move_point(&mut self, id: NodeId, to: Vector3) -> ConstructionResult<()> {
        self.require_free(id)?;
        self.execute(MoveNode::new(id, to).into())?;
        Ok(())
    }

    /// 拖动中的预览：不进入撤销栈，只做显示更新
    pub fn drag(&mut self, id: NodeId, to: Vector3) -> ConstructionResult<UpdateReport> {
        self.require_free(id)?;
        set_stored_position(&mut self.graph, id, to)?;
        Ok(self.graph.update(id, UpdateMode::Display)?)
    }

    /// 拖动结束：以拖动前的位置为起点提交一个移动命令
    pub fn finish_drag(&mut self, id: NodeId, from: Vector3, to: Vector3) -> ConstructionResult<()> {
        self.require_free(id)?;
        self.execute(MoveNode::from_to(id, from, to).into())?;
        Ok(())
    }

    /// 绕轴旋转所有自由点
    pub fn rotate(&mut self, axis: Vector3, angle: f64) -> ConstructionResult<()> {
        if normalize(&axis, self.settings().tolerance).is_none() {
            return Err(Self::alert(Alert::UnsupportedOperands(
                "zero rotation axis".to_string(),
            )));
        }
        let ids: Vec<NodeId> = self
            .graph
            .iter()
            .filter(|node| node.kind.is_free())
            .map(|node| node.id)
            .collect();
        self.execute(RotateNodes::new(axis, angle, ids).into())?;
        Ok(())
    }

    pub fn set_style(&mut self, id: NodeId, style: Style) -> ConstructionResult<()> {
        self.graph.node(id)?;
        self.execute(SetStyle::new(id, style).into())?;
        Ok(())
    }

    pub fn set_visibility(&mut self, id: NodeId, showing: bool) -> ConstructionResult<()> {
        self.graph.node(id)?;
        self.execute(SetVisibility::new(id, showing).into())?;
        Ok(())
    }

    /// 把自动交点提升为用户交点
    pub fn promote(&mut self, id: NodeId) -> ConstructionResult<()> {
        match self.kind_of(id)? {
            NodeKind::Intersection { .. } => {}
            _ => {
                let name = self.graph.node(id)?.name.clone();
                return Err(Self::alert(Alert::UnsupportedOperands(format!(
                    "{} is not an intersection",
                    name
                ))));
            }
        }
        self.execute(PromoteIntersection::new(id).into())?;
        Ok(())
    }

    /// 自由点当前保存的位置
    pub fn stored_position(&self, id: NodeId) -> ConstructionResult<Option<Vector3>> {
        Ok(stored_position(&self.graph, id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Alert;
    use crate::expression::ExprError;
    use crate::geometry::Geometry;
    use crate::node::Axis;
    use crate::properties::Color;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    type Snapshot = Vec<(NodeId, String, NodeKind, Geometry, bool, bool, Style)>;

    fn snapshot(c: &Construction) -> Snapshot {
        c.graph()
            .iter()
            .map(|n| {
                (
                    n.id,
                    n.name.clone(),
                    n.kind.clone(),
                    n.geometry.clone(),
                    n.exists,
                    n.showing,
                    n.style,
                )
            })
            .collect()
    }

    fn by_name(c: &Construction) -> Vec<(String, &'static str, Geometry, bool, bool, Style)> {
        let mut rows: Vec<_> = c
            .graph()
            .iter()
            .map(|n| {
                (
                    n.name.clone(),
                    n.kind.type_name(),
                    n.geometry.clone(),
                    n.exists,
                    n.showing,
                    n.style,
                )
            })
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows
    }

    fn value(c: &Construction, id: NodeId) -> f64 {
        c.graph().node(id).unwrap().value().unwrap()
    }

    fn position(c: &Construction, id: NodeId) -> Vector3 {
        c.graph().node(id).unwrap().position().unwrap()
    }

    /// P1 = x, P2 = y, P3 = z, L1 = P1P2, L2 = P1P3
    fn two_lines() -> (Construction, [NodeId; 5]) {
        let mut c = Construction::default();
        let p1 = c.add_point(Vector3::x()).unwrap();
        let p2 = c.add_point(Vector3::y()).unwrap();
        let p3 = c.add_point(Vector3::z()).unwrap();
        let l1 = c.add_line(p1, p2).unwrap();
        let l2 = c.add_line(p1, p3).unwrap();
        (c, [p1, p2, p3, l1, l2])
    }

    #[test]
    fn test_line_creation_adds_hidden_intersections() {
        let (c, [_, _, _, l1, l2]) = two_lines();
        let points = c.intersection_points(l1, l2);
        assert_eq!(points.len(), 2);

        let mut xs = Vec::new();
        for id in &points {
            let node = c.graph().node(*id).unwrap();
            assert!(!node.showing);
            assert!(node.exists);
            match node.kind {
                NodeKind::Intersection {
                    first,
                    second,
                    user_created,
                    ..
                } => {
                    assert_eq!((first, second), (l1, l2));
                    assert!(!user_created);
                }
                _ => panic!("not an intersection"),
            }
            let p = node.position().unwrap();
            assert!(p.y.abs() < 1e-12 && p.z.abs() < 1e-12);
            xs.push(p.x.signum());
        }
        xs.sort_by(f64::total_cmp);
        assert_eq!(xs, vec![-1.0, 1.0]);
        assert_eq!(c.graph().node(points[0]).unwrap().name, "P4");
    }

    #[test]
    fn test_ellipse_pairs_use_four_slots() {
        let mut c = Construction::default();
        let a = c.add_point(Vector3::z()).unwrap();
        let b = c.add_point(Vector3::x()).unwrap();
        let line = c.add_line(a, b).unwrap();

        let f1 = c.add_point(Vector3::new(0.3_f64.sin(), 0.0, 0.3_f64.cos())).unwrap();
        let f2 = c.add_point(Vector3::new(-(0.3_f64.sin()), 0.0, 0.3_f64.cos())).unwrap();
        let through = c.add_point(Vector3::new(0.0, 0.5, 1.0)).unwrap();
        let ellipse = c.add_ellipse(f1, f2, through).unwrap();
        assert!(c.graph().node(ellipse).unwrap().exists);

        let points = c.intersection_points(line, ellipse);
        assert_eq!(points.len(), 4);
        let existing = points
            .iter()
            .filter(|id| c.graph().node(**id).unwrap().exists)
            .count();
        assert_eq!(existing, 2);
    }

    #[test]
    fn test_promote_creates_hidden_antipode() {
        let (mut c, [_, _, _, l1, l2]) = two_lines();
        let ix = c.intersection_points(l1, l2)[0];
        let before = snapshot(&c);

        c.promote(ix).unwrap();
        let node = c.graph().node(ix).unwrap();
        assert!(node.showing);
        assert!(matches!(
            node.kind,
            NodeKind::Intersection {
                user_created: true,
                ..
            }
        ));
        let antipode = c.graph().antipode_of(ix).unwrap();
        assert!(!c.graph().node(antipode).unwrap().showing);
        assert!((position(&c, antipode) + position(&c, ix)).norm() < 1e-12);

        // 隐藏的对径点可以再被显示
        assert_eq!(c.add_antipode(ix).unwrap(), antipode);
        assert!(c.graph().node(antipode).unwrap().showing);

        c.undo().unwrap();
        c.undo().unwrap();
        assert_eq!(snapshot(&c), before);
    }

    #[test]
    fn test_antipode_alert_leaves_graph_unchanged() {
        let (mut c, [p1, ..]) = two_lines();
        let antipode = c.add_antipode(p1).unwrap();
        assert!((position(&c, antipode) + Vector3::x()).norm() < 1e-12);

        let before = snapshot(&c);
        let err = c.add_antipode(p1).unwrap_err();
        assert_eq!(
            err,
            ConstructionError::Alert(Alert::AntipodeExists("P1".to_string()))
        );
        assert_eq!(snapshot(&c), before);
    }

    #[test]
    fn test_duplicate_measurement_alert() {
        let (mut c, [p1, p2, ..]) = two_lines();
        let m1 = c
            .measure(MeasureRule::Distance {
                first: p1,
                second: p2,
            })
            .unwrap();
        assert_eq!(c.graph().node(m1).unwrap().name, "M1");
        assert!((value(&c, m1) - FRAC_PI_2).abs() < 1e-12);

        let before = snapshot(&c);
        let err = c
            .measure(MeasureRule::Distance {
                first: p2,
                second: p1,
            })
            .unwrap_err();
        assert_eq!(
            err,
            ConstructionError::Alert(Alert::DuplicateMeasurement("M1".to_string()))
        );
        assert_eq!(snapshot(&c), before);
    }

    #[test]
    fn test_measurement_operand_kinds_are_checked() {
        let (mut c, [p1, _, _, l1, _]) = two_lines();
        let err = c.measure(MeasureRule::CircleRadius { circle: l1 }).unwrap_err();
        assert!(matches!(
            err,
            ConstructionError::Alert(Alert::UnsupportedOperands(_))
        ));
        assert!(c.add_line(p1, l1).is_err());
    }

    #[test]
    fn test_calculation_follows_measurements() {
        let (mut c, [p1, p2, ..]) = two_lines();
        let m1 = c
            .measure(MeasureRule::Distance {
                first: p1,
                second: p2,
            })
            .unwrap();
        let calc = c.add_calculation("M1 * 2").unwrap();
        assert_eq!(c.graph().node(calc).unwrap().name, "M2");
        assert!((value(&c, calc) - PI).abs() < 1e-12);

        c.move_point(p2, Vector3::new(1.0, 1.0, 0.0).normalize())
            .unwrap();
        assert!((value(&c, m1) - FRAC_PI_4).abs() < 1e-12);
        assert!((value(&c, calc) - FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_calculation_alerts() {
        let (mut c, _) = two_lines();
        let before = snapshot(&c);
        assert_eq!(
            c.add_calculation("M9 + 1").unwrap_err(),
            ConstructionError::Alert(Alert::UndefinedVariable("M9".to_string()))
        );
        assert!(matches!(
            c.add_calculation("20 * cos pi").unwrap_err(),
            ConstructionError::Alert(Alert::Expression(
                ExprError::MissingFunctionParenthesis { .. }
            ))
        ));
        assert_eq!(snapshot(&c), before);
    }

    #[test]
    fn test_calculation_sentinel_marks_missing() {
        let (mut c, [p1, ..]) = two_lines();
        let m1 = c
            .measure(MeasureRule::Coordinate {
                point: p1,
                axis: Axis::Y,
            })
            .unwrap();
        assert_eq!(value(&c, m1), 0.0);
        let calc = c.add_calculation("ln(M1)").unwrap();
        let node = c.graph().node(calc).unwrap();
        assert_eq!(node.geometry, Geometry::Value(None));
        assert!(!node.exists);
    }

    #[test]
    fn test_cascade_delete_is_one_undoable_group() {
        let (mut c, [p1, p2, p3, ..]) = two_lines();
        let m1 = c
            .measure(MeasureRule::Distance {
                first: p1,
                second: p2,
            })
            .unwrap();
        c.add_label(m1).unwrap();
        let before = snapshot(&c);

        c.delete(p1).unwrap();
        assert_eq!(c.graph().ids(), vec![p2, p3]);
        assert!(matches!(c.log().last(), Some(Command::Group(_))));

        c.undo().unwrap();
        assert_eq!(snapshot(&c), before);
        c.redo().unwrap();
        assert_eq!(c.graph().ids(), vec![p2, p3]);
    }

    #[test]
    fn test_every_command_undoes_exactly() {
        let (mut c, [p1, p2, p3, l1, l2]) = two_lines();
        let ix = c.intersection_points(l1, l2)[0];
        let seg = c.add_segment(p2, p3, false).unwrap();
        let on = c.add_point_on(seg, Vector3::new(0.0, 1.0, 1.0)).unwrap();

        let actions: Vec<Box<dyn Fn(&mut Construction)>> = vec![
            Box::new(move |c: &mut Construction| {
                c.add_circle(p3, p2).unwrap();
            }),
            Box::new(move |c: &mut Construction| c.delete(p2).unwrap()),
            Box::new(move |c: &mut Construction| c.move_point(p3, Vector3::new(0.0, -1.0, 1.0)).unwrap()),
            Box::new(move |c: &mut Construction| c.move_point(on, Vector3::y()).unwrap()),
            Box::new(|c: &mut Construction| c.rotate(Vector3::new(1.0, 2.0, 3.0), 0.7).unwrap()),
            Box::new(move |c: &mut Construction| {
                c.set_style(l1, Style::default().with_stroke(Color::RED).with_dashed(true))
                    .unwrap()
            }),
            Box::new(move |c: &mut Construction| c.set_visibility(p1, false).unwrap()),
            Box::new(move |c: &mut Construction| c.promote(ix).unwrap()),
        ];

        for action in actions {
            let before = snapshot(&c);
            action(&mut c);
            assert_ne!(snapshot(&c), before);
            assert!(c.undo().unwrap());
            assert_eq!(snapshot(&c), before);
        }
    }

    #[test]
    fn test_script_round_trip() {
        let mut c = Construction::default();
        let p1 = c.add_point(Vector3::new(1.0, 0.2, 0.1)).unwrap();
        let p2 = c.add_point(Vector3::new(0.1, 1.0, 0.3)).unwrap();
        let p3 = c.add_point(Vector3::new(0.2, 0.1, 1.0)).unwrap();
        let line = c.add_line(p1, p2).unwrap();
        let seg = c.add_segment(p2, p3, true).unwrap();
        let circle = c.add_circle(p3, p1).unwrap();
        let ellipse = {
            let f1 = c.add_point(Vector3::new(0.3, 0.0, 1.0)).unwrap();
            let f2 = c.add_point(Vector3::new(-0.3, 0.0, 1.0)).unwrap();
            let t = c.add_point(Vector3::new(0.0, 0.6, 1.0)).unwrap();
            c.add_ellipse(f1, f2, t).unwrap()
        };
        let on = c.add_point_on(circle, Vector3::new(0.0, 1.0, 0.0)).unwrap();
        c.add_antipode(on).unwrap();
        let m1 = c
            .measure(MeasureRule::Distance {
                first: p1,
                second: p2,
            })
            .unwrap();
        c.measure(MeasureRule::Angle {
            first: p1,
            vertex: p2,
            second: p3,
        })
        .unwrap();
        c.measure(MeasureRule::SegmentLength { segment: seg }).unwrap();
        c.measure(MeasureRule::CircleRadius { circle }).unwrap();
        c.measure(MeasureRule::LineAngle {
            first: line,
            second: seg,
        })
        .unwrap();
        c.measure(MeasureRule::Coordinate {
            point: on,
            axis: Axis::Z,
        })
        .unwrap();
        c.add_calculation("max(M1, M2) / 2 + M3").unwrap();
        c.add_label(m1).unwrap();
        c.move_point(p1, Vector3::new(1.0, -0.2, 0.3)).unwrap();
        c.rotate(Vector3::z(), 0.25).unwrap();
        c.set_style(
            ellipse,
            Style::default()
                .with_fill(Some(Color::rgba(10, 20, 30, 40)))
                .with_stroke_width(1.5),
        )
        .unwrap();
        c.set_visibility(p3, false).unwrap();
        let ix = c.intersection_points(line, circle)[1];
        c.promote(ix).unwrap();
        c.delete(seg).unwrap();

        let script = c.script();
        let replayed = Construction::from_script(Settings::default(), &script).unwrap();
        assert_eq!(by_name(&replayed), by_name(&c));
        assert_eq!(replayed.script(), script);
    }

    #[test]
    fn test_replay_rejects_unknown_names() {
        let mut c = Construction::default();
        let err = c.replay(["Delete&name=P9"]).unwrap_err();
        assert!(matches!(
            err,
            ConstructionError::Command(crate::error::CommandError::Opcode(
                crate::error::OpcodeError::UnknownName(_)
            ))
        ));
    }

    #[test]
    fn test_drag_then_commit() {
        let (mut c, [p1, p2, ..]) = two_lines();
        let m1 = c
            .measure(MeasureRule::Distance {
                first: p1,
                second: p2,
            })
            .unwrap();
        let from = c.stored_position(p2).unwrap().unwrap();
        let to = Vector3::new(1.0, 1.0, 0.0).normalize();

        let report = c.drag(p2, to).unwrap();
        assert!(report.contains(p2));
        assert!(!report.contains(m1));
        assert!(c.graph().node(m1).unwrap().is_stale());

        c.finish_drag(p2, from, to).unwrap();
        assert!((value(&c, m1) - FRAC_PI_4).abs() < 1e-12);
        c.undo().unwrap();
        assert_eq!(position(&c, p2), from);
        assert!((value(&c, m1) - FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_init_resets() {
        let (mut c, _) = two_lines();
        c.init();
        assert!(c.graph().is_empty());
        assert!(!c.undo().unwrap());
        let p = c.add_point(Vector3::x()).unwrap();
        assert_eq!(c.graph().node(p).unwrap().name, "P1");
    }

    #[test]
    fn test_partial_update_refreshes_measurements_left_by_drag() {
        let (mut c, [p1, p2, p3, ..]) = two_lines();
        let m1 = c
            .measure(MeasureRule::Distance {
                first: p1,
                second: p2,
            })
            .unwrap();
        c.measure(MeasureRule::Distance {
            first: p3,
            second: p2,
        })
        .unwrap();
        let calc = c.add_calculation("M1 + M2").unwrap();

        c.drag(p1, Vector3::new(1.0, 1.0, 0.0).normalize()).unwrap();
        assert!(c.graph().node(m1).unwrap().is_stale());

        c.graph.mark_kids_out_of_date(p3);
        c.graph.update(p3, UpdateMode::Full).unwrap();
        assert!(c.graph().iter().all(|n| !n.is_stale()));
        assert!((value(&c, m1) - FRAC_PI_4).abs() < 1e-12);
        assert!((value(&c, calc) - (FRAC_PI_4 + FRAC_PI_2)).abs() < 1e-12);
    }

    #[test]
    fn test_created_style_survives_replay() {
        let mut c = Construction::default();
        let red = Style::default()
            .with_stroke(Color::RED)
            .with_stroke_width(2.5)
            .with_dashed(true);
        c.execute(
            CreateNode::new(NodeKind::FreePoint {
                position: Vector3::x(),
            })
            .with_style(red)
            .into(),
        )
        .unwrap();
        c.add_point(Vector3::y()).unwrap();
        let default_point = c.settings().point_style;

        let mut other = Settings::default();
        other.point_style = Style::default().with_stroke_width(4.0);
        let replayed = Construction::from_script(other, c.script()).unwrap();
        let style_of = |name: &str| {
            let id = replayed.find(name).unwrap();
            replayed.graph().node(id).unwrap().style
        };
        assert_eq!(style_of("P1"), red);
        assert_eq!(style_of("P2"), default_point);
    }

    #[test]
    fn test_line_break_in_calculation_survives_script() {
        let (mut c, [p1, p2, ..]) = two_lines();
        c.measure(MeasureRule::Distance {
            first: p1,
            second: p2,
        })
        .unwrap();
        let calc = c.add_calculation("M1 +\n2").unwrap();
        let name = c.graph().node(calc).unwrap().name.clone();

        let script = c.script();
        assert!(script.iter().all(|line| !line.contains('\n')));
        let text = script.join("\n");
        let replayed = Construction::from_script(Settings::default(), text.lines()).unwrap();
        let id = replayed.find(&name).unwrap();
        assert!((value(&replayed, id) - (FRAC_PI_2 + 2.0)).abs() < 1e-12);
    }
}

