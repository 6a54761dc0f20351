//! 更新引擎
//!
//! 从某个节点出发，按拓扑序重算所有可达的过期节点，每个节点只重算一次：
//! 节点在它所有过期父节点重算之后才会被访问。重算同时刷新 `exists`，
//! 并把新状态推送给显示句柄。

use crate::error::{GraphError, GraphResult};
use crate::geometry::{Geometry, SegmentArc, SphereCircle, SphereEllipse};
use crate::graph::Graph;
use crate::intersection::intersect;
use crate::math::{angle_between, normalize, tangent_toward, Vector3};
use crate::node::{MeasureRule, NodeId, NodeKind};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::f64::consts::{FRAC_PI_2, PI};
use tracing::trace;

/// 更新模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// 只刷新位置和可见性（拖动时使用），度量和标签保持过期
    Display,
    /// 同时刷新度量值和标签文本
    Full,
}

/// 一次更新重算过的节点，按重算顺序
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    pub recomputed: Vec<NodeId>,
}

impl UpdateReport {
    pub fn len(&self) -> usize {
        self.recomputed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recomputed.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.recomputed.contains(&id)
    }
}

/// 父节点的快照
struct ParentState {
    exists: bool,
    geometry: Geometry,
    token: Option<String>,
    name: String,
}

impl Graph {
    /// 从 `root` 出发更新
    ///
    /// 待重算集合包括从 `root` 可达的过期节点，以及这些节点的过期祖先，
    /// 子节点不会先于仍过期的父节点被重算。
    pub fn update(&mut self, root: NodeId, mode: UpdateMode) -> GraphResult<UpdateReport> {
        self.node(root)?;
        let mut reachable = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let node = self.node(id)?;
            if node.stale {
                reachable.push(id);
            }
            stack.extend(node.children.iter().copied());
        }

        let mut pending: HashSet<NodeId> = reachable.iter().copied().collect();
        let mut stack = reachable.clone();
        while let Some(id) = stack.pop() {
            for parent in &self.node(id)?.parents {
                if self.node(*parent)?.stale && pending.insert(*parent) {
                    reachable.push(*parent);
                    stack.push(*parent);
                }
            }
        }
        self.recompute_set(reachable, mode)
    }

    /// 更新所有过期节点
    pub fn update_all(&mut self, mode: UpdateMode) -> GraphResult<UpdateReport> {
        let stale = self
            .iter()
            .filter(|node| node.stale)
            .map(|node| node.id)
            .collect();
        self.recompute_set(stale, mode)
    }

    fn recompute_set(&mut self, ids: Vec<NodeId>, mode: UpdateMode) -> GraphResult<UpdateReport> {
        let pending: HashSet<NodeId> = ids
            .into_iter()
            .filter(|id| {
                mode == UpdateMode::Full
                    || self.get(*id).map_or(false, |node| {
                        !matches!(
                            node.kind,
                            NodeKind::Measurement { .. } | NodeKind::Label { .. }
                        )
                    })
            })
            .collect();

        // 入度 = 仍待重算的父节点数
        let mut in_degree: HashMap<NodeId, usize> = HashMap::new();
        for id in &pending {
            let node = self.node(*id)?;
            let count = node.parents.iter().filter(|p| pending.contains(p)).count();
            in_degree.insert(*id, count);
        }

        let mut ready: BTreeSet<NodeId> = in_degree
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut report = UpdateReport::default();

        while let Some(id) = ready.pop_first() {
            self.recompute(id)?;
            report.recomputed.push(id);
            for child in self.node(id)?.children.clone() {
                if let Some(count) = in_degree.get_mut(&child) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(child);
                    }
                }
            }
        }

        let stuck = pending
            .iter()
            .copied()
            .filter(|id| !report.contains(*id))
            .min();
        if let Some(stuck) = stuck {
            let parent = self
                .node(stuck)?
                .parents
                .iter()
                .copied()
                .find(|p| pending.contains(p))
                .unwrap_or(stuck);
            return Err(GraphError::Cycle {
                parent,
                child: stuck,
            });
        }
        Ok(report)
    }

    /// 重算单个节点
    fn recompute(&mut self, id: NodeId) -> GraphResult<()> {
        let node = self.node(id)?;
        let kind = node.kind.clone();
        let mut parents = HashMap::new();
        for parent in kind.dependencies() {
            let p = self.node(parent)?;
            parents.insert(
                parent,
                ParentState {
                    exists: p.exists,
                    geometry: p.geometry.clone(),
                    token: p.kind.token().map(str::to_string),
                    name: p.name.clone(),
                },
            );
        }
        let parents_exist = parents.values().all(|p| p.exists);

        let settings = self.settings();
        let tolerance = settings.tolerance;
        let precision = settings.label_precision;
        let (geometry, valid) = match &kind {
            NodeKind::FreePoint { position } => {
                let p = normalize(position, tolerance).unwrap_or(*position);
                (Geometry::Point(p), true)
            }
            NodeKind::PointOnObject { object, position } => {
                match parents[object].geometry.as_curve() {
                    Some(curve) => (
                        Geometry::Point(curve.closest_point(position, tolerance)),
                        true,
                    ),
                    None => (Geometry::Point(*position), false),
                }
            }
            NodeKind::Intersection {
                first,
                second,
                index,
                ..
            } => {
                let curves = (
                    parents[first].geometry.as_curve(),
                    parents[second].geometry.as_curve(),
                );
                match curves {
                    (Some(c1), Some(c2)) => {
                        let candidates = intersect(&c1, &c2, settings);
                        match candidates.get(*index as usize) {
                            Some(c) => (Geometry::Point(c.position), c.exists),
                            None => (Geometry::Point(Vector3::zeros()), false),
                        }
                    }
                    _ => (Geometry::Point(Vector3::zeros()), false),
                }
            }
            NodeKind::Antipode { source } => match parents[source].geometry.as_point() {
                Some(p) => (Geometry::Point(-p), true),
                None => (Geometry::None, false),
            },
            NodeKind::Line { first, second } => {
                let normal = point_pair(&parents, *first, *second)
                    .and_then(|(a, b)| normalize(&a.cross(&b), tolerance));
                match normal {
                    Some(normal) => (Geometry::Line { normal }, true),
                    None => (Geometry::None, false),
                }
            }
            NodeKind::Segment {
                start,
                end,
                long_arc,
            } => {
                let arc = point_pair(&parents, *start, *end)
                    .and_then(|(a, b)| SegmentArc::from_endpoints(a, b, *long_arc, tolerance));
                match arc {
                    Some(arc) => (Geometry::Segment(arc), true),
                    None => (Geometry::None, false),
                }
            }
            NodeKind::Circle { center, through } => match point_pair(&parents, *center, *through)
            {
                Some((c, p)) => {
                    let circle = SphereCircle::through(c, &p);
                    let valid = circle.radius > tolerance && circle.radius < PI - tolerance;
                    (Geometry::Circle(circle), valid)
                }
                None => (Geometry::None, false),
            },
            NodeKind::Ellipse {
                focus1,
                focus2,
                through,
            } => {
                let ellipse = point_pair(&parents, *focus1, *focus2).and_then(|(f1, f2)| {
                    let p = parents[through].geometry.as_point()?;
                    SphereEllipse::through(f1, f2, &p, tolerance)
                });
                match ellipse {
                    Some(ellipse) => (Geometry::Ellipse(ellipse), true),
                    None => (Geometry::None, false),
                }
            }
            NodeKind::Measurement { rule, .. } => {
                let value = measure(rule, &parents, tolerance);
                let valid = match rule {
                    MeasureRule::Calculation(_) => value.is_some(),
                    _ => true,
                };
                (Geometry::Value(value), valid)
            }
            NodeKind::Label { target } => {
                let target_state = &parents[target];
                let text = match (&target_state.token, &target_state.geometry) {
                    (Some(token), Geometry::Value(Some(value))) => {
                        format!("{} = {:.*}", token, precision, value)
                    }
                    (Some(token), _) => format!("{} = undefined", token),
                    (None, _) => target_state.name.clone(),
                };
                (Geometry::Text(text), true)
            }
        };

        let exists = parents_exist && valid;
        trace!(
            "recompute {} {} exists={}",
            id,
            geometry.type_name(),
            exists
        );

        let node = self.node_mut(id)?;
        node.geometry = geometry;
        node.exists = exists;
        node.stale = false;
        let visible = node.is_visible();
        let geometry = node.geometry.clone();

        if let Some(plottable) = self.plottable_mut(id) {
            plottable.set_geometry(&geometry);
            if let Geometry::Text(text) = &geometry {
                plottable.set_text(text);
            }
            plottable.set_visible(visible);
        }
        Ok(())
    }
}

fn point_pair(
    parents: &HashMap<NodeId, ParentState>,
    a: NodeId,
    b: NodeId,
) -> Option<(Vector3, Vector3)> {
    Some((
        parents.get(&a)?.geometry.as_point()?,
        parents.get(&b)?.geometry.as_point()?,
    ))
}

fn measure(
    rule: &MeasureRule,
    parents: &HashMap<NodeId, ParentState>,
    tolerance: f64,
) -> Option<f64> {
    let geometry = |id: &NodeId| parents.get(id).map(|p| &p.geometry);
    match rule {
        MeasureRule::SegmentLength { segment } => match geometry(segment)? {
            Geometry::Segment(arc) => Some(arc.arc_length),
            _ => None,
        },
        MeasureRule::Distance { first, second } => {
            let (a, b) = point_pair(parents, *first, *second)?;
            Some(angle_between(&a, &b))
        }
        MeasureRule::Angle {
            first,
            vertex,
            second,
        } => {
            let (a, v) = point_pair(parents, *first, *vertex)?;
            let b = geometry(second)?.as_point()?;
            let t1 = tangent_toward(&v, &a, tolerance)?;
            let t2 = tangent_toward(&v, &b, tolerance)?;
            Some(angle_between(&t1, &t2))
        }
        MeasureRule::LineAngle { first, second } => {
            let normal = |id: &NodeId| match geometry(id)? {
                Geometry::Line { normal } => Some(*normal),
                Geometry::Segment(arc) => Some(arc.normal),
                _ => None,
            };
            let angle = angle_between(&normal(first)?, &normal(second)?);
            Some(if angle > FRAC_PI_2 { PI - angle } else { angle })
        }
        MeasureRule::CircleRadius { circle } => match geometry(circle)? {
            Geometry::Circle(c) => Some(c.radius),
            _ => None,
        },
        MeasureRule::Coordinate { point, axis } => {
            Some(axis.component(&geometry(point)?.as_point()?))
        }
        MeasureRule::Calculation(calc) => {
            let mut variables = HashMap::new();
            for reference in &calc.references {
                let state = parents.get(reference)?;
                let token = state.token.clone()?;
                variables.insert(token, state.geometry.as_value()?);
            }
            calc.expr.evaluate(&variables).ok().flatten()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use crate::properties::Style;

    fn add(graph: &mut Graph, name: &str, kind: NodeKind) -> NodeId {
        let id = graph.allocate_id();
        graph.insert(Node::new(id, name, kind, Style::default())).unwrap()
    }

    fn free(graph: &mut Graph, name: &str, p: Vector3) -> NodeId {
        add(graph, name, NodeKind::FreePoint { position: p })
    }

    #[test]
    fn test_diamond_recomputes_each_node_once() {
        let mut graph = Graph::default();
        let a = free(&mut graph, "P1", Vector3::x());
        let b = free(&mut graph, "P2", Vector3::y());
        let c = free(&mut graph, "P3", Vector3::z());
        let l1 = add(&mut graph, "L1", NodeKind::Line { first: a, second: b });
        let l2 = add(&mut graph, "L2", NodeKind::Line { first: a, second: c });
        let ix = add(
            &mut graph,
            "P4",
            NodeKind::Intersection {
                first: l1,
                second: l2,
                index: 0,
                user_created: true,
            },
        );
        graph.update_all(UpdateMode::Full).unwrap();

        graph.mark_kids_out_of_date(a);
        let report = graph.update(a, UpdateMode::Full).unwrap();
        assert_eq!(report.recomputed.len(), 4);
        assert_eq!(report.recomputed[0], a);
        assert_eq!(*report.recomputed.last().unwrap(), ix);
        let unique: HashSet<_> = report.recomputed.iter().collect();
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn test_update_pulls_in_stale_parents_outside_root() {
        let mut graph = Graph::default();
        let a = free(&mut graph, "P1", Vector3::x());
        let b = free(&mut graph, "P2", Vector3::y());
        let l = add(&mut graph, "L1", NodeKind::Line { first: a, second: b });
        graph.update_all(UpdateMode::Full).unwrap();

        crate::command::set_stored_position(&mut graph, b, Vector3::z()).unwrap();
        graph.mark_kids_out_of_date(a);
        let report = graph.update(a, UpdateMode::Full).unwrap();

        let pos = |id: NodeId| report.recomputed.iter().position(|x| *x == id).unwrap();
        assert!(pos(b) < pos(l));
        assert!(graph.iter().all(|node| !node.is_stale()));
        match graph.node(l).unwrap().geometry {
            Geometry::Line { normal } => assert!((normal + Vector3::y()).norm() < 1e-12),
            ref other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_update_is_idempotent() {
        let mut graph = Graph::default();
        let a = free(&mut graph, "P1", Vector3::x());
        let b = free(&mut graph, "P2", Vector3::y());
        add(&mut graph, "L1", NodeKind::Line { first: a, second: b });
        let first = graph.update_all(UpdateMode::Full).unwrap();
        assert_eq!(first.len(), 3);

        let before: Vec<_> = graph.iter().map(|n| n.geometry.clone()).collect();
        let second = graph.update(a, UpdateMode::Full).unwrap();
        assert!(second.is_empty());
        let after: Vec<_> = graph.iter().map(|n| n.geometry.clone()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_existence_propagates() {
        let mut graph = Graph::default();
        let a = free(&mut graph, "P1", Vector3::x());
        let b = free(&mut graph, "P2", Vector3::x());
        let l = add(&mut graph, "L1", NodeKind::Line { first: a, second: b });
        let on = add(
            &mut graph,
            "P3",
            NodeKind::PointOnObject {
                object: l,
                position: Vector3::z(),
            },
        );
        graph.update_all(UpdateMode::Full).unwrap();
        assert!(!graph.node(l).unwrap().exists);
        assert!(!graph.node(on).unwrap().exists);

        if let NodeKind::FreePoint { position } = &mut graph.node_mut(b).unwrap().kind {
            *position = Vector3::y();
        }
        graph.mark_kids_out_of_date(b);
        graph.update(b, UpdateMode::Full).unwrap();
        assert!(graph.node(l).unwrap().exists);
        let p = graph.node(on).unwrap().position().unwrap();
        assert!(p.z.abs() < 1e-12);
    }

    #[test]
    fn test_display_mode_leaves_measurements_stale() {
        let mut graph = Graph::default();
        let a = free(&mut graph, "P1", Vector3::x());
        let b = free(&mut graph, "P2", Vector3::y());
        let m = add(
            &mut graph,
            "M1",
            NodeKind::Measurement {
                token: "M1".to_string(),
                rule: MeasureRule::Distance {
                    first: a,
                    second: b,
                },
            },
        );
        let report = graph.update_all(UpdateMode::Display).unwrap();
        assert!(!report.contains(m));
        assert!(graph.node(m).unwrap().is_stale());

        graph.update_all(UpdateMode::Full).unwrap();
        let value = graph.node(m).unwrap().value().unwrap();
        assert!((value - FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_line_angle_is_acute() {
        let mut graph = Graph::default();
        let a = free(&mut graph, "P1", Vector3::z());
        let b = free(&mut graph, "P2", Vector3::x());
        let c = free(
            &mut graph,
            "P3",
            Vector3::new(-1.0, 1.0, 0.0).normalize(),
        );
        let l1 = add(&mut graph, "L1", NodeKind::Line { first: a, second: b });
        let l2 = add(&mut graph, "L2", NodeKind::Line { first: a, second: c });
        let m = add(
            &mut graph,
            "M1",
            NodeKind::Measurement {
                token: "M1".to_string(),
                rule: MeasureRule::LineAngle {
                    first: l1,
                    second: l2,
                },
            },
        );
        graph.update_all(UpdateMode::Full).unwrap();
        let value = graph.node(m).unwrap().value().unwrap();
        assert!((value - PI / 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_label_text_uses_precision() {
        let mut graph = Graph::default();
        let a = free(&mut graph, "P1", Vector3::x());
        let b = free(&mut graph, "P2", Vector3::y());
        let m = add(
            &mut graph,
            "M1",
            NodeKind::Measurement {
                token: "M1".to_string(),
                rule: MeasureRule::Distance {
                    first: a,
                    second: b,
                },
            },
        );
        let label = add(&mut graph, "Lb1", NodeKind::Label { target: m });
        let point_label = add(&mut graph, "Lb2", NodeKind::Label { target: a });
        graph.update_all(UpdateMode::Full).unwrap();
        assert_eq!(
            graph.node(label).unwrap().geometry,
            Geometry::Text("M1 = 1.571".to_string())
        );
        assert_eq!(
            graph.node(point_label).unwrap().geometry,
            Geometry::Text("P1".to_string())
        );
    }

    #[test]
    fn test_plottable_receives_visibility() {
        use crate::plottable::recording::{Event, RecordingFactory};

        let factory = RecordingFactory::default();
        let log = factory.log.clone();
        let mut graph = Graph::with_factory(Default::default(), Box::new(factory));
        let id = graph.allocate_id();
        let mut node = Node::new(
            id,
            "P1",
            NodeKind::FreePoint {
                position: Vector3::x(),
            },
            Style::default(),
        );
        node.showing = false;
        graph.insert(node).unwrap();
        graph.update_all(UpdateMode::Full).unwrap();

        let events = log.borrow();
        assert_eq!(events[0], Event::Added(id));
        assert!(events.contains(&Event::Visible(id, false)));
    }
}
