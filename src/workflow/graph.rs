//! Agent 有向图
//!
//! 邻接表 + 入度表描述节点间的合法边；Verifier -> Generator 是唯一允许的回边，
//! 去掉该边后图必须是 DAG（Kahn 拓扑排序校验）。

use std::collections::{HashMap, HashSet, VecDeque};

use crate::workflow::types::{AgentName, Route};
use crate::workflow::WorkflowError;

/// 图节点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphNode {
    Start,
    Agent(AgentName),
    End,
}

/// 唯一的反馈回边
pub const FEEDBACK_EDGE: (GraphNode, GraphNode) = (
    GraphNode::Agent(AgentName::Verifier),
    GraphNode::Agent(AgentName::Generator),
);

/// Agent 依赖图
pub struct AgentGraph {
    /// 邻接表：节点 -> 后继
    pub adjacency: HashMap<GraphNode, Vec<GraphNode>>,
}

impl AgentGraph {
    /// 标准问答图
    pub fn standard() -> Self {
        use AgentName::*;
        use GraphNode::{Agent, End, Start};

        let mut graph = Self {
            adjacency: HashMap::new(),
        };
        graph.add_edge(Start, Agent(Router));
        graph.add_edge(Agent(Router), Agent(Researcher));
        graph.add_edge(Agent(Router), Agent(Reasoner));
        graph.add_edge(Agent(Router), Agent(DataAnalyst));
        graph.add_edge(Agent(Researcher), Agent(Reasoner));
        graph.add_edge(Agent(Reasoner), Agent(Generator));
        graph.add_edge(Agent(DataAnalyst), Agent(Generator));
        graph.add_edge(Agent(Generator), Agent(Verifier));
        graph.add_edge(Agent(Verifier), Agent(Generator));
        graph.add_edge(Agent(Generator), End);
        graph
    }

    pub fn add_edge(&mut self, from: GraphNode, to: GraphNode) {
        let successors = self.adjacency.entry(from).or_default();
        if !successors.contains(&to) {
            successors.push(to);
        }
        self.adjacency.entry(to).or_default();
    }

    pub fn has_edge(&self, from: GraphNode, to: GraphNode) -> bool {
        self.adjacency
            .get(&from)
            .is_some_and(|succ| succ.contains(&to))
    }

    pub fn successors(&self, node: GraphNode) -> &[GraphNode] {
        self.adjacency.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 去掉指定边后做拓扑排序，全部节点可排出即无环
    pub fn is_acyclic_without(&self, skip: Option<(GraphNode, GraphNode)>) -> bool {
        let mut in_degree: HashMap<GraphNode, usize> =
            self.adjacency.keys().map(|n| (*n, 0)).collect();
        for (from, succ) in &self.adjacency {
            for to in succ {
                if Some((*from, *to)) == skip {
                    continue;
                }
                *in_degree.entry(*to).or_insert(0) += 1;
            }
        }

        let mut queue: VecDeque<GraphNode> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(n, _)| *n)
            .collect();
        let mut visited = 0;
        while let Some(node) = queue.pop_front() {
            visited += 1;
            for to in self.successors(node) {
                if Some((node, *to)) == skip {
                    continue;
                }
                if let Some(d) = in_degree.get_mut(to) {
                    *d -= 1;
                    if *d == 0 {
                        queue.push_back(*to);
                    }
                }
            }
        }
        visited == in_degree.len()
    }

    /// 校验：整图有环，且去掉反馈边后无环
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if !self.has_edge(FEEDBACK_EDGE.0, FEEDBACK_EDGE.1) {
            return Err(WorkflowError::InvalidConfiguration(
                "feedback edge verifier -> generator missing".to_string(),
            ));
        }
        if !self.is_acyclic_without(Some(FEEDBACK_EDGE)) {
            return Err(WorkflowError::CyclicDependency);
        }
        Ok(())
    }

    /// 校验路由的 Agent 序列沿图中已有的边行进
    pub fn check_path(&self, route: Route) -> Result<(), WorkflowError> {
        let mut prev = GraphNode::Agent(AgentName::Router);
        for agent in route.sequence() {
            let next = GraphNode::Agent(agent);
            if !self.has_edge(prev, next) {
                return Err(WorkflowError::MissingEdge {
                    from: format!("{prev:?}"),
                    to: format!("{next:?}"),
                });
            }
            prev = next;
        }
        if !self.has_edge(prev, GraphNode::End) {
            return Err(WorkflowError::MissingEdge {
                from: format!("{prev:?}"),
                to: "End".to_string(),
            });
        }
        Ok(())
    }

    /// 从 Start 可达的 Agent
    pub fn reachable_agents(&self) -> HashSet<AgentName> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([GraphNode::Start]);
        while let Some(node) = queue.pop_front() {
            for next in self.successors(node) {
                if let GraphNode::Agent(name) = next {
                    if seen.insert(*name) {
                        queue.push_back(*next);
                    }
                }
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_graph_is_valid() {
        let graph = AgentGraph::standard();
        assert!(graph.validate().is_ok());
        assert!(!graph.is_acyclic_without(None));
    }

    #[test]
    fn test_every_route_follows_edges() {
        let graph = AgentGraph::standard();
        for route in Route::ALL {
            assert!(graph.check_path(route).is_ok(), "route {route} off-graph");
        }
    }

    #[test]
    fn test_extra_cycle_detected() {
        let mut graph = AgentGraph::standard();
        graph.add_edge(
            GraphNode::Agent(AgentName::Reasoner),
            GraphNode::Agent(AgentName::Researcher),
        );
        assert!(matches!(graph.validate(), Err(WorkflowError::CyclicDependency)));
    }

    #[test]
    fn test_all_agents_reachable() {
        let graph = AgentGraph::standard();
        let reachable = graph.reachable_agents();
        for agent in AgentName::ALL {
            assert!(reachable.contains(&agent), "{agent} unreachable");
        }
    }
}
