//! Graph topology: nodes, edges, and the validated immutable form
//!
//! A graph is a set of named nodes, a designated entry node, successor
//! specifications per node, an interrupt set, and a state schema. Once
//! [`Graph::validate`] passes and the graph is wrapped by the compiler,
//! the topology is frozen: there is no mutation API on a compiled graph,
//! and one compiled graph is shared read-only by every thread.

use crate::state::StateSchema;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Node ID type
pub type NodeId = String;

/// Terminal marker: routing to `END` finishes the run
pub const END: &str = "__end__";

/// Error type node handlers may return
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Boxed async node handler: full state in, partial update out
pub type NodeHandler =
    Arc<dyn Fn(Value) -> BoxFuture<'static, std::result::Result<Value, HandlerError>> + Send + Sync>;

/// Routing decision returned by a conditional edge's router
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    /// Continue to the named node (must be in the edge's candidate set)
    Node(NodeId),
    /// Finish the run
    End,
}

/// Router function for conditional edges, invoked with the post-merge state
pub type Router = Arc<dyn Fn(&Value) -> RouteTarget + Send + Sync>;

/// Successor specification attached to a node
#[derive(Clone)]
pub enum Edge {
    /// Always taken
    Direct(NodeId),
    /// Router picks one target from the declared candidate set
    Conditional {
        router: Router,
        candidates: Vec<NodeId>,
    },
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Edge::Direct(node_id) => f.debug_tuple("Direct").field(node_id).finish(),
            Edge::Conditional { candidates, .. } => f
                .debug_struct("Conditional")
                .field("router", &"<function>")
                .field("candidates", candidates)
                .finish(),
        }
    }
}

/// A named computation step
///
/// `output_field` and `rejection_value` exist for the resume-reject
/// protocol: when a caller rejects a pending node, the engine synthesizes
/// `{output_field: rejection_value}` in place of invoking the handler and
/// merges it through the field's normal reducer policy.
#[derive(Clone)]
pub struct NodeSpec {
    pub name: NodeId,
    pub handler: NodeHandler,
    pub output_field: Option<String>,
    pub rejection_value: Option<Value>,
}

impl NodeSpec {
    /// The partial update synthesized when this node is rejected
    pub fn rejection_update(&self) -> Value {
        let Some(field) = &self.output_field else {
            return Value::Object(serde_json::Map::new());
        };

        let value = self.rejection_value.clone().unwrap_or_else(|| {
            serde_json::json!({"status": "rejected", "node": self.name})
        });

        let mut update = serde_json::Map::new();
        update.insert(field.clone(), value);
        Value::Object(update)
    }
}

impl std::fmt::Debug for NodeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeSpec")
            .field("name", &self.name)
            .field("handler", &"<function>")
            .field("output_field", &self.output_field)
            .finish()
    }
}

/// Mutable graph under construction; frozen by compilation
#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub nodes: HashMap<NodeId, NodeSpec>,
    pub edges: HashMap<NodeId, Vec<Edge>>,
    pub entry: Option<NodeId>,
    pub interrupt_before: HashSet<NodeId>,
    pub schema: StateSchema,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: NodeId, spec: NodeSpec) {
        self.nodes.insert(id, spec);
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId) {
        self.edges.entry(from).or_default().push(Edge::Direct(to));
    }

    pub fn add_conditional_edge(&mut self, from: NodeId, router: Router, candidates: Vec<NodeId>) {
        self.edges
            .entry(from)
            .or_default()
            .push(Edge::Conditional { router, candidates });
    }

    pub fn set_entry(&mut self, node: NodeId) {
        self.entry = Some(node);
    }

    /// Validate the topology before freezing it.
    ///
    /// Checks, in order: an entry node is designated and exists; every
    /// edge source, direct target, and conditional candidate names a
    /// declared node (or `END`); every node has at least one successor
    /// specification; every interrupt node is declared; every node is
    /// reachable from the entry.
    pub fn validate(&self) -> Result<(), String> {
        let entry = self
            .entry
            .as_ref()
            .ok_or_else(|| "no entry node designated".to_string())?;

        if !self.nodes.contains_key(entry) {
            return Err(format!("entry node '{}' does not exist", entry));
        }

        for (from, edges) in &self.edges {
            if !self.nodes.contains_key(from) {
                return Err(format!("edge source '{}' does not exist", from));
            }

            for edge in edges {
                match edge {
                    Edge::Direct(to) => {
                        if to != END && !self.nodes.contains_key(to) {
                            return Err(format!(
                                "edge '{}' -> '{}': target does not exist",
                                from, to
                            ));
                        }
                    }
                    Edge::Conditional { candidates, .. } => {
                        if candidates.is_empty() {
                            return Err(format!(
                                "conditional edge from '{}' declares no candidates",
                                from
                            ));
                        }
                        for to in candidates {
                            if to != END && !self.nodes.contains_key(to) {
                                return Err(format!(
                                    "conditional edge from '{}': candidate '{}' does not exist",
                                    from, to
                                ));
                            }
                        }
                    }
                }
            }
        }

        // No path may dead-end short of END at runtime
        for id in self.nodes.keys() {
            if self.edges.get(id).map_or(true, |e| e.is_empty()) {
                return Err(format!("node '{}' has no successor specification", id));
            }
        }

        for node in &self.interrupt_before {
            if !self.nodes.contains_key(node) {
                return Err(format!("interrupt node '{}' does not exist", node));
            }
        }

        let reachable = self.reachable_from(entry);
        for id in self.nodes.keys() {
            if !reachable.contains(id) {
                return Err(format!("node '{}' is unreachable from entry", id));
            }
        }

        Ok(())
    }

    fn reachable_from(&self, entry: &str) -> HashSet<NodeId> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        seen.insert(entry.to_string());
        queue.push_back(entry.to_string());

        while let Some(node) = queue.pop_front() {
            let Some(edges) = self.edges.get(&node) else {
                continue;
            };
            for edge in edges {
                let targets: Vec<&NodeId> = match edge {
                    Edge::Direct(to) => vec![to],
                    Edge::Conditional { candidates, .. } => candidates.iter().collect(),
                };
                for to in targets {
                    if to != END && seen.insert(to.clone()) {
                        queue.push_back(to.clone());
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
    use crate::state::ReducerPolicy;

    fn noop_spec(name: &str) -> NodeSpec {
        NodeSpec {
            name: name.to_string(),
            handler: Arc::new(|_state| {
                Box::pin(async move { Ok(Value::Object(serde_json::Map::new())) })
            }),
            output_field: None,
            rejection_value: None,
        }
    }

    #[test]
    fn test_valid_linear_graph() {
        let mut graph = Graph::new();
        graph.add_node("a".to_string(), noop_spec("a"));
        graph.add_node("b".to_string(), noop_spec("b"));
        graph.add_edge("a".to_string(), "b".to_string());
        graph.add_edge("b".to_string(), END.to_string());
        graph.set_entry("a".to_string());

        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_missing_entry_rejected() {
        let mut graph = Graph::new();
        graph.add_node("a".to_string(), noop_spec("a"));
        graph.add_edge("a".to_string(), END.to_string());

        let err = graph.validate().unwrap_err();
        assert!(err.contains("entry"));
    }

    #[test]
    fn test_dangling_edge_target_rejected() {
        let mut graph = Graph::new();
        graph.add_node("a".to_string(), noop_spec("a"));
        graph.add_edge("a".to_string(), "ghost".to_string());
        graph.set_entry("a".to_string());

        let err = graph.validate().unwrap_err();
        assert!(err.contains("ghost"));
    }

    #[test]
    fn test_node_without_successors_rejected() {
        let mut graph = Graph::new();
        graph.add_node("a".to_string(), noop_spec("a"));
        graph.add_node("b".to_string(), noop_spec("b"));
        graph.add_edge("a".to_string(), "b".to_string());
        graph.set_entry("a".to_string());

        let err = graph.validate().unwrap_err();
        assert!(err.contains("'b'"));
        assert!(err.contains("successor"));
    }

    #[test]
    fn test_orphan_node_rejected() {
        let mut graph = Graph::new();
        graph.add_node("a".to_string(), noop_spec("a"));
        graph.add_node("island".to_string(), noop_spec("island"));
        graph.add_edge("a".to_string(), END.to_string());
        graph.add_edge("island".to_string(), END.to_string());
        graph.set_entry("a".to_string());

        let err = graph.validate().unwrap_err();
        assert!(err.contains("island"));
        assert!(err.contains("unreachable"));
    }

    #[test]
    fn test_conditional_candidates_reach_nodes() {
        let mut graph = Graph::new();
        graph.add_node("a".to_string(), noop_spec("a"));
        graph.add_node("b".to_string(), noop_spec("b"));
        graph.add_conditional_edge(
            "a".to_string(),
            Arc::new(|_| RouteTarget::End),
            vec!["b".to_string(), END.to_string()],
        );
        graph.add_edge("b".to_string(), END.to_string());
        graph.set_entry("a".to_string());

        // b is reachable only through the candidate set
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_rejection_update_default() {
        let mut spec = noop_spec("tools");
        spec.output_field = Some("messages".to_string());

        let update = spec.rejection_update();
        assert_eq!(update["messages"]["status"], "rejected");
        assert_eq!(update["messages"]["node"], "tools");
    }

    #[test]
    fn test_rejection_update_custom_value() {
        let mut spec = noop_spec("tools");
        spec.output_field = Some("messages".to_string());
        spec.rejection_value = Some(serde_json::json!("[tool execution rejected by user]"));

        let update = spec.rejection_update();
        assert_eq!(
            update["messages"],
            serde_json::json!("[tool execution rejected by user]")
        );
    }

    #[test]
    fn test_schema_is_part_of_graph() {
        let mut graph = Graph::new();
        graph.schema.add_field("messages", ReducerPolicy::Append);
        assert!(graph.schema.contains("messages"));
    }
}
