//! Fluent builder for constructing and compiling graphs
//!
//! [`StateGraph`] is the only way to obtain a
//! [`CompiledGraph`](crate::compiled::CompiledGraph): declare schema
//! fields, nodes, edges, an entry point, and an interrupt set, then call
//! [`compile`](StateGraph::compile). Compilation validates the topology
//! and freezes it; after that there is no way to mutate nodes or edges.
//!
//! ```rust,no_run
//! use stepgraph_core::{StateGraph, ReducerPolicy, RouteTarget, END};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let mut builder = StateGraph::new();
//! builder
//!     .add_field("messages", ReducerPolicy::Append)
//!     .add_field("flag", ReducerPolicy::Overwrite)
//!     .add_node("agent", |_state| async move { Ok(json!({"messages": ["thinking"]})) })
//!     .add_node("tools", |_state| async move { Ok(json!({"messages": ["tool output"]})) })
//!     .add_edge("tools", "agent")
//!     .add_conditional_edge(
//!         "agent",
//!         Arc::new(|state| {
//!             if state["flag"] == json!(true) {
//!                 RouteTarget::Node("tools".to_string())
//!             } else {
//!                 RouteTarget::End
//!             }
//!         }),
//!         vec!["tools".to_string(), END.to_string()],
//!     )
//!     .set_entry("agent")
//!     .interrupt_before(["tools"]);
//! let compiled = builder.compile().unwrap();
//! ```

use crate::compiled::{CompiledGraph, RunConfig};
use crate::error::{GraphError, Result};
use crate::graph::{Graph, HandlerError, NodeHandler, NodeId, NodeSpec, RouteTarget, Router};
use crate::state::ReducerPolicy;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Builder for a checkpointed step graph
#[derive(Debug, Default)]
pub struct StateGraph {
    graph: Graph,
    config: RunConfig,
}

impl StateGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a state field and its reducer policy
    pub fn add_field(&mut self, name: impl Into<String>, policy: ReducerPolicy) -> &mut Self {
        self.graph.schema.add_field(name, policy);
        self
    }

    /// Add a node with an async handler returning a partial state update
    pub fn add_node<F, Fut>(&mut self, id: impl Into<NodeId>, handler: F) -> &mut Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Value, HandlerError>> + Send + 'static,
    {
        let id = id.into();
        let handler: NodeHandler = Arc::new(move |state| Box::pin(handler(state)));
        self.graph.add_node(
            id.clone(),
            NodeSpec {
                name: id,
                handler,
                output_field: None,
                rejection_value: None,
            },
        );
        self
    }

    /// Add a node declaring which state field its result lands in.
    ///
    /// The declared field is what resume-reject writes the synthesized
    /// rejection outcome to (through the field's normal reducer policy).
    pub fn add_node_with_output<F, Fut>(
        &mut self,
        id: impl Into<NodeId>,
        output_field: impl Into<String>,
        handler: F,
    ) -> &mut Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Value, HandlerError>> + Send + 'static,
    {
        let id = id.into();
        let handler: NodeHandler = Arc::new(move |state| Box::pin(handler(state)));
        self.graph.add_node(
            id.clone(),
            NodeSpec {
                name: id,
                handler,
                output_field: Some(output_field.into()),
                rejection_value: None,
            },
        );
        self
    }

    /// Override the value synthesized when a node is rejected
    pub fn set_rejection_value(&mut self, id: &str, value: Value) -> &mut Self {
        if let Some(spec) = self.graph.nodes.get_mut(id) {
            spec.rejection_value = Some(value);
        }
        self
    }

    /// Add a static edge, always taken
    pub fn add_edge(&mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) -> &mut Self {
        self.graph.add_edge(from.into(), to.into());
        self
    }

    /// Add a conditional edge with a fixed candidate set.
    ///
    /// At runtime the router is invoked with the post-merge state; a
    /// returned node outside `candidates` is a routing error.
    pub fn add_conditional_edge(
        &mut self,
        from: impl Into<NodeId>,
        router: Router,
        candidates: Vec<NodeId>,
    ) -> &mut Self {
        self.graph.add_conditional_edge(from.into(), router, candidates);
        self
    }

    /// Convenience: conditional edge from a plain closure
    pub fn add_router<F>(
        &mut self,
        from: impl Into<NodeId>,
        candidates: Vec<NodeId>,
        router: F,
    ) -> &mut Self
    where
        F: Fn(&Value) -> RouteTarget + Send + Sync + 'static,
    {
        self.add_conditional_edge(from, Arc::new(router), candidates)
    }

    /// Designate the entry node
    pub fn set_entry(&mut self, node: impl Into<NodeId>) -> &mut Self {
        self.graph.set_entry(node.into());
        self
    }

    /// Declare nodes before which execution must always pause
    pub fn interrupt_before<I, T>(&mut self, nodes: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Into<NodeId>,
    {
        self.graph
            .interrupt_before
            .extend(nodes.into_iter().map(Into::into));
        self
    }

    /// Cap the number of super-steps per run (guards non-terminating loops)
    pub fn with_max_steps(&mut self, max_steps: usize) -> &mut Self {
        self.config.max_steps = max_steps;
        self
    }

    /// Validate and freeze the graph into its executable form.
    ///
    /// Fails with [`GraphError::Validation`] naming the offending node or
    /// edge. The result carries an in-memory checkpoint store; attach a
    /// different backend with
    /// [`with_checkpointer`](CompiledGraph::with_checkpointer).
    pub fn compile(&self) -> Result<CompiledGraph> {
        self.graph.validate().map_err(GraphError::validation)?;
        Ok(CompiledGraph::new(self.graph.clone(), self.config.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::END;
    use serde_json::json;

    #[test]
    fn test_compile_valid_graph() {
        let mut builder = StateGraph::new();
        builder
            .add_field("messages", ReducerPolicy::Append)
            .add_node("a", |_| async move { Ok(json!({"messages": ["hi"]})) })
            .add_edge("a", END)
            .set_entry("a");

        assert!(builder.compile().is_ok());
    }

    #[test]
    fn test_compile_reports_offending_node() {
        let mut builder = StateGraph::new();
        builder
            .add_node("a", |_| async move { Ok(json!({})) })
            .add_edge("a", "missing")
            .set_entry("a");

        let err = builder.compile().unwrap_err();
        match err {
            GraphError::Validation(msg) => assert!(msg.contains("missing")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_compile_rejects_unknown_interrupt_node() {
        let mut builder = StateGraph::new();
        builder
            .add_node("a", |_| async move { Ok(json!({})) })
            .add_edge("a", END)
            .set_entry("a")
            .interrupt_before(["ghost"]);

        assert!(builder.compile().is_err());
    }
}
