//! Human-in-the-loop approval gate
//!
//! An agent/tools loop where every tool execution pauses for approval.
//! The first thread approves the pending tool call; the second rejects
//! it, and the rejection outcome flows through the state so the agent
//! can react to it.

use serde_json::json;
use stepgraph_core::{ReducerPolicy, ResumeDecision, RouteTarget, StateGraph, StepResult, END};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Approval Flow Demo ===\n");

    let mut builder = StateGraph::new();
    builder
        .add_field("messages", ReducerPolicy::Append)
        .add_field("needs_tool", ReducerPolicy::Overwrite)
        .add_node("agent", |state| async move {
            // First pass asks for a tool; after the tool (or its
            // rejection) lands in messages, finish
            let already_called = state["messages"]
                .as_array()
                .map(|m| m.len() > 1)
                .unwrap_or(false);
            Ok(json!({
                "messages": ["agent: deciding next action"],
                "needs_tool": !already_called,
            }))
        })
        .add_node_with_output("tools", "messages", |_state| async move {
            Ok(json!({"messages": ["tools: fetched 3 rows"]}))
        })
        .set_rejection_value("tools", json!("tools: execution rejected by user"))
        .add_router(
            "agent",
            vec!["tools".to_string(), END.to_string()],
            |state| {
                if state["needs_tool"] == json!(true) {
                    RouteTarget::Node("tools".to_string())
                } else {
                    RouteTarget::End
                }
            },
        )
        .add_edge("tools", "agent")
        .set_entry("agent")
        .interrupt_before(["tools"]);
    let graph = builder.compile()?;

    // --- Thread 1: approve the tool call ---
    println!("--- thread-1: approve ---");
    let result = graph.start("thread-1", json!({})).await?;
    if let StepResult::Interrupted { pending_nodes, .. } = &result {
        println!("halted before: {:?}", pending_nodes);
    }

    let result = graph.resume("thread-1", ResumeDecision::Continue).await?;
    if let StepResult::Completed { state, .. } = &result {
        println!("final messages: {}\n", state["messages"]);
    }

    // --- Thread 2: reject the tool call ---
    println!("--- thread-2: reject ---");
    let result = graph.start("thread-2", json!({})).await?;
    if let StepResult::Interrupted { pending_nodes, .. } = &result {
        println!("halted before: {:?}", pending_nodes);
    }

    let result = graph.resume("thread-2", ResumeDecision::Reject).await?;
    if let StepResult::Completed { state, .. } = &result {
        println!("final messages: {}", state["messages"]);
    }

    println!("\n=== Demo Complete ===");
    Ok(())
}
