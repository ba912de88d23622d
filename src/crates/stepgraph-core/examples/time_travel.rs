//! Time-travel over the checkpoint tree
//!
//! Runs a three-stage pipeline to completion, then rewinds: first a
//! plain fork from a mid-run checkpoint, then a state edit followed by a
//! fork so the tail of the pipeline re-executes against the edited
//! state. The original lineage survives both.

use serde_json::json;
use stepgraph_core::{ReducerPolicy, StateGraph, StepResult, END};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Time Travel Demo ===\n");

    let mut builder = StateGraph::new();
    builder
        .add_field("total", ReducerPolicy::Overwrite)
        .add_field("log", ReducerPolicy::Append)
        .add_node("load", |_state| async move {
            Ok(json!({"total": 10, "log": ["loaded base total 10"]}))
        })
        .add_node("tax", |state| async move {
            let total = state["total"].as_i64().unwrap_or(0);
            Ok(json!({
                "total": total + total / 5,
                "log": [format!("applied 20% tax: {}", total + total / 5)],
            }))
        })
        .add_node("report", |state| async move {
            Ok(json!({"log": [format!("final total {}", state["total"])]}))
        })
        .add_edge("load", "tax")
        .add_edge("tax", "report")
        .add_edge("report", END)
        .set_entry("load");
    let graph = builder.compile()?;

    let result = graph.start("thread-1", json!({})).await?;
    if let StepResult::Completed { state, .. } = &result {
        println!("first run: total = {}", state["total"]);
    }

    let checkpoints = graph.list_checkpoints("thread-1").await?;
    println!("checkpoints written: {}", checkpoints.len());
    for c in &checkpoints {
        println!("  {} pending={:?} source={:?}", c.checkpoint_id, c.pending_nodes, c.source);
    }

    // The checkpoint where load has run but tax has not
    let before_tax = checkpoints
        .iter()
        .find(|c| c.pending_nodes == vec!["tax".to_string()])
        .ok_or("no pre-tax checkpoint")?
        .checkpoint_id
        .clone();

    // Edit the base total at that point, then branch off the edit
    println!("\nediting total to 100 at {} and re-running", before_tax);
    let edited = graph
        .update_state("thread-1", &before_tax, json!({"total": 100}))
        .await?;
    let result = graph.fork_from("thread-1", &edited).await?;
    if let StepResult::Completed { state, .. } = &result {
        println!("branched run: total = {}", state["total"]);
    }

    // The original lineage is untouched
    let original = graph.get_state_at("thread-1", &before_tax).await?;
    println!("original pre-tax total is still {}", original["total"]);

    println!("\n=== Demo Complete ===");
    Ok(())
}
