//! Super-step execution loop and the engine's public operations
//!
//! One loop iteration is a super-step: pop the frontier's front node,
//! check the interrupt set, invoke the handler, merge the partial update
//! through the schema's reducer policies, resolve successors, and write
//! one checkpoint. Execution is strictly sequential within a thread —
//! fan-out queues successors, it never runs them in parallel.
//!
//! Checkpoint discipline: a super-step either persists one complete
//! checkpoint or nothing. Handler failures return
//! [`StepResult::Failed`] *before* any write, so retrying re-invokes only
//! the failing node from the last durable checkpoint (at-least-once).

use super::graph::CompiledGraph;
use crate::error::{GraphError, Result};
use crate::graph::{Edge, NodeId, NodeSpec, RouteTarget, END};
use serde_json::Value;
use stepgraph_checkpoint::{
    Checkpoint, CheckpointError, CheckpointId, CheckpointSource, CheckpointSummary,
};

/// Outcome of one engine invocation (`start`, `resume`, or `fork_from`)
#[derive(Debug, Clone)]
pub enum StepResult {
    /// The run reached a terminal node
    Completed {
        state: Value,
        checkpoint_id: CheckpointId,
    },
    /// Execution halted before a node in the interrupt set
    Interrupted {
        state: Value,
        pending_nodes: Vec<NodeId>,
        checkpoint_id: CheckpointId,
    },
    /// A node handler raised, or the step limit was hit; nothing was
    /// committed for the failing step
    Failed {
        node: NodeId,
        error: String,
        last_good_checkpoint: CheckpointId,
    },
}

/// Caller's verdict on the node execution halted before
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeDecision {
    /// Approve: execute the pending node normally
    Continue,
    /// Reject: synthesize the node's rejection outcome instead of
    /// invoking its handler, then route as if it had run
    Reject,
}

impl CompiledGraph {
    /// Begin executing a fresh thread.
    ///
    /// Merges `input` into an empty state via the schema, writes the seed
    /// checkpoint with the entry node pending, and runs the step loop.
    /// Fails with [`GraphError::AlreadyStarted`] if the thread has a head
    /// checkpoint.
    #[tracing::instrument(skip(self, input))]
    pub async fn start(&self, thread_id: &str, input: Value) -> Result<StepResult> {
        let _guard = self.acquire_run_lock(thread_id)?;

        match self.saver.head(thread_id).await {
            Ok(_) => return Err(GraphError::AlreadyStarted(thread_id.to_string())),
            Err(CheckpointError::EmptyThread(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let mut state = Value::Object(serde_json::Map::new());
        self.graph.schema.apply(&mut state, &input)?;

        let frontier = vec![self.entry.clone()];
        let seed = Checkpoint::new(
            thread_id,
            None,
            state.clone(),
            frontier.clone(),
            CheckpointSource::Input,
        );
        let seed_id = self.saver.save(seed).await?;
        tracing::info!(thread_id, checkpoint = %seed_id, "thread started");

        self.run_loop(thread_id, state, frontier, seed_id, None).await
    }

    /// Resume a thread halted at an interrupt boundary.
    ///
    /// `Continue` approves the pending node: it executes normally this
    /// time, and the approval covers exactly that node instance. `Reject`
    /// writes the node's synthesized rejection outcome into state through
    /// its declared output field and reducer policy, then routes onward
    /// as if the node had run.
    ///
    /// Fails with [`GraphError::NotInterrupted`] if the thread's head has
    /// no pending nodes.
    #[tracing::instrument(skip(self))]
    pub async fn resume(&self, thread_id: &str, decision: ResumeDecision) -> Result<StepResult> {
        let _guard = self.acquire_run_lock(thread_id)?;

        let head = self.saver.head(thread_id).await?;
        if head.pending_nodes.is_empty() {
            return Err(GraphError::NotInterrupted(thread_id.to_string()));
        }

        let mut frontier = head.pending_nodes;
        let mut state = head.state;

        match decision {
            ResumeDecision::Continue => {
                let approved = frontier[0].clone();
                tracing::info!(thread_id, node = %approved, "resuming past approved node");
                self.run_loop(thread_id, state, frontier, head.id, Some(approved))
                    .await
            }
            ResumeDecision::Reject => {
                let rejected = frontier.remove(0);
                tracing::info!(thread_id, node = %rejected, "rejecting pending node");

                let spec = self.node(&rejected)?;
                let update = spec.rejection_update();
                self.graph.schema.apply(&mut state, &update)?;
                frontier.extend(self.resolve_successors(&rejected, &state)?);

                let checkpoint = Checkpoint::new(
                    thread_id,
                    Some(head.id),
                    state.clone(),
                    frontier.clone(),
                    CheckpointSource::Step,
                );
                let checkpoint_id = self.saver.save(checkpoint).await?;

                self.run_loop(thread_id, state, frontier, checkpoint_id, None)
                    .await
            }
        }
    }

    /// Re-enter execution at a historical checkpoint, creating a branch.
    ///
    /// Writes a fork checkpoint whose parent is the historical one, so
    /// the original lineage stays intact and the thread's head advances
    /// along the new branch. The interrupt set is re-checked from
    /// scratch — a fork does not inherit a prior approval.
    #[tracing::instrument(skip(self))]
    pub async fn fork_from(&self, thread_id: &str, checkpoint_id: &str) -> Result<StepResult> {
        let _guard = self.acquire_run_lock(thread_id)?;

        let source = self.saver.load(thread_id, checkpoint_id).await?;
        let fork = Checkpoint::new(
            thread_id,
            Some(source.id.clone()),
            source.state.clone(),
            source.pending_nodes.clone(),
            CheckpointSource::Fork,
        );
        let fork_id = self.saver.save(fork).await?;
        tracing::info!(thread_id, from = %checkpoint_id, fork = %fork_id, "forked");

        if source.pending_nodes.is_empty() {
            // Forking a completed checkpoint: nothing left to run on the
            // new branch
            return Ok(StepResult::Completed {
                state: source.state,
                checkpoint_id: fork_id,
            });
        }

        self.run_loop(thread_id, source.state, source.pending_nodes, fork_id, None)
            .await
    }

    /// Apply field-level overrides to a historical checkpoint's state,
    /// producing a new checkpoint whose parent is the edited one.
    ///
    /// Overrides are schema-validated and applied with overwrite
    /// semantics regardless of each field's normal reducer policy. This
    /// is a zero-step fork: no node executes, and the original
    /// checkpoint is untouched.
    #[tracing::instrument(skip(self, overrides))]
    pub async fn update_state(
        &self,
        thread_id: &str,
        checkpoint_id: &str,
        overrides: Value,
    ) -> Result<CheckpointId> {
        let _guard = self.acquire_run_lock(thread_id)?;

        let source = self.saver.load(thread_id, checkpoint_id).await?;
        let mut state = source.state;
        self.graph.schema.apply_overrides(&mut state, &overrides)?;

        let edit = Checkpoint::new(
            thread_id,
            Some(source.id),
            state,
            source.pending_nodes,
            CheckpointSource::Update,
        );
        let edit_id = self.saver.save(edit).await?;
        tracing::info!(thread_id, from = %checkpoint_id, edit = %edit_id, "state updated");
        Ok(edit_id)
    }

    /// Pure read of the head checkpoint: (state snapshot, pending nodes)
    pub async fn get_state(&self, thread_id: &str) -> Result<(Value, Vec<NodeId>)> {
        let head = self.saver.head(thread_id).await?;
        Ok((head.state, head.pending_nodes))
    }

    /// Pure read of any historical checkpoint's state snapshot
    pub async fn get_state_at(&self, thread_id: &str, checkpoint_id: &str) -> Result<Value> {
        let checkpoint = self.saver.load(thread_id, checkpoint_id).await?;
        Ok(checkpoint.state)
    }

    /// All of the thread's checkpoints in creation order, branches
    /// included, for history and branch visualization
    pub async fn list_checkpoints(&self, thread_id: &str) -> Result<Vec<CheckpointSummary>> {
        let history = self.saver.history(thread_id).await?;
        Ok(history.iter().map(CheckpointSummary::from).collect())
    }

    /// The synchronous super-step loop: interrupt check, invoke, merge,
    /// route, checkpoint.
    ///
    /// `approved` names the one node instance allowed past the interrupt
    /// check; it is consumed by the first iteration, so a self-loop back
    /// into the interrupt set halts again on the next pass.
    async fn run_loop(
        &self,
        thread_id: &str,
        mut state: Value,
        mut frontier: Vec<NodeId>,
        mut last_checkpoint: CheckpointId,
        mut approved: Option<NodeId>,
    ) -> Result<StepResult> {
        let mut steps = 0usize;

        loop {
            let Some(current) = frontier.first().cloned() else {
                tracing::info!(thread_id, checkpoint = %last_checkpoint, "run completed");
                return Ok(StepResult::Completed {
                    state,
                    checkpoint_id: last_checkpoint,
                });
            };

            if self.graph.interrupt_before.contains(&current)
                && approved.as_deref() != Some(current.as_str())
            {
                tracing::info!(thread_id, node = %current, "halting before interrupt node");
                return Ok(StepResult::Interrupted {
                    state,
                    pending_nodes: frontier,
                    checkpoint_id: last_checkpoint,
                });
            }
            approved = None;

            if steps >= self.config.max_steps {
                tracing::error!(thread_id, limit = self.config.max_steps, "step limit hit");
                return Ok(StepResult::Failed {
                    node: current,
                    error: format!("step limit of {} exceeded", self.config.max_steps),
                    last_good_checkpoint: last_checkpoint,
                });
            }

            let spec = self.node(&current)?;
            tracing::debug!(thread_id, node = %current, step = steps, "invoking node");
            let update = match (spec.handler)(state.clone()).await {
                Ok(update) => update,
                Err(e) => {
                    tracing::error!(thread_id, node = %current, error = %e, "handler failed");
                    return Ok(StepResult::Failed {
                        node: current,
                        error: e.to_string(),
                        last_good_checkpoint: last_checkpoint,
                    });
                }
            };

            if let Err(e) = self.graph.schema.apply(&mut state, &update) {
                tracing::error!(thread_id, node = %current, error = %e, "merge failed");
                return Ok(StepResult::Failed {
                    node: current,
                    error: e.to_string(),
                    last_good_checkpoint: last_checkpoint,
                });
            }

            frontier.remove(0);
            frontier.extend(self.resolve_successors(&current, &state)?);

            let checkpoint = Checkpoint::new(
                thread_id,
                Some(last_checkpoint.clone()),
                state.clone(),
                frontier.clone(),
                CheckpointSource::Step,
            );
            last_checkpoint = self.saver.save(checkpoint).await?;
            steps += 1;
        }
    }

    /// Resolve a node's successors against the post-merge state.
    ///
    /// Static edges are taken unconditionally; conditional routers must
    /// return a member of their declared candidate set. `END` targets are
    /// dropped from the frontier — an empty frontier is completion.
    fn resolve_successors(&self, node: &str, state: &Value) -> Result<Vec<NodeId>> {
        let mut next = Vec::new();
        let Some(edges) = self.graph.edges.get(node) else {
            return Ok(next);
        };

        for edge in edges {
            match edge {
                Edge::Direct(to) => {
                    if to != END {
                        next.push(to.clone());
                    }
                }
                Edge::Conditional { router, candidates } => match router(state) {
                    RouteTarget::End => {
                        if !candidates.iter().any(|c| c == END) {
                            return Err(GraphError::route(node, END));
                        }
                    }
                    RouteTarget::Node(to) => {
                        if !candidates.contains(&to) {
                            return Err(GraphError::route(node, to));
                        }
                        if to != END {
                            next.push(to);
                        }
                    }
                },
            }
        }

        Ok(next)
    }

    fn node(&self, id: &str) -> Result<&NodeSpec> {
        self.graph.nodes.get(id).ok_or_else(|| {
            GraphError::validation(format!("unknown node '{}' in pending set", id))
        })
    }
}
