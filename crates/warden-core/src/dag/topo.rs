//! Kahn's algorithm: group nodes into parallel execution waves.

use super::graph::DagState;
use crate::error::{Result, WardenError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One topological rank: nodes expected to execute concurrently.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Wave {
    pub level: usize,
    pub nodes: Vec<String>,
}

/// Assign each node a wave by repeatedly draining zero-in-degree nodes.
/// Writes `node.level` and `state.max_level`. Errors on cycles.
pub fn topo_levels(state: &mut DagState) -> Result<Vec<Wave>> {
    let mut in_deg: BTreeMap<String, usize> = state
        .nodes
        .iter()
        .map(|(id, n)| (id.clone(), n.depends_on.len()))
        .collect();

    let mut queue: Vec<String> = in_deg
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(id, _)| id.clone())
        .collect();

    let mut waves: Vec<Wave> = Vec::new();
    let mut processed = 0usize;

    while !queue.is_empty() {
        let level = waves.len();
        let mut next_queue: Vec<String> = Vec::new();

        for id in &queue {
            let node = state.nodes.get_mut(id).expect("queued ids exist");
            node.level = level;
            processed += 1;

            let blocked: Vec<String> = node.blocks.clone();
            for child in blocked {
                let deg = in_deg.get_mut(&child).expect("edges checked at insert");
                *deg -= 1;
                if *deg == 0 {
                    next_queue.push(child);
                }
            }
        }

        waves.push(Wave {
            level,
            nodes: queue.clone(),
        });
        queue = next_queue;
    }

    if processed != state.nodes.len() {
        return Err(WardenError::CycleDetected(format!(
            "processed {processed} of {} nodes",
            state.nodes.len()
        )));
    }

    state.max_level = waves.len().saturating_sub(1);
    Ok(waves)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
