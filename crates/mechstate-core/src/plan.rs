//! Path planning over the state graph.
//!
//! Pure functions from (graph, start, goal) to candidate paths: no machine
//! state is read or written here, which keeps the planner independently
//! testable. The graphs are small, static and human-authored (tens of
//! states), so exhaustive enumeration of simple paths followed by a
//! minimum-length selection is both simpler and fast enough; planning also
//! only runs when a plan goes stale, never every tick.

use crate::graph::StateGraph;
use crate::id::StateId;

/// Enumerate every simple path (no repeated state) from `start` to `goal`,
/// walking the `targets` relation depth-first in edge-insertion order.
///
/// A path is recorded as soon as it first reaches `goal`; traversal never
/// continues past the goal or revisits a state already on the path-so-far.
/// `start == goal` yields the single trivial path `[start]`.
pub fn enumerate_paths(graph: &StateGraph, start: StateId, goal: StateId) -> Vec<Vec<StateId>> {
    let mut found = Vec::new();
    if !graph.contains(start) || !graph.contains(goal) {
        return found;
    }
    if start == goal {
        found.push(vec![start]);
        return found;
    }
    let mut path = vec![start];
    walk(graph, goal, &mut path, &mut found);
    found
}

fn walk(graph: &StateGraph, goal: StateId, path: &mut Vec<StateId>, found: &mut Vec<Vec<StateId>>) {
    let here = *path.last().expect("walk called with empty path");
    for &next in graph.targets_of(here) {
        if path.contains(&next) {
            // Cycle guard: simple paths only.
            continue;
        }
        if next == goal {
            let mut complete = path.clone();
            complete.push(next);
            found.push(complete);
            continue;
        }
        path.push(next);
        walk(graph, goal, path, found);
        path.pop();
    }
}

/// The shortest path from `start` to `goal`, or `None` if the goal is
/// unreachable through the transition relation.
///
/// Among equal-length candidates the first one found wins. Discovery order
/// is the depth-first order of [`enumerate_paths`], which follows
/// edge-insertion order; for a statically assembled graph this tie-break is
/// deterministic across runs.
pub fn shortest_path(graph: &StateGraph, start: StateId, goal: StateId) -> Option<Vec<StateId>> {
    let mut best: Option<Vec<StateId>> = None;
    for candidate in enumerate_paths(graph, start, goal) {
        match &best {
            Some(current) if candidate.len() >= current.len() => {}
            _ => best = Some(candidate),
        }
    }
    best
}
