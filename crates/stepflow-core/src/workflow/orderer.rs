//! Dependency ordering for workflow steps.
//!
//! Produces a single linear sequence in which every step appears after all of
//! its dependencies. Traversal is an explicit-stack depth-first search over a
//! two-colour mark set, so deep dependency chains do not grow the call stack.
//! Roots are visited in declaration order and dependencies in the order they
//! are declared, which makes the output deterministic for a given input.

use std::collections::HashMap;

use crate::error::ValidationError;
use crate::workflow::schema::Step;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    /// On the current traversal path; meeting it again means a cycle.
    Visiting,
    Visited,
}

/// Validate `steps` and return them in execution order.
///
/// Checks run in this order: duplicate ids, dangling dependencies, cycles.
pub fn order_steps(steps: &[Step]) -> Result<Vec<&Step>, ValidationError> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(steps.len());
    for (i, step) in steps.iter().enumerate() {
        if index.insert(step.id.as_str(), i).is_some() {
            return Err(ValidationError::DuplicateStepId(step.id.clone()));
        }
    }

    let mut edges: Vec<Vec<usize>> = Vec::with_capacity(steps.len());
    for step in steps {
        let mut deps = Vec::with_capacity(step.depends_on.len());
        for dep in &step.depends_on {
            match index.get(dep.as_str()) {
                Some(&i) => deps.push(i),
                None => {
                    return Err(ValidationError::UnknownDependency {
                        step: step.id.clone(),
                        dependency: dep.clone(),
                    })
                }
            }
        }
        edges.push(deps);
    }

    let mut marks = vec![Mark::Unvisited; steps.len()];
    let mut order = Vec::with_capacity(steps.len());
    // (step index, next dependency to look at)
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for root in 0..steps.len() {
        if marks[root] != Mark::Unvisited {
            continue;
        }
        marks[root] = Mark::Visiting;
        stack.push((root, 0));

        while let Some(frame) = stack.last_mut() {
            let (node, cursor) = *frame;
            if cursor < edges[node].len() {
                frame.1 += 1;
                let dep = edges[node][cursor];
                match marks[dep] {
                    Mark::Unvisited => {
                        marks[dep] = Mark::Visiting;
                        stack.push((dep, 0));
                    }
                    Mark::Visiting => {
                        return Err(ValidationError::CyclicDependency(cycle_path(
                            steps, &stack, dep,
                        )));
                    }
                    Mark::Visited => {}
                }
            } else {
                marks[node] = Mark::Visited;
                order.push(&steps[node]);
                stack.pop();
            }
        }
    }

    tracing::debug!(
        "Ordered {} step(s): {:?}",
        order.len(),
        order.iter().map(|s| s.id.as_str()).collect::<Vec<_>>()
    );
    Ok(order)
}

/// Ids from the first occurrence of `reentered` on the stack to the top, closed
/// by `reentered` again.
fn cycle_path(steps: &[Step], stack: &[(usize, usize)], reentered: usize) -> Vec<String> {
    let start = stack
        .iter()
        .position(|&(node, _)| node == reentered)
        .unwrap_or(0);
    let mut path: Vec<String> = stack[start..]
        .iter()
        .map(|&(node, _)| steps[node].id.clone())
        .collect();
    path.push(steps[reentered].id.clone());
    path
}
