//! Bounded bidirectional neighbourhood around an origin node.

use std::{
    any::Any,
    collections::{HashMap, HashSet, VecDeque},
    sync::Arc,
};

use parking_lot::{Mutex, RwLock};
use shared::{
    error::Result,
    protocol::{
        downcast_node, require, stable_fingerprint, Capability, Directed, Graph, GraphRef, Meta,
        Node, NodeRef,
    },
};

/// A node of the inner graph tagged with its signed distance from the
/// origin: positive along outgoing edges, negative along incoming ones.
#[derive(Debug, Clone)]
pub struct BallNode {
    pub distance: i64,
    pub inner: NodeRef,
}

impl Node for BallNode {
    fn fingerprint(&self) -> String {
        self.inner.fingerprint()
    }

    fn label(&self) -> String {
        format!("{:+} {}", self.distance, self.inner.label())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Decorator limiting a directed graph to nodes within `radius` steps of
/// `origin`. The first distance recorded for a fingerprint is kept for the
/// lifetime of the ball, even when a shorter route is found later.
pub struct Ball {
    inner: RwLock<GraphRef>,
    origin: NodeRef,
    radius: u32,
    seen: Mutex<HashMap<String, i64>>,
}

impl Ball {
    pub fn new(origin: NodeRef, inner: GraphRef, radius: u32) -> Result<Self> {
        require(inner.as_directed(), Capability::Directed, inner.as_ref())?;
        let key = stable_fingerprint(&origin)?;
        Ok(Self {
            inner: RwLock::new(inner),
            origin,
            radius,
            seen: Mutex::new(HashMap::from([(key, 0)])),
        })
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    fn wrap(&self, candidates: Vec<NodeRef>, distance: i64) -> Result<Vec<NodeRef>> {
        let mut seen = self.seen.lock();
        let mut wrapped = Vec::with_capacity(candidates.len());
        for inner in candidates {
            let key = stable_fingerprint(&inner)?;
            let distance = match seen.get(&key) {
                Some(first) => *first,
                None if distance.unsigned_abs() > u64::from(self.radius) => continue,
                None => {
                    seen.insert(key, distance);
                    distance
                }
            };
            wrapped.push(Arc::new(BallNode { distance, inner }) as NodeRef);
        }
        Ok(wrapped)
    }

    fn step(&self, node: &NodeRef, forward: bool) -> Result<Vec<NodeRef>> {
        let ball_node = downcast_node::<BallNode>(node)?;
        let inner = self.inner.read().clone();
        let directed = require(inner.as_directed(), Capability::Directed, inner.as_ref())?;
        let (neighbors, distance) = if forward {
            (directed.outgoing(&ball_node.inner)?, ball_node.distance + 1)
        } else {
            (directed.incoming(&ball_node.inner)?, ball_node.distance - 1)
        };
        self.wrap(neighbors, distance)
    }

    /// Walks the ball in both directions and returns every member once, in
    /// discovery order starting at the origin.
    pub fn members(&self) -> Result<Vec<BallNode>> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        let mut queue: VecDeque<NodeRef> = self.home_nodes()?.into();
        while let Some(node) = queue.pop_front() {
            if !visited.insert(stable_fingerprint(&node)?) {
                continue;
            }
            let ball_node = downcast_node::<BallNode>(&node)?.clone();
            queue.extend(self.step(&node, true)?);
            queue.extend(self.step(&node, false)?);
            out.push(ball_node);
        }
        Ok(out)
    }
}

impl Graph for Ball {
    fn name(&self) -> String {
        format!("ball({}, {})", self.inner.read().name(), self.radius)
    }

    fn home_nodes(&self) -> Result<Vec<NodeRef>> {
        Ok(vec![Arc::new(BallNode {
            distance: 0,
            inner: self.origin.clone(),
        })])
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_directed(&self) -> Option<&dyn Directed> {
        Some(self)
    }

    fn as_meta(&self) -> Option<&dyn Meta> {
        Some(self)
    }
}

impl Directed for Ball {
    fn incoming(&self, node: &NodeRef) -> Result<Vec<NodeRef>> {
        self.step(node, false)
    }

    fn outgoing(&self, node: &NodeRef) -> Result<Vec<NodeRef>> {
        self.step(node, true)
    }
}

impl Meta for Ball {
    fn get(&self) -> GraphRef {
        self.inner.read().clone()
    }

    /// Swapping the inner graph invalidates recorded distances.
    fn set(&self, inner: GraphRef) {
        *self.inner.write() = inner;
        let mut seen = self.seen.lock();
        seen.clear();
        if let Ok(key) = stable_fingerprint(&self.origin) {
            seen.insert(key, 0);
        }
    }
}

#[cfg(test)]
#[path = "tests/ball_tests.rs"]
mod tests;
