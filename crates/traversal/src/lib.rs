//! Algorithms that run against any graph implementing the capabilities they
//! ask for, plus decorator graphs layered over other graphs.

pub mod ball;
pub mod explore;
pub mod reduction;
pub mod sort;
pub mod topo;
pub mod transfer;
pub mod wrappers;

pub use ball::{Ball, BallNode};
pub use explore::{bfs, dfs, paths_between, Flow};
pub use reduction::transitive_reduction;
pub use sort::{sort_nodes, SortKey};
pub use topo::topo_sort;
pub use transfer::{break_cycles, reachable, transfer};
pub use wrappers::{Filtered, Inverted, InvertedDimension};
