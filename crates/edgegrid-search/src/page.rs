//! Search result shapes.

use edgegrid_core::EdgeCluster;
use serde::{Deserialize, Serialize};

/// A record paired with its cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub cursor: String,
    pub node: EdgeCluster,
}

impl From<EdgeCluster> for Edge {
    fn from(node: EdgeCluster) -> Self {
        Self {
            cursor: node.id.clone(),
            node,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub edges: Vec<Edge>,
    /// Matching records before cursors and limits were applied.
    pub total_count: usize,
    pub page_info: PageInfo,
}

impl Page {
    /// The records on this page, in page order.
    pub fn nodes(&self) -> impl Iterator<Item = &EdgeCluster> {
        self.edges.iter().map(|edge| &edge.node)
    }
}
