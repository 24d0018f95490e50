use thiserror::Error;

use crate::display_object::NodeId;

#[derive(Error, Debug)]
pub enum SceneError {
    #[error("Display object {0} not found")]
    NodeNotFound(NodeId),

    #[error("The root of a document cannot be removed or re-parented")]
    RootNode,

    #[error("Cannot attach {node} under {parent}: it would create a cycle")]
    Cycle { node: NodeId, parent: NodeId },

    #[error("Display object {0} is already attached")]
    AlreadyAttached(NodeId),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
