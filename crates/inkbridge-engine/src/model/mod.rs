/*!
 * # Document Model
 *
 * The rich-text tree the rest of the engine keeps the surface in sync with.
 *
 * - **`node`**: persistent `Rc` tree of elements and text leaves
 * - **`path`**: path, point and range arithmetic including operation transforms
 * - **`operation`**: primitive invertible mutations
 * - **`editor`**: the mutation entry point with its apply-hook chain, queries
 *   and normalization
 * - **`transforms`**: selection and text editing built from operations
 * - **`history`**: undo/redo recorded through an apply hook
 *
 * Every committed change flows through [`Editor::apply`]. Hooks registered with
 * [`Editor::add_hook`] see each operation before and after it lands, which is
 * how the identity registry migrates keys and how history records batches.
 */

pub mod editor;
pub mod history;
pub mod node;
pub mod operation;
pub mod path;
pub mod transforms;

pub use editor::{ApplyHook, Editor};
pub use history::{Batch, History, HistoryRecorder, SharedHistory};
pub use node::{Element, Node, NodeRef, Properties, Text};
pub use operation::Operation;
pub use path::{Affinity, Path, Point, Range};
pub use transforms::{Direction, Edge, Unit};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("No node at path {0:?}")]
    InvalidPath(Path),
    #[error("Node at path {0:?} is not a text leaf")]
    NotText(Path),
    #[error("Offset {offset} is out of bounds at path {path:?}")]
    OffsetOutOfBounds { path: Path, offset: usize },
    #[error("Cannot merge node at {0:?} into a sibling of a different kind")]
    MismatchedMerge(Path),
}
