/*!
 * # inkbridge engine
 *
 * Keeps a tree-shaped rich-text model and a native editable surface
 * consistent while either side changes.
 *
 * - **`registry`**: stable keys for model nodes, child back-links and
 *   node/element bindings
 * - **`mapper`**: model points and ranges to surface positions and back
 * - **`sync`**: selection and focus reconciliation with echo suppression
 * - **`input`**: structured input intents and the fallback hotkey table
 * - **`transfer`**: fragment encoding for clipboard and drag payloads
 * - **`editable`**: the host-facing surface wiring all of the above together
 *
 * The document model (`model`), the in-memory surface (`surface`) and the
 * renderer (`render`) are the minimal stand-ins the engine runs against.
 */

pub mod capabilities;
pub mod editable;
pub mod error;
pub mod input;
pub mod mapper;
pub mod model;
pub mod registry;
pub mod render;
pub mod schedule;
pub mod surface;
pub mod sync;
pub mod transfer;

// Re-export key types for easier usage
pub use capabilities::Capabilities;
pub use editable::{Editable, EditableOptions};
pub use error::{EngineError, TransferError};
pub use input::{BeforeInputEvent, EditCommand, InputData, InputIntent, KeyEvent};
pub use mapper::Mapper;
pub use model::{Editor, Node, NodeRef, Operation, Path, Point, Range};
pub use registry::{Key, Registry};
pub use surface::{NativeSelection, Surface, SurfaceId, SurfacePosition, SurfaceRange};
pub use sync::{SyncState, Synchronizer};
pub use transfer::TransferPayload;
