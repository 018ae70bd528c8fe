mod backend;
mod backends;
mod labels;
mod registry;
mod result;

pub use backend::DetectorBackend;
pub use backends::{ScriptedBackend, StubBackend};
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use labels::{coco_label, COCO_LABELS};
pub use registry::{BackendRegistry, DetectorSettings};
pub use result::{BoundingBox, Detection};
