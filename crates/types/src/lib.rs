pub mod event;
pub mod ids;
pub mod name;

pub use event::{StreamEvent, StreamEventHandler};
pub use ids::NodeId;
pub use name::{Attribute, QName};
