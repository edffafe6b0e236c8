pub mod chunk;
pub mod controller;
pub mod engine;
pub mod fetch;
pub mod layer;
pub mod oracle;
pub mod priority;
pub mod protocol;
pub mod registry;
pub mod source;
pub mod transformed;
pub mod view;

pub use chunk::*;
pub use controller::*;
pub use engine::*;
pub use fetch::*;
pub use layer::*;
pub use oracle::*;
pub use priority::*;
pub use registry::*;
pub use source::*;
pub use transformed::*;
pub use view::*;
