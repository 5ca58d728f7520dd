pub mod decision;
pub mod error;
pub mod event;
pub mod ids;
pub mod listener;
pub mod model;
pub mod types;

pub use decision::*;
pub use error::*;
pub use event::*;
pub use ids::*;
pub use listener::*;
pub use model::*;
pub use types::*;
