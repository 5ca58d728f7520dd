pub mod memory;
pub mod relay;
pub mod sink;
pub mod trace;

pub use memory::*;
pub use relay::*;
pub use sink::*;
pub use trace::*;
