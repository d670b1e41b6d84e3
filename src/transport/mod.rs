pub mod memory;
pub mod traits;
pub mod udp;

pub use memory::*;
pub use traits::*;
pub use udp::*;
