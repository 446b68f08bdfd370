pub mod simulator;
pub mod topology;

pub use simulator::*;
pub use topology::*;
