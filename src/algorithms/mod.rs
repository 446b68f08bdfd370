pub mod bellman_ford;

pub use bellman_ford::*;
