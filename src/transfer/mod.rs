pub mod packet;
pub mod receiver;
pub mod sender;

pub use packet::*;
pub use receiver::*;
pub use sender::*;

#[cfg(test)]
mod tests;
