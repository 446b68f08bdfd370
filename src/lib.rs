pub mod algorithms;
pub mod config;
pub mod network;
pub mod protocol;
pub mod transfer;
