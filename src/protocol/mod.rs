pub mod handlers;
pub mod host;
pub mod routing_table;
pub mod types;

pub use handlers::*;
pub use host::*;
pub use routing_table::*;
pub use types::*;
