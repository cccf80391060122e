mod codec;
mod header;
mod messages;

pub use codec::*;
pub use header::*;
pub use messages::*;
