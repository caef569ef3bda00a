//! Wire and internal types for the chat-completions surface (spec §3, §6).

mod request;
mod response;
mod stream;
mod tool;

pub use request::*;
pub use response::*;
pub use stream::*;
pub use tool::*;
