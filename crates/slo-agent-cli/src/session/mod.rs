pub mod message_serialize;
pub mod session;
pub mod session_file;

pub use session::Session;
