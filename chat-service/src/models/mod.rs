//! Domain models for the chat service.

pub mod message;
pub mod session;

pub use message::{Message, Role};
pub use session::{Session, TITLE_MAX_CHARS};
