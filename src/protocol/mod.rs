//! Command protocol: registry, response documents, and dispatch.

pub mod command;
pub mod dispatcher;
pub mod document;

pub use command::{Command, Privilege};
pub use dispatcher::CommandDispatcher;
pub use document::{Document, Field, Row, Rowset};
