//! Command path - serial bytes to remote command calls.
//!
//! ```text
//! serial reader ─► CommandTokenizer ─► DispatchHandle ─► dispatch task ─► RemoteControl
//! ```
//!
//! Tokens are dispatched strictly one at a time, in the order they were
//! parsed, whatever the outcome of the previous dispatch.

mod queue;
mod tokenizer;

pub use queue::{spawn_dispatch_task, DispatchHandle};
pub use tokenizer::{
    is_single_char_command, CommandTokenizer, MAX_TOKEN_LEN, SINGLE_CHAR_COMMANDS,
    TOKEN_TERMINATORS,
};
