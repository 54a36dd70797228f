//! Interactive chat loop for Parley.
//!
//! The loop drives a [`SessionController`]: user input and backend results
//! arrive on separate channels, so the prompt stays usable (and chats can be
//! switched) while a reply is outstanding. Entry point:
//! `loop_runner::run_chat_loop`.
//!
//! [`SessionController`]: parley_core::session::controller::SessionController

pub mod commands;
pub mod input;
pub mod loop_runner;
