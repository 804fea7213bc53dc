//! EduBot core library: webhook handling, intent matching, knowledge store, fallback
//! completions, and the HTTP gateway used by the CLI.

pub mod channels;
pub mod config;
pub mod fallback;
pub mod gateway;
pub mod init;
pub mod knowledge;
pub mod llm;
pub mod matcher;
pub mod reply;
pub mod resolver;
pub mod webhook;
