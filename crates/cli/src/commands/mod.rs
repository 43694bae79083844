pub mod chat;
pub mod classify;
pub mod config_cmd;
pub mod prompts;
pub mod serve;
