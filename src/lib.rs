pub mod agents;
pub mod audit;
pub mod browser;
pub mod cli;
pub mod config;
pub mod container;
pub mod context;
pub mod conversation;
pub mod errors;
pub mod http;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod queue;
pub mod tools;
