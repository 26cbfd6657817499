pub mod agent;
pub mod ark;
pub mod baike;
pub mod caller;
pub mod config;
pub mod deepsearch;
pub mod graph;
pub mod llm;
pub mod mode;
pub mod prompts;
pub mod refine;
pub mod stream;
pub mod timeline;
pub mod types;

#[cfg(test)]
pub mod testing;
