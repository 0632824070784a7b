pub mod agent;
pub mod analyzer;
pub mod directives;
pub mod llm_client;
pub mod material;
pub mod path;
pub mod session;
pub mod skills;
pub mod store;
pub mod student;
pub mod style;
pub mod summary;
