//! ProbHub ingestion: pulls posts from Hacker News and StackExchange, asks an
//! LLM whether each one describes a real problem, and stores the accepted ones
//! as scored, tagged problems in SQLite.

pub mod ai;
pub mod app;
pub mod config;
pub mod connectors;
pub mod db;
pub mod error;
pub mod ingest;
pub mod models;
pub mod scoring;
