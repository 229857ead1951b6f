//! Astro Consult - astrology consultation backend
//!
//! Collects a user's birth details through an LLM-driven triage dialogue,
//! queues them for a live consultation, and answers questions from a small
//! embedded knowledge base.

pub mod analytics;
pub mod api;
pub mod chat;
pub mod db;
pub mod embeddings;
pub mod events;
pub mod knowledge;
pub mod llm;
pub mod moderation;
pub mod queue;
pub mod rag;
pub mod triage;
