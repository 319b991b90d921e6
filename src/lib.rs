//! Poll Assistant - conversational flow engine for a polling chat assistant
//!
//! Users create, edit, browse and vote on polls through free-form chat. The
//! engine classifies each message, keeps per-user multi-step state, drives
//! one flow per task and renders deterministic replies, optionally polished
//! by a rate-limited generative backend.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
