//! # Docflow Core
//!
//! Rust core of the contractor-management document approval workflow engine:
//! a multi-stage, SLA-bound approval pipeline with escalation, queue
//! assignment, and an immutable audit trail.
//!
//! ## Architecture
//!
//! The [`engine::ApprovalEngine`] orchestrates every state transition. It
//! reads stage configuration, validates decisions, and hands the storage
//! layer one atomic transition per operation — workflow update, stage
//! sub-records, queue-item compare-and-set, and history append land together
//! or not at all. Document lookup, approver resolution, and notification
//! delivery are injected capabilities ([`collaborators`]).
//!
//! ## Module Organization
//!
//! - [`models`] - Workflow, stage, queue-item, and history records plus the
//!   stage configuration store
//! - [`state_machine`] - Status vocabulary and the legal-transition table
//! - [`engine`] - Initiation, decision processing, queries, and the
//!   escalation sweeper
//! - [`storage`] - The atomic-transition store contract with Postgres and
//!   in-memory backends
//! - [`collaborators`] - Injected document/approver/notification capabilities
//! - [`web`] - Axum handlers exposing the engine over HTTP
//! - [`config`] - Environment-driven service configuration
//! - [`error`] - Structured error kinds
//!
//! ## Concurrency
//!
//! Independent HTTP callers share no coordination; correctness rests on the
//! storage contract. Concurrent decisions on one workflow race on the queue
//! item's `pending -> completed` compare-and-set, and the loser observes an
//! authorization error rather than a double-applied stage.

pub mod collaborators;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod models;
pub mod state_machine;
pub mod storage;
pub mod web;

pub use config::DocflowConfig;
pub use engine::ApprovalEngine;
pub use error::{ActiveWorkflowRef, EngineError, Result};
pub use state_machine::{
    HistoryAction, PriorityLevel, QueueItemStatus, StageStatus, WorkflowStatus,
};
