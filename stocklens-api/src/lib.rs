//! # StockLens API Server
//!
//! HTTP API for token-metered inventory counting. Users photograph a
//! shelf, pay a fixed token cost per analysis, review the recognized
//! (label, count) pairs, and persist the ones they accept. History can be
//! selected and exported as an XLSX workbook.
//!
//! ## Module Organization
//!
//! - `app`: Router assembly, state, and authentication middleware
//! - `config`: Environment-driven configuration
//! - `error`: Unified API error type and HTTP mappings
//! - `workflow`: The counting workflow orchestrator
//! - `recognition`: Vision model gateway
//! - `storage`: Best-effort photo uploads
//! - `store`: Inventory record persistence
//! - `export`: Selection and XLSX rendering
//! - `routes`: HTTP handlers

pub mod app;
pub mod config;
pub mod error;
pub mod export;
pub mod recognition;
pub mod routes;
pub mod storage;
pub mod store;
pub mod workflow;
