//! Shotwatch Core - Domain types, ports and configuration
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `FileRecord`, `PermissionGrant`, `WatchedDirectory`
//!   and validated newtypes
//! - **Port definitions** - Traits for adapters: `IRemoteStore`, `IRecordIndex`
//! - **Configuration** - YAML-backed settings shared by every crate
//!
//! # Architecture
//!
//! The domain module contains pure types with no I/O beyond path checks.
//! Ports define trait interfaces that adapter crates implement. The
//! reconciliation engine in `shotwatch-sync` drives both ports.

pub mod config;
pub mod domain;
pub mod ports;
