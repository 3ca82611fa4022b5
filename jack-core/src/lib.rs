//! Jack Core
//!
//! Core types shared by the Jack crates.
//!
//! This crate contains:
//! - Domain types: the ad hoc build, job metadata, execution targets, log events
//! - DTOs: the build server's JSON payloads and their conversion into domain types

pub mod domain;
pub mod dto;
