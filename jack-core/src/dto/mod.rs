//! Data Transfer Objects for the build server's JSON API
//!
//! These mirror the subset of the server's `api/json` payloads that Jack
//! reads. Unknown fields are ignored so payloads from newer servers parse.

pub mod job;
pub mod node;
