//! Persistent, incrementally refreshable index over the files beneath a
//! root directory, keyed both by relative path and by content hash.
//!
//! The engine keeps its records in an embedded ordered KV store and
//! reconciles prior snapshots with the filesystem through a sequence-based
//! mark-and-sweep refresh. On top of the engine sit duplicate detection
//! within one tree and content intersection between two trees.

pub mod codec;
pub mod dedup;
pub mod engine;
pub mod hasher;
pub mod intersect;
pub mod logging;
pub mod path_utils;
pub mod records;
pub mod store;
pub mod walker;
