//! Unit tests for safedb
//!
//! Pure logic tests that need no database tools and no network.

mod storage;
