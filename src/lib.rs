//! campus-forum - discussion forum of a course-management platform
//!
//! Posts are scoped to courses (or a global board), ranked by a heat score
//! that blends time-decayed engagement with freshness, and kept consistent
//! as users like, collect, comment and delete.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
