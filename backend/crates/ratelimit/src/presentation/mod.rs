//! Presentation Layer
//!
//! The axum middleware and its response DTOs. Routing itself belongs to the
//! host application; this layer only decorates it.

pub mod dto;
pub mod middleware;
