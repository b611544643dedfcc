//! Caller identity. Authentication happens upstream; requests reach this
//! service with the user id already established.

pub mod middleware;
