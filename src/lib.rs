//! Backend for a single-page timed coding-assignment intake site.
//!
//! Authentication, record persistence, and blob storage are delegated to
//! external platform capabilities behind thin bindings; the core is the
//! session lifecycle controller that drives the candidate's session from
//! `LoggedOut` through `InProgress` to `Finished`.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub mod models {
    pub mod identity;
    pub mod session;
}

pub mod platform {
    pub mod blobs;
    pub mod documents;
    pub mod identity;
    pub mod memory;
    pub mod notify;
    pub mod redis;
}

pub mod session {
    pub mod controller;
}

pub mod handlers {
    pub mod auth;
    pub mod session;
}
