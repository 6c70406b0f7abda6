//! services/api/src/adapters/mod.rs
//!
//! Concrete implementations of the `vital_core` ports against Google's REST
//! surfaces: Identity Toolkit for authentication and Firestore for storage.

pub mod firebase_auth;
pub mod firestore;
pub mod google_token;
