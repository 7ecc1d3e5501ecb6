//! Core types for Ldapgate

mod identity;
mod kube;

pub use identity::*;
pub use kube::*;
