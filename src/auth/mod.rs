//! Authentication and authorization primitives.
//!
//! Three small, independent pieces:
//! - `guard`: pure ownership/role checks, no I/O
//! - `token`: compact signed bearer tokens
//! - `password`: salted password digests

pub mod guard;
pub mod password;
pub mod token;

pub use guard::{ensure_owner, ensure_seller, GuardError};
pub use password::{hash_password, verify_password};
pub use token::{TokenError, TokenSigner};
