//! Ownership and role guards.
//!
//! Pure functions over an [`Actor`] and resource attributes; decisions are
//! made from the arguments alone, with no storage or clock access. Callers
//! load the resource first, so "does not exist" and "exists but not yours"
//! stay distinguishable.

use crate::domain::{Actor, Role};

/// Authorization failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    #[error("user {actor} does not own this resource (owner: {owner})")]
    NotOwner { actor: i64, owner: i64 },

    #[error("operation requires the seller role (actor role: {role})")]
    SellerRequired { role: Role },
}

/// Allow only the resource owner through.
pub fn ensure_owner(actor: &Actor, owner_id: i64) -> Result<(), GuardError> {
    if actor.user_id == owner_id {
        Ok(())
    } else {
        Err(GuardError::NotOwner {
            actor: actor.user_id,
            owner: owner_id,
        })
    }
}

/// Allow only sellers through.
pub fn ensure_seller(actor: &Actor) -> Result<(), GuardError> {
    match actor.role {
        Role::Seller => Ok(()),
        Role::Buyer => Err(GuardError::SellerRequired { role: actor.role }),
    }
}
