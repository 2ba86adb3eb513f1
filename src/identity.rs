//! Caller identity as resolved by the upstream identity provider.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::{Result, SettlementError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role { Admin, Seller, User }

impl std::str::FromStr for Role {
    type Err = SettlementError;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Self::Admin),
            "SELLER" => Ok(Self::Seller),
            "USER" => Ok(Self::User),
            _ => Err(SettlementError::Unauthenticated),
        }
    }
}

/// The authenticated caller. Sellers are identified by the id their order
/// groups carry as `seller_id`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn buyer(id: Uuid) -> Self { Self { id, role: Role::User } }
    pub fn seller(id: Uuid) -> Self { Self { id, role: Role::Seller } }
    pub fn admin(id: Uuid) -> Self { Self { id, role: Role::Admin } }

    pub fn is_admin(&self) -> bool { self.role == Role::Admin }

    /// Sellers may only act on their own groups; admins on any.
    pub fn ensure_manages(&self, seller_id: Uuid) -> Result<()> {
        match self.role {
            Role::Admin => Ok(()),
            Role::Seller if self.id == seller_id => Ok(()),
            _ => Err(SettlementError::Forbidden),
        }
    }

    /// Buyers may only see their own orders; admins any.
    pub fn ensure_owns(&self, buyer_id: Uuid) -> Result<()> {
        if self.is_admin() || self.id == buyer_id { Ok(()) } else { Err(SettlementError::Forbidden) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seller_scope() {
        let seller = Uuid::new_v4();
        assert!(Actor::seller(seller).ensure_manages(seller).is_ok());
        assert!(Actor::seller(seller).ensure_manages(Uuid::new_v4()).is_err());
        assert!(Actor::buyer(seller).ensure_manages(seller).is_err());
        assert!(Actor::admin(Uuid::new_v4()).ensure_manages(seller).is_ok());
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("seller".parse::<Role>().unwrap(), Role::Seller);
        assert!("root".parse::<Role>().is_err());
    }
}
