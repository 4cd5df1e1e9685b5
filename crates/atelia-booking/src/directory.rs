//! Identity and catalog lookups the workflow depends on.
//!
//! The booking core does not own users or services; it only needs to
//! check that referenced identities exist, resolve display names for
//! notification text, and read the offering (duration and price) a
//! provider advertises for a service. [`Directory`] is the seam to the
//! owning system; [`InMemoryDirectory`] backs tests and examples.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use atelia_core::{ServiceId, UserId};

use crate::error::Result;

/// What a provider advertises for one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offering {
    /// Advertised duration in minutes, if the provider publishes one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    /// Advertised price, if the provider publishes one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
}

/// Read-only lookups into the identity and catalog system.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Returns true if the user exists (any role).
    async fn user_exists(&self, user: UserId) -> Result<bool>;

    /// Returns true if the user exists and is a provider.
    async fn provider_exists(&self, user: UserId) -> Result<bool>;

    /// Returns true if the user exists and holds operator privileges.
    async fn is_operator(&self, user: UserId) -> Result<bool>;

    /// Returns true if the service exists in the catalog.
    async fn service_exists(&self, service: ServiceId) -> Result<bool>;

    /// Resolves a user's display name for notification text.
    async fn display_name(&self, user: UserId) -> Result<Option<String>>;

    /// Returns the provider's offering for a service, if they offer it.
    async fn offering(&self, provider: UserId, service: ServiceId) -> Result<Option<Offering>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Requester,
    Provider,
    Operator,
}

#[derive(Debug, Clone)]
struct UserRecord {
    name: String,
    role: Role,
}

/// In-memory directory for tests and examples.
///
/// Populate with the `add_*` methods before sharing; lookups afterwards
/// are read-only.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    users: HashMap<UserId, UserRecord>,
    services: HashMap<ServiceId, String>,
    offerings: HashMap<(UserId, ServiceId), Offering>,
}

impl InMemoryDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plain user, returning the generated ID.
    pub fn add_user(&mut self, name: impl Into<String>) -> UserId {
        self.add_with_role(name, Role::Requester)
    }

    /// Registers a provider, returning the generated ID.
    pub fn add_provider(&mut self, name: impl Into<String>) -> UserId {
        self.add_with_role(name, Role::Provider)
    }

    /// Registers an operator, returning the generated ID.
    pub fn add_operator(&mut self, name: impl Into<String>) -> UserId {
        self.add_with_role(name, Role::Operator)
    }

    /// Registers a catalog service, returning the generated ID.
    pub fn add_service(&mut self, name: impl Into<String>) -> ServiceId {
        let id = ServiceId::generate();
        self.services.insert(id, name.into());
        id
    }

    /// Advertises a service for a provider.
    pub fn add_offering(
        &mut self,
        provider: UserId,
        service: ServiceId,
        duration_minutes: Option<u32>,
        price: Option<Decimal>,
    ) {
        self.offerings.insert(
            (provider, service),
            Offering {
                duration_minutes,
                price,
            },
        );
    }

    fn add_with_role(&mut self, name: impl Into<String>, role: Role) -> UserId {
        let id = UserId::generate();
        self.users.insert(
            id,
            UserRecord {
                name: name.into(),
                role,
            },
        );
        id
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn user_exists(&self, user: UserId) -> Result<bool> {
        Ok(self.users.contains_key(&user))
    }

    async fn provider_exists(&self, user: UserId) -> Result<bool> {
        Ok(self
            .users
            .get(&user)
            .is_some_and(|record| record.role == Role::Provider))
    }

    async fn is_operator(&self, user: UserId) -> Result<bool> {
        Ok(self
            .users
            .get(&user)
            .is_some_and(|record| record.role == Role::Operator))
    }

    async fn service_exists(&self, service: ServiceId) -> Result<bool> {
        Ok(self.services.contains_key(&service))
    }

    async fn display_name(&self, user: UserId) -> Result<Option<String>> {
        Ok(self.users.get(&user).map(|record| record.name.clone()))
    }

    async fn offering(&self, provider: UserId, service: ServiceId) -> Result<Option<Offering>> {
        Ok(self.offerings.get(&(provider, service)).copied())
    }
}
