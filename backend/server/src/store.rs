//! Accounts and driver profiles.
use std::collections::HashMap;

use async_trait::async_trait;
use redis::{AsyncCommands, RedisError, aio::ConnectionManager};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    database::keys,
    models::{Driver, User},
};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Phone number already registered")]
    PhoneTaken,

    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    #[error("Corrupt record: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Value at {0} is not a counter")]
    NotAnInteger(String),
}

#[async_trait]
pub trait Repository: Send + Sync {
    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn user_by_phone(&self, phone: &str) -> Result<Option<User>, StoreError>;

    /// Creates the account, and its driver profile when given.
    /// Fails with [`StoreError::PhoneTaken`] if the phone already has an account.
    async fn insert_user(&self, user: &User, driver: Option<&Driver>) -> Result<(), StoreError>;

    async fn save_user(&self, user: &User) -> Result<(), StoreError>;

    /// Deletes the account and its driver profile. Returns whether it existed.
    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn driver_by_id(&self, id: Uuid) -> Result<Option<Driver>, StoreError>;

    async fn driver_by_user(&self, user_id: Uuid) -> Result<Option<Driver>, StoreError>;

    async fn save_driver(&self, driver: &Driver) -> Result<(), StoreError>;
}

pub struct RedisRepository {
    connection: ConnectionManager,
}

impl RedisRepository {
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    async fn load<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        let mut conn = self.connection.clone();
        let raw: Option<String> = conn.get(key).await?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn load_id(&self, key: &str) -> Result<Option<Uuid>, StoreError> {
        let mut conn = self.connection.clone();
        let raw: Option<String> = conn.get(key).await?;

        // a dangling or garbled index reads as missing
        Ok(raw.and_then(|raw| Uuid::parse_str(&raw).ok()))
    }
}

#[async_trait]
impl Repository for RedisRepository {
    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        self.load(&keys::user(id)).await
    }

    async fn user_by_phone(&self, phone: &str) -> Result<Option<User>, StoreError> {
        match self.load_id(&keys::user_phone(phone)).await? {
            Some(id) => self.user_by_id(id).await,
            None => Ok(None),
        }
    }

    async fn insert_user(&self, user: &User, driver: Option<&Driver>) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let phone_key = keys::user_phone(&user.phone);

        let claimed: bool = conn.set_nx(&phone_key, user.id.to_string()).await?;
        if !claimed {
            return Err(StoreError::PhoneTaken);
        }

        let mut pipe = redis::pipe();
        pipe.atomic()
            .set(keys::user(user.id), serde_json::to_string(user)?)
            .ignore();

        if let Some(driver) = driver {
            pipe.set(keys::driver(driver.id), serde_json::to_string(driver)?)
                .ignore()
                .set(keys::driver_user(user.id), driver.id.to_string())
                .ignore();
        }

        if let Err(e) = pipe.query_async::<()>(&mut conn).await {
            // release the phone so the signup can be retried
            let _ = conn.del::<_, ()>(&phone_key).await;
            return Err(e.into());
        }

        Ok(())
    }

    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        conn.set::<_, _, ()>(keys::user(user.id), serde_json::to_string(user)?)
            .await?;

        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError> {
        let Some(user) = self.user_by_id(id).await? else {
            return Ok(false);
        };

        let mut pipe = redis::pipe();
        pipe.atomic()
            .del(keys::user(id))
            .ignore()
            .del(keys::user_phone(&user.phone))
            .ignore();

        if let Some(driver_id) = self.load_id(&keys::driver_user(id)).await? {
            pipe.del(keys::driver(driver_id))
                .ignore()
                .del(keys::driver_user(id))
                .ignore();
        }

        let mut conn = self.connection.clone();
        pipe.query_async::<()>(&mut conn).await?;

        Ok(true)
    }

    async fn driver_by_id(&self, id: Uuid) -> Result<Option<Driver>, StoreError> {
        self.load(&keys::driver(id)).await
    }

    async fn driver_by_user(&self, user_id: Uuid) -> Result<Option<Driver>, StoreError> {
        match self.load_id(&keys::driver_user(user_id)).await? {
            Some(id) => self.driver_by_id(id).await,
            None => Ok(None),
        }
    }

    async fn save_driver(&self, driver: &Driver) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        conn.set::<_, _, ()>(keys::driver(driver.id), serde_json::to_string(driver)?)
            .await?;

        Ok(())
    }
}

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    phones: HashMap<String, Uuid>,
    drivers: HashMap<Uuid, Driver>,
    driver_by_user: HashMap<Uuid, Uuid>,
}

#[derive(Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn user_by_phone(&self, phone: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;

        Ok(tables
            .phones
            .get(phone)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn insert_user(&self, user: &User, driver: Option<&Driver>) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;

        if tables.phones.contains_key(&user.phone) {
            return Err(StoreError::PhoneTaken);
        }

        tables.phones.insert(user.phone.clone(), user.id);
        tables.users.insert(user.id, user.clone());

        if let Some(driver) = driver {
            tables.driver_by_user.insert(user.id, driver.id);
            tables.drivers.insert(driver.id, driver.clone());
        }

        Ok(())
    }

    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        self.tables.write().await.users.insert(user.id, user.clone());

        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;

        let Some(user) = tables.users.remove(&id) else {
            return Ok(false);
        };

        tables.phones.remove(&user.phone);
        if let Some(driver_id) = tables.driver_by_user.remove(&id) {
            tables.drivers.remove(&driver_id);
        }

        Ok(true)
    }

    async fn driver_by_id(&self, id: Uuid) -> Result<Option<Driver>, StoreError> {
        Ok(self.tables.read().await.drivers.get(&id).cloned())
    }

    async fn driver_by_user(&self, user_id: Uuid) -> Result<Option<Driver>, StoreError> {
        let tables = self.tables.read().await;

        Ok(tables
            .driver_by_user
            .get(&user_id)
            .and_then(|id| tables.drivers.get(id))
            .cloned())
    }

    async fn save_driver(&self, driver: &Driver) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .drivers
            .insert(driver.id, driver.clone());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use lupad_types::{AuthMethod, UserType};

    use super::*;
    use crate::models::Vehicle;

    fn customer(phone: &str) -> User {
        User::new(
            phone.to_string(),
            "Maria".to_string(),
            None,
            UserType::Customer,
            None,
            AuthMethod::Otp,
        )
    }

    #[tokio::test]
    async fn test_phone_is_unique() {
        let repo = MemoryRepository::new();

        repo.insert_user(&customer("+639171234567"), None).await.unwrap();

        assert!(matches!(
            repo.insert_user(&customer("+639171234567"), None).await,
            Err(StoreError::PhoneTaken)
        ));
    }

    #[tokio::test]
    async fn test_delete_cascades_to_driver() {
        let repo = MemoryRepository::new();
        let mut user = customer("+639181234567");
        user.user_type = UserType::Driver;

        let driver = Driver::new(
            user.id,
            Vehicle {
                vehicle_type: "sedan".to_string(),
                license_number: "N01-23-456789".to_string(),
                plate_number: "NAB 1234".to_string(),
            },
        );
        repo.insert_user(&user, Some(&driver)).await.unwrap();

        assert_eq!(
            repo.driver_by_user(user.id).await.unwrap().map(|d| d.id),
            Some(driver.id)
        );

        assert!(repo.delete_user(user.id).await.unwrap());
        assert!(repo.driver_by_id(driver.id).await.unwrap().is_none());
        assert!(repo.user_by_phone(&user.phone).await.unwrap().is_none());
        assert!(!repo.delete_user(user.id).await.unwrap());

        // phone is free again
        repo.insert_user(&customer("+639181234567"), None).await.unwrap();
    }
}
