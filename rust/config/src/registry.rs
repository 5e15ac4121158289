use parking_lot::Mutex;
use std::{
    any::{type_name, Any, TypeId},
    collections::HashMap,
    sync::Arc,
};
use tessera_error::{ErrorCodes, TesseraError};
use thiserror::Error;

pub trait Injectable: Any + Send + Sync + Clone {}

/// Holds the capabilities a component needs but cannot deserialize: remote
/// client handles, embedders, converters. Keyed by type, one value per type.
/// ## Note
/// Values are cloned on retrieval, so register cheap handles (usually an
/// `Arc` wrapped in a newtype) whose clones share state.
#[derive(Default, Clone)]
pub struct Registry {
    storage: Arc<Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>>,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Type [{0}] not found in the registry")]
    TypeNotFound(String),
}

impl TesseraError for RegistryError {
    fn code(&self) -> ErrorCodes {
        ErrorCodes::InvalidArgument
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Injectable>(&self, value: T) {
        let mut storage = self.storage.lock();
        storage.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn get<T: Injectable>(&self) -> Result<T, RegistryError> {
        self.try_get::<T>()
            .ok_or(RegistryError::TypeNotFound(type_name::<T>().to_string()))
    }

    /// Like [`Registry::get`], for capabilities that are optional.
    pub fn try_get<T: Injectable>(&self) -> Option<T> {
        let storage = self.storage.lock();
        storage
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
            .cloned()
    }

    pub fn contains<T: Injectable>(&self) -> bool {
        self.storage.lock().contains_key(&TypeId::of::<T>())
    }
}
