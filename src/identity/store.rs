use super::types::{Embedding, Identity, IdentityRecord, IdentitySummary, RepresentativeImage};
use crate::error::StoreError;
use crate::persistence::KeyValueStore;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

const IDENTITIES_KEY: &str = "identities";
const COUNTER_KEY: &str = "anonymous_counter";
const RECORD_PREFIX: &str = "identity/";

fn record_key(name: &str) -> String {
    format!("{}{}", RECORD_PREFIX, name)
}

/// Durable set of named identities plus the anonymous-ID counter.
///
/// The store has a single writer. Every mutation persists first and only
/// then updates the in-memory view, so a failed call leaves memory matching
/// the last acknowledged state and can be retried as-is.
pub struct IdentityStore {
    backend: Arc<dyn KeyValueStore>,
    identities: Vec<Identity>,
    anonymous_counter: u64,
    loaded: bool,
}

impl IdentityStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            identities: Vec::new(),
            anonymous_counter: 0,
            loaded: false,
        }
    }

    /// Populate identities and the counter from persistence.
    ///
    /// Only the first call loads; later calls log a warning and return.
    pub async fn load(&mut self) -> Result<(), StoreError> {
        if self.loaded {
            warn!("Identity store already loaded, ignoring repeated load");
            return Ok(());
        }

        let names: Vec<String> = match self.backend.get(IDENTITIES_KEY).await? {
            Some(value) => decode(IDENTITIES_KEY, value)?,
            None => Vec::new(),
        };

        let mut identities: Vec<Identity> = Vec::with_capacity(names.len());
        for name in names {
            if identities.iter().any(|i| i.name == name) {
                warn!("Identity '{}' listed twice, keeping the first entry", name);
                continue;
            }

            let key = record_key(&name);
            let record = match self.backend.get(&key).await? {
                Some(value) => value,
                None => {
                    warn!("Identity '{}' has no stored record, skipping", name);
                    continue;
                }
            };

            match decode::<IdentityRecord>(&key, record) {
                Ok(record) if !record.descriptors.is_empty() => {
                    debug!("Loaded identity: {}", name);
                    identities.push(record.into_identity(name));
                }
                Ok(_) => warn!("Identity '{}' has no descriptors, skipping", name),
                Err(e) => warn!("Skipping identity '{}': {}", name, e),
            }
        }

        let counter = match self.backend.get(COUNTER_KEY).await? {
            Some(value) => decode(COUNTER_KEY, value)?,
            None => 0,
        };

        self.identities = identities;
        self.anonymous_counter = counter;
        self.loaded = true;

        info!(
            "Identity store loaded: {} identities, anonymous counter at {}",
            self.identities.len(),
            self.anonymous_counter
        );
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Identities in insertion order
    pub fn list_identities(&self) -> &[Identity] {
        &self.identities
    }

    pub fn summaries(&self) -> Vec<IdentitySummary> {
        self.identities.iter().map(Identity::summary).collect()
    }

    /// Ordered snapshot of `name -> descriptors`
    pub fn get_embeddings(&self) -> Vec<(String, Vec<Embedding>)> {
        self.identities
            .iter()
            .map(|i| (i.name.clone(), i.descriptors.clone()))
            .collect()
    }

    /// Borrowed `name -> descriptors` view in insertion order, as consumed
    /// by the matcher
    pub fn embeddings(&self) -> impl Iterator<Item = (&str, &[Embedding])> + '_ {
        self.identities
            .iter()
            .map(|i| (i.name.as_str(), i.descriptors.as_slice()))
    }

    pub fn get(&self, name: &str) -> Option<&Identity> {
        self.identities.iter().find(|i| i.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Last issued anonymous ID (0 if none was ever issued)
    pub fn anonymous_counter(&self) -> u64 {
        self.anonymous_counter
    }

    /// Store a new identity.
    ///
    /// The record is written before the name list so the list never points
    /// at a missing record.
    pub async fn add_identity(
        &mut self,
        name: &str,
        descriptors: Vec<Embedding>,
        image: Option<RepresentativeImage>,
    ) -> Result<(), StoreError> {
        self.ensure_loaded()?;
        validate_name(name)?;
        if descriptors.is_empty() {
            return Err(StoreError::EmptyDescriptors {
                name: name.to_string(),
            });
        }
        if self.contains(name) {
            return Err(StoreError::DuplicateName {
                name: name.to_string(),
            });
        }

        let identity = Identity {
            name: name.to_string(),
            descriptors,
            image,
            enrolled_at: Utc::now(),
        };

        self.write_record(&identity).await?;

        let mut names = self.names();
        names.push(identity.name.clone());
        self.write_names(&names).await?;

        info!(
            "Added identity '{}' with {} descriptors",
            identity.name,
            identity.descriptors.len()
        );
        self.identities.push(identity);
        Ok(())
    }

    /// Move an identity's payload to a new name.
    ///
    /// Writes are issued create-new, update list, remove-old: a crash in
    /// between leaves an extra record, never a lost one. The renamed identity
    /// keeps its position in insertion order.
    pub async fn rename_identity(&mut self, old_name: &str, new_name: &str) -> Result<(), StoreError> {
        self.ensure_loaded()?;
        validate_name(new_name)?;
        let position = self
            .position(old_name)
            .ok_or_else(|| StoreError::NotFound {
                name: old_name.to_string(),
            })?;
        if self.contains(new_name) {
            return Err(StoreError::DuplicateName {
                name: new_name.to_string(),
            });
        }

        let mut renamed = self.identities[position].clone();
        renamed.name = new_name.to_string();

        self.write_record(&renamed).await?;

        let mut names = self.names();
        names[position] = renamed.name.clone();
        self.write_names(&names).await?;

        self.identities[position] = renamed;

        if let Err(e) = self.backend.remove(&record_key(old_name)).await {
            warn!(
                "Renamed '{}' to '{}' but the old record could not be removed: {}",
                old_name, new_name, e
            );
        }

        info!("Renamed identity '{}' to '{}'", old_name, new_name);
        Ok(())
    }

    /// Remove an identity from memory and persistence
    pub async fn delete_identity(&mut self, name: &str) -> Result<(), StoreError> {
        self.ensure_loaded()?;
        let position = self.position(name).ok_or_else(|| StoreError::NotFound {
            name: name.to_string(),
        })?;

        let mut names = self.names();
        names.remove(position);
        self.write_names(&names).await?;

        self.identities.remove(position);

        if let Err(e) = self.backend.remove(&record_key(name)).await {
            warn!(
                "Deleted '{}' but its record could not be removed: {}",
                name, e
            );
        }

        info!("Deleted identity '{}'", name);
        Ok(())
    }

    /// Issue the next anonymous ID.
    ///
    /// The value is persisted before it is returned. If the write fails the
    /// value is still consumed, so it can never be handed out twice.
    pub async fn next_anonymous_id(&mut self) -> Result<u64, StoreError> {
        self.ensure_loaded()?;
        let next = self.anonymous_counter + 1;
        self.anonymous_counter = next;

        self.backend.set(COUNTER_KEY, Value::from(next)).await?;

        debug!("Issued anonymous id {}", next);
        Ok(next)
    }

    /// Mutations rewrite the name list and counter wholesale, so they need
    /// the persisted state in memory first
    fn ensure_loaded(&self) -> Result<(), StoreError> {
        if self.loaded {
            Ok(())
        } else {
            Err(StoreError::NotLoaded)
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.identities.iter().position(|i| i.name == name)
    }

    fn names(&self) -> Vec<String> {
        self.identities.iter().map(|i| i.name.clone()).collect()
    }

    async fn write_names(&self, names: &[String]) -> Result<(), StoreError> {
        let value = serde_json::to_value(names).map_err(|e| StoreError::io(IDENTITIES_KEY, e))?;
        self.backend.set(IDENTITIES_KEY, value).await
    }

    async fn write_record(&self, identity: &Identity) -> Result<(), StoreError> {
        let key = record_key(&identity.name);
        let value = serde_json::to_value(IdentityRecord::from_identity(identity))
            .map_err(|e| StoreError::io(key.as_str(), e))?;
        self.backend.set(&key, value).await
    }
}

fn validate_name(name: &str) -> Result<(), StoreError> {
    if name.trim().is_empty() {
        return Err(StoreError::InvalidName {
            reason: "name must not be empty".to_string(),
        });
    }
    Ok(())
}

fn decode<T: serde::de::DeserializeOwned>(key: &str, value: Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        details: e.to_string(),
    })
}
