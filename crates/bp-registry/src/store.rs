//! In-memory typed key-value store backing the registry service.
//!
//! Durability is explicitly out of scope (`spec.md` §1 Non-goals); the
//! store lives for the lifetime of the process, mirroring the teacher's
//! `IndexRegistry` (`entity-gateway/src/index/registry.rs`) which also
//! holds its state behind a single `RwLock<HashMap<..>>`.

use bp_types::{RegistryKey, RegistryValue};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown registry key: {0}")]
    UnknownKey(String),
    #[error("remove is only defined for the worker-IP list, not {0:?}")]
    RemoveNotSupported(RegistryKey),
    #[error("value not present: {0}")]
    NotFound(String),
}

pub struct RegistryStore {
    entries: RwLock<HashMap<RegistryKey, RegistryValue>>,
}

impl Default for RegistryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryStore {
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        entries.insert(RegistryKey::PixelClassificationWorkerIps, RegistryValue::List(Vec::new()));
        entries.insert(RegistryKey::Log, RegistryValue::List(Vec::new()));
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub fn get(&self, key: RegistryKey) -> Option<RegistryValue> {
        self.entries.read().unwrap().get(&key).cloned()
    }

    /// List-valued keys append; every other key replaces (§4.9).
    pub fn set(&self, key: RegistryKey, value: RegistryValue) -> Result<(), RegistryError> {
        let mut entries = self.entries.write().unwrap();
        if key.is_list_valued() {
            let RegistryValue::List(mut incoming) = value else {
                return Err(RegistryError::UnknownKey(format!(
                    "{key:?} expects a list value"
                )));
            };
            match entries.get_mut(&key) {
                Some(RegistryValue::List(existing)) => existing.append(&mut incoming),
                _ => {
                    entries.insert(key, RegistryValue::List(incoming));
                }
            }
        } else {
            entries.insert(key, value);
        }
        Ok(())
    }

    /// Only defined for the worker-IP list: removes the first occurrence.
    pub fn remove(&self, key: RegistryKey, value: &str) -> Result<(), RegistryError> {
        if key != RegistryKey::PixelClassificationWorkerIps {
            return Err(RegistryError::RemoveNotSupported(key));
        }
        let mut entries = self.entries.write().unwrap();
        match entries.get_mut(&key) {
            Some(RegistryValue::List(list)) => {
                if let Some(pos) = list.iter().position(|v| v == value) {
                    list.remove(pos);
                    Ok(())
                } else {
                    Err(RegistryError::NotFound(value.to_string()))
                }
            }
            _ => Err(RegistryError::NotFound(value.to_string())),
        }
    }

    /// Append a formatted `(level, timestamp, service-id, message)` entry
    /// onto `LOG` (§4.9). This is a small audit trail, not a replacement for
    /// `tracing` (SPEC_FULL.md §5).
    pub fn log(&self, level: &str, service_id: &str, message: &str) {
        let formatted = format!("[{}] {level} {service_id}: {message}", Utc::now().to_rfc3339());
        let mut entries = self.entries.write().unwrap();
        match entries.get_mut(&RegistryKey::Log) {
            Some(RegistryValue::List(list)) => list.push(formatted),
            _ => {
                entries.insert(RegistryKey::Log, RegistryValue::List(vec![formatted]));
            }
        }
    }

    pub fn worker_ips(&self) -> Vec<String> {
        match self.get(RegistryKey::PixelClassificationWorkerIps) {
            Some(RegistryValue::List(v)) => v,
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips_every_key() {
        let store = RegistryStore::new();
        for key in RegistryKey::ALL {
            let value = if key.is_list_valued() {
                RegistryValue::List(vec!["x".into()])
            } else {
                RegistryValue::Scalar("v".into())
            };
            store.set(*key, value).unwrap();
            assert!(store.get(*key).is_some());
        }
    }

    #[test]
    fn list_key_appends_instead_of_replacing() {
        let store = RegistryStore::new();
        store
            .set(RegistryKey::PixelClassificationWorkerIps, RegistryValue::List(vec!["10.0.0.1".into()]))
            .unwrap();
        store
            .set(RegistryKey::PixelClassificationWorkerIps, RegistryValue::List(vec!["10.0.0.2".into()]))
            .unwrap();
        assert_eq!(store.worker_ips(), vec!["10.0.0.1", "10.0.0.2"]);
    }

    #[test]
    fn remove_only_accepted_on_worker_ip_list() {
        let store = RegistryStore::new();
        store.set(RegistryKey::GatewayIp, RegistryValue::Scalar("10.0.0.5".into())).unwrap();
        assert!(matches!(
            store.remove(RegistryKey::GatewayIp, "10.0.0.5"),
            Err(RegistryError::RemoveNotSupported(_))
        ));
    }

    #[test]
    fn remove_deletes_first_occurrence() {
        let store = RegistryStore::new();
        store
            .set(
                RegistryKey::PixelClassificationWorkerIps,
                RegistryValue::List(vec!["a".into(), "b".into(), "a".into()]),
            )
            .unwrap();
        store.remove(RegistryKey::PixelClassificationWorkerIps, "a").unwrap();
        assert_eq!(store.worker_ips(), vec!["b", "a"]);
    }

    #[test]
    fn log_appends_formatted_entries() {
        let store = RegistryStore::new();
        store.log("INFO", "gateway", "setup complete");
        let entries = store.worker_ips(); // unrelated key, sanity that it's untouched
        assert!(entries.is_empty());
        match store.get(RegistryKey::Log).unwrap() {
            RegistryValue::List(log) => assert_eq!(log.len(), 1),
            _ => panic!("expected list"),
        }
    }
}
