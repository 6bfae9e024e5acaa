//! Per-render FeatureSet cache
//!
//! A dashboard re-renders many widgets off the same ledger snapshot. The cache
//! keeps the most recent FeatureSet keyed by a SHA-256 fingerprint of the
//! ledger and the feature config, so repeated requests within one render skip
//! extraction. Any change to a transaction or to the config changes the key.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use sha2::{Digest, Sha256};

use crate::config::FeatureConfig;
use crate::error::Result;
use crate::features::{FeatureExtractor, FeatureSet};
use crate::models::Transaction;

/// Hex SHA-256 over every field of every transaction plus the feature config
pub fn ledger_fingerprint(transactions: &[Transaction], config: &FeatureConfig) -> String {
    let mut hasher = Sha256::new();

    for tx in transactions {
        hasher.update(tx.id.to_be_bytes());
        hasher.update(tx.date.to_string().as_bytes());
        hasher.update(tx.amount.to_bits().to_be_bytes());
        hasher.update(tx.category.as_bytes());
        hasher.update([0u8]);
        hasher.update(tx.description.as_bytes());
        hasher.update([0u8]);
    }

    hasher.update([0xffu8]);
    for category in &config.essential_categories {
        hasher.update(category.trim().to_lowercase().as_bytes());
        hasher.update([0u8]);
    }
    hasher.update(config.large_transaction_multiplier.to_bits().to_be_bytes());

    hex::encode(hasher.finalize())
}

/// Cache hit/miss counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Single-entry FeatureSet cache
#[derive(Debug)]
pub struct FeatureCache {
    extractor: FeatureExtractor,
    entry: Mutex<Option<(String, Arc<FeatureSet>)>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl FeatureCache {
    pub fn new(extractor: FeatureExtractor) -> Self {
        Self {
            extractor,
            entry: Mutex::new(None),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Cached FeatureSet for this ledger, extracting on a miss
    ///
    /// Extraction errors are returned and never cached.
    pub fn get_or_extract(&self, transactions: &[Transaction]) -> Result<Arc<FeatureSet>> {
        let key = ledger_fingerprint(transactions, self.extractor.config());

        if let Ok(entry) = self.entry.lock() {
            if let Some((cached_key, features)) = entry.as_ref() {
                if *cached_key == key {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(Arc::clone(features));
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let features = Arc::new(self.extractor.extract(transactions)?);
        tracing::debug!(fingerprint = %&key[..12], "FeatureSet cached");

        if let Ok(mut entry) = self.entry.lock() {
            *entry = Some((key, Arc::clone(&features)));
        }
        Ok(features)
    }

    pub fn invalidate(&self) {
        if let Ok(mut entry) = self.entry.lock() {
            *entry = None;
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
