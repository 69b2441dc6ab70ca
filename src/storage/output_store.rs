//! In-memory output bookkeeping
//!
//! Outputs are keyed by outpoint, which is unique within the store. Insertion
//! order is kept so listings are stable across calls.

use std::collections::HashMap;

use super::{output_status::OutputStatus, stored_output::StoredOutput};
use crate::{
    data_structures::Outpoint,
    errors::{WalletError, WalletResult},
    interface::QueryMode,
};

/// Query filters for retrieving outputs
#[derive(Debug, Clone, Default)]
pub struct OutputFilter {
    /// Filter by basket name
    pub basket: Option<String>,
    /// Filter by tags, combined per `tag_query_mode`
    pub tags: Vec<String>,
    pub tag_query_mode: QueryMode,
    /// Filter by output status
    pub status: Option<OutputStatus>,
    /// Keep spent outputs in the result
    pub include_spent: bool,
    /// Limit number of results
    pub limit: Option<usize>,
    /// Offset for pagination
    pub offset: Option<usize>,
}

impl OutputFilter {
    /// Create a new empty filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by basket
    pub fn with_basket(mut self, basket: impl Into<String>) -> Self {
        self.basket = Some(basket.into());
        self
    }

    /// Filter by tags
    pub fn with_tags(mut self, tags: Vec<String>, mode: QueryMode) -> Self {
        self.tags = tags;
        self.tag_query_mode = mode;
        self
    }

    /// Filter by output status
    pub fn with_status(mut self, status: OutputStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Keep spent outputs in the result
    pub fn including_spent(mut self) -> Self {
        self.include_spent = true;
        self
    }

    /// Set pagination limit
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set pagination offset
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    fn matches(&self, output: &StoredOutput) -> bool {
        if let Some(basket) = &self.basket {
            if output.basket.as_deref() != Some(basket.as_str()) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if output.status != status {
                return false;
            }
        }
        if !self.include_spent && output.status == OutputStatus::Spent {
            return false;
        }
        self.tag_query_mode.matches(&self.tags, &output.tags)
    }
}

#[derive(Debug, Default)]
pub struct MemoryOutputStore {
    outputs: HashMap<Outpoint, StoredOutput>,
    order: Vec<Outpoint>,
}

impl MemoryOutputStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, output: StoredOutput) -> WalletResult<()> {
        if output.satoshis == 0 {
            return Err(WalletError::invalid_argument(
                "satoshis",
                format!("output {} carries no value", output.outpoint),
            ));
        }
        if self.outputs.contains_key(&output.outpoint) {
            return Err(WalletError::Storage(format!(
                "outpoint {} already stored",
                output.outpoint
            )));
        }
        self.order.push(output.outpoint.clone());
        self.outputs.insert(output.outpoint.clone(), output);
        Ok(())
    }

    pub fn contains(&self, outpoint: &Outpoint) -> bool {
        self.outputs.contains_key(outpoint)
    }

    pub fn get(&self, outpoint: &Outpoint) -> Option<&StoredOutput> {
        self.outputs.get(outpoint)
    }

    /// Spendable outputs in a basket, smallest first
    pub fn spendable_in_basket(&self, basket: &str) -> Vec<StoredOutput> {
        let mut candidates: Vec<StoredOutput> = self
            .ordered()
            .filter(|o| o.basket.as_deref() == Some(basket) && o.is_spendable())
            .cloned()
            .collect();
        candidates.sort_by(|a, b| a.satoshis.cmp(&b.satoshis));
        candidates
    }

    /// Reserve every outpoint for `reference`, or none of them
    pub fn reserve(&mut self, outpoints: &[Outpoint], reference: &str) -> WalletResult<()> {
        for outpoint in outpoints {
            let output = self
                .outputs
                .get(outpoint)
                .ok_or_else(|| WalletError::NotFound(format!("output {outpoint}")))?;
            if !output.is_spendable() {
                return Err(WalletError::invalid_argument(
                    "inputs",
                    format!("output {outpoint} is not spendable ({:?})", output.status),
                ));
            }
        }
        for outpoint in outpoints {
            if let Some(output) = self.outputs.get_mut(outpoint) {
                output.status = OutputStatus::Reserved;
                output.reserved_by = Some(reference.to_string());
            }
        }
        Ok(())
    }

    /// Return outputs held by `reference` to spendable; returns how many
    pub fn release(&mut self, reference: &str) -> usize {
        let mut released = 0;
        for output in self.outputs.values_mut() {
            if output.reserved_by.as_deref() == Some(reference) {
                output.status = OutputStatus::Spendable;
                output.reserved_by = None;
                released += 1;
            }
        }
        released
    }

    pub fn mark_spent(&mut self, outpoints: &[Outpoint], txid: &str) {
        for outpoint in outpoints {
            if let Some(output) = self.outputs.get_mut(outpoint) {
                output.status = OutputStatus::Spent;
                output.reserved_by = None;
                output.spent_in = Some(txid.to_string());
            }
        }
    }

    pub fn relinquish(&mut self, basket: &str, outpoint: &Outpoint) -> WalletResult<()> {
        let output = self
            .outputs
            .get_mut(outpoint)
            .filter(|o| o.basket.as_deref() == Some(basket))
            .ok_or_else(|| WalletError::NotFound(format!("output {outpoint} in basket '{basket}'")))?;
        if output.status == OutputStatus::Reserved {
            return Err(WalletError::invalid_argument(
                "output",
                format!("output {outpoint} is reserved by a pending action"),
            ));
        }
        output.status = OutputStatus::Relinquished;
        output.basket = None;
        Ok(())
    }

    /// Matching outputs after pagination, plus the total match count
    pub fn query(&self, filter: &OutputFilter) -> (usize, Vec<StoredOutput>) {
        let matching: Vec<&StoredOutput> = self.ordered().filter(|o| filter.matches(o)).collect();
        let total = matching.len();
        let page = matching
            .into_iter()
            .skip(filter.offset.unwrap_or(0))
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        (total, page)
    }

    pub fn balance(&self, basket: &str) -> u64 {
        self.ordered()
            .filter(|o| o.basket.as_deref() == Some(basket) && o.status.is_spendable())
            .map(|o| o.satoshis)
            .sum()
    }

    fn ordered(&self) -> impl Iterator<Item = &StoredOutput> {
        self.order.iter().filter_map(|outpoint| self.outputs.get(outpoint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data_structures::PrivateKey, linkage::LockingScript, storage::stored_output::OutputKey,
    };

    fn output(txid_byte: &str, index: u32, satoshis: u64) -> StoredOutput {
        let script = LockingScript::pay_to_public_key_hash(&PrivateKey::random().public_key());
        StoredOutput::new(
            Outpoint::new(txid_byte.repeat(32), index),
            satoshis,
            script,
            OutputKey::Identity,
        )
        .in_basket("default")
    }

    #[test]
    fn test_insert_rejects_duplicates_and_zero_value() {
        let mut store = MemoryOutputStore::new();
        store.insert(output("aa", 0, 100)).unwrap();
        assert!(store.insert(output("aa", 0, 100)).is_err());
        assert!(store.insert(output("bb", 0, 0)).is_err());
        assert_eq!(store.balance("default"), 100);
    }

    #[test]
    fn test_reserve_is_all_or_nothing() {
        let mut store = MemoryOutputStore::new();
        store.insert(output("aa", 0, 100)).unwrap();
        let present = Outpoint::new("aa".repeat(32), 0);
        let missing = Outpoint::new("cc".repeat(32), 0);

        assert!(store.reserve(&[present.clone(), missing], "ref").is_err());
        assert!(store.get(&present).unwrap().is_spendable());

        store.reserve(&[present.clone()], "ref").unwrap();
        assert_eq!(store.get(&present).unwrap().status, OutputStatus::Reserved);
        assert!(store.reserve(&[present.clone()], "other").is_err());
        assert!(store.relinquish("default", &present).is_err());

        assert_eq!(store.release("ref"), 1);
        assert!(store.get(&present).unwrap().is_spendable());
    }

    #[test]
    fn test_query_paginates_in_insertion_order() {
        let mut store = MemoryOutputStore::new();
        for (i, sats) in [500u64, 100, 300].iter().enumerate() {
            store.insert(output("aa", i as u32, *sats)).unwrap();
        }
        let (total, page) = store.query(&OutputFilter::new().with_basket("default").with_offset(1).with_limit(1));
        assert_eq!(total, 3);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].satoshis, 100);

        let smallest_first = store.spendable_in_basket("default");
        assert_eq!(smallest_first[0].satoshis, 100);
    }

    #[test]
    fn test_relinquish_removes_from_basket() {
        let mut store = MemoryOutputStore::new();
        store.insert(output("aa", 0, 100)).unwrap();
        let outpoint = Outpoint::new("aa".repeat(32), 0);
        assert!(store.relinquish("tokens", &outpoint).is_err());
        store.relinquish("default", &outpoint).unwrap();
        assert_eq!(store.balance("default"), 0);
        assert_eq!(store.get(&outpoint).unwrap().status, OutputStatus::Relinquished);
    }
}
