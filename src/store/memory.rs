//! In-process deposit store.
//!
//! Same contract as the PostgreSQL backend, backed by a mutex-protected
//! vector. Used by the test suite and for local runs without a database.

use super::DepositStore;
use crate::error::StoreError;
use crate::model::{Deposit, DepositStatus, NewDeposit};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::RwLock;

#[derive(Default)]
pub struct MemoryDepositStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    rows: Vec<Deposit>,
}

impl MemoryDepositStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DepositStore for MemoryDepositStore {
    async fn find_by_tx_hash(&self, tx_hash: &str) -> Result<Option<Deposit>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .rows
            .iter()
            .find(|d| d.tx_hash.eq_ignore_ascii_case(tx_hash))
            .cloned())
    }

    async fn insert(&self, deposit: NewDeposit) -> Result<Option<Deposit>, StoreError> {
        let mut inner = self.inner.write().unwrap();
        if inner
            .rows
            .iter()
            .any(|d| d.tx_hash.eq_ignore_ascii_case(&deposit.tx_hash))
        {
            return Ok(None);
        }

        inner.next_id += 1;
        let now = Utc::now();
        let row = Deposit {
            id: inner.next_id,
            tx_hash: deposit.tx_hash,
            user_address: None,
            monitored_address: Some(deposit.monitored_address),
            chain: deposit.chain,
            token_address: deposit.token_address,
            asset: deposit.asset,
            amount: deposit.amount,
            decimals: i32::from(deposit.decimals),
            block_number: deposit.block_number as i64,
            status: DepositStatus::Unconfirmed,
            confirmations: 0,
            created_at: now,
            updated_at: now,
        };
        inner.rows.push(row.clone());
        Ok(Some(row))
    }

    async fn find_pending(&self) -> Result<Vec<Deposit>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .rows
            .iter()
            .filter(|d| d.status.is_pending())
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        id: i64,
        status: DepositStatus,
        confirmations: i64,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        if let Some(row) = inner.rows.iter_mut().find(|d| d.id == id) {
            row.status = status;
            row.confirmations = confirmations;
            row.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Deposit>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.rows.clone())
    }
}
