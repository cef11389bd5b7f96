use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::query::Query;
use crate::{CoreError, Deposit, DepositRepository, DepositSearchRepository};

/// In-memory entity store. Ids are issued from 1 upward and never reused.
pub struct InMemoryDepositRepo {
    inner: Mutex<StoreState>,
}

struct StoreState {
    rows: BTreeMap<i64, Deposit>,
    next_id: i64,
}

/// In-memory search index holding whole documents keyed by id.
pub struct InMemorySearchIndex {
    docs: Mutex<BTreeMap<i64, Deposit>>,
}

impl InMemoryDepositRepo {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreState {
                rows: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }
}

impl Default for InMemoryDepositRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl DepositRepository for InMemoryDepositRepo {
    fn save(&self, mut deposit: Deposit) -> Result<Deposit, CoreError> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        match deposit.id {
            Some(id) => {
                let row = state.rows.get_mut(&id).ok_or(CoreError::NotFound)?;
                *row = deposit.clone();
            }
            None => {
                let id = state.next_id;
                state.next_id += 1;
                deposit.id = Some(id);
                state.rows.insert(id, deposit.clone());
            }
        }
        Ok(deposit)
    }

    fn find_all(&self) -> Result<Vec<Deposit>, CoreError> {
        let state = self
            .inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        Ok(state.rows.values().cloned().collect())
    }

    fn find_one(&self, id: i64) -> Result<Option<Deposit>, CoreError> {
        let state = self
            .inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        Ok(state.rows.get(&id).cloned())
    }

    fn delete(&self, id: i64) -> Result<(), CoreError> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        state.rows.remove(&id);
        Ok(())
    }

    fn count(&self) -> Result<usize, CoreError> {
        let state = self
            .inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        Ok(state.rows.len())
    }
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self {
            docs: Mutex::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemorySearchIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl DepositSearchRepository for InMemorySearchIndex {
    fn index(&self, deposit: &Deposit) -> Result<(), CoreError> {
        let id = deposit
            .id
            .ok_or_else(|| CoreError::Index("cannot index a deposit without id".into()))?;
        let mut docs = self
            .docs
            .lock()
            .map_err(|_| CoreError::Index("mutex poisoned".into()))?;
        docs.insert(id, deposit.clone());
        Ok(())
    }

    fn remove(&self, id: i64) -> Result<(), CoreError> {
        let mut docs = self
            .docs
            .lock()
            .map_err(|_| CoreError::Index("mutex poisoned".into()))?;
        docs.remove(&id);
        Ok(())
    }

    fn find_one(&self, id: i64) -> Result<Option<Deposit>, CoreError> {
        let docs = self
            .docs
            .lock()
            .map_err(|_| CoreError::Index("mutex poisoned".into()))?;
        Ok(docs.get(&id).cloned())
    }

    fn search(&self, query: &str) -> Result<Vec<Deposit>, CoreError> {
        let parsed = Query::parse(query)?;
        let docs = self
            .docs
            .lock()
            .map_err(|_| CoreError::Index("mutex poisoned".into()))?;
        Ok(parsed.run(docs.values()))
    }

    fn delete_all(&self) -> Result<(), CoreError> {
        let mut docs = self
            .docs
            .lock()
            .map_err(|_| CoreError::Index("mutex poisoned".into()))?;
        docs.clear();
        Ok(())
    }
}
