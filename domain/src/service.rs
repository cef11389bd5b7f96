use tracing::{debug, warn};

use crate::mapper::DepositMapper;
use crate::{CoreError, DepositDto, DepositRepository, DepositSearchRepository};

/// Application service for deposits.
///
/// Writes go to the entity store first and are then mirrored into the search
/// index. The two writes do not share a transaction: a failed index write is
/// logged and the stored record is still returned, so the index may lag the
/// store until the record is written again.
pub struct DepositService<R: DepositRepository, S: DepositSearchRepository> {
    repo: R,
    index: S,
    mapper: DepositMapper,
}

impl<R: DepositRepository, S: DepositSearchRepository> DepositService<R, S> {
    pub fn new(repo: R, index: S) -> Self {
        Self {
            repo,
            index,
            mapper: DepositMapper,
        }
    }

    /// Insert (no id) or fully replace (id present) a deposit, then index it.
    pub fn save(&self, dto: DepositDto) -> Result<DepositDto, CoreError> {
        debug!(deposit = %dto, "request to save deposit");
        let stored = self.repo.save(self.mapper.to_entity(dto))?;
        if let Err(e) = self.index.index(&stored) {
            warn!(id = ?stored.id, err = %e, "search index write failed; index is stale");
        }
        Ok(self.mapper.to_dto(stored))
    }

    pub fn find_all(&self) -> Result<Vec<DepositDto>, CoreError> {
        debug!("request to get all deposits");
        Ok(self.mapper.to_dtos(self.repo.find_all()?))
    }

    pub fn find_one(&self, id: i64) -> Result<Option<DepositDto>, CoreError> {
        debug!(id, "request to get deposit");
        Ok(self.repo.find_one(id)?.map(|d| self.mapper.to_dto(d)))
    }

    /// Remove from the store, then from the index. Absent ids are not an error.
    pub fn delete(&self, id: i64) -> Result<(), CoreError> {
        debug!(id, "request to delete deposit");
        self.repo.delete(id)?;
        if let Err(e) = self.index.remove(id) {
            warn!(id, err = %e, "search index delete failed; index is stale");
        }
        Ok(())
    }

    /// Free-text search against the index. The query text is handed to the
    /// index unchanged.
    pub fn search(&self, query: &str) -> Result<Vec<DepositDto>, CoreError> {
        debug!(query, "request to search deposits");
        Ok(self.mapper.to_dtos(self.index.search(query)?))
    }

    /// Direct access to the index, for consistency checks.
    pub fn index(&self) -> &S {
        &self.index
    }

    pub fn count(&self) -> Result<usize, CoreError> {
        self.repo.count()
    }
}
