//! Lightweight request checks. Field contents are not validated: booking and
//! currency codes are arbitrary text and user ids are foreign references.

use crate::{CoreError, DepositDto};

/// A deposit submitted for creation must not carry an id yet.
pub fn validate_new_deposit(dto: &DepositDto) -> Result<(), CoreError> {
    if dto.id.is_some() {
        return Err(CoreError::IdExists);
    }
    Ok(())
}
