//! Translation between the stored [`Deposit`] and the wire [`DepositDto`].
//!
//! The two shapes carry the same four fields, so every mapping is a plain
//! field copy and is lossless in both directions.

use crate::{Deposit, DepositDto};

/// Stateless mapper between entity and transfer shapes.
#[derive(Clone, Copy, Debug, Default)]
pub struct DepositMapper;

impl DepositMapper {
    pub fn to_dto(&self, entity: Deposit) -> DepositDto {
        DepositDto {
            id: entity.id,
            booking_code: entity.booking_code,
            user_id: entity.user_id,
            currency_code: entity.currency_code,
        }
    }

    pub fn to_entity(&self, dto: DepositDto) -> Deposit {
        Deposit {
            id: dto.id,
            booking_code: dto.booking_code,
            user_id: dto.user_id,
            currency_code: dto.currency_code,
        }
    }

    pub fn to_dtos(&self, entities: Vec<Deposit>) -> Vec<DepositDto> {
        entities.into_iter().map(|e| self.to_dto(e)).collect()
    }

    pub fn to_entities(&self, dtos: Vec<DepositDto>) -> Vec<Deposit> {
        dtos.into_iter().map(|d| self.to_entity(d)).collect()
    }

    /// Reference entity carrying only an identity.
    pub fn from_id(&self, id: Option<i64>) -> Option<Deposit> {
        id.map(|id| Deposit {
            id: Some(id),
            ..Deposit::default()
        })
    }
}
