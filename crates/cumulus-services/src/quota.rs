//! Quota ledger: logical per-user caps over one shared physical volume.

use cumulus_core::{
    models::{Person, QuotaOverview, QuotaUsage},
    AppError,
};
use cumulus_db::QuotaRepository;
use cumulus_storage::BlobVolume;

pub struct QuotaLedger {
    quotas: QuotaRepository,
    volume: BlobVolume,
}

impl QuotaLedger {
    pub fn new(quotas: QuotaRepository, volume: BlobVolume) -> Self {
        Self { quotas, volume }
    }

    /// Admit `additional` bytes for the person, or say why not.
    ///
    /// Two independent gates: the logical cap (NULL = unlimited) and the
    /// free space of the volume. An unlimited user still cannot write past
    /// the disk. The upload path re-runs the logical check inside its commit
    /// transaction under the per-user advisory lock; this seam is for
    /// everyone else who wants an answer before moving bytes.
    pub async fn admit(&self, person_id: i64, additional: i64) -> Result<(), AppError> {
        let usage = self.quotas.usage(person_id).await?;
        if !usage.fits(additional) {
            return Err(AppError::QuotaExceeded {
                used: usage.used,
                cap: usage.cap.unwrap_or_default(),
                requested: additional,
            });
        }

        let disk = self
            .volume
            .disk_stats()
            .map_err(|e| AppError::Storage(e.to_string()))?;
        if additional > 0 && additional as u64 > disk.free {
            return Err(AppError::CapacityExceeded(format!(
                "{} bytes requested, {} free on volume",
                additional, disk.free
            )));
        }

        Ok(())
    }

    pub async fn usage(&self, person_id: i64) -> Result<QuotaUsage, AppError> {
        self.quotas.usage(person_id).await
    }

    /// One person's identity next to their quota position, for the admin
    /// detail view.
    pub async fn user_detail(&self, person_id: i64) -> Result<(Person, QuotaUsage), AppError> {
        let person = self
            .quotas
            .get_person(person_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Person {}", person_id)))?;
        let usage = self.quotas.usage(person_id).await?;
        Ok((person, usage))
    }

    /// Change a person's cap. Both guards fail closed: the new cap must
    /// cover what the person already stores, and the sum of everyone's
    /// explicit caps must still fit on the disk. `None` lifts the cap.
    pub async fn set_user_quota(
        &self,
        person_id: i64,
        new_cap: Option<i64>,
    ) -> Result<(), AppError> {
        if let Some(cap) = new_cap {
            if cap < 0 {
                return Err(AppError::InvalidInput("Quota cap must be >= 0".into()));
            }

            let usage = self.quotas.usage(person_id).await?;
            if cap < usage.used {
                return Err(AppError::CapacityExceeded(format!(
                    "Cap {} is below current usage {}",
                    cap, usage.used
                )));
            }

            let others = self.quotas.sum_other_caps(person_id).await?;
            let disk = self
                .volume
                .disk_stats()
                .map_err(|e| AppError::Storage(e.to_string()))?;
            let committed = others.saturating_add(cap);
            if committed < 0 || committed as u64 > disk.total {
                return Err(AppError::CapacityExceeded(format!(
                    "Caps would total {} bytes on a {} byte volume",
                    committed, disk.total
                )));
            }
        }

        if !self.quotas.set_cap(person_id, new_cap).await? {
            return Err(AppError::NotFound(format!("Person {}", person_id)));
        }

        tracing::info!(person_id, ?new_cap, "Storage cap updated");
        Ok(())
    }

    /// Admin overview: every user's usage next to the physical disk.
    pub async fn overview(&self) -> Result<QuotaOverview, AppError> {
        let users = self.quotas.usage_overview().await?;
        let disk = self
            .volume
            .disk_stats()
            .map_err(|e| AppError::Storage(e.to_string()))?;

        Ok(QuotaOverview { users, disk })
    }
}
