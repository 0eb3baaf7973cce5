use serde::Serialize;

use super::person::PersonUsage;

/// One user's quota position: bytes used by the user's non-trashed
/// resources vs. the configured cap (`None` = unlimited).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct QuotaUsage {
    pub used: i64,
    pub cap: Option<i64>,
}

impl QuotaUsage {
    /// Would `additional` bytes still fit under the logical cap?
    /// The physical free-space ceiling is checked separately.
    pub fn fits(&self, additional: i64) -> bool {
        match self.cap {
            None => true,
            Some(cap) => self.used.saturating_add(additional) <= cap,
        }
    }
}

/// Free/used/total bytes of the volume backing the uploads root.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DiskStats {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

/// Admin overview: all users with usage, plus the physical disk.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaOverview {
    pub users: Vec<PersonUsage>,
    pub disk: DiskStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_cap_always_fits() {
        let usage = QuotaUsage {
            used: i64::MAX / 2,
            cap: None,
        };
        assert!(usage.fits(i64::MAX / 2));
    }

    #[test]
    fn test_cap_boundary_is_inclusive() {
        let usage = QuotaUsage {
            used: 40,
            cap: Some(100),
        };
        assert!(usage.fits(60));
        assert!(!usage.fits(61));
    }

    #[test]
    fn test_fits_saturates_instead_of_overflowing() {
        let usage = QuotaUsage {
            used: i64::MAX,
            cap: Some(i64::MAX),
        };
        assert!(!usage.fits(1));
    }
}
