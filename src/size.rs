//! Size Budget - Transport Ceiling Classification
//!
//! Advisory only: the generator never truncates a document to fit.

use serde::{Deserialize, Serialize};

use crate::limits::EngineLimits;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeTier {
    Safe,
    Caution,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeReport {
    pub bytes: usize,
    pub kib_bytes: f64,
    pub percentage: f64,
    pub tier: SizeTier,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeBudget {
    ceiling: usize,
    caution_ratio: f64,
    critical_ratio: f64,
}

impl SizeBudget {
    pub fn from_limits(limits: &EngineLimits) -> Self {
        Self {
            ceiling: limits.size_ceiling,
            caution_ratio: limits.caution_ratio,
            critical_ratio: limits.critical_ratio,
        }
    }

    pub fn measure(&self, document: &str) -> SizeReport {
        self.measure_bytes(document.len())
    }

    pub fn measure_bytes(&self, bytes: usize) -> SizeReport {
        let ratio = bytes as f64 / self.ceiling as f64;
        let tier = if ratio >= self.critical_ratio {
            SizeTier::Critical
        } else if ratio >= self.caution_ratio {
            SizeTier::Caution
        } else {
            SizeTier::Safe
        };
        SizeReport {
            bytes,
            kib_bytes: bytes as f64 / 1024.0,
            percentage: ratio * 100.0,
            tier,
        }
    }
}

impl Default for SizeBudget {
    fn default() -> Self {
        Self::from_limits(&EngineLimits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_boundaries() {
        let budget = SizeBudget::default();
        assert_eq!(budget.measure_bytes(0).tier, SizeTier::Safe);
        assert_eq!(budget.measure_bytes(48 * 1024 - 1).tier, SizeTier::Safe);
        assert_eq!(budget.measure_bytes(48 * 1024).tier, SizeTier::Caution);
        assert_eq!(budget.measure_bytes(58_982).tier, SizeTier::Caution);
        assert_eq!(budget.measure_bytes(58_983).tier, SizeTier::Critical);
        assert_eq!(budget.measure_bytes(64 * 1024).tier, SizeTier::Critical);
        assert_eq!(budget.measure_bytes(80 * 1024).tier, SizeTier::Critical);
    }

    #[test]
    fn report_fields() {
        let report = SizeBudget::default().measure(&"a".repeat(64 * 1024));
        assert_eq!(report.bytes, 65_536);
        assert_eq!(report.kib_bytes, 64.0);
        assert_eq!(report.percentage, 100.0);
    }

    #[test]
    fn counts_utf8_bytes() {
        assert_eq!(SizeBudget::default().measure("é").bytes, 2);
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(SizeBudget::default().measure_bytes(1024)).unwrap();
        assert_eq!(json["kibBytes"], 1.0);
        assert_eq!(json["tier"], "safe");
    }
}
