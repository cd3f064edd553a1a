// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Counters reported by [`crate::images::Device::frame`].

use std::ops::AddAssign;

/// What one stage saw and drew.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageStats {
    pub vertex_total: u64,
    pub vertex_drawn: u64,
    pub primitive_total: u64,
    pub primitive_drawn: u64,
    pub instance_total: u64,
    pub instance_drawn: u64,
}

impl AddAssign for StageStats {
    fn add_assign(&mut self, other: Self) {
        self.vertex_total += other.vertex_total;
        self.vertex_drawn += other.vertex_drawn;
        self.primitive_total += other.primitive_total;
        self.primitive_drawn += other.primitive_drawn;
        self.instance_total += other.instance_total;
        self.instance_drawn += other.instance_drawn;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// The context was lost and nothing was drawn.
    pub lost: bool,
    /// One entry per enabled stage, in stage order.
    pub stages: Vec<(String, StageStats)>,
    pub totals: StageStats,
}

impl FrameStats {
    pub(crate) fn lost() -> Self {
        Self {
            lost: true,
            ..Self::default()
        }
    }

    pub(crate) fn push(&mut self, stage: &str, stats: StageStats) {
        self.totals += stats;
        self.stages.push((stage.to_string(), stats));
    }

    /// Stats of the stage named `name`, if it ran.
    pub fn stage(&self, name: &str) -> Option<&StageStats> {
        self.stages.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_accumulate() {
        let mut stats = FrameStats::default();
        let one = StageStats {
            vertex_total: 3,
            vertex_drawn: 3,
            primitive_total: 1,
            primitive_drawn: 1,
            instance_total: 1,
            instance_drawn: 1,
        };
        stats.push("a", one);
        stats.push("b", StageStats { instance_total: 2, ..Default::default() });
        assert_eq!(stats.totals.instance_total, 3);
        assert_eq!(stats.totals.vertex_drawn, 3);
        assert_eq!(stats.stage("b").unwrap().instance_drawn, 0);
        assert!(stats.stage("c").is_none());
        assert!(FrameStats::lost().lost);
    }
}
