use serde::ser::SerializeStruct;
use serde::{
    Serialize,
    Serializer,
};
use std::ops::AddAssign;
use std::time::Duration;

/// Counters of a grouping pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupingStats {
    pub num_points: usize,
    pub num_partitions: usize,
    pub clusters_built: usize,
    pub groups_extracted: usize,
    pub singletons: usize,
    /// Quality computations done after the initial one of every cluster.
    pub quality_recomputations: usize,
    /// Summed over partitions.
    pub build_time: Duration,
    /// Summed over partitions.
    pub extraction_time: Duration,
    pub total_time: Duration,
}

impl GroupingStats {
    pub fn num_groups(&self) -> usize {
        self.groups_extracted + self.singletons
    }
}

impl AddAssign for GroupingStats {
    fn add_assign(&mut self, other: Self) {
        self.num_points += other.num_points;
        self.num_partitions += other.num_partitions;
        self.clusters_built += other.clusters_built;
        self.groups_extracted += other.groups_extracted;
        self.singletons += other.singletons;
        self.quality_recomputations += other.quality_recomputations;
        self.build_time += other.build_time;
        self.extraction_time += other.extraction_time;
        self.total_time += other.total_time;
    }
}

impl Serialize for GroupingStats {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("GroupingStats", 9)?;
        state.serialize_field("num_points", &self.num_points)?;
        state.serialize_field("num_partitions", &self.num_partitions)?;
        state.serialize_field("clusters_built", &self.clusters_built)?;
        state.serialize_field("groups_extracted", &self.groups_extracted)?;
        state.serialize_field("singletons", &self.singletons)?;
        state.serialize_field("quality_recomputations", &self.quality_recomputations)?;
        state.serialize_field("build_time_ms", &(self.build_time.as_millis() as u64))?;
        state.serialize_field(
            "extraction_time_ms",
            &(self.extraction_time.as_millis() as u64),
        )?;
        state.serialize_field("total_time_ms", &(self.total_time.as_millis() as u64))?;
        state.end()
    }
}

impl std::fmt::Display for GroupingStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Grouping Stats:")?;
        writeln!(
            f,
            "Points: {} in {} partition(s)",
            self.num_points, self.num_partitions
        )?;
        writeln!(f, "Clusters built: {}", self.clusters_built)?;
        writeln!(
            f,
            "Groups: {} extracted, {} singletons",
            self.groups_extracted, self.singletons
        )?;
        writeln!(f, "Quality recomputations: {}", self.quality_recomputations)?;
        writeln!(f, "Build Time: {:.2?}", self.build_time)?;
        writeln!(f, "Extraction Time: {:.2?}", self.extraction_time)?;
        writeln!(f, "Total Time: {:.2?}", self.total_time)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_assign_sums_partitions() {
        let mut total = GroupingStats::default();
        for i in 1..=2 {
            total += GroupingStats {
                num_points: 10 * i,
                num_partitions: 1,
                groups_extracted: i,
                build_time: Duration::from_millis(5),
                ..Default::default()
            };
        }
        assert_eq!(total.num_points, 30);
        assert_eq!(total.num_partitions, 2);
        assert_eq!(total.groups_extracted, 3);
        assert_eq!(total.build_time, Duration::from_millis(10));
    }

    #[test]
    fn test_display_mentions_counts() {
        let stats = GroupingStats {
            num_points: 12,
            groups_extracted: 4,
            singletons: 2,
            ..Default::default()
        };
        let text = stats.to_string();
        assert!(text.contains("Points: 12"));
        assert!(text.contains("4 extracted, 2 singletons"));
        assert_eq!(stats.num_groups(), 6);
    }
}
