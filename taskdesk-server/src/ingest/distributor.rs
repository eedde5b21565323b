//! Distributor: shuffled round-robin assignment
//!
//! Agent order is shuffled once per call, then record *i* goes to
//! `shuffled[i % M]`. Every agent receives `floor(N/M)` or `ceil(N/M)` records,
//! and each bucket keeps the input order. Pure: no agent state is touched.

use rand::seq::SliceRandom;
use rand::Rng;
use taskdesk_common::db::TaskRecord;
use uuid::Uuid;

/// Records newly assigned to one agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub agent_id: Uuid,
    pub tasks: Vec<TaskRecord>,
}

/// One bucket per agent, in shuffled order (empty buckets included)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Distribution {
    pub assignments: Vec<Assignment>,
}

impl Distribution {
    /// Total records across all buckets
    pub fn total(&self) -> usize {
        self.assignments.iter().map(|a| a.tasks.len()).sum()
    }

    pub fn tasks_for(&self, agent_id: Uuid) -> Option<&[TaskRecord]> {
        self.assignments
            .iter()
            .find(|a| a.agent_id == agent_id)
            .map(|a| a.tasks.as_slice())
    }

    /// Buckets that received at least one record
    pub fn non_empty(&self) -> impl Iterator<Item = &Assignment> {
        self.assignments.iter().filter(|a| !a.tasks.is_empty())
    }
}

/// Assign `records` across `agent_ids`
///
/// With no agents there is nowhere to put records and the result has no
/// buckets; callers enforce a minimum agent count before distributing.
pub fn distribute<R>(records: Vec<TaskRecord>, agent_ids: &[Uuid], rng: &mut R) -> Distribution
where
    R: Rng + ?Sized,
{
    let mut order = agent_ids.to_vec();

    if records.is_empty() || order.is_empty() {
        return Distribution {
            assignments: order
                .into_iter()
                .map(|agent_id| Assignment {
                    agent_id,
                    tasks: Vec::new(),
                })
                .collect(),
        };
    }

    order.shuffle(rng);

    let per_agent = records.len().div_ceil(order.len());
    let mut assignments: Vec<Assignment> = order
        .into_iter()
        .map(|agent_id| Assignment {
            agent_id,
            tasks: Vec::with_capacity(per_agent),
        })
        .collect();

    let agent_count = assignments.len();
    for (i, record) in records.into_iter().enumerate() {
        assignments[i % agent_count].tasks.push(record);
    }

    Distribution { assignments }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn records(n: usize) -> Vec<TaskRecord> {
        (0..n)
            .map(|i| TaskRecord::new(format!("name-{i}"), format!("{i}"), "note"))
            .collect()
    }

    fn agents(m: usize) -> Vec<Uuid> {
        (0..m).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn test_even_split_one_each() {
        let ids = agents(5);
        let dist = distribute(records(5), &ids, &mut StdRng::seed_from_u64(1));

        assert_eq!(dist.assignments.len(), 5);
        assert!(dist.assignments.iter().all(|a| a.tasks.len() == 1));
        for id in &ids {
            assert_eq!(dist.tasks_for(*id).map(<[TaskRecord]>::len), Some(1));
        }
    }

    #[test]
    fn test_uneven_split_within_one() {
        let dist = distribute(records(12), &agents(7), &mut StdRng::seed_from_u64(7));

        let counts: Vec<usize> = dist.assignments.iter().map(|a| a.tasks.len()).collect();
        assert_eq!(dist.total(), 12);
        assert_eq!(counts.iter().filter(|&&c| c == 2).count(), 5);
        assert_eq!(counts.iter().filter(|&&c| c == 1).count(), 2);
    }

    #[test]
    fn test_bucket_preserves_input_order() {
        let dist = distribute(records(23), &agents(5), &mut StdRng::seed_from_u64(3));

        // Bucket k holds records k, k+5, k+10, ...
        for (k, assignment) in dist.assignments.iter().enumerate() {
            let expected: Vec<String> = (k..23).step_by(5).map(|i| format!("name-{i}")).collect();
            let actual: Vec<String> = assignment.tasks.iter().map(|t| t.first_name.clone()).collect();
            assert_eq!(actual, expected);
        }
    }

    #[test]
    fn test_no_records_gives_empty_buckets() {
        let ids = agents(6);
        let dist = distribute(Vec::new(), &ids, &mut StdRng::seed_from_u64(0));

        assert_eq!(dist.assignments.len(), 6);
        assert_eq!(dist.total(), 0);
        assert_eq!(dist.non_empty().count(), 0);
    }

    #[test]
    fn test_no_agents_gives_no_buckets() {
        let dist = distribute(records(3), &[], &mut StdRng::seed_from_u64(0));
        assert!(dist.assignments.is_empty());
    }

    #[test]
    fn test_same_seed_same_order() {
        let ids = agents(8);
        let a = distribute(records(16), &ids, &mut StdRng::seed_from_u64(42));
        let b = distribute(records(16), &ids, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }
}
