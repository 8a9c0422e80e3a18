// Makespan Lower Bound

use crate::domain::Instance;

/// Classical job-shop lower bound: the larger of the heaviest job workload
/// and the heaviest machine workload, using expected durations.
///
/// Used by the middleware to scale the time-based truncation limit; never
/// used for scheduling decisions.
pub fn lower_bound(instance: &Instance) -> u64 {
    let job_bound = instance
        .jobs
        .iter()
        .map(|job| {
            job.operations
                .iter()
                .map(|op| op.duration.expected())
                .sum::<u64>()
        })
        .max()
        .unwrap_or(0);

    let machine_bound = instance
        .machines
        .iter()
        .map(|machine| {
            instance
                .jobs
                .iter()
                .flat_map(|job| &job.operations)
                .filter(|op| op.machine_id == machine.id)
                .map(|op| op.duration.expected())
                .sum::<u64>()
        })
        .max()
        .unwrap_or(0);

    job_bound.max(machine_bound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testkit;

    #[test]
    fn lower_bound_of_two_by_two() {
        let (instance, _) = testkit::two_machine_shop();
        // job workloads: 5 and 6; machine workloads: m-0 = 7, m-1 = 4
        assert_eq!(lower_bound(&instance), 7);
    }
}
