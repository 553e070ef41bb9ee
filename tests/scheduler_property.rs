mod common;

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;

use rundag::run::{DependencyOrder, RunQueue, UnitStatus};

use common::{run_queue, runner_options, FakeExecutor, UnitBuilder};

// Strategy to generate a valid DAG: unit N may only depend on units with a
// lower index, which makes cycles impossible by construction.
fn dag_strategy(max_units: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max_units).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..n), n).prop_map(
            |raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(i, potential)| {
                        let mut deps = HashSet::new();
                        for d in potential {
                            if i > 0 {
                                deps.insert(d % i);
                            }
                        }
                        let mut deps: Vec<usize> = deps.into_iter().collect();
                        deps.sort_unstable();
                        deps
                    })
                    .collect()
            },
        )
    })
}

fn unit_name(i: usize) -> String {
    format!("unit-{i}")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn random_dags_run_every_reachable_unit_exactly_once(
        deps in dag_strategy(8),
        failing_indices in proptest::collection::vec(0..8usize, 0..3),
    ) {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();

        rt.block_on(async move {
            let n = deps.len();
            let failing: HashSet<usize> =
                failing_indices.into_iter().filter(|i| *i < n).collect();

            let units: Vec<_> = deps
                .iter()
                .enumerate()
                .map(|(i, ds)| {
                    let mut builder = UnitBuilder::new(&unit_name(i));
                    for d in ds {
                        builder = builder.after(&unit_name(*d));
                    }
                    builder.build()
                })
                .collect();

            let queue = RunQueue::linked(units, DependencyOrder::Normal).unwrap();
            let executor = Arc::new(FakeExecutor::failing(
                failing.iter().map(|i| unit_name(*i)),
            ));
            let opts = Arc::new(runner_options(executor.clone()));

            let result = run_queue(&queue, &opts, None, 3).await;

            // A unit ends up failed when its own command fails or any of
            // its dependencies failed; deps always point at lower indices,
            // so this folds in index order.
            let mut failed = vec![false; n];
            for i in 0..n {
                failed[i] = failing.contains(&i) || deps[i].iter().any(|d| failed[*d]);
            }

            // A unit actually runs iff none of its dependencies failed.
            let should_run: HashSet<String> = (0..n)
                .filter(|i| deps[*i].iter().all(|d| !failed[*d]))
                .map(unit_name)
                .collect();

            let executed = executor.executed();
            let executed_set: HashSet<String> = executed.iter().cloned().collect();

            assert_eq!(
                executed.len(),
                executed_set.len(),
                "a unit ran twice: {executed:?}"
            );
            assert_eq!(executed_set, should_run);

            // Dependencies start (and therefore finish) before dependents.
            for (i, ds) in deps.iter().enumerate() {
                let Some(pos) = executed.iter().position(|p| *p == unit_name(i)) else {
                    continue;
                };
                for d in ds {
                    let dep_pos = executed
                        .iter()
                        .position(|p| *p == unit_name(*d))
                        .expect("an executed unit's dependency must have run");
                    assert!(
                        dep_pos < pos,
                        "unit-{d} must run before unit-{i}: {executed:?}"
                    );
                }
            }

            for node in queue.iter() {
                assert_eq!(node.status(), UnitStatus::Finished);
            }

            let expected_failures = failed.iter().filter(|f| **f).count();
            match result {
                Ok(()) => assert_eq!(expected_failures, 0),
                Err(errs) => assert_eq!(errs.len(), expected_failures),
            }
        });
    }
}
