// tests/resolver_properties.rs

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use proptest::prelude::*;

use pipedag::engine::{ExecutorOptions, Pipeline};
use pipedag::store::{CheckPolicy, MemoryCompletionStore};
use pipedag::task::TaskId;
use pipedag_test_utils::fake_task::FakeGraph;

/// Random DAG over `task_0..task_n`: task `i` may only depend on tasks
/// `0..i`, which keeps it acyclic. The last task is the goal. Each task is
/// independently marked complete or not.
#[derive(Debug, Clone)]
struct Scenario {
    deps: Vec<BTreeSet<usize>>,
    complete: Vec<bool>,
}

fn scenario_strategy(max_tasks: usize) -> impl Strategy<Value = Scenario> {
    (1..=max_tasks).prop_flat_map(|n| {
        (
            proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..4), n),
            proptest::collection::vec(any::<bool>(), n),
        )
            .prop_map(move |(raw, complete)| {
                let deps = raw
                    .into_iter()
                    .enumerate()
                    .map(|(i, picks)| {
                        if i == 0 {
                            BTreeSet::new()
                        } else {
                            picks.into_iter().map(|p| p % i).collect()
                        }
                    })
                    .collect();
                Scenario { deps, complete }
            })
    })
}

fn name(i: usize) -> String {
    format!("task_{i}")
}

fn marker(i: usize) -> String {
    format!("out/task_{i}")
}

fn build(scenario: &Scenario) -> (FakeGraph, MemoryCompletionStore) {
    let graph = FakeGraph::new();
    for (i, deps) in scenario.deps.iter().enumerate() {
        let dep_names: Vec<String> = deps.iter().map(|d| name(*d)).collect();
        let dep_refs: Vec<&str> = dep_names.iter().map(String::as_str).collect();
        let m = marker(i);
        graph.add(&name(i), &dep_refs, &[m.as_str()]);
    }
    let store = MemoryCompletionStore::with_markers(
        scenario
            .complete
            .iter()
            .enumerate()
            .filter(|(_, done)| **done)
            .map(|(i, _)| marker(i)),
    );
    (graph, store)
}

/// Tasks reachable from the goal without passing through a complete task.
fn expected_schedule(scenario: &Scenario) -> HashSet<usize> {
    let goal = scenario.deps.len() - 1;
    let mut seen = HashSet::new();
    let mut stack = vec![goal];
    while let Some(i) = stack.pop() {
        if scenario.complete[i] || !seen.insert(i) {
            continue;
        }
        stack.extend(scenario.deps[i].iter().copied());
    }
    seen
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("build tokio runtime")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn plan_is_minimal_deduplicated_and_dependency_ordered(scenario in scenario_strategy(12)) {
        let (graph, store) = build(&scenario);
        let goal = name(scenario.deps.len() - 1);
        let pipeline = Pipeline::new(
            Arc::new(store),
            ExecutorOptions { workers: 1, check_policy: CheckPolicy::no_retry() },
        );

        let plan = runtime()
            .block_on(pipeline.plan(graph.get(&goal)))
            .expect("acyclic graph resolves");

        let ids = plan.ids();
        let unique: HashSet<&TaskId> = ids.iter().collect();
        prop_assert_eq!(unique.len(), ids.len(), "duplicate task in plan");

        let scheduled: HashSet<usize> = ids
            .iter()
            .map(|id| id.kind().trim_start_matches("task_").parse::<usize>().unwrap())
            .collect();
        prop_assert_eq!(&scheduled, &expected_schedule(&scenario));

        for (pos, id) in ids.iter().enumerate() {
            let i: usize = id.kind().trim_start_matches("task_").parse().unwrap();
            for dep in &scenario.deps[i] {
                if let Some(dep_pos) = plan.position(&TaskId::new(name(*dep))) {
                    prop_assert!(dep_pos < pos, "{} scheduled before its dependency", id);
                }
            }
        }

        prop_assert!(graph.runs().is_empty());
    }

    #[test]
    fn running_the_plan_completes_goal_and_second_run_is_empty(
        scenario in scenario_strategy(10),
        workers in 1usize..4,
    ) {
        let (graph, store) = build(&scenario);
        let goal = name(scenario.deps.len() - 1);
        let pipeline = Pipeline::new(
            Arc::new(store.clone()),
            ExecutorOptions { workers, check_policy: CheckPolicy::no_retry() },
        );
        let rt = runtime();

        let report = rt.block_on(pipeline.run(graph.get(&goal))).expect("run succeeds");
        prop_assert!(report.is_success());
        prop_assert_eq!(graph.runs().len(), expected_schedule(&scenario).len());
        prop_assert!(store.contains(&marker(scenario.deps.len() - 1).into()));

        graph.clear_runs();
        let again = rt.block_on(pipeline.plan(graph.get(&goal))).expect("resolves");
        prop_assert!(again.is_empty());
        prop_assert!(graph.runs().is_empty());
    }
}
