use std::collections::{HashMap, HashSet};

use proptest::prelude::*;

use taskdag::config::ConfigFile;
use taskdag::ident::{Ident, TaskName};
use taskdag::track::{Scheduler, TaskStatus};
use taskdag_test_utils::builders::{task_name, ConfigFileBuilder, TaskConfigBuilder};

// Strategy to generate a valid DAG configuration.
// We ensure acyclicity by only allowing task N to depend on tasks 0..N-1.
fn dag_config_strategy(max_tasks: usize) -> impl Strategy<Value = ConfigFile> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        // Generate a list of dependency lists. The strategy can't depend on
        // the index 'i' inside a vec combinator, so generate random indices
        // and sanitize them afterwards.
        let deps_strat = proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        );

        deps_strat.prop_map(move |raw_deps| {
            let mut builder = ConfigFileBuilder::new();
            for (i, potential_deps) in raw_deps.into_iter().enumerate() {
                let name = format!("task_{}", i);
                let mut task_builder =
                    TaskConfigBuilder::new().cmd(&format!("echo {}", name));

                // Sanitize dependencies: only allow deps < i
                let mut valid_deps = HashSet::new();
                for dep_idx in potential_deps {
                    if i > 0 {
                        valid_deps.insert(dep_idx % i);
                    }
                }

                for dep_idx in valid_deps {
                    task_builder = task_builder.depends_on(&format!("task_{}", dep_idx));
                }
                builder = builder.with_task(&name, task_builder.build());
            }
            builder.build()
        })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn random_dags_terminate_in_dependency_order(
        cfg in dag_config_strategy(8),
        goal_indices in proptest::collection::vec(0..8usize, 1..4),
        failing_indices in proptest::collection::vec(0..8usize, 0..3),
    ) {
        let mut scheduler = Scheduler::from_config(&cfg).unwrap();
        let spec_names: Vec<TaskName> =
            cfg.specs().iter().map(|s| s.name.clone()).collect();

        let goals: Vec<TaskName> = goal_indices
            .iter()
            .filter(|&&i| i < spec_names.len())
            .map(|&i| spec_names[i].clone())
            .collect();
        let failing: HashSet<String> = failing_indices
            .iter()
            .filter(|&&i| i < spec_names.len())
            .map(|&i| spec_names[i].to_string())
            .collect();
        prop_assume!(!goals.is_empty());

        for goal in &goals {
            scheduler.queue_entry(goal, true).unwrap();
        }
        scheduler.build_network().unwrap();

        // Instances currently "executing", completed FIFO.
        let mut executing: Vec<TaskName> = Vec::new();
        let mut dispatched: HashSet<TaskName> = HashSet::new();
        let mut order: Vec<TaskName> = Vec::new();

        let mut steps = 0usize;
        let max_steps = 10_000usize;

        loop {
            prop_assert!(steps < max_steps, "simulation did not settle");
            steps += 1;

            while let Some(task) = scheduler.next_for().unwrap() {
                prop_assert!(
                    dispatched.insert(task.name.clone()),
                    "{} dispatched twice",
                    task.name
                );
                order.push(task.name.clone());
                executing.push(task.name.clone());
            }

            if executing.is_empty() {
                if scheduler.is_idle() {
                    break;
                }
                // Nothing runnable and nothing running: the next sweep
                // decays deferred entries until they dispatch or halt.
                continue;
            }

            let task = executing.remove(0);
            let status = if failing.contains(&task.de_uniq().to_string()) {
                TaskStatus::Failed
            } else {
                TaskStatus::Success
            };
            scheduler.set_status(&task, status);
            scheduler.build_network().unwrap();
        }

        // First-dispatch position per plain name.
        let mut position: HashMap<String, usize> = HashMap::new();
        for (idx, name) in order.iter().enumerate() {
            position.entry(name.de_uniq().to_string()).or_insert(idx);
        }

        for spec in cfg.specs() {
            let Some(&task_pos) = position.get(&spec.name.to_string()) else {
                continue;
            };
            for rel in &spec.depends_on {
                if let Ident::Task(dep) = &rel.target {
                    let dep_pos = position.get(&dep.to_string()).copied();
                    prop_assert!(
                        dep_pos.is_some_and(|d| d < task_pos),
                        "{} dispatched without {} finishing first",
                        spec.name,
                        dep
                    );
                    // A dispatched task implies every dependency succeeded.
                    prop_assert!(
                        !failing.contains(&dep.to_string()),
                        "{} ran although its dependency {} fails",
                        spec.name,
                        dep
                    );
                }
            }
        }

        // Every goal must settle on a terminal status.
        for (goal, status) in scheduler.user_goal_statuses() {
            prop_assert!(
                status.is_terminal(),
                "goal {} finished the run as {:?}",
                goal,
                status
            );
        }
    }

    #[test]
    fn independent_tasks_dispatch_by_priority(
        priorities in proptest::collection::vec(-5..25i32, 1..6),
    ) {
        let mut builder = ConfigFileBuilder::new();
        for (i, p) in priorities.iter().enumerate() {
            builder = builder.with_task(
                &format!("task_{}", i),
                TaskConfigBuilder::new().cmd("true").priority(*p).build(),
            );
        }
        let cfg = builder.build();

        let mut scheduler = Scheduler::from_config(&cfg).unwrap();
        for i in 0..priorities.len() {
            scheduler
                .queue_entry(&task_name(&format!("task_{}", i)), true)
                .unwrap();
        }
        scheduler.build_network().unwrap();

        let mut order = Vec::new();
        while let Some(task) = scheduler.next_for().unwrap() {
            order.push(task.name.de_uniq().to_string());
        }

        // Highest priority first; equal priorities keep queueing order.
        let mut expected: Vec<(i32, usize)> =
            priorities.iter().copied().enumerate().map(|(i, p)| (p, i)).collect();
        expected.sort_by_key(|&(p, _)| std::cmp::Reverse(p));
        let expected: Vec<String> =
            expected.into_iter().map(|(_, i)| format!("task_{}", i)).collect();

        prop_assert_eq!(order, expected);
    }
}
