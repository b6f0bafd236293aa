// tests/registry_instantiation.rs

use taskdag::errors::TrackingError;
use taskdag::spec::{Injection, Relation, Value, CMD_KEY};
use taskdag::track::{Registry, ReusePolicy, JOB_HEAD_KEY};
use taskdag_test_utils::builders::{artifact, task_name, SpecBuilder};

#[test]
fn instantiating_twice_reuses_the_instance() {
    let mut reg = Registry::new(ReusePolicy::MostRecent);
    reg.register_spec(SpecBuilder::new("fetch").cmd("curl x").build())
        .unwrap();

    let first = reg.instantiate_spec(&task_name("fetch")).unwrap().unwrap();
    let second = reg.instantiate_spec(&task_name("fetch")).unwrap().unwrap();

    assert_eq!(first, second);
    assert_eq!(reg.instances_of(&task_name("fetch")), &[first.clone()]);
    assert!(first.derives_from(&task_name("fetch")));
}

#[test]
fn disabled_specs_resolve_to_nothing() {
    let mut reg = Registry::new(ReusePolicy::MostRecent);
    reg.register_spec(SpecBuilder::new("old").cmd("true").disabled().build())
        .unwrap();

    assert!(reg.instantiate_spec(&task_name("old")).unwrap().is_none());
    assert!(reg.instances_of(&task_name("old")).is_empty());
}

#[test]
fn re_registering_must_match_the_existing_spec() {
    let mut reg = Registry::new(ReusePolicy::MostRecent);
    let spec = SpecBuilder::new("a").cmd("echo 1").build();
    reg.register_spec(spec.clone()).unwrap();

    // Identical registration is a no-op.
    reg.register_spec(spec).unwrap();

    let conflicting = SpecBuilder::new("a").cmd("echo 2").build();
    match reg.register_spec(conflicting) {
        Err(TrackingError::SpecConflict(name)) => assert_eq!(name, "a"),
        other => panic!("expected SpecConflict, got {other:?}"),
    }
}

#[test]
fn registration_synthesizes_cleanup_and_head_templates() {
    let mut reg = Registry::new(ReusePolicy::MostRecent);
    reg.register_spec(SpecBuilder::new("svc").cmd("run").build())
        .unwrap();
    reg.register_spec(SpecBuilder::new("batch").job().cmd("run").build())
        .unwrap();

    let names: Vec<String> = reg.spec_names().iter().map(|n| n.to_string()).collect();
    assert!(names.contains(&"svc::$cleanup$".to_string()));
    assert!(names.contains(&"batch::$cleanup$".to_string()));
    assert!(names.contains(&"batch::$head$".to_string()));
    // Plain specs get no head.
    assert!(!names.contains(&"svc::$head$".to_string()));
}

#[test]
fn sources_fold_left_to_right_with_the_spec_last() {
    let mut reg = Registry::new(ReusePolicy::MostRecent);
    reg.register_spec(
        SpecBuilder::new("defaults")
            .param("retries", 1i64)
            .param("region", "eu")
            .priority(7)
            .build(),
    )
    .unwrap();
    reg.register_spec(SpecBuilder::new("overrides").param("retries", 5i64).build())
        .unwrap();
    reg.register_spec(
        SpecBuilder::new("deploy")
            .source("defaults")
            .source("overrides")
            .cmd("deploy {region}")
            .build(),
    )
    .unwrap();

    let inst = reg.instantiate_spec(&task_name("deploy")).unwrap().unwrap();
    let spec = reg.spec(&inst).unwrap();

    // Later sources shadow earlier ones; the spec itself wins overall.
    assert_eq!(spec.extra.get("retries"), Some(&Value::Int(5)));
    assert_eq!(spec.extra.get("region"), Some(&Value::from("eu")));
    assert_eq!(spec.extra.get(CMD_KEY), Some(&Value::from("deploy {region}")));
    assert_eq!(spec.priority, 7);
}

#[test]
fn unregistered_source_is_an_error() {
    let mut reg = Registry::new(ReusePolicy::MostRecent);
    reg.register_spec(SpecBuilder::new("child").source("ghost").build())
        .unwrap();

    match reg.instantiate_spec(&task_name("child")) {
        Err(TrackingError::UnregisteredSource { spec, source }) => {
            assert_eq!(spec, "child");
            assert_eq!(source, "ghost");
        }
        other => panic!("expected UnregisteredSource, got {other:?}"),
    }
}

#[test]
fn relation_reuse_respects_injected_values() {
    let mut reg = Registry::new(ReusePolicy::MostRecent);
    reg.register_spec(SpecBuilder::new("env").cmd("setup").build())
        .unwrap();
    reg.register_spec(SpecBuilder::new("use::dev").param("profile", "dev").build())
        .unwrap();
    reg.register_spec(SpecBuilder::new("use::prod").param("profile", "prod").build())
        .unwrap();

    let dev = reg.instantiate_spec(&task_name("use::dev")).unwrap().unwrap();
    let prod = reg.instantiate_spec(&task_name("use::prod")).unwrap().unwrap();

    let rel = Relation::task(task_name("env")).with_injection(Injection::new(
        [("profile".to_string(), "{profile}".to_string())].into(),
    ));

    let env_dev = reg.instantiate_relation(&dev, &rel).unwrap().unwrap();
    // Same control again: the existing instance already holds the values.
    let env_dev_again = reg.instantiate_relation(&dev, &rel).unwrap().unwrap();
    assert_eq!(env_dev, env_dev_again);

    // A control that would inject different values gets a fresh instance.
    let env_prod = reg.instantiate_relation(&prod, &rel).unwrap().unwrap();
    assert_ne!(env_dev, env_prod);
    assert_eq!(reg.instances_of(&task_name("env")).len(), 2);

    assert_eq!(
        reg.spec(&env_dev).unwrap().extra.get("profile"),
        Some(&Value::from("dev"))
    );
    assert_eq!(
        reg.spec(&env_prod).unwrap().extra.get("profile"),
        Some(&Value::from("prod"))
    );
}

#[test]
fn reuse_policy_picks_among_matching_instances() {
    let template = SpecBuilder::new("env").cmd("setup").build();
    let i1 = template.instantiate();
    let i2 = template.instantiate();

    let mut recent = Registry::new(ReusePolicy::MostRecent);
    recent.register_spec(template.clone()).unwrap();
    recent.register_spec(i1.clone()).unwrap();
    recent.register_spec(i2.clone()).unwrap();
    assert_eq!(
        recent.instantiate_spec(&task_name("env")).unwrap().unwrap(),
        i2.name
    );

    let mut first = Registry::new(ReusePolicy::FirstRegistered);
    first.register_spec(template).unwrap();
    first.register_spec(i1.clone()).unwrap();
    first.register_spec(i2).unwrap();
    assert_eq!(
        first.instantiate_spec(&task_name("env")).unwrap().unwrap(),
        i1.name
    );
}

#[test]
fn must_inject_blocks_dispatch_until_satisfied() {
    let mut reg = Registry::new(ReusePolicy::MostRecent);
    reg.register_spec(
        SpecBuilder::new("needy")
            .cmd("use {root}")
            .must_inject("root")
            .build(),
    )
    .unwrap();
    reg.register_spec(SpecBuilder::new("giver").param("workdir", "/w").build())
        .unwrap();

    let bare = reg.instantiate_spec(&task_name("needy")).unwrap().unwrap();
    match reg.make_task(&bare) {
        Err(TrackingError::InjectionFailed { target, .. }) => assert_eq!(target, bare.to_string()),
        other => panic!("expected InjectionFailed, got {other:?}"),
    }

    let giver = reg.instantiate_spec(&task_name("giver")).unwrap().unwrap();
    let rel = Relation::task(task_name("needy")).with_injection(Injection::new(
        [("root".to_string(), "{workdir}".to_string())].into(),
    ));
    let fed = reg.instantiate_relation(&giver, &rel).unwrap().unwrap();
    let task = reg.make_task(&fed).unwrap();
    assert_eq!(task.command().unwrap(), Some("use /w".to_string()));
}

#[test]
fn cleanup_instances_are_minted_once_per_parent() {
    let mut reg = Registry::new(ReusePolicy::MostRecent);
    reg.register_spec(SpecBuilder::new("svc").cmd("run").build())
        .unwrap();
    let parent = reg.instantiate_spec(&task_name("svc")).unwrap().unwrap();

    let c1 = reg.instantiate_cleanup(&parent).unwrap();
    let c2 = reg.instantiate_cleanup(&parent).unwrap();
    assert_eq!(c1, c2);
    assert!(c1.derives_from(&task_name("svc").with_cleanup()));
}

#[test]
fn job_bodies_learn_their_head_at_dispatch() {
    let mut reg = Registry::new(ReusePolicy::MostRecent);
    reg.register_spec(SpecBuilder::new("ingest").job().cmd("ingest.sh").build())
        .unwrap();

    let body = reg.instantiate_spec(&task_name("ingest")).unwrap().unwrap();
    let head = reg.head_of(&body).cloned().unwrap();
    assert!(head.derives_from(&task_name("ingest").with_head()));

    let task = reg.make_task(&body).unwrap();
    assert_eq!(
        task.state.get(JOB_HEAD_KEY),
        Some(&Value::Str(head.to_string()))
    );

    // The head instance exists up front and runs nothing itself.
    let head_spec = reg.spec(&head).unwrap();
    assert_eq!(head_spec.extra.get(CMD_KEY), None);
}

#[test]
fn producer_indexes_cover_exact_and_glob_artifacts() {
    let mut reg = Registry::new(ReusePolicy::MostRecent);
    reg.register_spec(
        SpecBuilder::new("pack")
            .cmd("pack")
            .required_for_artifact("out/a.txt")
            .build(),
    )
    .unwrap();
    reg.register_spec(
        SpecBuilder::new("gen")
            .cmd("gen")
            .required_for_artifact("out/*.txt")
            .build(),
    )
    .unwrap();
    reg.register_spec(
        SpecBuilder::new("reader")
            .cmd("read")
            .depends_on_artifact("out/a.txt")
            .build(),
    )
    .unwrap();

    let exact = artifact("out/a.txt");
    let producers: Vec<String> = reg
        .producers_matching(&exact)
        .iter()
        .map(|n| n.to_string())
        .collect();
    assert_eq!(producers, vec!["gen".to_string(), "pack".to_string()]);

    assert_eq!(reg.producers_of(&artifact("out/*.txt")), vec![task_name("gen")]);
    assert_eq!(reg.consumers_of(&exact), vec![task_name("reader")]);
}
