// tests/spec_merging.rs

use std::collections::BTreeMap;

use taskdag::ident::Ident;
use taskdag::spec::{
    render_template, render_value, Injection, MetaFlag, Relation, TaskKind, Value,
    CLEANUP_CMD_KEY, CMD_KEY, DEFAULT_PRIORITY,
};
use taskdag_test_utils::builders::{task_name, SpecBuilder};

fn params(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn templates_render_from_params() {
    let p = params(&[
        ("name", Value::from("report")),
        ("count", Value::Int(3)),
    ]);
    assert_eq!(
        render_template("run {name} x{count}", &p).unwrap(),
        "run report x3"
    );
    // Text without placeholders passes through, stray braces included.
    assert_eq!(render_template("a {not a key} b", &p).unwrap(), "a {not a key} b");

    let err = render_template("echo {missing}", &p).unwrap_err();
    assert!(err.to_string().contains("missing"));
}

#[test]
fn exact_placeholder_keeps_the_value_type() {
    let p = params(&[
        ("count", Value::Int(3)),
        ("flags", Value::List(vec![Value::from("-v"), Value::from("-q")])),
    ]);
    // A bare "{key}" template moves the value across untouched.
    assert_eq!(render_value("{count}", &p).unwrap(), Value::Int(3));
    // Anything more than the bare placeholder renders to a string.
    assert_eq!(
        render_value("{count}!", &p).unwrap(),
        Value::from("3!")
    );
    // Lists flatten space-separated when forced into a string.
    assert_eq!(render_value("use {flags}", &p).unwrap(), Value::from("use -v -q"));
}

#[test]
fn merged_over_layers_child_on_ancestor() {
    let base = SpecBuilder::new("ci::base")
        .cmd("make")
        .param("profile", "dev")
        .param("jobs", 4i64)
        .depends_on_task("ci::env")
        .priority(3)
        .job()
        .build();
    let child = SpecBuilder::new("ci::build")
        .source("ci::base")
        .param("profile", "release")
        .depends_on_task("ci::lint")
        .must_inject("out_dir")
        .build();

    let merged = child.merged_over(&base);

    assert_eq!(merged.name, task_name("ci::build"));
    // Child keys win; untouched ancestor keys survive.
    assert_eq!(merged.extra.get("profile"), Some(&Value::from("release")));
    assert_eq!(merged.extra.get("jobs"), Some(&Value::Int(4)));
    assert_eq!(merged.extra.get(CMD_KEY), Some(&Value::from("make")));
    // Relation groups concatenate.
    let dep_targets: Vec<String> = merged
        .depends_on
        .iter()
        .map(|rel| rel.target.to_string())
        .collect();
    assert_eq!(dep_targets, vec!["ci::env", "ci::lint"]);
    // Defaults inherit, explicit values stick.
    assert_eq!(merged.kind, TaskKind::Job);
    assert_eq!(merged.priority, 3);
    assert_eq!(merged.must_inject, vec!["out_dir".to_string()]);
}

#[test]
fn merged_over_replaces_relation_on_same_target() {
    let base = SpecBuilder::new("b")
        .depends_on_rel(Relation::task(task_name("shared")).with_constraints(["k".to_string()]))
        .build();
    let child = SpecBuilder::new("c")
        .depends_on_task("shared")
        .build();

    let merged = child.merged_over(&base);
    assert_eq!(merged.depends_on.len(), 1);
    // The child's plain relation replaced the constrained ancestor one.
    assert!(merged.depends_on[0].constraints.is_empty());
}

#[test]
fn explicit_child_settings_beat_the_ancestor() {
    let base = SpecBuilder::new("b").priority(3).build();
    let child = SpecBuilder::new("c").priority(7).build();
    assert_eq!(child.merged_over(&base).priority, 7);

    let loud = SpecBuilder::new("c").priority(DEFAULT_PRIORITY).build();
    assert_eq!(loud.merged_over(&base).priority, 3);
}

#[test]
fn instantiate_mints_concrete_name_and_records_provenance() {
    let spec = SpecBuilder::new("grp::task").cmd("true").build();
    let inst = spec.instantiate();
    assert!(inst.name.is_concrete());
    assert!(inst.name.derives_from(&spec.name));
    assert_eq!(inst.sources.last(), Some(&spec.name));

    // Instantiating the instance again must not stack another source.
    let again = inst.instantiate();
    assert_eq!(again.sources, inst.sources);
}

#[test]
fn head_spec_runs_no_command() {
    let body = SpecBuilder::new("deploy")
        .job()
        .cmd("deploy.sh")
        .param(CLEANUP_CMD_KEY, "teardown.sh")
        .param("region", "eu")
        .required_for_task("notify")
        .priority(5)
        .build()
        .instantiate();

    let head = body.head_spec(&body.name);

    assert_eq!(head.name, task_name("deploy").with_head());
    assert!(head.meta.contains(&MetaFlag::JobHead));
    assert_eq!(head.priority, 5);
    // The head waits on the body and takes over its forward relations.
    assert_eq!(head.depends_on, vec![Relation::task(body.name.clone())]);
    assert_eq!(head.required_for, body.required_for);
    // Parameters carry over, commands do not.
    assert_eq!(head.extra.get("region"), Some(&Value::from("eu")));
    assert_eq!(head.extra.get(CMD_KEY), None);
    assert_eq!(head.extra.get(CLEANUP_CMD_KEY), None);
}

#[test]
fn cleanup_spec_promotes_the_cleanup_command() {
    let parent = SpecBuilder::new("svc")
        .cmd("svc start")
        .param(CLEANUP_CMD_KEY, "svc stop")
        .param("port", 8080i64)
        .cleanup_rel(Relation::task(task_name("audit")))
        .priority(2)
        .build()
        .instantiate();

    let cleanup = parent.cleanup_spec(&parent.name);

    assert_eq!(cleanup.name, task_name("svc").with_cleanup());
    assert_eq!(cleanup.priority, 2);
    // Waits on the parent first, then whatever extra cleanup relations say.
    assert_eq!(cleanup.depends_on[0], Relation::task(parent.name.clone()));
    assert_eq!(cleanup.depends_on[1], Relation::task(task_name("audit")));
    // `cleanup_cmd` becomes the command; the parent's own command is gone.
    assert_eq!(cleanup.extra.get(CMD_KEY), Some(&Value::from("svc stop")));
    assert_eq!(cleanup.extra.get(CLEANUP_CMD_KEY), None);
    assert_eq!(cleanup.extra.get("port"), Some(&Value::Int(8080)));
}

#[test]
fn cleanup_spec_without_cleanup_cmd_has_no_command() {
    let parent = SpecBuilder::new("svc").cmd("svc start").build().instantiate();
    let cleanup = parent.cleanup_spec(&parent.name);
    assert_eq!(cleanup.extra.get(CMD_KEY), None);
}

#[test]
fn accepts_checks_provenance_constraints_and_injected_values() {
    let control = SpecBuilder::new("consumer")
        .param("profile", "dev")
        .param("workdir", "/tmp/w")
        .build();

    let rel = Relation::task(task_name("env")).with_constraints(["profile".to_string()]);

    let good = SpecBuilder::new("env").param("profile", "dev").build().instantiate();
    assert!(rel.accepts(&control, &good));

    // Abstract candidates are never acceptable.
    let abstract_env = SpecBuilder::new("env").param("profile", "dev").build();
    assert!(!rel.accepts(&control, &abstract_env));

    // Wrong template lineage.
    let stranger = SpecBuilder::new("other").param("profile", "dev").build().instantiate();
    assert!(!rel.accepts(&control, &stranger));

    // Constraint key disagrees, or is missing from the candidate.
    let prod = SpecBuilder::new("env").param("profile", "prod").build().instantiate();
    assert!(!rel.accepts(&control, &prod));
    let bare = SpecBuilder::new("env").build().instantiate();
    assert!(!rel.accepts(&control, &bare));

    // A constraint key the control spec does not define is vacuous.
    let rel_vacuous =
        Relation::task(task_name("env")).with_constraints(["no_such_key".to_string()]);
    assert!(rel_vacuous.accepts(&control, &good));
}

#[test]
fn accepts_requires_already_injected_values() {
    let control = SpecBuilder::new("consumer").param("workdir", "/tmp/w").build();
    let rel = Relation::task(task_name("env")).with_injection(Injection::new(
        [("root".to_string(), "{workdir}".to_string())].into(),
    ));

    let holds = SpecBuilder::new("env").param("root", "/tmp/w").build().instantiate();
    assert!(rel.accepts(&control, &holds));

    let differs = SpecBuilder::new("env").param("root", "/elsewhere").build().instantiate();
    assert!(!rel.accepts(&control, &differs));
}

#[test]
fn artifact_relations_never_accept_instances() {
    let control = SpecBuilder::new("consumer").build();
    let rel = Relation {
        target: Ident::Artifact("out.txt".parse().unwrap()),
        constraints: Vec::new(),
        injection: None,
    };
    let candidate = SpecBuilder::new("env").build().instantiate();
    assert!(!rel.accepts(&control, &candidate));
}

#[test]
fn injection_renders_each_mapping_entry() {
    let injection = Injection::new(
        [
            ("dest".to_string(), "{workdir}/out".to_string()),
            ("jobs".to_string(), "{jobs}".to_string()),
        ]
        .into(),
    );
    let p = params(&[("workdir", Value::from("/w")), ("jobs", Value::Int(2))]);
    let rendered = injection.render(&p).unwrap();
    assert_eq!(rendered.get("dest"), Some(&Value::from("/w/out")));
    assert_eq!(rendered.get("jobs"), Some(&Value::Int(2)));
}
