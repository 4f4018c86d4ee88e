const DATA: &str = include_str!("args_test.in");

use std::time::Duration;

use doc_stress::configuration::RetrieveBound;
use doc_stress::fanout::Target;
use doc_stress::store::CollectionName;
use doc_stress::template::TemplateKind;

use crate::args::{parse_doc_stress_args, DocStressArgs, LogLevel, ParseResult, StoreKind};

fn parse(s: &str) -> Option<DocStressArgs> {
    match parse_doc_stress_args(s.split_ascii_whitespace(), false) {
        Some(ParseResult::Config(config)) => Some(*config),
        _ => None,
    }
}

#[test]
fn test_example_sets() {
    let mut success_count = 0;
    let mut failure_count = 0;

    for (i, s) in DATA.lines().enumerate() {
        let s = s.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        match parse_doc_stress_args(s.split_ascii_whitespace(), false) {
            Some(_) => success_count += 1,
            None => {
                eprintln!("  line {}: {}", i + 1, s);
                failure_count += 1;
            }
        }
    }

    println!("Successes: {success_count}, failures: {failure_count}");
    assert_eq!(failure_count, 0);
}

#[test]
fn test_defaults() {
    let args = parse("doc-stress -i 127.0.0.1").unwrap();
    assert_eq!(args.store, StoreKind::Cql);
    assert_eq!(args.nodes, ["127.0.0.1"]);
    assert_eq!(args.username, "Administrator");
    assert_eq!(args.bucket, "default");
    assert_eq!(
        args.target,
        Target::Single(CollectionName::new("_default", "default"))
    );
    assert_eq!(args.log_level, LogLevel::Info);
    assert!(!args.loop_forever);
    assert_eq!(args.loop_interval, Duration::from_secs(30));

    let spec = &args.workload;
    assert_eq!(spec.num_ops, 1000);
    assert_eq!(spec.percent_create, 100);
    assert_eq!(spec.start_seq_num, 1);
    assert_eq!(spec.key_for(7), "doc_7");
    assert_eq!(spec.template, TemplateKind::Person);
    assert_eq!(spec.doc_size, 500);
    assert_eq!(spec.expiry, None);
    assert!(spec.fields_to_update.is_empty());
    assert!(spec.secondary_sync.is_none());
    assert_eq!(spec.retrieve_bound, RetrieveBound::Legacy);

    assert_eq!(args.limits.concurrency, 4);
    assert_eq!(args.limits.max_retries, 20);
    assert_eq!(args.limits.deadline, Duration::from_secs(1000));
}

#[test]
fn test_workload_values() {
    let args = parse(
        "doc-stress -store memory -ac -n 200 -pc 50 -pu 10 -pd 5 -dsn 7 \
         -dpx k -dsx _s -dt emp -de 60 -fu salary,,dept -tx -sd false -rb exact",
    )
    .unwrap();
    assert_eq!(args.target, Target::All);

    let spec = &args.workload;
    assert_eq!(spec.key_for(9), "k9_s");
    assert_eq!(spec.template, TemplateKind::Emp);
    assert_eq!(spec.template_name, "emp");
    assert_eq!(spec.expiry, Some(Duration::from_secs(60)));
    assert_eq!(spec.fields_to_update, ["salary", "dept"]);
    assert!(spec.transactional);
    assert!(!spec.shuffle);
    assert_eq!(spec.retrieve_bound, RetrieveBound::Exact);
}

#[test]
fn test_secondary_sync_target() {
    let args = parse(
        "doc-stress -store memory -es -es_host es.local -es_port 9200 \
         -es_login admin -es_password pw -es_dir /tmp/bulk",
    )
    .unwrap();
    let target = args.workload.secondary_sync.unwrap();
    assert_eq!(target.bulk_url(), "http://es.local:9200/_bulk");
    assert_eq!(target.login, "admin");
    assert_eq!(target.bulk_dir, std::path::Path::new("/tmp/bulk"));
    assert_eq!(target.max_retries, 5);
}

#[test]
fn test_rejected() {
    let rejected = [
        // The cql store needs contact nodes
        "doc-stress",
        "doc-stress -i ,",
        "doc-stress -store sqlite",
        "doc-stress -store memory -pc 10 -pd 20",
        "doc-stress -store memory -pu 101",
        "doc-stress -store memory -nt 0",
        "doc-stress -store memory -n 100 -dsn 18446744073709551600",
        "doc-stress -store memory -dt wiki",
        "doc-stress -store memory -es -es_host localhost",
        "doc-stress -store memory -log_level TRACE",
        "doc-stress -store memory -dl 10",
        "doc-stress -store memory -n 10 --num_ops 20",
        "doc-stress -store memory -unknown",
        "doc-stress -store memory positional",
    ];
    for line in rejected {
        assert!(parse(line).is_none(), "{line}");
    }
}

#[test]
fn test_log_level_directive() {
    let args = parse("doc-stress -store memory -log_level FATAL").unwrap();
    assert_eq!(args.log_level.directive(), "error");
    let args = parse("doc-stress -store memory -log_level off").unwrap();
    assert_eq!(args.log_level.directive(), "off");
}
