mod common;

use std::path::Path;
use std::sync::Arc;

use asupersync::runtime::RuntimeBuilder;
use common::Recorder;
use sqlweave_core::{
    CommandKind, Cx, DataType, DefaultParameterSetter, EntityDef, EntityKey, EntitySet, Error,
    Metadata, Outcome, Record, SimplexDef, StaticProvider, Value,
};
use sqlweave_query::{
    AnsiDialect, BulkFormat, BulkLoader, FlatFileImporter, GroupedImporter, ImportOptions,
    Importer, Visitor,
};

fn catalog() -> Arc<EntitySet> {
    let provider = StaticProvider::default()
        .entity(
            EntityDef::new("Person")
                .key("Id")
                .property(SimplexDef::new("Id", DataType::Int64).sequence("person_id"))
                .property(SimplexDef::new("Name", DataType::String).length(50).required())
                .property(SimplexDef::new("Email", DataType::String).length(100)),
        )
        .entity(
            EntityDef::new("Meter")
                .alias("meters")
                .property(SimplexDef::new("Device", DataType::String).length(16).tag())
                .property(SimplexDef::new("Ts", DataType::Timestamp).required())
                .property(SimplexDef::new("Reading", DataType::Double)),
        );
    Metadata::load(&[&provider])
        .expect("load catalog")
        .snapshot()
}

struct QuotedLoader;

impl BulkLoader for QuotedLoader {
    fn load_statement(&self, path: &Path, table: &str, columns: &[String], _: &BulkFormat) -> String {
        format!("LOAD '{}' INTO {} ({})", path.display(), table, columns.join(", "))
    }
}

fn flat(batch_size: usize) -> FlatFileImporter {
    FlatFileImporter::new(
        Arc::new(QuotedLoader),
        BulkFormat::default(),
        ImportOptions::new().batch_size(batch_size),
    )
}

fn grouped(batch_size: usize) -> GroupedImporter {
    GroupedImporter::new(
        Arc::new(Visitor::new(Arc::new(AnsiDialect))),
        Arc::new(DefaultParameterSetter::new()),
        ImportOptions::new().batch_size(batch_size),
    )
}

fn people() -> Vec<Record> {
    vec![
        Record::new().with("Id", 1_i64).with("Name", "Ada"),
        Record::new()
            .with("Id", 2_i64)
            .with("Name", "B\tob")
            .with("Email", "b@example.com"),
        Record::new().with("Id", 3_i64).with("Name", "Cy"),
    ]
}

fn readings() -> Vec<Record> {
    ["a", "b", "a", "b", "a"]
        .iter()
        .enumerate()
        .map(|(i, device)| {
            Record::new()
                .with("Device", *device)
                .with("Ts", Value::Timestamp(1_700_000_000_000_000 + i as i64))
                .with("Reading", Value::Double(i as f64))
        })
        .collect()
}

#[test]
fn flat_import_writes_one_file_per_batch_and_removes_it() {
    let set = catalog();
    let recorder = Recorder::new();
    let mut conn = recorder.connection();

    let count = flat(2)
        .import(&mut conn, &set, &EntityKey::global("Person"), &people())
        .expect("import");
    assert_eq!(count, 3);

    let commands = recorder.commands();
    assert_eq!(commands.len(), 2);
    assert!(commands.iter().all(|c| c.kind == CommandKind::BulkLoad && c.closed));
    assert!(commands[0].text.ends_with("INTO Person (Id, Name, Email)"));

    let (path, contents) = &commands[0].files[0];
    assert_eq!(contents, "1\tAda\t\\N\n2\tB\\tob\tb@example.com\n");
    assert!(!Path::new(path).exists());
    assert_eq!(commands[1].files[0].1, "3\tCy\t\\N\n");
}

#[test]
fn flat_import_cleans_up_when_a_batch_fails() {
    let set = catalog();
    let recorder = Recorder::new().fail_at(2);
    let mut conn = recorder.connection();

    let err = flat(1)
        .import(&mut conn, &set, &EntityKey::global("Person"), &people())
        .unwrap_err();
    assert_eq!(err.code(), Some(1205));

    let commands = recorder.commands();
    assert_eq!(commands.len(), 2);
    assert!(commands.iter().all(|c| c.closed));
    let (path, _) = &commands[0].files[0];
    assert!(!Path::new(path).exists());
    let second = commands[1]
        .text
        .split('\'')
        .nth(1)
        .expect("path in load statement");
    assert!(!Path::new(second).exists());
}

#[test]
fn flat_import_rejects_missing_required_values_before_writing() {
    let set = catalog();
    let recorder = Recorder::new();
    let mut conn = recorder.connection();
    let rows = vec![Record::new().with("Id", 1_i64)];

    let err = flat(10)
        .import(&mut conn, &set, &EntityKey::global("Person"), &rows)
        .unwrap_err();
    assert!(matches!(err, Error::DataArgument(ref e) if e.field.as_deref() == Some("Name")));
    assert!(recorder.commands().is_empty());
}

#[test]
fn grouped_import_sums_counts_across_two_subtables() {
    let set = catalog();
    let recorder = Recorder::new();
    let mut conn = recorder.connection();

    let count = grouped(2)
        .import(&mut conn, &set, &EntityKey::global("Meter"), &readings())
        .expect("import");
    assert_eq!(count, 5);

    let commands = recorder.commands();
    assert_eq!(commands.len(), 1);
    let command = &commands[0];
    assert_eq!(command.kind, CommandKind::Prepared);
    assert!(command.closed);
    assert_eq!(command.table_names, vec!["meters_a", "meters_b"]);
    assert_eq!(command.tags.len(), 2);
    assert_eq!(command.tags[1][0].value, Value::Text("b".to_string()));
    // a: 2 + 1, b: 2
    assert_eq!(command.executions, 3);
    assert_eq!(command.batches.len(), 5);
    assert_eq!(command.batches[0].len(), 2);
}

#[test]
fn grouped_import_closes_the_command_on_failure() {
    let set = catalog();
    let recorder = Recorder::new().fail_at(2);
    let mut conn = recorder.connection();

    let err = grouped(2)
        .import(&mut conn, &set, &EntityKey::global("Meter"), &readings())
        .unwrap_err();
    assert!(matches!(err, Error::Query(_)));

    let commands = recorder.commands();
    assert_eq!(commands.len(), 1);
    assert!(commands[0].closed);
    assert_eq!(commands[0].executions, 1);
}

#[test]
fn grouped_import_requires_tags() {
    let set = catalog();
    let recorder = Recorder::new();
    let mut conn = recorder.connection();

    let err = grouped(2)
        .import(&mut conn, &set, &EntityKey::global("Person"), &people())
        .unwrap_err();
    assert!(matches!(err, Error::Unsupported(_)));
}

#[test]
fn import_stops_between_batches_when_cancelled() {
    let set = catalog();
    let recorder = Recorder::new();
    let mut conn = recorder.connection();
    let executed = || !recorder.commands().is_empty();

    let err = flat(1)
        .import_with(&mut conn, &set, &EntityKey::global("Person"), &people(), &executed)
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert_eq!(recorder.commands().len(), 1);
}

#[test]
fn async_import_completes_without_cancellation() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let set = catalog();
    let recorder = Recorder::new();

    rt.block_on(async {
        let mut conn = recorder.connection();
        let importer = grouped(10);
        let rows = readings();
        let key = EntityKey::global("Meter");
        match importer.import_async(&cx, &mut conn, &set, &key, &rows).await {
            Outcome::Ok(count) => assert_eq!(count, 5),
            other => panic!("unexpected outcome: {other:?}"),
        }
    });
}

#[test]
fn async_import_stops_at_the_next_batch_once_cancelled() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let set = catalog();
    let recorder = Recorder::new().cancel_at(1, &cx);

    rt.block_on(async {
        let mut conn = recorder.connection();
        let rows = readings();
        let key = EntityKey::global("Meter");
        let outcome = grouped(1).import_async(&cx, &mut conn, &set, &key, &rows).await;
        assert!(matches!(outcome, Outcome::Cancelled(_)), "{outcome:?}");
    });
    let commands = recorder.commands();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].executions, 1);
    assert!(commands[0].closed);
}
