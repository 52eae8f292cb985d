use std::path::{Path, PathBuf};

use base64::Engine as _;
use dbfs::table::TableHandle;
use dbfs::{Provider, Resource};
use dbfs_core::config::{ContentLength, EscapeHatch, FsConfig};
use dbfs_core::format::ExportFormat;

fn create_db(dir: &Path, name: &str, sql: &str) -> PathBuf {
    let path = dir.join(name);
    let conn = rusqlite::Connection::open(&path).expect("create db");
    conn.execute_batch(sql).expect("seed db");
    path
}

fn provider(databases: Vec<PathBuf>) -> Provider {
    Provider::new(&FsConfig {
        databases,
        ..FsConfig::default()
    })
    .expect("provider")
}

fn read(provider: &Provider, path: &str) -> Vec<u8> {
    let resource = provider.resolve(path).expect("resolve");
    let artifact = resource.as_artifact().expect("artifact");
    artifact.read().expect("read")
}

fn list(provider: &Provider, path: &str) -> Vec<String> {
    let resource = provider.resolve(path).expect("resolve");
    let collection = resource.as_collection().expect("collection");
    collection.list_children().expect("list")
}

/// Minimal RFC 4180 reader: quoted fields, doubled quotes, embedded newlines.
fn parse_delimited(input: &str, delimiter: char) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                other => field.push(other),
            }
        } else if ch == '"' {
            in_quotes = true;
        } else if ch == delimiter {
            record.push(std::mem::take(&mut field));
        } else if ch == '\n' {
            record.push(std::mem::take(&mut field));
            records.push(std::mem::take(&mut record));
        } else {
            field.push(ch);
        }
    }
    assert!(field.is_empty() && record.is_empty(), "unterminated record");
    records
}

fn parse_json_lines(bytes: &[u8]) -> Vec<serde_json::Value> {
    std::str::from_utf8(bytes)
        .expect("utf8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect()
}

#[test]
fn end_to_end_listing_and_csv_read() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(
        dir.path(),
        "test.sqlite",
        "CREATE TABLE test_table(A, B, C); INSERT INTO test_table VALUES (1, 2, 3);",
    );
    let provider = provider(vec![db]);

    assert_eq!(list(&provider, "/"), vec!["test.sqlite"]);
    assert_eq!(
        list(&provider, "/test.sqlite"),
        vec![
            "test_table.csv",
            "test_table.tsv",
            "test_table.json",
            "test_table.jsonl"
        ]
    );
    assert_eq!(
        read(&provider, "/test.sqlite/test_table.csv"),
        b"A,B,C\n1,2,3\n"
    );
    assert_eq!(
        read(&provider, "/test.sqlite/test_table.tsv"),
        b"A\tB\tC\n1\t2\t3\n"
    );
    assert_eq!(
        read(&provider, "test.sqlite/test_table.json"),
        br#"[{"A":1,"B":2,"C":3}]"#
    );
    assert_eq!(
        read(&provider, "test.sqlite/test_table.jsonl"),
        b"{\"A\":1,\"B\":2,\"C\":3}"
    );
}

#[test]
fn root_lists_databases_in_configured_order() {
    let dir = tempfile::tempdir().unwrap();
    let b = create_db(dir.path(), "b.sqlite", "CREATE TABLE t(a);");
    let a = create_db(dir.path(), "a.db", "CREATE TABLE t(a);");
    let provider = provider(vec![b, a]);
    assert_eq!(list(&provider, ""), vec!["b.sqlite", "a.db"]);
    assert_eq!(
        provider
            .root()
            .children()
            .unwrap()
            .iter()
            .map(|child| child.path().to_string())
            .collect::<Vec<_>>(),
        vec!["/b.sqlite", "/a.db"]
    );
}

#[test]
fn database_listing_is_tables_times_enabled_formats() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(
        dir.path(),
        "shop.sqlite",
        "CREATE TABLE orders(id); CREATE TABLE items(id);",
    );
    let provider = Provider::new(&FsConfig {
        databases: vec![db],
        formats: vec![ExportFormat::JsonLines, ExportFormat::Csv],
        ..FsConfig::default()
    })
    .unwrap();
    assert_eq!(
        list(&provider, "/shop.sqlite"),
        vec!["orders.jsonl", "orders.csv", "items.jsonl", "items.csv"]
    );
    let err = provider
        .resolve("/shop.sqlite/orders.tsv")
        .expect_err("tsv disabled");
    assert_eq!(err.code(), "not_found");
}

#[test]
fn duplicate_basenames_fail_provider_construction() {
    let err = Provider::new(&FsConfig {
        databases: vec!["/one/data.sqlite".into(), "/two/data.sqlite".into()],
        ..FsConfig::default()
    })
    .expect_err("duplicate");
    assert_eq!(err.code(), "config");
}

#[test]
fn segment_past_an_artifact_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(dir.path(), "db.sqlite", "CREATE TABLE t(a);");
    let provider = provider(vec![db]);
    provider.resolve("/db.sqlite/t.csv").expect("artifact");
    let err = provider
        .resolve("/db.sqlite/t.csv/extra")
        .expect_err("artifacts have no children");
    assert_eq!(err.code(), "not_found");
}

#[test]
fn unknown_names_are_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(dir.path(), "db.sqlite", "CREATE TABLE t(a);");
    let provider = provider(vec![db]);
    for path in ["/other.sqlite", "/db.sqlite/missing.csv", "/db.sqlite/t", "/db.sqlite/t.xml"] {
        let err = provider.resolve(path).expect_err(path);
        assert_eq!(err.code(), "not_found", "{path}");
    }
    let err = provider.resolve("/db.sqlite/../x").expect_err("dotdot");
    assert_eq!(err.code(), "invalid_path");
}

#[test]
fn csv_round_trips_through_a_csv_reader() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(
        dir.path(),
        "db.sqlite",
        r#"CREATE TABLE t(id INTEGER, label TEXT, ratio REAL, raw BLOB);
           INSERT INTO t VALUES (1, 'plain', 0.1, x'00ff');
           INSERT INTO t VALUES (2, 'comma, "quoted"
and newline', -1.5e-10, NULL);
           INSERT INTO t VALUES (9007199254740993, '', 1e300, x'');"#,
    );
    let provider = provider(vec![db.clone()]);
    let expected = TableHandle::new(&db).query_table("t").unwrap();

    for (suffix, delimiter) in [("csv", ','), ("tsv", '\t')] {
        let bytes = read(&provider, &format!("/db.sqlite/t.{suffix}"));
        let records = parse_delimited(std::str::from_utf8(&bytes).unwrap(), delimiter);
        assert_eq!(records[0], expected.columns);
        assert_eq!(records.len(), expected.rows.len() + 1);

        let row = &records[2];
        assert_eq!(row[0], "2");
        assert_eq!(row[1], "comma, \"quoted\"\nand newline");
        assert_eq!(row[2].parse::<f64>().unwrap(), -1.5e-10);
        assert_eq!(row[3], "");

        let row = &records[3];
        assert_eq!(row[0].parse::<i64>().unwrap(), 9007199254740993);
        assert_eq!(row[2].parse::<f64>().unwrap(), 1e300);

        let raw = base64::engine::general_purpose::STANDARD
            .decode(&records[1][3])
            .unwrap();
        assert_eq!(raw, vec![0x00, 0xff]);
    }
}

#[test]
fn json_array_matches_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(
        dir.path(),
        "db.sqlite",
        "CREATE TABLE t(id, name, score, data);
         INSERT INTO t VALUES (1, 'a', 1.25, x'0102');
         INSERT INTO t VALUES (2, NULL, -3.0, NULL);
         INSERT INTO t VALUES (3, 'unicode ✓', 0.1, x'');",
    );
    let provider = provider(vec![db]);

    let array: Vec<serde_json::Value> =
        serde_json::from_slice(&read(&provider, "/db.sqlite/t.json")).unwrap();
    let lines = parse_json_lines(&read(&provider, "/db.sqlite/t.jsonl"));
    assert_eq!(array.len(), 3);
    assert_eq!(array, lines);
    assert_eq!(array[1]["name"], serde_json::Value::Null);
    assert_eq!(array[0]["score"].as_f64(), Some(1.25));
}

#[test]
fn blob_survives_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(
        dir.path(),
        "db.sqlite",
        "CREATE TABLE files(payload BLOB); INSERT INTO files VALUES (x'010203');",
    );
    let provider = provider(vec![db]);
    let lines = parse_json_lines(&read(&provider, "/db.sqlite/files.jsonl"));
    let encoded = lines[0]["payload"].as_str().expect("base64 string");
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .unwrap();
    assert_eq!(decoded, vec![0x01, 0x02, 0x03]);
}

#[test]
fn listings_follow_the_live_schema() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(dir.path(), "db.sqlite", "CREATE TABLE first(a);");
    let provider = Provider::new(&FsConfig {
        databases: vec![db.clone()],
        formats: vec![ExportFormat::Csv],
        ..FsConfig::default()
    })
    .unwrap();
    let collection = provider.resolve("/db.sqlite").unwrap();
    let collection = collection.as_collection().unwrap().clone();
    assert_eq!(collection.list_children().unwrap(), vec!["first.csv"]);

    let conn = rusqlite::Connection::open(&db).unwrap();
    conn.execute_batch("CREATE TABLE second(b); INSERT INTO first VALUES (7);")
        .unwrap();
    assert_eq!(
        collection.list_children().unwrap(),
        vec!["first.csv", "second.csv"]
    );
    assert_eq!(read(&provider, "/db.sqlite/first.csv"), b"a\n7\n");
}

#[test]
fn unreadable_database_fails_only_its_own_paths() {
    let dir = tempfile::tempdir().unwrap();
    let good = create_db(dir.path(), "good.sqlite", "CREATE TABLE t(a);");
    let missing = dir.path().join("missing.sqlite");
    let junk = dir.path().join("junk.sqlite");
    std::fs::write(&junk, vec![b'j'; 2048]).unwrap();
    let provider = provider(vec![good, missing, junk]);

    assert_eq!(
        list(&provider, "/"),
        vec!["good.sqlite", "missing.sqlite", "junk.sqlite"]
    );
    for name in ["missing.sqlite", "junk.sqlite"] {
        let resource = provider.resolve(&format!("/{name}")).expect("collection");
        let err = resource
            .as_collection()
            .unwrap()
            .list_children()
            .expect_err("unavailable");
        assert_eq!(err.code(), "storage_unavailable", "{name}");

        let err = provider
            .resolve(&format!("/{name}/t.csv"))
            .expect_err("unavailable");
        assert_eq!(err.code(), "storage_unavailable", "{name}");
    }
    assert_eq!(list(&provider, "/good.sqlite").len(), 4);
}

#[test]
fn computed_lengths_match_content() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(
        dir.path(),
        "db.sqlite",
        "CREATE TABLE t(a, b); INSERT INTO t VALUES ('x', 1), ('y', 2);",
    );
    let computed = Provider::new(&FsConfig {
        databases: vec![db.clone()],
        content_length: ContentLength::Computed,
        ..FsConfig::default()
    })
    .unwrap();
    let unknown = provider(vec![db]);

    for format in ExportFormat::ALL {
        let path = format!("/db.sqlite/t{}", format.suffix());
        let resource = computed.resolve(&path).unwrap();
        let artifact = resource.as_artifact().unwrap();
        let body = artifact.read().unwrap();
        assert_eq!(artifact.known_length().unwrap(), Some(body.len() as u64));
        assert_eq!(artifact.content_type(), format.content_type());

        let resource = unknown.resolve(&path).unwrap();
        assert_eq!(resource.as_artifact().unwrap().known_length().unwrap(), None);
    }
}

#[test]
fn artifacts_describe_their_table() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(dir.path(), "db.sqlite", "CREATE TABLE t(a);");
    let provider = provider(vec![db]);
    let resource = provider.resolve("/db.sqlite/t.jsonl").unwrap();
    let artifact = resource.as_artifact().unwrap();
    assert_eq!(artifact.name(), "t.jsonl");
    assert_eq!(artifact.format(), ExportFormat::JsonLines);
    let descriptor = artifact.descriptor();
    assert_eq!(descriptor.database_name, "db.sqlite");
    assert_eq!(descriptor.table_name, "t");
    assert!(resource.get_child("anything").unwrap().is_none());
}

#[test]
fn escape_hatch_is_off_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(dir.path(), "db.sqlite", "CREATE TABLE t(a);");
    let provider = provider(Vec::new());
    let host = db.to_str().unwrap();
    let err = provider.resolve(host).expect_err("escape hatch disabled");
    assert_eq!(err.code(), "not_found");
}

#[test]
fn escape_hatch_walks_host_directories_to_a_database() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("nested")).unwrap();
    let db = create_db(
        &dir.path().join("nested"),
        "deep.sqlite",
        "CREATE TABLE t(a); INSERT INTO t VALUES (5);",
    );
    let provider = Provider::new(&FsConfig {
        escape_hatch: EscapeHatch {
            enabled: true,
            follow_symlinks: false,
        },
        ..FsConfig::default()
    })
    .unwrap();

    let canonical = db.canonicalize().unwrap();
    let host = canonical.to_str().unwrap();
    let parent = provider
        .resolve(&canonical.parent().unwrap().to_string_lossy())
        .unwrap();
    let Resource::Collection(parent) = parent else {
        panic!("directory should be a collection");
    };
    assert!(parent.list_children().unwrap().is_empty());

    assert_eq!(
        provider
            .resolve(host)
            .unwrap()
            .as_collection()
            .unwrap()
            .list_children()
            .unwrap(),
        vec!["t.csv", "t.tsv", "t.json", "t.jsonl"]
    );
    assert_eq!(read(&provider, &format!("{host}/t.csv")), b"a\n5\n");

    let err = provider
        .resolve(&format!("{host}-nope"))
        .expect_err("missing host file");
    assert_eq!(err.code(), "not_found");
}

#[cfg(unix)]
#[test]
fn escape_hatch_refuses_symlinks_unless_configured() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(dir.path(), "real.sqlite", "CREATE TABLE t(a);");
    let canonical_dir = dir.path().canonicalize().unwrap();
    let link = canonical_dir.join("link.sqlite");
    std::os::unix::fs::symlink(&db, &link).unwrap();
    let link = link.to_str().unwrap().to_string();

    let strict = Provider::new(&FsConfig {
        escape_hatch: EscapeHatch {
            enabled: true,
            follow_symlinks: false,
        },
        ..FsConfig::default()
    })
    .unwrap();
    assert_eq!(strict.resolve(&link).expect_err("symlink").code(), "not_found");

    let following = Provider::new(&FsConfig {
        escape_hatch: EscapeHatch {
            enabled: true,
            follow_symlinks: true,
        },
        ..FsConfig::default()
    })
    .unwrap();
    assert_eq!(
        list(&following, &link),
        vec!["t.csv", "t.tsv", "t.json", "t.jsonl"]
    );
}

#[test]
fn configured_names_win_over_host_entries() {
    let dir = tempfile::tempdir().unwrap();
    // A configured database named like a top-level host directory.
    let db = create_db(dir.path(), "tmp", "CREATE TABLE mine(a);");
    let provider = Provider::new(&FsConfig {
        databases: vec![db],
        escape_hatch: EscapeHatch {
            enabled: true,
            follow_symlinks: false,
        },
        ..FsConfig::default()
    })
    .unwrap();
    let resource = provider.resolve("/tmp").unwrap();
    let Resource::Collection(dbfs::Collection::Database(db)) = resource else {
        panic!("configured database expected");
    };
    assert_eq!(db.table_names().unwrap(), vec!["mine"]);
}

#[test]
fn cancelled_providers_stop_table_work_without_affecting_others() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = create_db(dir.path(), "db.sqlite", "CREATE TABLE t(a); INSERT INTO t VALUES (1);");
    let provider = provider(vec![db]);

    let cancel = dbfs::CancelToken::new();
    let scoped = provider.with_cancel(cancel.clone());
    let artifact = scoped
        .resolve("/db.sqlite/t.csv")
        .expect("resolve")
        .as_artifact()
        .cloned()
        .expect("artifact");

    cancel.cancel();
    assert_eq!(artifact.read().unwrap_err().code(), "cancelled");
    assert_eq!(
        scoped.resolve("/db.sqlite/t.csv").unwrap_err().code(),
        "cancelled"
    );

    assert_eq!(read(&provider, "/db.sqlite/t.csv"), b"a\n1\n");
    let fresh = artifact.with_cancel(dbfs::CancelToken::new());
    assert_eq!(fresh.read().expect("read"), b"a\n1\n");
}
