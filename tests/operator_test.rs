// ABOUTME: Tests for the manual database operator using the in-memory fake
// ABOUTME: Covers connection state, statements, scripts, and config-driven backup

mod common;

use common::FakeConnector;
use pg_table_migrator::{DatabaseOperator, MigratorError};

#[tokio::test]
async fn test_operations_require_connection() {
    let operator = DatabaseOperator::new(FakeConnector::new());
    assert!(!operator.is_connected());

    assert!(matches!(
        operator.exec("SELECT 1").await,
        Err(MigratorError::NotConnected)
    ));
    assert!(matches!(
        operator.load_script("anything.sql").await,
        Err(MigratorError::NotConnected)
    ));
    assert!(matches!(
        operator.backup(None, "out.bin").await,
        Err(MigratorError::NotConnected)
    ));
    assert!(matches!(
        operator.restore(None, "in.bin").await,
        Err(MigratorError::NotConnected)
    ));
}

#[tokio::test]
async fn test_connect_exec_disconnect() {
    let connector = FakeConnector::new();
    let mut operator = DatabaseOperator::new(connector.clone());

    operator.connect("dbname=app").await.unwrap();
    assert!(operator.is_connected());

    operator.exec("CREATE TABLE t (id INT)").await.unwrap();
    assert_eq!(connector.statements("app"), vec!["CREATE TABLE t (id INT)"]);

    operator.disconnect();
    assert!(!operator.is_connected());
    assert!(matches!(
        operator.exec("SELECT 1").await,
        Err(MigratorError::NotConnected)
    ));
}

#[tokio::test]
async fn test_reconnect_replaces_session() {
    let connector = FakeConnector::new();
    let mut operator = DatabaseOperator::new(connector.clone());

    operator.connect("dbname=first").await.unwrap();
    operator.connect("dbname=second").await.unwrap();
    operator.exec("SELECT 1").await.unwrap();

    assert!(connector.statements("first").is_empty());
    assert_eq!(connector.statements("second").len(), 1);
}

#[tokio::test]
async fn test_failed_connect_leaves_operator_disconnected() {
    let connector = FakeConnector::new();
    connector.state.lock().unwrap().refuse.insert("down".into());
    let mut operator = DatabaseOperator::new(connector);

    let err = operator.connect("dbname=down").await.unwrap_err();
    assert!(matches!(err, MigratorError::Connection { .. }));
    assert!(!operator.is_connected());
}

#[tokio::test]
async fn test_rejected_statement_is_reported() {
    let connector = FakeConnector::new();
    connector.with_db("app", |db| db.fail_execute = true);
    let mut operator = DatabaseOperator::new(connector);
    operator.connect("dbname=app").await.unwrap();

    let err = operator.exec("SELEC 1").await.unwrap_err();
    assert!(matches!(err, MigratorError::Statement { .. }));
}

#[tokio::test]
async fn test_load_and_execute_script() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("schema.sql");
    std::fs::write(&script, "CREATE TABLE a (id INT);\nCREATE TABLE b (id INT);\n").unwrap();

    let connector = FakeConnector::new();
    let mut operator = DatabaseOperator::new(connector.clone());
    operator.connect("dbname=app").await.unwrap();

    let loaded = operator.load_script(&script).await.unwrap();
    assert!(loaded.contains("CREATE TABLE b"));

    operator.load_and_execute(&script).await.unwrap();
    assert_eq!(connector.statements("app"), vec![loaded]);
}

#[tokio::test]
async fn test_empty_or_missing_script_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let empty = dir.path().join("empty.sql");
    std::fs::write(&empty, "  \n").unwrap();

    let connector = FakeConnector::new();
    let mut operator = DatabaseOperator::new(connector.clone());
    operator.connect("dbname=app").await.unwrap();

    assert!(matches!(
        operator.load_and_execute(&empty).await,
        Err(MigratorError::Script(_))
    ));
    assert!(matches!(
        operator.load_script(dir.path().join("missing.sql")).await,
        Err(MigratorError::Io { .. })
    ));
    assert!(connector.statements("app").is_empty());
}

#[tokio::test]
async fn test_backup_and_restore_with_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("tables.json");
    std::fs::write(&config, r#"{"tables": ["orders"]}"#).unwrap();
    let output = dir.path().join("orders.bin");

    let connector = FakeConnector::new();
    connector.with_db("app", |db| {
        db.copy_chunks
            .insert("orders".to_string(), vec![b"order-bytes".to_vec()]);
        db.copy_chunks
            .insert("ignored".to_string(), vec![b"other".to_vec()]);
    });

    let mut operator = DatabaseOperator::new(connector.clone());
    operator.connect("dbname=app").await.unwrap();

    let report = operator.backup(Some(config.as_path()), &output).await.unwrap();
    assert_eq!(report.tables, vec!["orders"]);
    assert_eq!(std::fs::read(&output).unwrap(), b"order-bytes");

    let report = operator.restore(Some(config.as_path()), &output).await.unwrap();
    assert_eq!(report.bytes_read, 11);
    connector.with_db("app", |db| {
        assert_eq!(db.copied_in["orders"], b"order-bytes");
    });

    operator.exit();
}

#[tokio::test]
async fn test_invalid_backup_config_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("bad.json");
    std::fs::write(&config, r#"{"tables": "orders"}"#).unwrap();

    let mut operator = DatabaseOperator::new(FakeConnector::new());
    operator.connect("dbname=app").await.unwrap();

    let err = operator
        .backup(Some(config.as_path()), dir.path().join("out.bin"))
        .await
        .unwrap_err();
    assert!(matches!(err, MigratorError::Config(_)));
}
