use crate::db::*;
use crate::store::DurableStore;
use tempfile::NamedTempFile;

#[tokio::test]
async fn test_set_get_overwrite() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    assert!(db.get("work_set", "tags").await.unwrap().is_none());

    db.set("work_set", "tags", r#"["a"]"#).await.unwrap();
    db.set("work_set", "tags", r#"["a","b"]"#).await.unwrap();

    assert_eq!(
        db.get("work_set", "tags").await.unwrap().as_deref(),
        Some(r#"["a","b"]"#)
    );

    db.close().await;
}

#[tokio::test]
async fn test_entries_keep_first_insert_order() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    db.set("progress:tags", "zebra", "1").await.unwrap();
    db.set("progress:tags", "apple", "2").await.unwrap();
    db.set("progress:tags", "zebra", "3").await.unwrap();
    db.set("progress:other", "mango", "4").await.unwrap();

    let entries = db.entries("progress:tags").await.unwrap();
    assert_eq!(
        entries,
        vec![
            ("zebra".to_string(), "3".to_string()),
            ("apple".to_string(), "2".to_string()),
        ]
    );

    db.close().await;
}

#[tokio::test]
async fn test_remove_and_clear() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    db.set("progress:tags", "a", "1").await.unwrap();
    db.set("progress:tags", "b", "2").await.unwrap();
    db.set("work_set", "tags", "[]").await.unwrap();

    db.remove("progress:tags", "a").await.unwrap();
    db.remove("progress:tags", "not-there").await.unwrap();
    assert_eq!(db.entries("progress:tags").await.unwrap().len(), 1);

    db.clear("progress:tags").await.unwrap();
    assert!(db.entries("progress:tags").await.unwrap().is_empty());
    assert!(db.get("work_set", "tags").await.unwrap().is_some());

    db.close().await;
}

#[tokio::test]
async fn test_values_survive_reopen() {
    let temp_file = NamedTempFile::new().unwrap();

    {
        let db = Database::new(temp_file.path()).await.unwrap();
        db.set("progress:tags", "cat", r#"{"status":"failure","message":"HTTP 500"}"#)
            .await
            .unwrap();
        db.close().await;
    }

    let db = Database::new(temp_file.path()).await.unwrap();
    assert_eq!(
        db.get("progress:tags", "cat").await.unwrap().as_deref(),
        Some(r#"{"status":"failure","message":"HTTP 500"}"#)
    );
    db.close().await;
}
