//! Integration tests for flurry

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::{at, event, read_bytes, read_records};
use flurry::error::IngestError;
use flurry::source::parse_batch;
use flurry::{Config, ContainerStore, IngestContext, StorageProvider};
use serde_json::json;
use tempfile::TempDir;

fn memory_context() -> (IngestContext, Arc<StorageProvider>) {
    let store = Arc::new(StorageProvider::in_memory());
    let ctx = IngestContext::with_store(Config::with_storage_url("memory://"), store.clone());
    (ctx, store)
}

mod config_tests {
    use super::*;

    #[test]
    fn test_config_yaml_parsing() {
        let yaml = r#"
storage:
  url: "s3://diagnostics/archive"
  storage_options:
    aws_region: eu-west-1

container:
  prefix: "diag-"

compression:
  chunk_size_bytes: 1048576
  level: 9

writer:
  max_concurrent_writes: 4
"#;
        let config = Config::from_yaml(yaml).unwrap();

        assert_eq!(config.storage.url, "s3://diagnostics/archive");
        assert_eq!(
            config.storage.storage_options.get("aws_region").map(String::as_str),
            Some("eu-west-1")
        );
        assert_eq!(config.container.prefix, "diag-");
        assert_eq!(config.compression.chunk_size_bytes, 1024 * 1024);
        assert_eq!(config.compression.level, 9);
        assert_eq!(config.writer.max_concurrent_writes, 4);
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_yaml("storage:\n  url: memory://\n").unwrap();

        assert_eq!(config.container.prefix, "logs-");
        assert_eq!(config.compression.chunk_size_bytes, 4 * 1024 * 1024);
        assert_eq!(config.compression.level, 6);
        assert_eq!(config.writer.max_concurrent_writes, 8);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_connecting() {
        let mut config = Config::with_storage_url("memory://");
        config.compression.level = 11;

        let err = IngestContext::from_config(config).await.unwrap_err();
        assert!(matches!(err, IngestError::Config { .. }));
    }

    #[tokio::test]
    async fn test_unsupported_storage_url() {
        let err = IngestContext::from_config(Config::with_storage_url("ftp://nowhere"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Storage { .. }));
    }
}

mod example_tests {
    use super::*;

    #[tokio::test]
    async fn test_records_payload_with_host_field() {
        let (ctx, store) = memory_context();
        let summary = ctx
            .process_batch(&[event(
                "0",
                100,
                at(14, 30),
                r#"{"records":[{"Host":"Example.com:443","msg":"a"}]}"#,
            )])
            .await
            .unwrap();

        assert_eq!(summary.artifacts.len(), 1);
        let artifact = &summary.artifacts[0];
        assert_eq!(artifact.path.container, "logs-example-com");
        assert_eq!(
            artifact.path.key,
            "y=2026/m=01/d=28/h=14/m=00/p=0/part-o100-o100.ndjson.gz"
        );

        let records = read_records(store.as_ref(), &artifact.path).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].fqdn, "example.com");
        assert_eq!(records[0].partition_id, "0");
        assert_eq!(records[0].offset, 100);
        assert_eq!(records[0].sequence_number, 1000);
        assert_eq!(records[0].time_utc, at(14, 30));
        assert_eq!(records[0].record, json!({"Host": "Example.com:443", "msg": "a"}));
    }

    #[tokio::test]
    async fn test_non_json_payload_falls_back() {
        let (ctx, store) = memory_context();
        let summary = ctx
            .process_batch(&[event("0", 7, at(14, 0), "not json at all")])
            .await
            .unwrap();

        let artifact = &summary.artifacts[0];
        assert_eq!(artifact.path.container, "logs-unknown");

        let records = read_records(store.as_ref(), &artifact.path).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "not json at all");
        assert_eq!(records[0].fqdn, "unknown");
        assert_eq!(records[0].record, json!("not json at all"));
    }

    #[tokio::test]
    async fn test_redelivered_offsets_produce_identical_artifact() {
        let batch: Vec<_> = (100..=105)
            .map(|offset| {
                event(
                    "0",
                    offset,
                    at(14, offset as u32 - 100),
                    &format!(r#"{{"resultDescription":"GET /line/{offset} host=api.example.com"}}"#),
                )
            })
            .collect();

        let (first_ctx, first_store) = memory_context();
        let first = first_ctx.process_batch(&batch).await.unwrap();
        let (second_ctx, second_store) = memory_context();
        let second = second_ctx.process_batch(&batch).await.unwrap();

        assert_eq!(first.artifacts.len(), 1);
        let path = &first.artifacts[0].path;
        assert_eq!(path.container, "logs-api-example-com");
        assert!(path.key.ends_with("part-o100-o105.ndjson.gz"));
        assert_eq!(second.artifacts[0].path, *path);
        assert_eq!(
            read_bytes(first_store.as_ref(), path).await,
            read_bytes(second_store.as_ref(), path).await
        );
    }
}

mod pipeline_tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_preserves_every_record_in_order() {
        let (ctx, store) = memory_context();
        let batch = vec![
            event(
                "3",
                10,
                at(9, 1),
                r#"[{"records":[{"message":"first","x-forwarded-host":"shop.example.com"},{"message":"second","x-forwarded-host":"shop.example.com"}]}]"#,
            ),
            event("3", 11, at(9, 2), r#"{"message":"third","headers":{"X-Forwarded-Host":"shop.example.com"}}"#),
            event("3", 12, at(9, 3), r#"{"msg":"other tenant","host":"blog.example.com"}"#),
        ];

        let summary = ctx.process_batch(&batch).await.unwrap();
        assert_eq!(summary.events, 3);
        assert_eq!(summary.records, 4);
        assert_eq!(summary.artifacts.len(), 2);

        let shop = summary
            .artifacts
            .iter()
            .find(|a| a.path.container == "logs-shop-example-com")
            .unwrap();
        assert!(shop.path.key.ends_with("p=3/part-o10-o11.ndjson.gz"));

        let records = read_records(store.as_ref(), &shop.path).await;
        let messages: Vec<_> = records.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "third"]);
        assert!(records.iter().all(|r| r.fqdn == "shop.example.com"));
        assert!(records.iter().all(|r| r.partition_id == "3"));
    }

    #[tokio::test]
    async fn test_tenants_never_share_an_artifact() {
        let (ctx, store) = memory_context();
        let tenants = ["a.example.com", "b.example.com", "c.example.org"];
        let batch: Vec<_> = (0..30u64)
            .map(|i| {
                let tenant = tenants[(i % 3) as usize];
                event(
                    &(i % 2).to_string(),
                    i,
                    at(10, 0),
                    &format!("GET /item/{i} host: {tenant}"),
                )
            })
            .collect();

        let summary = ctx.process_batch(&batch).await.unwrap();
        assert_eq!(summary.artifacts.len(), 6);

        let containers: HashSet<_> = summary
            .artifacts
            .iter()
            .map(|a| a.path.container.as_str())
            .collect();
        assert_eq!(containers.len(), 3);

        let mut total = 0;
        for artifact in &summary.artifacts {
            let records = read_records(store.as_ref(), &artifact.path).await;
            let fqdns: HashSet<_> = records.iter().map(|r| r.fqdn.clone()).collect();
            assert_eq!(fqdns.len(), 1, "{} mixes tenants", artifact.path);
            total += records.len();
        }
        assert_eq!(total, 30);
    }

    #[tokio::test]
    async fn test_tenants_truncated_onto_one_container_keep_every_record() {
        let (ctx, store) = memory_context();
        let stem = "a".repeat(60);
        let one = format!("{stem}.one.example.com");
        let two = format!("{stem}.two.example.com");
        let body = json!({
            "records": [
                {"message": "first", "x-forwarded-host": one},
                {"message": "second", "x-forwarded-host": two},
            ]
        })
        .to_string();

        let summary = ctx
            .process_batch(&[event("0", 100, at(14, 0), &body)])
            .await
            .unwrap();
        assert_eq!(summary.records, 2);
        assert_eq!(summary.artifacts.len(), 1);
        let artifact = &summary.artifacts[0];
        assert_eq!(artifact.record_count, 2);
        assert_eq!(artifact.path.container.len(), 63);

        let records = read_records(store.as_ref(), &artifact.path).await;
        let fqdns: Vec<_> = records.iter().map(|r| r.fqdn.as_str()).collect();
        assert_eq!(fqdns, vec![one.as_str(), two.as_str()]);
    }

    #[tokio::test]
    async fn test_hours_and_partitions_split_buckets() {
        let (ctx, _) = memory_context();
        let body = "host=api.example.com";
        let summary = ctx
            .process_batch(&[
                event("0", 1, at(13, 59), body),
                event("0", 2, at(14, 0), body),
                event("1", 3, at(14, 0), body),
            ])
            .await
            .unwrap();

        let keys: Vec<_> = summary.artifacts.iter().map(|a| a.path.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "y=2026/m=01/d=28/h=13/m=00/p=0/part-o1-o1.ndjson.gz",
                "y=2026/m=01/d=28/h=14/m=00/p=0/part-o2-o2.ndjson.gz",
                "y=2026/m=01/d=28/h=14/m=00/p=1/part-o3-o3.ndjson.gz",
            ]
        );
    }

    #[tokio::test]
    async fn test_custom_prefix() {
        let mut config = Config::with_storage_url("memory://");
        config.container.prefix = "Diag_".to_string();
        let ctx = IngestContext::with_store(config, Arc::new(StorageProvider::in_memory()));

        let plan = ctx.plan(&[event("0", 1, at(0, 0), "host=x.io")]);
        assert_eq!(plan[0].path.container, "diag-x-io");
    }
}

mod local_storage_tests {
    use super::*;

    #[tokio::test]
    async fn test_batch_file_to_local_directory() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("archive");

        let batch_text = concat!(
            r#"{"PartitionId":"0","Offset":"100","SequenceNumber":"5","EnqueuedTimeUtc":"2026-01-28T14:30:00Z","body":"{\"records\":[{\"Host\":\"Example.com:443\",\"msg\":\"a\"}]}"}"#,
            "\n",
            r#"{"PartitionId":"0","Offset":"101","SequenceNumber":"6","EnqueuedTimeUtc":"2026-01-28T14:31:00Z","body":"not json at all"}"#,
            "\n",
        );
        let events = parse_batch(batch_text).unwrap();

        let config = Config::from_yaml(&format!("storage:\n  url: \"{}\"\n", root.display())).unwrap();
        let ctx = IngestContext::from_config(config).await.unwrap();
        let summary = ctx.process_batch(&events).await.unwrap();
        assert_eq!(summary.artifacts.len(), 2);

        let artifact_file = root.join(
            "logs-example-com/y=2026/m=01/d=28/h=14/m=00/p=0/part-o100-o100.ndjson.gz",
        );
        let on_disk = std::fs::read(&artifact_file).unwrap();
        let records = common::decode(&on_disk);
        assert_eq!(records[0].fqdn, "example.com");
        assert_eq!(records[0].sequence_number, 5);

        assert!(root.join("logs-unknown").is_dir());
    }

    #[tokio::test]
    async fn test_local_rerun_overwrites_in_place() {
        let temp_dir = TempDir::new().unwrap();
        let url = temp_dir.path().to_str().unwrap().to_string();
        let batch = vec![event("0", 1, at(1, 0), "host=a.io one")];

        let first = IngestContext::from_config(Config::with_storage_url(url.clone()))
            .await
            .unwrap();
        let written = first.process_batch(&batch).await.unwrap();

        // a fresh process finds the container already present
        let second = IngestContext::from_config(Config::with_storage_url(url))
            .await
            .unwrap();
        let rewritten = second.process_batch(&batch).await.unwrap();
        assert_eq!(written.artifacts, rewritten.artifacts);

        let files: Vec<_> = walk(temp_dir.path());
        assert_eq!(files.len(), 1, "{files:?}");
        let store = StorageProvider::for_url(temp_dir.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(
            store.create_container("logs-a-io").await.unwrap(),
            flurry::ContainerStatus::AlreadyExists
        );
    }

    fn walk(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                files.extend(walk(&path));
            } else {
                files.push(path);
            }
        }
        files
    }
}
