use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use color_eyre::eyre::{Result, WrapErr as _};
use push_core::Installation;
use push_dispatch::{
    DispatchCallback, DispatchRouter, ResultReconciler, TargetResolver, WorkerStats,
    spawn_reconcile_workers,
};
use push_gateway::{FcmGateway, PushGateway};
use push_storage::{InstallationStore as _, SqliteStorage};

use crate::cli::{ImportArgs, SendArgs};
use crate::config::Config;

fn open_storage(config: &Config) -> Result<SqliteStorage> {
    let storage =
        SqliteStorage::new(&config.database_url).wrap_err("failed to initialize storage")?;

    storage
        .run_migrations()
        .wrap_err("failed to run migrations")?;

    Ok(storage)
}

pub fn migrate(config: &Config) -> Result<()> {
    open_storage(config)?;
    tracing::info!(database_url = %config.database_url, "migrations applied");
    Ok(())
}

/// Returns the number of newly stored installations.
pub fn import(config: &Config, args: &ImportArgs) -> Result<usize> {
    let variant = config.variant(&args.variant)?;
    let storage = open_storage(config)?;

    let content = std::fs::read_to_string(&args.file)
        .wrap_err_with(|| format!("failed to read {}", args.file.display()))?;
    let installations: Vec<Installation> =
        serde_json::from_str(&content).wrap_err("invalid installation file")?;

    let stored = storage.add_installations(variant, &installations)?;

    tracing::info!(file = %args.file.display(), stored, "import finished");

    Ok(stored)
}

/// Counts callback outcomes.
#[derive(Debug, Default)]
pub struct LoggingCallback {
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

impl DispatchCallback for LoggingCallback {
    fn on_success(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    fn on_error(&self, reason: &str) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        tracing::error!(reason = %reason, "batch failed");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendSummary {
    pub batches: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub reconciled: WorkerStats,
}

/// Resolve targets, dispatch every batch, then drain reconciliation.
pub async fn send(config: &Config, args: &SendArgs) -> Result<SendSummary> {
    let gateway = FcmGateway::new(config.gateway.endpoint.clone())?;
    send_with(config, args, gateway).await
}

/// [`send`] through a caller-supplied gateway.
pub async fn send_with<G: PushGateway>(
    config: &Config,
    args: &SendArgs,
    gateway: G,
) -> Result<SendSummary> {
    let variant = config.variant(&args.variant)?.clone();
    let storage = open_storage(config)?;

    let batches = if args.target.is_empty() {
        let resolver = TargetResolver::new(storage.clone())
            .with_max_topic_subscribers(config.max_topic_subscribers);
        let criteria = args.criteria();
        let batch_size = config.batch_size;
        let variant = variant.clone();

        tokio::task::spawn_blocking(move || resolver.batches(&variant, &criteria, batch_size))
            .await
            .wrap_err("target resolution panicked")??
    } else {
        vec![args.target.clone()]
    };

    let reconciler = Arc::new(
        ResultReconciler::new(storage)
            .with_actionable_codes(config.reconcile.actionable_error_codes.clone()),
    );
    let (publisher, workers) = spawn_reconcile_workers(reconciler, config.channel_config());

    let router = DispatchRouter::new(gateway, publisher).with_timeout(config.gateway_timeout());

    let push = args.push_message();
    let push_message_id = uuid::Uuid::new_v4().to_string();
    let callback = LoggingCallback::default();

    tracing::info!(
        variant_id = %variant.id,
        push_message_id = %push_message_id,
        batches = batches.len(),
        "dispatching"
    );

    for batch in &batches {
        router
            .dispatch(&variant, batch, &push, &push_message_id, &callback)
            .await;
    }

    drop(router);
    let reconciled = workers.shutdown().await;

    let summary = SendSummary {
        batches: batches.len(),
        succeeded: callback.succeeded.load(Ordering::Relaxed),
        failed: callback.failed.load(Ordering::Relaxed),
        reconciled,
    };

    tracing::info!(?summary, "send finished");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use axum::extract::State;
    use axum::routing::post;
    use axum::{Json, Router};
    use push_core::{TokenCriteria, Variant, VariantKind};
    use push_storage::{DeviceRegistry as _, InstallationStore as _};
    use serde_json::{Value, json};

    type Requests = Arc<Mutex<Vec<Value>>>;

    async fn fake_fcm(State(requests): State<Requests>, Json(body): Json<Value>) -> Json<Value> {
        requests.lock().unwrap().push(body.clone());

        if body.get("to").is_some() {
            return Json(json!({"message_id": 7}));
        }

        let results: Vec<Value> = body["registration_ids"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .iter()
            .map(|token| match token.as_str() {
                Some("b") => json!({"error": "NotRegistered"}),
                Some("c") => json!({"message_id": "m", "registration_id": "d"}),
                _ => json!({}),
            })
            .collect();

        Json(json!({"multicast_id": 1, "results": results}))
    }

    async fn serve_fcm() -> (FcmGateway, Requests) {
        let requests = Requests::default();
        let app = Router::new()
            .route("/fcm/send", post(fake_fcm))
            .with_state(Arc::clone(&requests));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let gateway = FcmGateway::with_client(client, format!("http://{addr}/fcm/send"));
        (gateway, requests)
    }

    fn import_devices(config: &Config, dir: &tempfile::TempDir, devices: &str) {
        let file = dir.path().join("devices.json");
        std::fs::write(&file, devices).unwrap();
        import(
            config,
            &ImportArgs {
                variant: "android-1".to_string(),
                file,
            },
        )
        .unwrap();
    }

    fn stored_tokens(config: &Config) -> Vec<String> {
        SqliteStorage::new(&config.database_url)
            .unwrap()
            .find_device_tokens("android-1", &TokenCriteria::new(), 100, None)
            .unwrap()
    }

    fn config(dir: &tempfile::TempDir) -> Config {
        Config {
            database_url: dir.path().join("push.db").to_string_lossy().into_owned(),
            variants: vec![Variant {
                id: "android-1".to_string(),
                kind: VariantKind::Android,
                server_key: "secret".to_string(),
            }],
            ..Config::default()
        }
    }

    fn send_args(variant: &str, alias: &str) -> SendArgs {
        SendArgs {
            variant: variant.to_string(),
            target: Vec::new(),
            category: Vec::new(),
            alias: vec![alias.to_string()],
            device_type: Vec::new(),
            alert: "hello".to_string(),
            sound: None,
            badge: None,
            priority: crate::cli::PriorityArg::Normal,
            ttl: None,
            data: Vec::new(),
        }
    }

    #[test]
    fn test_import_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let file = dir.path().join("devices.json");
        std::fs::write(
            &file,
            r#"[
                {"deviceToken": "t1", "alias": "ann", "categories": ["news"]},
                {"deviceToken": "t2"},
                {"deviceToken": "t1"},
                {"deviceToken": ""}
            ]"#,
        )
        .unwrap();

        let stored = import(
            &config,
            &ImportArgs {
                variant: "android-1".to_string(),
                file,
            },
        )
        .unwrap();
        assert_eq!(stored, 2);

        let storage = SqliteStorage::new(&config.database_url).unwrap();
        let device = storage
            .find_by_variant_and_token("android-1", "t1")
            .unwrap()
            .unwrap();
        assert_eq!(device.alias.as_deref(), Some("ann"));
        assert!(device.categories.contains("news"));
    }

    #[test]
    fn test_import_unknown_variant() {
        let dir = tempfile::tempdir().unwrap();
        let args = ImportArgs {
            variant: "missing".to_string(),
            file: dir.path().join("devices.json"),
        };

        assert!(import(&config(&dir), &args).is_err());
    }

    #[tokio::test]
    async fn test_send_without_audience_contacts_nobody() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(&dir);
        config.gateway.endpoint = "http://127.0.0.1:9/unreachable".to_string();

        let summary = send(&config, &send_args("android-1", "nobody")).await.unwrap();

        assert_eq!(
            summary,
            SendSummary {
                batches: 0,
                succeeded: 0,
                failed: 0,
                reconciled: WorkerStats::default(),
            }
        );
    }

    #[tokio::test]
    async fn test_send_reconciles_device_batch() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        import_devices(
            &config,
            &dir,
            r#"[{"deviceToken": "a"}, {"deviceToken": "b"}, {"deviceToken": "c"}]"#,
        );
        let (gateway, requests) = serve_fcm().await;

        let mut args = send_args("android-1", "unused");
        args.alias.clear();
        let summary = send_with(&config, &args, gateway).await.unwrap();

        assert_eq!(
            summary,
            SendSummary {
                batches: 1,
                succeeded: 1,
                failed: 0,
                reconciled: WorkerStats {
                    completed: 1,
                    failed: 0
                },
            }
        );

        let requests = requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["registration_ids"], json!(["a", "b", "c"]));
        assert_eq!(stored_tokens(&config), vec!["a", "d"]);
    }

    #[tokio::test]
    async fn test_send_to_topics_leaves_registry_alone() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        import_devices(
            &config,
            &dir,
            r#"[
                {"deviceToken": "a", "categories": ["news"]},
                {"deviceToken": "b", "categories": ["news"]},
                {"deviceToken": "c", "categories": ["news"]}
            ]"#,
        );
        let storage = SqliteStorage::new(&config.database_url).unwrap();
        let before: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|t| storage.find_by_variant_and_token("android-1", t).unwrap())
            .collect();
        let (gateway, requests) = serve_fcm().await;

        let mut args = send_args("android-1", "unused");
        args.alias.clear();
        args.category = vec!["news".to_string()];
        let summary = send_with(&config, &args, gateway).await.unwrap();

        assert_eq!(
            summary,
            SendSummary {
                batches: 1,
                succeeded: 1,
                failed: 0,
                reconciled: WorkerStats::default(),
            }
        );

        let requests = requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["to"], "/topics/news");

        let after: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|t| storage.find_by_variant_and_token("android-1", t).unwrap())
            .collect();
        assert_eq!(after, before);
        assert_eq!(stored_tokens(&config), vec!["a", "b", "c"]);
    }
}
