use std::{sync::Arc, time::Duration};

use anyhow::Result;
use reqwest::Client;
use tokio::{sync::mpsc::UnboundedReceiver, time::timeout};
use tokio_cron_scheduler::JobScheduler;

use crate::{
    badge::BadgeBoard,
    bridge::{self, MessageRouter, Outbox},
    cache::VerdictCache,
    config::AppConfig,
    db::{self, link_stats::LinkStatsRepository, settings::SettingsRepository},
    domain::OutboundFrame,
    infrastructure::{
        clock::SystemClock, directories::ResolvedPaths, notifier::AlertNotifier,
        shutdown::Shutdown,
    },
    service::{ClassificationService, ClassifierClient},
    tasks::{dispatcher::ScanDispatcher, scheduler::configure_sweep_job},
};

pub struct PhishGuardApp {
    paths: ResolvedPaths,
    scheduler: JobScheduler,
    router: Arc<MessageRouter>,
    classifier: Arc<ClassifierClient>,
    settings: SettingsRepository,
    outbox: Outbox,
    frames: UnboundedReceiver<OutboundFrame>,
    shutdown: Shutdown,
}

impl PhishGuardApp {
    pub async fn initialize(
        config: AppConfig,
        paths: ResolvedPaths,
        shutdown: Shutdown,
    ) -> Result<Self> {
        let pool = db::init_pool(&paths.db_path).await?;
        let settings = SettingsRepository::new(pool.clone());
        let link_stats = LinkStatsRepository::new(pool);

        let http_client = Client::builder()
            .user_agent(format!("phishguard-host/{}", env!("CARGO_PKG_VERSION")))
            .timeout(config.service.request_timeout)
            .build()?;
        let classifier = Arc::new(ClassifierClient::new(http_client, &config.service));
        let service: Arc<dyn ClassificationService> = classifier.clone();

        let cache = Arc::new(VerdictCache::new(&config.cache, Arc::new(SystemClock)));
        let (outbox, frames) = Outbox::channel();
        let badges = Arc::new(BadgeBoard::new(outbox.clone()));
        let alerts = Arc::new(AlertNotifier::new(settings.clone(), outbox.clone()));

        let dispatcher = Arc::new(ScanDispatcher::new(
            service.clone(),
            cache.clone(),
            badges.clone(),
            alerts,
            link_stats.clone(),
        ));
        let router = Arc::new(MessageRouter::new(
            dispatcher,
            service,
            badges,
            settings.clone(),
            link_stats,
            outbox.clone(),
            config.scan.clone(),
        ));

        let scheduler = configure_sweep_job(&config.cache.sweep_cron, cache).await?;

        tracing::info!(
            api = %config.service.base_url,
            ttl_ms = config.cache.ttl.as_millis() as u64,
            max_entries = config.cache.max_entries,
            "scan orchestrator ready"
        );

        Ok(Self {
            paths,
            scheduler,
            router,
            classifier,
            settings,
            outbox,
            frames,
            shutdown,
        })
    }

    pub async fn run(self) -> Result<()> {
        let PhishGuardApp {
            paths,
            mut scheduler,
            router,
            classifier,
            settings,
            outbox,
            frames,
            shutdown,
        } = self;

        tracing::info!(data = %paths.data_dir.display(), "phishguard native host started");

        if classifier.health().await {
            tracing::info!(target: "service", "classification service reachable");
        } else {
            tracing::warn!(
                target: "service",
                "classification service unreachable; scans will report errors until it returns"
            );
        }

        let served = bridge::serve(
            router,
            tokio::io::stdin(),
            tokio::io::stdout(),
            outbox,
            frames,
            shutdown.clone(),
        )
        .await;
        shutdown.trigger();
        if let Err(err) = served {
            tracing::error!(?err, "native messaging loop failed");
        }

        let shutdown_timeout = Duration::from_secs(5);
        match timeout(shutdown_timeout, scheduler.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::error!(target: "scheduler", ?err, "scheduler shutdown failed");
            }
            Err(_) => {
                tracing::warn!(
                    target: "scheduler",
                    "scheduler did not stop within {:?}",
                    shutdown_timeout
                );
            }
        }

        if timeout(shutdown_timeout, settings.close()).await.is_err() {
            tracing::warn!(
                target: "db",
                "database pool did not close within {:?}",
                shutdown_timeout
            );
        }

        tracing::info!("phishguard native host stopped");
        Ok(())
    }
}
