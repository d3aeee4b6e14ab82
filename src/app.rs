use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::ai::{
    ChatClient, HackerNewsNormalizer, LanguageModel, Normalizer, ProblemJudge,
    StackExchangeNormalizer,
};
use crate::config::Config;
use crate::connectors::{Connector, HackerNewsConnector, StackExchangeConnector};
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::ingest::Orchestrator;
use crate::models::{
    IngestionStats, ProblemDetail, ProblemPage, ProblemQuery, Source, SourceStatus, Tag,
};

pub struct App {
    pub repository: Arc<Repository>,
    config: Config,
    llm: Option<Arc<dyn LanguageModel>>,
}

impl App {
    pub async fn new(config: &Config) -> Result<Self> {
        let repository = Arc::new(Repository::new(&config.db_path).await?);

        let llm = match config.require_llm() {
            Ok((api_key, base_url)) => {
                let client = ChatClient::new(base_url, api_key, &config.llm)?;
                tracing::debug!("Using model {}", client.model_version());
                Some(Arc::new(client) as Arc<dyn LanguageModel>)
            }
            Err(_) => None,
        };

        Ok(Self {
            repository,
            config: config.clone(),
            llm,
        })
    }

    /// Runs one ingestion over `source_name` with its matching connector and normalizer.
    pub async fn ingest(
        &self,
        source_name: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<IngestionStats> {
        let llm = match &self.llm {
            Some(llm) => Arc::clone(llm),
            None => {
                self.config.require_llm()?;
                return Err(AppError::Config("LLM client is not configured".into()));
            }
        };
        let judge = ProblemJudge::new(llm, &self.config.llm);

        let (connector, normalizer): (Box<dyn Connector>, Box<dyn Normalizer>) = match source_name
        {
            "hackernews" => (
                Box::new(HackerNewsConnector::new(self.config.hackernews.clone())?),
                Box::new(HackerNewsNormalizer::new(judge)),
            ),
            "stackexchange" => (
                Box::new(StackExchangeConnector::new(self.config.stackexchange.clone())?),
                Box::new(StackExchangeNormalizer::new(judge)),
            ),
            other => return Err(self.no_connector(other).await),
        };

        let orchestrator = Orchestrator::new(Arc::clone(&self.repository), self.config.scoring);
        orchestrator
            .run(connector.source_name(), connector.as_ref(), normalizer.as_ref(), since)
            .await
    }

    async fn no_connector(&self, source_name: &str) -> AppError {
        match self.repository.get_source_by_name(source_name).await {
            Ok(Some(source)) if !source.is_active() => {
                AppError::SourcePaused(source_name.to_string())
            }
            Ok(Some(_)) => AppError::Config(format!("no connector for source {source_name}")),
            Ok(None) => AppError::SourceNotFound(source_name.to_string()),
            Err(e) => e,
        }
    }

    pub async fn list(&self, query: &ProblemQuery) -> Result<ProblemPage> {
        self.repository
            .list_problems(query, &self.config.listing, &self.config.scoring)
            .await
    }

    pub async fn show(&self, id: i64) -> Result<Option<ProblemDetail>> {
        self.repository.get_problem(id).await
    }

    pub async fn sources(&self) -> Result<Vec<Source>> {
        self.repository.list_sources().await
    }

    pub async fn tags(&self) -> Result<Vec<Tag>> {
        self.repository.list_tags().await
    }

    pub async fn set_source_status(&self, source_name: &str, status: SourceStatus) -> Result<()> {
        if !self.repository.set_source_status(source_name, status).await? {
            return Err(AppError::SourceNotFound(source_name.to_string()));
        }
        tracing::info!("Source {} is now {}", source_name, status.as_str());
        Ok(())
    }
}
