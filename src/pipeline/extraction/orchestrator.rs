use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use super::fetch::HttpFetcher;
use super::proxy::{ProxyOptions, ServerProxyClient};
use super::retry::{ProgressReporter, RetryPolicy, Sleeper, TokioSleeper};
use super::strategy::{ExtractionStrategy, LocalParseStrategy, ServerProxyStrategy};
use super::types::{
    AttemptOutcome, ByteFetcher, DocumentDescriptor, ExtractionAttempt, ExtractionOutcome,
    PdfParser, RawDocumentBytes, StrategyOutput,
};
use super::ExtractionError;
use crate::config::ExtractionConfig;

/// Strategy name recorded when the byte fetch itself fails.
const FETCH_STEP: &str = "fetch";

/// Where the orchestrator is in its run. Logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OrchestratorState {
    Idle,
    Attempting { strategy: &'static str, attempt: u32 },
    Succeeded,
    ExhaustedRetries,
}

/// Outcome plus the in-memory audit trail of one extraction.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub outcome: ExtractionOutcome,
    pub attempts: Vec<ExtractionAttempt>,
    pub correlation_id: Uuid,
    pub final_state: OrchestratorState,
    /// Short cause of the surfaced failure, when the run failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<&'static str>,
}

/// Runs strategies in order inside each attempt and retries with
/// exponential backoff until one yields text or attempts run out.
pub struct ExtractionOrchestrator {
    fetcher: Arc<dyn ByteFetcher>,
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl ExtractionOrchestrator {
    pub fn new(
        fetcher: Arc<dyn ByteFetcher>,
        strategies: Vec<Box<dyn ExtractionStrategy>>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            fetcher,
            strategies,
            policy,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replace the backoff sleeper (tests inject one that does not wait).
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Production wiring: HTTP fetcher, local parse first, then the
    /// fallback endpoint when one is configured.
    pub fn from_config(
        config: &ExtractionConfig,
        parser: Arc<dyn PdfParser>,
    ) -> Result<Self, ExtractionError> {
        let fetcher = Arc::new(HttpFetcher::new(config)?);

        let mut strategies: Vec<Box<dyn ExtractionStrategy>> =
            vec![Box::new(LocalParseStrategy::new(parser, config.max_pages))];
        if let Some(client) = ServerProxyClient::from_config(config)? {
            tracing::debug!(endpoint = client.endpoint(), "Fallback extraction enabled");
            let options = ProxyOptions {
                timeout: Some(config.call_timeout.as_millis() as u64),
                max_pages: Some(config.max_pages),
            };
            strategies.push(Box::new(ServerProxyStrategy::new(client, options)));
        }

        Ok(Self::new(fetcher, strategies, RetryPolicy::from(config)))
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Extract text for one document. Never returns an error: failures end
    /// up in the report's outcome with a user-facing message.
    pub async fn extract(
        &self,
        descriptor: &DocumentDescriptor,
        progress: &ProgressReporter,
    ) -> ExtractionReport {
        let correlation_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "extract",
            correlation_id = %correlation_id,
            doc = %descriptor.url
        );
        self.run(descriptor, progress, correlation_id)
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        descriptor: &DocumentDescriptor,
        progress: &ProgressReporter,
        correlation_id: Uuid,
    ) -> ExtractionReport {
        let mut state = OrchestratorState::Idle;
        let mut attempts = Vec::new();
        let mut raw: Option<RawDocumentBytes> = None;
        let mut last_error: Option<ExtractionError> = None;

        progress.report(0);
        tracing::info!(
            state = ?state,
            title = %descriptor.title,
            max_attempts = self.policy.max_attempts,
            strategies = ?self.strategy_names(),
            "Starting extraction"
        );
        if !descriptor.looks_like_pdf() {
            tracing::warn!(
                mime = %descriptor.effective_mime(),
                "Document does not look like a PDF, extracting anyway"
            );
        }

        'attempts: for attempt in 1..=self.policy.max_attempts {
            if attempt > 1 {
                let delay = self.policy.delay_after(attempt - 1);
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "Backing off");
                self.sleeper.sleep(delay).await;
            }
            progress.report(attempt_progress(attempt, self.policy.max_attempts));

            // Bytes are fetched once and reused by every later attempt.
            let document = match &raw {
                Some(document) => document.clone(),
                None => {
                    let started_at = Utc::now();
                    let title = Some(descriptor.title.as_str()).filter(|t| !t.is_empty());
                    match self.bounded(self.fetcher.fetch(&descriptor.url, title)).await {
                        Ok(document) => {
                            raw = Some(document.clone());
                            document
                        }
                        Err(e) => {
                            tracing::warn!(attempt, error = %e, "Fetch failed");
                            attempts.push(failed_attempt(FETCH_STEP, attempt, started_at, &e));
                            let fatal = !e.is_retryable();
                            last_error = Some(e);
                            if fatal {
                                break 'attempts;
                            }
                            continue;
                        }
                    }
                }
            };

            // Fallback-message output only stands if no later strategy does better.
            let mut provisional: Option<StrategyOutput> = None;

            for strategy in &self.strategies {
                state = OrchestratorState::Attempting {
                    strategy: strategy.name(),
                    attempt,
                };
                tracing::debug!(state = ?state, "Trying strategy");

                let started_at = Utc::now();
                let result = self
                    .bounded(strategy.attempt(&document, &correlation_id))
                    .await
                    .and_then(require_text);

                match result {
                    Ok(output) => {
                        attempts.push(ExtractionAttempt {
                            strategy_name: strategy.name().to_string(),
                            attempt_number: attempt,
                            started_at,
                            outcome: AttemptOutcome::Success {
                                text: output.text.clone(),
                            },
                        });
                        if output.is_fallback() {
                            tracing::info!(
                                strategy = strategy.name(),
                                attempt,
                                "Only the fallback message was recovered, trying next strategy"
                            );
                            provisional.get_or_insert(output);
                            continue;
                        }
                        return self.succeed(output, attempts, correlation_id, progress, strategy.name());
                    }
                    Err(e) => {
                        tracing::warn!(
                            strategy = strategy.name(),
                            attempt,
                            error = %e,
                            "Extraction attempt failed"
                        );
                        attempts.push(failed_attempt(strategy.name(), attempt, started_at, &e));
                        let fatal = !e.is_retryable();
                        last_error = Some(e);
                        if fatal {
                            break 'attempts;
                        }
                    }
                }
            }

            if let Some(output) = provisional {
                return self.succeed(output, attempts, correlation_id, progress, "fallback_message");
            }
        }

        let error = last_error.unwrap_or_else(|| {
            ExtractionError::NoTextFound("no extraction strategy is configured".into())
        });
        state = OrchestratorState::ExhaustedRetries;
        tracing::error!(
            state = ?state,
            attempts = attempts.len(),
            error = %error,
            "Extraction failed"
        );

        ExtractionReport {
            outcome: ExtractionOutcome::failed(error.user_message()),
            attempts,
            correlation_id,
            final_state: state,
            failure_reason: Some(error.reason()),
        }
    }

    fn succeed(
        &self,
        output: StrategyOutput,
        attempts: Vec<ExtractionAttempt>,
        correlation_id: Uuid,
        progress: &ProgressReporter,
        source: &str,
    ) -> ExtractionReport {
        progress.report(100);
        tracing::info!(
            source,
            attempts = attempts.len(),
            text_len = output.text.len(),
            stage = output.stage.map(|s| s.as_str()).unwrap_or("none"),
            "Extraction succeeded"
        );
        ExtractionReport {
            outcome: ExtractionOutcome::succeeded(output.text, output.pages),
            attempts,
            correlation_id,
            final_state: OrchestratorState::Succeeded,
            failure_reason: None,
        }
    }

    /// Apply the per-call watchdog.
    async fn bounded<T, F>(&self, call: F) -> Result<T, ExtractionError>
    where
        F: Future<Output = Result<T, ExtractionError>>,
    {
        match tokio::time::timeout(self.policy.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ExtractionError::Timeout(self.policy.call_timeout)),
        }
    }
}

/// Empty text is a failure to retry, never a success with no content.
fn require_text(output: StrategyOutput) -> Result<StrategyOutput, ExtractionError> {
    if output.text.trim().is_empty() {
        Err(ExtractionError::NoTextFound("strategy returned empty text".into()))
    } else {
        Ok(output)
    }
}

fn failed_attempt(
    strategy: &str,
    attempt: u32,
    started_at: chrono::DateTime<Utc>,
    error: &ExtractionError,
) -> ExtractionAttempt {
    ExtractionAttempt {
        strategy_name: strategy.to_string(),
        attempt_number: attempt,
        started_at,
        outcome: AttemptOutcome::Failure {
            reason: error.reason().to_string(),
        },
    }
}

/// Attempt milestones spread over 10..90; 100 is reserved for success.
fn attempt_progress(attempt: u32, max_attempts: u32) -> u8 {
    let span = 80 * (attempt.saturating_sub(1)) / max_attempts.max(1);
    (10 + span).min(90) as u8
}
