use super::{
    poller::{decide, failure_backoff, PollDecision},
    transport::{HttpTransport, ImageTransport},
    validation::validate_prompt,
};
use crate::{
    config::GeneratorConfig,
    error::{GenerationError, Result},
    models::{GenerationRequest, GenerationResult, OperationHandle},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

const SUBMIT_PATH: &str = "/openai/images/generations:submit";
const LOGGED_PROMPT_CHARS: usize = 50;

/// One step of a single `submit_and_wait` call.
#[derive(Debug)]
enum JobState {
    Validating,
    Submitting,
    Polling(PollingJob),
    Succeeded(GenerationResult),
    Failed(GenerationError),
    TimedOut,
}

#[derive(Debug)]
struct PollingJob {
    operation: OperationHandle,
    started: Instant,
    attempts: u32,
}

/// Submits prompts to the image generation service and waits for the
/// result. Holds no per-job state, so one instance can serve concurrent
/// requests.
#[derive(Clone)]
pub struct ImageGenerator {
    transport: Arc<dyn ImageTransport>,
    endpoint: String,
    submit_url: String,
    image_size: String,
    image_quality: String,
    timeout: Duration,
    poll_interval: Duration,
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| GenerationError::ConfigError(format!("{} is required", name)))
}

impl ImageGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        let api_key = required(config.api_key.clone(), "API key")?;
        let transport = HttpTransport::new(&api_key, config.request_timeout())?;
        Self::with_transport(config, Arc::new(transport))
    }

    pub fn with_transport(
        config: GeneratorConfig,
        transport: Arc<dyn ImageTransport>,
    ) -> Result<Self> {
        let endpoint = required(config.endpoint.clone(), "Endpoint")?
            .trim_end_matches('/')
            .to_string();
        let submit_url = format!(
            "{}{}?api-version={}",
            endpoint, SUBMIT_PATH, config.api_version
        );

        Ok(Self {
            transport,
            endpoint,
            submit_url,
            timeout: config.timeout(),
            poll_interval: config.poll_interval(),
            image_size: config.image_size,
            image_quality: config.image_quality,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn submit_url(&self) -> &str {
        &self.submit_url
    }

    /// Submit `prompt` and poll until the job reaches a terminal status or
    /// the overall timeout runs out.
    pub async fn submit_and_wait(&self, prompt: &str) -> Result<GenerationResult> {
        let mut state = JobState::Validating;
        loop {
            state = match state {
                JobState::Validating => self.validate(prompt),
                JobState::Submitting => self.submit(prompt).await,
                JobState::Polling(job) => self.poll(prompt, job).await,
                JobState::Succeeded(result) => return Ok(result),
                JobState::Failed(err) => return Err(err),
                JobState::TimedOut => return Err(GenerationError::TimeoutError),
            };
        }
    }

    /// Same as [`submit_and_wait`](Self::submit_and_wait), returning only the URL.
    pub async fn generate_image(&self, prompt: &str) -> Result<String> {
        self.submit_and_wait(prompt).await.map(|result| result.url)
    }

    fn validate(&self, prompt: &str) -> JobState {
        match validate_prompt(prompt) {
            Ok(()) => JobState::Submitting,
            Err(e) => {
                log::warn!("Rejected prompt: {}", e);
                JobState::Failed(e)
            }
        }
    }

    async fn submit(&self, prompt: &str) -> JobState {
        let request = GenerationRequest::new(prompt, &self.image_size, &self.image_quality);

        log::info!(
            "Submitting image generation request for prompt: {}...",
            prompt.chars().take(LOGGED_PROMPT_CHARS).collect::<String>()
        );

        let header = match self.transport.submit(&self.submit_url, &request).await {
            Ok(header) => header,
            Err(e) => {
                log::error!("API request failed: {}", e);
                return JobState::Failed(GenerationError::ServiceUnavailableError(e));
            }
        };

        match OperationHandle::from_header(header) {
            Some(operation) => {
                log::info!("Generation job accepted: {}", operation.as_str());
                JobState::Polling(PollingJob {
                    operation,
                    started: Instant::now(),
                    attempts: 0,
                })
            }
            None => {
                log::error!("Image generation failed: no operation-location header in response");
                JobState::Failed(GenerationError::ProtocolError(
                    "missing operation handle".into(),
                ))
            }
        }
    }

    async fn poll(&self, prompt: &str, mut job: PollingJob) -> JobState {
        let elapsed = job.started.elapsed();
        if elapsed >= self.timeout {
            log::error!(
                "Image generation timed out after {}s and {} polls",
                elapsed.as_secs(),
                job.attempts
            );
            return JobState::TimedOut;
        }

        job.attempts += 1;
        let delay = match self.transport.poll(job.operation.as_str()).await {
            Err(e) => {
                log::warn!("Polling request failed: {}", e);
                failure_backoff(self.poll_interval)
            }
            Ok(body) => match decide(&body, &self.endpoint, self.poll_interval) {
                PollDecision::Complete(url) => {
                    log::info!("Image generation succeeded after {} polls", job.attempts);
                    return JobState::Succeeded(GenerationResult {
                        url,
                        prompt: prompt.to_string(),
                    });
                }
                PollDecision::Fail(err) => {
                    log::error!("Image generation failed: {}", err);
                    return JobState::Failed(err);
                }
                PollDecision::Wait(delay) => {
                    log::debug!("Generation still running (poll {})", job.attempts);
                    delay
                }
            },
        };

        sleep(delay).await;
        JobState::Polling(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::imagegen::transport::MockImageTransport;
    use mockall::Sequence;
    use std::sync::Mutex;

    /// Records warn/error output from this crate, per test thread.
    mod capture {
        use log::{Level, LevelFilter, Metadata, Record};
        use once_cell::sync::Lazy;
        use std::sync::Mutex;
        use std::thread::{self, ThreadId};

        struct CaptureLogger {
            records: Mutex<Vec<(ThreadId, Level, String)>>,
        }

        impl log::Log for CaptureLogger {
            fn enabled(&self, metadata: &Metadata) -> bool {
                metadata.target().starts_with("rimagegen")
            }

            fn log(&self, record: &Record) {
                if self.enabled(record.metadata()) {
                    self.records.lock().unwrap().push((
                        thread::current().id(),
                        record.level(),
                        record.args().to_string(),
                    ));
                }
            }

            fn flush(&self) {}
        }

        static CAPTURE: Lazy<CaptureLogger> = Lazy::new(|| CaptureLogger {
            records: Mutex::new(Vec::new()),
        });

        pub fn install() {
            let _ = log::set_logger(&*CAPTURE);
            log::set_max_level(LevelFilter::Trace);
        }

        pub fn problems() -> Vec<(Level, String)> {
            let current = thread::current().id();
            CAPTURE
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|(id, level, _)| *id == current && *level <= Level::Warn)
                .map(|(_, level, message)| (*level, message.clone()))
                .collect()
        }
    }

    const ENDPOINT: &str = "https://svc";
    const OPERATION: &str = "https://svc/op/123";

    fn config() -> GeneratorConfig {
        GeneratorConfig::new()
            .with_endpoint(ENDPOINT)
            .with_credentials("test-key")
            .with_timeouts(30, 5)
    }

    fn generator(mock: MockImageTransport) -> ImageGenerator {
        ImageGenerator::with_transport(config(), Arc::new(mock)).unwrap()
    }

    fn accepting_submit(mock: &mut MockImageTransport) {
        mock.expect_submit()
            .times(1)
            .returning(|_, _| Ok(Some(OPERATION.to_string())));
    }

    fn succeeded(url: &str) -> String {
        format!(
            r#"{{"status":"succeeded","result":{{"data":[{{"url":"{}"}}]}}}}"#,
            url
        )
    }

    #[tokio::test]
    async fn test_short_prompt_makes_no_calls() {
        for prompt in ["hi", "", "   abc  ", "\n\t"] {
            let mut mock = MockImageTransport::new();
            mock.expect_submit().times(0);
            mock.expect_poll().times(0);

            let err = generator(mock).submit_and_wait(prompt).await.unwrap_err();
            assert!(matches!(err, GenerationError::ValidationError(_)));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_red_fox_scenario() {
        let mut mock = MockImageTransport::new();
        let mut seq = Sequence::new();
        mock.expect_submit()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|url, request| {
                url.to_string()
                    == "https://svc/openai/images/generations:submit?api-version=2023-06-01-preview"
                    && request.prompt == "a red fox in snow"
                    && request.n == 1
                    && request.size == "1024x1024"
                    && request.quality == "standard"
            })
            .returning(|_, _| Ok(Some(OPERATION.to_string())));
        mock.expect_poll()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|url| url.to_string() == OPERATION)
            .returning(|_| Ok(r#"{"status":"running"}"#.to_string()));
        mock.expect_poll()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(succeeded("https://svc/images/abc.png")));

        let result = generator(mock)
            .submit_and_wait("a red fox in snow")
            .await
            .unwrap();

        assert_eq!(result.url, "https://svc/images/abc.png");
        assert_eq!(result.prompt, "a red fox in snow");
    }

    #[tokio::test]
    async fn test_trailing_slash_endpoint_is_normalized() {
        let mut mock = MockImageTransport::new();
        mock.expect_submit()
            .times(1)
            .withf(|url, _| url.starts_with("https://svc/openai/"))
            .returning(|_, _| Ok(Some(OPERATION.to_string())));
        mock.expect_poll()
            .times(1)
            .returning(|_| Ok(succeeded("https://svc/images/abc.png")));

        let config = config().with_endpoint("https://svc/");
        let generator = ImageGenerator::with_transport(config, Arc::new(mock)).unwrap();

        assert_eq!(generator.endpoint(), "https://svc");
        let url = generator.generate_image("a red fox in snow").await.unwrap();
        assert_eq!(url, "https://svc/images/abc.png");
    }

    #[tokio::test]
    async fn test_submit_transport_failure() {
        let mut mock = MockImageTransport::new();
        mock.expect_submit()
            .times(1)
            .returning(|_, _| Err(TransportError::Status(503)));
        mock.expect_poll().times(0);

        let err = generator(mock)
            .submit_and_wait("a red fox in snow")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GenerationError::ServiceUnavailableError(TransportError::Status(503))
        ));
    }

    #[tokio::test]
    async fn test_missing_operation_location() {
        for header in [None, Some(String::new())] {
            let mut mock = MockImageTransport::new();
            mock.expect_submit()
                .times(1)
                .returning(move |_, _| Ok(header.clone()));
            mock.expect_poll().times(0);

            let err = generator(mock)
                .submit_and_wait("a red fox in snow")
                .await
                .unwrap_err();
            assert!(matches!(err, GenerationError::ProtocolError(_)));
        }
    }

    #[tokio::test]
    async fn test_foreign_result_url_rejected() {
        let mut mock = MockImageTransport::new();
        accepting_submit(&mut mock);
        mock.expect_poll()
            .times(1)
            .returning(|_| Ok(succeeded("https://attacker.example/abc.png")));

        let err = generator(mock)
            .submit_and_wait("a red fox in snow")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::ProtocolError(_)));
    }

    #[tokio::test]
    async fn test_failed_status_stops_polling() {
        let mut mock = MockImageTransport::new();
        accepting_submit(&mut mock);
        mock.expect_poll().times(1).returning(|_| {
            Ok(r#"{"status":"failed","error":{"message":"content filtered"}}"#.to_string())
        });

        let err = generator(mock)
            .submit_and_wait("a red fox in snow")
            .await
            .unwrap_err();
        match err {
            GenerationError::GenerationFailedError(msg) => assert_eq!(msg, "content filtered"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_canceled_without_message() {
        let mut mock = MockImageTransport::new();
        accepting_submit(&mut mock);
        mock.expect_poll()
            .times(1)
            .returning(|_| Ok(r#"{"status":"canceled"}"#.to_string()));

        let err = generator(mock)
            .submit_and_wait("a red fox in snow")
            .await
            .unwrap_err();
        match err {
            GenerationError::GenerationFailedError(msg) => assert_eq!(msg, "Unknown error"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_status_not_retried() {
        let mut mock = MockImageTransport::new();
        accepting_submit(&mut mock);
        mock.expect_poll()
            .times(1)
            .returning(|_| Ok("not json".to_string()));

        let err = generator(mock)
            .submit_and_wait("a red fox in snow")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::ProtocolError(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failures_back_off_until_timeout() {
        let calls: Arc<Mutex<Vec<Instant>>> = Arc::new(Mutex::new(Vec::new()));
        let recorded = calls.clone();

        let mut mock = MockImageTransport::new();
        accepting_submit(&mut mock);
        mock.expect_poll().returning(move |_| {
            recorded.lock().unwrap().push(Instant::now());
            Err(TransportError::Timeout("operation timed out".into()))
        });

        let started = Instant::now();
        let err = generator(mock)
            .submit_and_wait("a red fox in snow")
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::TimeoutError));
        assert!(started.elapsed() >= Duration::from_secs(30));

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        for pair in calls.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(10));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_then_success() {
        let mut mock = MockImageTransport::new();
        let mut seq = Sequence::new();
        accepting_submit(&mut mock);
        mock.expect_poll()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(TransportError::Connection("reset by peer".into())));
        mock.expect_poll()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(succeeded("https://svc/images/abc.png")));

        let started = Instant::now();
        let result = generator(mock)
            .submit_and_wait("a red fox in snow")
            .await
            .unwrap();

        assert_eq!(result.url, "https://svc/images/abc.png");
        assert!(started.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_polls_until_timeout() {
        let mut mock = MockImageTransport::new();
        accepting_submit(&mut mock);
        mock.expect_poll()
            .times(6)
            .returning(|_| Ok(r#"{"status":"notRunning"}"#.to_string()));

        let err = generator(mock)
            .submit_and_wait("a red fox in snow")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::TimeoutError));
    }

    /// Runs a job expected to fail and returns the warn/error records it left.
    async fn failure_records(mock: MockImageTransport, prompt: &str) -> Vec<(log::Level, String)> {
        capture::install();
        assert!(capture::problems().is_empty());
        assert!(generator(mock).submit_and_wait(prompt).await.is_err());
        capture::problems()
    }

    #[tokio::test]
    async fn test_rejected_prompt_logs_one_warning() {
        let mut mock = MockImageTransport::new();
        mock.expect_submit().times(0);

        let records = failure_records(mock, "hi").await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, log::Level::Warn);
        assert!(records[0].1.contains("at least 5 characters"));
    }

    #[tokio::test]
    async fn test_submit_failure_logs_one_error() {
        let mut mock = MockImageTransport::new();
        mock.expect_submit()
            .returning(|_, _| Err(TransportError::Connection("refused".into())));

        let records = failure_records(mock, "a red fox in snow").await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, log::Level::Error);
        assert!(records[0].1.contains("API request failed"));
    }

    #[tokio::test]
    async fn test_missing_handle_logs_one_error() {
        let mut mock = MockImageTransport::new();
        mock.expect_submit().returning(|_, _| Ok(None));

        let records = failure_records(mock, "a red fox in snow").await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, log::Level::Error);
        assert!(records[0].1.contains("operation-location"));
    }

    #[tokio::test]
    async fn test_failed_status_logs_one_error() {
        let mut mock = MockImageTransport::new();
        accepting_submit(&mut mock);
        mock.expect_poll().returning(|_| {
            Ok(r#"{"status":"failed","error":{"message":"content filtered"}}"#.to_string())
        });

        let records = failure_records(mock, "a red fox in snow").await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, log::Level::Error);
        assert!(records[0].1.contains("content filtered"));
    }

    #[tokio::test]
    async fn test_rejected_result_url_logs_one_error() {
        let mut mock = MockImageTransport::new();
        accepting_submit(&mut mock);
        mock.expect_poll()
            .returning(|_| Ok(succeeded("https://attacker.example/abc.png")));

        let records = failure_records(mock, "a red fox in snow").await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, log::Level::Error);
        assert!(records[0].1.contains("invalid image URL"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_logs_one_error() {
        let mut mock = MockImageTransport::new();
        accepting_submit(&mut mock);
        mock.expect_poll()
            .returning(|_| Ok(r#"{"status":"running"}"#.to_string()));

        let records = failure_records(mock, "a red fox in snow").await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, log::Level::Error);
        assert!(records[0].1.contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retried_polls_log_warnings_and_one_error() {
        let mut mock = MockImageTransport::new();
        accepting_submit(&mut mock);
        mock.expect_poll()
            .returning(|_| Err(TransportError::Status(500)));

        let records = failure_records(mock, "a red fox in snow").await;
        let errors: Vec<_> = records
            .iter()
            .filter(|(level, _)| *level == log::Level::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].1.contains("timed out"));
        assert_eq!(records.len(), 4);
        assert!(records[..3]
            .iter()
            .all(|(level, message)| *level == log::Level::Warn && message.contains("Polling")));
    }

    #[test]
    fn test_missing_configuration() {
        let err = ImageGenerator::new(GeneratorConfig::new().with_credentials("key")).err();
        assert!(matches!(err, Some(GenerationError::ConfigError(_))));

        let err = ImageGenerator::new(GeneratorConfig::new().with_endpoint(ENDPOINT)).err();
        assert!(matches!(err, Some(GenerationError::ConfigError(_))));
    }

    #[test]
    fn test_submit_url_uses_api_version() {
        let generator = ImageGenerator::new(config().with_api_version("2024-02-01")).unwrap();
        assert_eq!(
            generator.submit_url(),
            "https://svc/openai/images/generations:submit?api-version=2024-02-01"
        );
    }
}
