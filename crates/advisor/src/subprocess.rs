use crate::error::AdvisorError;
use crate::protocol::{Request, Response};
use crate::Advisor;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

/// An advisor living in a child process.
///
/// Requests go to the child's stdin, one JSON object per line; the next line on
/// its stdout is the answer. The child is killed when the advisor is dropped.
pub struct SubprocessAdvisor {
    name: String,
    observation_dim: usize,
    timeout: Duration,
    _child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl SubprocessAdvisor {
    pub fn spawn(command: &[String], observation_dim: usize, timeout: Duration) -> Result<Self, AdvisorError> {
        let name = command.join(" ");
        let Some((program, args)) = command.split_first() else {
            return Err(AdvisorError::Spawn {
                command: name,
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty advisor command"),
            });
        };
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| AdvisorError::Spawn { command: name.clone(), source })?;

        let stdin = child.stdin.take().ok_or(AdvisorError::ProcessExited)?;
        let stdout = child.stdout.take().ok_or(AdvisorError::ProcessExited)?;
        tracing::info!(advisor = %name, observation_dim, ?timeout, "Advisor process started");

        Ok(Self {
            name,
            observation_dim,
            timeout,
            _child: child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        })
    }

    async fn round_trip(&mut self, request: &Request<'_>) -> Result<Response, AdvisorError> {
        let mut line = serde_json::to_string(request).map_err(AdvisorError::Encode)?;
        line.push('\n');

        let limit = self.timeout;
        let stdin = &mut self.stdin;
        let stdout = &mut self.stdout;
        let exchange = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.flush().await?;
            stdout.next_line().await
        };

        let answer = match tokio::time::timeout(limit, exchange).await {
            Err(_) => return Err(AdvisorError::Timeout(limit)),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => return Err(AdvisorError::ProcessExited),
            Ok(Err(e)) => return Err(AdvisorError::Io(e)),
            Ok(Ok(None)) => return Err(AdvisorError::ProcessExited),
            Ok(Ok(Some(answer))) => answer,
        };

        match serde_json::from_str::<Response>(answer.trim()) {
            Ok(Response::Error { error }) => Err(AdvisorError::Remote(error)),
            Ok(response) => Ok(response),
            Err(source) => Err(AdvisorError::Malformed { line: answer, source }),
        }
    }
}

#[async_trait]
impl Advisor for SubprocessAdvisor {
    fn name(&self) -> &str {
        &self.name
    }

    fn observation_dim(&self) -> usize {
        self.observation_dim
    }

    async fn infer(&mut self, obs: &[f64]) -> Result<i64, AdvisorError> {
        if obs.len() != self.observation_dim {
            return Err(AdvisorError::InvalidObservation { expected: self.observation_dim, got: obs.len() });
        }
        // JSON has no NaN or infinity.
        let obs: Vec<f64> = obs.iter().map(|v| if v.is_finite() { *v } else { 0.0 }).collect();
        match self.round_trip(&Request::Infer { obs: &obs }).await? {
            Response::Action { action } => {
                tracing::debug!(advisor = %self.name, action, "Advisor answered");
                Ok(action)
            }
            other => Err(AdvisorError::UnexpectedResponse(format!("{other:?}"))),
        }
    }

    async fn reset(&mut self) -> Result<(), AdvisorError> {
        match self.round_trip(&Request::Reset).await? {
            Response::Status { .. } => Ok(()),
            other => Err(AdvisorError::UnexpectedResponse(format!("{other:?}"))),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn script(body: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), body.to_string()]
    }

    const ECHO_POLICY: &str = r#"while read line; do
  case "$line" in
    *reset*) echo '{"status":"reset"}' ;;
    *infer*) echo '{"action":2}' ;;
  esac
done"#;

    #[tokio::test]
    async fn infers_and_resets() {
        let mut advisor = SubprocessAdvisor::spawn(&script(ECHO_POLICY), 3, Duration::from_secs(5)).unwrap();
        assert_eq!(advisor.infer(&[0.1, f64::NAN, 0.3]).await.unwrap(), 2);
        advisor.reset().await.unwrap();
        assert_eq!(advisor.infer(&[0.0, 0.0, 0.0]).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn wrong_observation_size_is_rejected_locally() {
        let mut advisor = SubprocessAdvisor::spawn(&script(ECHO_POLICY), 3, Duration::from_secs(5)).unwrap();
        assert!(matches!(
            advisor.infer(&[1.0]).await,
            Err(AdvisorError::InvalidObservation { expected: 3, got: 1 })
        ));
    }

    #[tokio::test]
    async fn remote_errors_are_surfaced() {
        let body = r#"read line; echo '{"error":"invalid_observation"}'"#;
        let mut advisor = SubprocessAdvisor::spawn(&script(body), 1, Duration::from_secs(5)).unwrap();
        assert!(matches!(advisor.infer(&[1.0]).await, Err(AdvisorError::Remote(msg)) if msg == "invalid_observation"));
    }

    #[tokio::test]
    async fn malformed_answer() {
        let body = "read line; echo 'not json'";
        let mut advisor = SubprocessAdvisor::spawn(&script(body), 1, Duration::from_secs(5)).unwrap();
        assert!(matches!(advisor.infer(&[1.0]).await, Err(AdvisorError::Malformed { .. })));
    }

    #[tokio::test]
    async fn process_exit_is_fatal_for_the_request() {
        let body = "read line; exit 0";
        let mut advisor = SubprocessAdvisor::spawn(&script(body), 1, Duration::from_secs(5)).unwrap();
        assert!(matches!(advisor.infer(&[1.0]).await, Err(AdvisorError::ProcessExited)));
    }

    #[tokio::test]
    async fn slow_advisor_times_out() {
        let body = "read line; sleep 5";
        let mut advisor = SubprocessAdvisor::spawn(&script(body), 1, Duration::from_millis(100)).unwrap();
        assert!(matches!(advisor.infer(&[1.0]).await, Err(AdvisorError::Timeout(_))));
    }

    #[test]
    fn missing_program_fails_to_spawn() {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let _guard = runtime.enter();
        let result = SubprocessAdvisor::spawn(&["/nonexistent/advisor-binary".to_string()], 1, Duration::from_secs(1));
        assert!(matches!(result, Err(AdvisorError::Spawn { .. })));
        assert!(matches!(
            SubprocessAdvisor::spawn(&[], 1, Duration::from_secs(1)),
            Err(AdvisorError::Spawn { .. })
        ));
    }
}
