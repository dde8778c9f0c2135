//! Alert Processor
//!
//! Walks one webhook batch in order, picks out firing alerts, resolves their
//! recovery action and runs it. Every firing alert yields exactly one
//! [`AlertOutcome`]; nothing else does.

mod models;

pub use models::{
    Alert, AlertBatch, AlertOutcome, AlertStatus, AlertType, BatchResponse, NO_ACTION,
    NO_ACTION_MESSAGE, UNKNOWN_ALERT_NAME, UNKNOWN_LABEL,
};

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{actions::ActionRegistry, executor::PlaybookRunner, metrics};

pub struct AlertProcessor {
    registry: Arc<ActionRegistry>,
    runner: Arc<dyn PlaybookRunner>,
}

impl AlertProcessor {
    pub fn new(registry: Arc<ActionRegistry>, runner: Arc<dyn PlaybookRunner>) -> Self {
        Self { registry, runner }
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub async fn process(&self, batch: AlertBatch, alert_type: AlertType) -> BatchResponse {
        metrics::ALERTS_RECEIVED_TOTAL.inc_by(batch.len() as u64);

        let mut responses = Vec::with_capacity(batch.len());
        for (index, raw) in batch.into_alerts().into_iter().enumerate() {
            if let Some(outcome) = self.process_alert(index, &raw).await {
                responses.push(outcome);
            }
        }

        info!(
            "Processed {} alert batch: {} outcome(s)",
            alert_type,
            responses.len()
        );
        BatchResponse::processed(alert_type, responses)
    }

    async fn process_alert(&self, index: usize, raw: &Value) -> Option<AlertOutcome> {
        let status = AlertStatus::of(raw);
        if status != AlertStatus::Firing {
            info!("Skipping {} alert", status);
            metrics::ALERTS_SKIPPED_TOTAL.inc();
            return None;
        }

        // a bad entry only costs its own outcome
        let alert = match Alert::from_raw(raw) {
            Ok(alert) => alert,
            Err(e) => {
                let name = raw_alert_name(raw);
                error!("Malformed alert #{} ({}): {}", index, name, e);
                return Some(AlertOutcome::malformed(name, e));
            }
        };

        let alert_name = alert.alert_name();
        let recovery_action = alert.recovery_action();
        info!(
            "Processing alert: {}, Recovery action: {}",
            alert_name, recovery_action
        );

        match self.registry.resolve(recovery_action) {
            Some(playbook) => {
                let extra_vars = alert.extra_vars(Utc::now());
                let result = self.runner.run(playbook, &extra_vars).await;
                Some(AlertOutcome::executed(alert_name, recovery_action, result))
            }
            None => {
                warn!("No recovery action defined for alert: {}", alert_name);
                metrics::UNRESOLVED_ACTIONS_TOTAL.inc();
                Some(AlertOutcome::no_action(alert_name))
            }
        }
    }
}

fn raw_alert_name(raw: &Value) -> &str {
    raw.pointer("/labels/alertname")
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_ALERT_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{ExecutionResult, ExtraVars, MockPlaybookRunner};
    use crate::actions::Playbook;
    use mockall::predicate::eq;
    use serde_json::json;

    fn processor_with(runner: MockPlaybookRunner) -> AlertProcessor {
        AlertProcessor::new(Arc::new(ActionRegistry::builtin()), Arc::new(runner))
    }

    fn batch(payload: Value) -> AlertBatch {
        AlertBatch::from_value(payload).unwrap()
    }

    fn firing(alertname: &str, action: Option<&str>) -> Value {
        let mut annotations = serde_json::Map::new();
        if let Some(action) = action {
            annotations.insert("recovery_action".to_string(), json!(action));
        }
        json!({
            "status": "firing",
            "labels": {
                "alertname": alertname,
                "severity": "critical",
                "service": "api",
                "instance": "host1"
            },
            "annotations": annotations
        })
    }

    #[tokio::test]
    async fn firing_alert_runs_mapped_playbook_with_its_labels() {
        let mut runner = MockPlaybookRunner::new();
        runner
            .expect_run()
            .withf(|playbook: &Playbook, vars: &ExtraVars| {
                playbook.file_name() == "restart-nginx.yml"
                    && vars["alert_name"] == "HighCPU"
                    && vars["severity"] == "critical"
                    && vars["service"] == "api"
                    && vars["instance"] == "host1"
                    && chrono::DateTime::parse_from_rfc3339(&vars["timestamp"]).is_ok()
            })
            .times(1)
            .returning(|_, _| ExecutionResult::succeeded("PLAY RECAP ok=3"));
        let processor = processor_with(runner);

        let response = processor
            .process(
                batch(json!({"alerts": [firing("HighCPU", Some("restart_nginx"))]})),
                AlertType::General,
            )
            .await;

        assert_eq!(response.status, "processed");
        assert_eq!(response.alert_type, AlertType::General);
        assert_eq!(response.responses.len(), 1);
        let outcome = &response.responses[0];
        assert_eq!(outcome.alert, "HighCPU");
        assert_eq!(outcome.action, "restart_nginx");
        assert!(outcome.success);
        assert_eq!(outcome.output.as_deref(), Some("PLAY RECAP ok=3"));
        assert!(outcome.message.is_none());
    }

    #[tokio::test]
    async fn failed_run_is_reported_not_retried() {
        let mut runner = MockPlaybookRunner::new();
        runner
            .expect_run()
            .times(1)
            .returning(|_, _| ExecutionResult::timed_out(std::time::Duration::from_secs(300)));
        let processor = processor_with(runner);

        let response = processor
            .process(
                batch(json!({"alerts": [firing("HighMemory", Some("cleanup_memory"))]})),
                AlertType::Critical,
            )
            .await;

        let outcome = &response.responses[0];
        assert_eq!(outcome.action, "cleanup_memory");
        assert!(!outcome.success);
        assert_eq!(outcome.output.as_deref(), Some("Execution timed out"));
    }

    #[tokio::test]
    async fn resolved_alerts_produce_no_outcome() {
        let mut runner = MockPlaybookRunner::new();
        runner.expect_run().never();
        let processor = processor_with(runner);

        let mut resolved = firing("HighCPU", Some("restart_nginx"));
        resolved["status"] = json!("resolved");

        let response = processor
            .process(batch(json!({"alerts": [resolved]})), AlertType::Warning)
            .await;

        assert!(response.responses.is_empty());
    }

    #[tokio::test]
    async fn missing_recovery_action_is_reported_without_running() {
        let mut runner = MockPlaybookRunner::new();
        runner.expect_run().never();
        let processor = processor_with(runner);

        let response = processor
            .process(
                batch(json!({"alerts": [firing("HighCPU", None)]})),
                AlertType::General,
            )
            .await;

        assert_eq!(response.responses.len(), 1);
        let outcome = &response.responses[0];
        assert_eq!(outcome.action, "none");
        assert!(!outcome.success);
        assert_eq!(outcome.message.as_deref(), Some("No recovery action defined"));
        assert!(outcome.output.is_none());
    }

    #[tokio::test]
    async fn unknown_action_does_not_stop_the_batch() {
        let mut runner = MockPlaybookRunner::new();
        runner
            .expect_run()
            .with(eq(Playbook::new("disk-cleanup.yml")), mockall::predicate::always())
            .times(1)
            .returning(|_, _| ExecutionResult::succeeded("cleaned"));
        let processor = processor_with(runner);

        let response = processor
            .process(
                batch(json!({"alerts": [
                    firing("DiskFull", Some("disk_cleanup")),
                    firing("Mystery", Some("unknown_action")),
                ]})),
                AlertType::General,
            )
            .await;

        assert_eq!(response.responses.len(), 2);
        assert_eq!(response.responses[0].alert, "DiskFull");
        assert_eq!(response.responses[0].action, "disk_cleanup");
        assert!(response.responses[0].success);
        assert_eq!(response.responses[1].alert, "Mystery");
        assert_eq!(response.responses[1].action, "none");
        assert!(!response.responses[1].success);
    }

    #[tokio::test]
    async fn outcomes_follow_input_order_of_firing_alerts() {
        let mut runner = MockPlaybookRunner::new();
        runner
            .expect_run()
            .times(2)
            .returning(|playbook, _| ExecutionResult::succeeded(playbook.file_name()));
        let processor = processor_with(runner);

        let mut resolved = firing("Recovered", Some("restart_nginx"));
        resolved["status"] = json!("resolved");
        let pending = json!({"status": "pending", "labels": {"alertname": "Pending"}});

        let response = processor
            .process(
                batch(json!({"alerts": [
                    firing("First", Some("optimize_system")),
                    resolved,
                    firing("Second", None),
                    pending,
                    firing("Third", Some("restart_nginx")),
                ]})),
                AlertType::Critical,
            )
            .await;

        let names: Vec<&str> = response.responses.iter().map(|o| o.alert.as_str()).collect();
        assert_eq!(names, vec!["First", "Second", "Third"]);
        assert_eq!(
            response.responses[0].output.as_deref(),
            Some("system-recovery.yml")
        );
        assert_eq!(
            response.responses[2].output.as_deref(),
            Some("restart-nginx.yml")
        );
    }

    #[tokio::test]
    async fn malformed_firing_alert_is_isolated() {
        let mut runner = MockPlaybookRunner::new();
        runner
            .expect_run()
            .times(1)
            .returning(|_, _| ExecutionResult::succeeded("ok"));
        let processor = processor_with(runner);

        let broken = json!({
            "status": "firing",
            "labels": {"alertname": "Broken"},
            "annotations": {"recovery_action": ["restart_nginx"]}
        });

        let response = processor
            .process(
                batch(json!({"alerts": [
                    broken,
                    "not an alert",
                    firing("Healthy", Some("restart_nginx")),
                ]})),
                AlertType::General,
            )
            .await;

        assert_eq!(response.responses.len(), 2);
        let bad = &response.responses[0];
        assert_eq!(bad.alert, "Broken");
        assert_eq!(bad.action, "none");
        assert!(!bad.success);
        assert!(bad.message.as_deref().unwrap().starts_with("Malformed alert"));
        assert_eq!(response.responses[1].alert, "Healthy");
        assert!(response.responses[1].success);
    }

    #[tokio::test]
    async fn numeric_labels_do_not_block_recovery() {
        let mut runner = MockPlaybookRunner::new();
        runner
            .expect_run()
            .withf(|playbook: &Playbook, vars: &ExtraVars| {
                playbook.file_name() == "restart-nginx.yml"
                    && vars["alert_name"] == "HighCPU"
                    && vars["service"] == "unknown"
            })
            .times(1)
            .returning(|_, _| ExecutionResult::succeeded("ok"));
        let processor = processor_with(runner);

        let alert = json!({
            "status": "firing",
            "labels": {"alertname": "HighCPU", "replicas": 3, "service": 8080},
            "annotations": {"recovery_action": "restart_nginx", "priority": 1}
        });

        let response = processor
            .process(batch(json!({"alerts": [alert]})), AlertType::Critical)
            .await;

        assert_eq!(response.responses.len(), 1);
        let outcome = &response.responses[0];
        assert_eq!(outcome.alert, "HighCPU");
        assert_eq!(outcome.action, "restart_nginx");
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn each_alert_gets_its_own_timestamp() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let mut runner = MockPlaybookRunner::new();
        runner.expect_run().times(2).returning(move |_, vars| {
            recorder.lock().unwrap().push(vars["timestamp"].clone());
            std::thread::sleep(std::time::Duration::from_millis(5));
            ExecutionResult::succeeded("ok")
        });
        let processor = processor_with(runner);

        processor
            .process(
                batch(json!({"alerts": [
                    firing("A", Some("restart_nginx")),
                    firing("B", Some("restart_nginx")),
                ]})),
                AlertType::General,
            )
            .await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_ne!(seen[0], seen[1]);
    }
}
