mod common;

use common::RecordingQueue;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;
use vps_billing::adapters::provisioner::SimulatedProvisioner;
use vps_billing::domain::error::PipelineError;
use vps_billing::domain::provider::{ProvisionRequest, Provisioner};
use vps_billing::domain::task::{QueueName, TaskKind};
use vps_billing::services::scheduler::run_scheduler;

// ── 1. scheduler_fires_scans_on_interval ───────────────────────────────────

#[tokio::test(start_paused = true)]
async fn scheduler_fires_scans_on_interval() {
    let queue = Arc::new(RecordingQueue::default());
    let (tx, rx) = watch::channel(false);

    let handle = tokio::spawn(run_scheduler(
        queue.clone(),
        Duration::from_secs(60),
        Duration::from_secs(300),
        rx,
    ));

    // Nothing fires at start.
    tokio::time::sleep(Duration::from_secs(59)).await;
    assert!(queue.submitted().is_empty());

    tokio::time::sleep(Duration::from_secs(242)).await;
    let submitted = queue.submitted();
    let expires = submitted.iter().filter(|t| t.kind == TaskKind::ExpireService).count();
    let renewals = submitted.iter().filter(|t| t.kind == TaskKind::RenewalReminder).count();
    assert_eq!(expires, 5);
    assert_eq!(renewals, 1);
    for task in &submitted {
        assert_eq!(task.queue, QueueName::Default);
        assert_eq!(task.payload, serde_json::json!({}));
    }

    tx.send(true).unwrap();
    handle.await.unwrap();
}

// ── 2. simulated_provisioner ───────────────────────────────────────────────

fn request() -> ProvisionRequest {
    ProvisionRequest {
        service_id: Uuid::now_v7(),
        plan_id: Uuid::now_v7(),
        user_id: Uuid::now_v7(),
    }
}

#[tokio::test(start_paused = true)]
async fn simulated_provisioner_derives_stable_machine() {
    let provisioner = SimulatedProvisioner::new(Duration::from_secs(1));
    let request = request();
    let (_tx, rx) = watch::channel(false);

    let machine = provisioner.provision(&request, rx).await.unwrap();
    assert_eq!(machine, SimulatedProvisioner::machine_for(request.service_id));
    assert!(machine.hostname.starts_with("vps-"));
    assert!(machine.hostname.ends_with(".example.com"));

    let octets: Vec<u32> = machine
        .ip_address
        .split('.')
        .map(|o| o.parse().unwrap())
        .collect();
    assert_eq!(octets[..2], [192, 168]);
    assert!((1..=254).contains(&octets[2]));
    assert!((1..=254).contains(&octets[3]));
}

#[tokio::test(start_paused = true)]
async fn simulated_provisioner_stops_on_cancel() {
    let provisioner = SimulatedProvisioner::new(Duration::from_secs(10));
    let request = request();
    let (tx, rx) = watch::channel(false);

    let cancel = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        tx.send(true).unwrap();
    });

    let err = provisioner.provision(&request, rx).await.unwrap_err();
    match err {
        PipelineError::Provider(message) => assert!(message.contains("create"), "{message}"),
        other => panic!("unexpected error: {other:?}"),
    }
    cancel.await.unwrap();
}
