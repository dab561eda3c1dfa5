use {
    crate::domain::{
        error::PipelineError,
        provider::{ProvisionRequest, ProvisionedMachine, Provisioner},
    },
    std::{future::Future, pin::Pin, time::Duration},
    tokio::sync::watch,
    uuid::Uuid,
};

/// Stand-in compute backend: walks the create, boot and network steps with
/// fixed delays and derives a stable hostname and address from the service id.
#[derive(Debug, Clone)]
pub struct SimulatedProvisioner {
    step_delay: Duration,
}

impl SimulatedProvisioner {
    pub fn new(step_delay: Duration) -> Self {
        Self { step_delay }
    }

    pub fn machine_for(service_id: Uuid) -> ProvisionedMachine {
        let bytes = service_id.as_bytes();
        let simple = service_id.simple().to_string();
        ProvisionedMachine {
            hostname: format!("vps-{}.example.com", &simple[..8]),
            ip_address: format!(
                "192.168.{}.{}",
                bytes[14] % 254 + 1,
                bytes[15] % 254 + 1
            ),
        }
    }

    async fn run(
        &self,
        request: ProvisionRequest,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<ProvisionedMachine, PipelineError> {
        let steps = [
            ("create", self.step_delay * 2),
            ("boot", self.step_delay),
            ("network", self.step_delay),
        ];

        for (step, delay) in steps {
            if *cancel.borrow() {
                return Err(PipelineError::Provider(format!("cancelled before {step}")));
            }
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.changed() => {
                    return Err(PipelineError::Provider(format!("cancelled during {step}")));
                }
            }
            tracing::debug!(service_id = %request.service_id, step, "provisioning step done");
        }

        Ok(Self::machine_for(request.service_id))
    }
}

impl Provisioner for SimulatedProvisioner {
    fn provision(
        &self,
        request: &ProvisionRequest,
        cancel: watch::Receiver<bool>,
    ) -> Pin<Box<dyn Future<Output = Result<ProvisionedMachine, PipelineError>> + Send + '_>> {
        Box::pin(self.run(request.clone(), cancel))
    }
}
