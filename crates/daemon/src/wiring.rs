//! Adapter selection from settings

use crate::settings::ServiceSettings;
use std::sync::Arc;
use tenantq_core::application::ResourceHandlers;
use tenantq_core::domain::{FUNCTION_SERVICE, STATE_MACHINE_SERVICE};
use tenantq_core::port::ResourceInvoker;
use tenantq_infra_http::{
    HttpEndpoint, HttpFunctionInvoker, HttpStateMachineInvoker, UnconfiguredInvoker,
};
use tracing::{info, warn};

/// Pick an HTTP invoker per resource type, or a stand-in that always fails
pub fn build_handlers(settings: &ServiceSettings) -> anyhow::Result<ResourceHandlers> {
    let timeout = settings.invoke_timeout();

    let serverless_function: Arc<dyn ResourceInvoker> =
        match non_empty(settings.function_service_url.as_deref()) {
            Some(url) => {
                info!(url, "Function service endpoint configured");
                let endpoint = HttpEndpoint::new(url, timeout)
                    .map_err(|e| anyhow::anyhow!("Invalid function_service_url: {}", e))?;
                Arc::new(HttpFunctionInvoker::new(endpoint))
            }
            None => {
                warn!("No function service endpoint; messages for functions will be dead-lettered");
                Arc::new(UnconfiguredInvoker::new(FUNCTION_SERVICE))
            }
        };

    let state_machine: Arc<dyn ResourceInvoker> =
        match non_empty(settings.state_machine_service_url.as_deref()) {
            Some(url) => {
                info!(url, "State machine service endpoint configured");
                let endpoint = HttpEndpoint::new(url, timeout)
                    .map_err(|e| anyhow::anyhow!("Invalid state_machine_service_url: {}", e))?;
                Arc::new(HttpStateMachineInvoker::new(endpoint))
            }
            None => {
                warn!("No state machine service endpoint; messages for state machines will be dead-lettered");
                Arc::new(UnconfiguredInvoker::new(STATE_MACHINE_SERVICE))
            }
        };

    Ok(ResourceHandlers {
        serverless_function,
        state_machine,
    })
}

/// Host name used to tag queue lock leases
pub fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

fn non_empty(url: Option<&str>) -> Option<&str> {
    url.map(str::trim).filter(|u| !u.is_empty())
}
