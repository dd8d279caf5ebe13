//! Queue Service - business rules in front of the queue repository
//!
//! Every public operation is a guarded transition on the repository: names,
//! resource/DLQ pairing and existence are checked before anything is written.
//! Violations surface as the precondition variants of [`AppError`]; storage
//! failures propagate unchanged.

use crate::application::constants::{DEFAULT_HEALTH_CHECK_TIMEOUT, MAX_QUEUE_NAME_LEN};
use crate::domain::{
    CreateQueueSpec, HealthReport, Message, Orid, Patch, QueueBinding, QueueDetails, QueueLength,
    QueueMeta, ResourceKind, QUEUE_SERVICE,
};
use crate::error::{AppError, Result};
use crate::port::QueueRepository;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const INVALID_NAME_MESSAGE: &str =
    "Queue name invalid. Criteria: maximum length 50 characters, alphanumeric and hyphen only.";
const PAIRING_MESSAGE: &str = "When using resource or dlq both resource and dlq must be provided";

/// Create queue request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQueueRequest {
    pub name: String,
    pub account_id: String,
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub dlq: Option<String>,
    #[serde(default)]
    pub max_size: Option<i64>,
    #[serde(default)]
    pub delay: Option<u32>,
    #[serde(default)]
    pub visibility_timeout: Option<u32>,
}

/// Update queue request; an absent field is left untouched, `null` clears it
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQueueRequest {
    pub queue_orid: Orid,
    #[serde(default)]
    pub dlq: Patch<String>,
    #[serde(default)]
    pub resource: Patch<String>,
}

/// Queue Service (the business rules layer)
pub struct QueueService {
    queue_repo: Arc<dyn QueueRepository>,
    orid_provider: String,
    health_check_timeout: Duration,
}

impl QueueService {
    pub fn new(queue_repo: Arc<dyn QueueRepository>, orid_provider: impl Into<String>) -> Self {
        Self {
            queue_repo,
            orid_provider: orid_provider.into(),
            health_check_timeout: DEFAULT_HEALTH_CHECK_TIMEOUT,
        }
    }

    pub fn with_health_check_timeout(mut self, timeout: Duration) -> Self {
        self.health_check_timeout = timeout;
        self
    }

    /// List queues, unscoped when `account_id` is `None`
    pub async fn list_queues(&self, account_id: Option<&str>) -> Result<Vec<Orid>> {
        self.queue_repo.list_queues(account_id).await
    }

    /// Create a queue and return its identifier
    pub async fn create_queue(&self, req: CreateQueueRequest) -> Result<Orid> {
        validate_queue_name(&req.name)?;

        let orid = Orid::generate(
            self.orid_provider.as_str(),
            QUEUE_SERVICE,
            req.name.as_str(),
            req.account_id.as_str(),
            None,
        )?;

        let meta = match (req.resource.as_deref(), req.dlq.as_deref()) {
            (None, None) => QueueMeta::default(),
            (Some(resource), Some(dlq)) => parse_binding(resource, dlq)?.into(),
            _ => return Err(AppError::QueueUpdateCondition(PAIRING_MESSAGE.to_string())),
        };

        // Names are unique per account, checked against the global listing
        let existing = self.queue_repo.list_queues(None).await?;
        if existing.contains(&orid) {
            return Err(AppError::QueueExists(orid));
        }

        let spec = CreateQueueSpec {
            orid: orid.clone(),
            meta,
            max_size: req.max_size,
            delay: req.delay,
            visibility_timeout: req.visibility_timeout,
        };
        self.queue_repo.create_queue(&spec).await?;

        info!(queue = %orid, "Queue created");
        Ok(orid)
    }

    /// Bind, rebind or unbind the resource and DLQ of a queue
    pub async fn update_queue(&self, req: UpdateQueueRequest) -> Result<()> {
        let (dlq, resource) = match (req.resource, req.dlq) {
            (Patch::Unset, Patch::Unset) => (Patch::Unset, Patch::Unset),
            (Patch::Clear, Patch::Clear) => (Patch::Clear, Patch::Clear),
            (Patch::Set(resource), Patch::Set(dlq)) => {
                let binding = parse_binding(&resource, &dlq)?;
                (Patch::Set(binding.dlq), Patch::Set(binding.resource))
            }
            _ => return Err(AppError::QueueUpdateCondition(PAIRING_MESSAGE.to_string())),
        };

        self.queue_repo
            .update_queue(&req.queue_orid, dlq, resource)
            .await
    }

    pub async fn delete_queue(&self, queue: &Orid) -> Result<()> {
        self.ensure_exists(queue).await?;
        self.queue_repo.remove_queue(queue).await?;

        info!(queue = %queue, "Queue removed");
        Ok(())
    }

    pub async fn get_queue_details(&self, queue: &Orid) -> Result<QueueDetails> {
        self.ensure_exists(queue).await?;
        self.queue_repo.get_queue_details(queue).await
    }

    pub async fn get_queue_length(&self, queue: &Orid) -> Result<QueueLength> {
        let details = self.get_queue_details(queue).await?;
        Ok(QueueLength {
            orid: details.orid,
            size: details.current_messages,
        })
    }

    pub async fn create_message(&self, queue: &Orid, body: &str, delay: Option<u32>) -> Result<()> {
        self.ensure_exists(queue).await?;
        self.queue_repo.create_message(queue, body, delay).await
    }

    /// `None` when no message is currently visible
    pub async fn get_message(
        &self,
        queue: &Orid,
        visibility_timeout: Option<u32>,
    ) -> Result<Option<Message>> {
        self.queue_repo.get_message(queue, visibility_timeout).await
    }

    /// Removing an unknown message is not an error, it removes 0
    pub async fn remove_message(&self, queue: &Orid, message_id: &str) -> Result<u64> {
        self.queue_repo.remove_message(queue, message_id).await
    }

    pub async fn health_checks(&self) -> Result<HealthReport> {
        self.queue_repo
            .health_checks(self.health_check_timeout)
            .await
    }

    async fn ensure_exists(&self, queue: &Orid) -> Result<()> {
        let existing = self.queue_repo.list_queues(None).await?;
        if existing.contains(queue) {
            Ok(())
        } else {
            Err(AppError::QueueNotFound(queue.to_string()))
        }
    }
}

/// Names match `^[A-Za-z0-9-]+$` and are at most 50 characters
pub fn validate_queue_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_QUEUE_NAME_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');

    if valid {
        Ok(())
    } else {
        Err(AppError::InvalidName(INVALID_NAME_MESSAGE.to_string()))
    }
}

/// Validate a resource/DLQ pair: both valid identifiers, resource invocable, DLQ a queue
fn parse_binding(resource: &str, dlq: &str) -> Result<QueueBinding> {
    let resource = Orid::parse(resource)
        .map_err(|_| AppError::QueueUpdateCondition("resource must be a valid orid".to_string()))?;
    let dlq = Orid::parse(dlq)
        .map_err(|_| AppError::QueueUpdateCondition("dlq must be a valid orid".to_string()))?;

    if !ResourceKind::of(&resource).is_supported() {
        return Err(AppError::QueueUpdateCondition(format!(
            "Resource must be one of the following types: {}",
            ResourceKind::SUPPORTED_TAGS.join(", ")
        )));
    }
    if dlq.service != QUEUE_SERVICE {
        return Err(AppError::QueueUpdateCondition(
            "DLQ must be a queue".to_string(),
        ));
    }

    Ok(QueueBinding { resource, dlq })
}
