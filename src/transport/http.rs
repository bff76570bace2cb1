//! # HTTP Polling Transport
//!
//! The classic CloudPRNT loop: push status, and when the server says a job
//! is ready, fetch it, render it and acknowledge it.
//!
//! ```text
//!            ┌──────────── jobReady = false ───────────┐
//!            ▼           (answer clientAction, sleep)  │
//!      ┌──────────┐                                    │
//!      │ Polling  │ ── POST status ────────────────────┘
//!      └──────────┘
//!            │ jobReady = true
//!            ▼
//!      ┌──────────┐  GET payload ─► decode ─► write
//!      │Servicing │  DELETE code=200|500|510   (always, exactly once)
//!      └──────────┘
//! ```
//!
//! This module performs single steps; the loop itself lives in
//! [`session`](crate::session).

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::client::CloudPrntClient;
use crate::cloudprnt::job::select_media_type;
use crate::cloudprnt::messages::answer_client_actions;
use crate::cloudprnt::{AckCode, Job, PendingJob, PollStatus, StatusReport};
use crate::error::CloudPrntError;
use crate::output::{self, JobSink};

/// A job the server announced as ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobNotice {
    pub token: Option<String>,
    pub media_types: Option<Vec<String>>,
}

/// Result of one status push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Idle,
    JobReady(JobNotice),
}

impl From<PollStatus> for PollOutcome {
    fn from(status: PollStatus) -> Self {
        if status.job_ready {
            Self::JobReady(JobNotice {
                token: status.job_token,
                media_types: status.media_types,
            })
        } else {
            Self::Idle
        }
    }
}

pub struct HttpPoller {
    client: Arc<CloudPrntClient>,
    poll_interval: Duration,
    rotate: bool,
    sink: Arc<dyn JobSink>,
}

impl HttpPoller {
    pub fn new(
        client: Arc<CloudPrntClient>,
        poll_interval: Duration,
        rotate: bool,
        sink: Arc<dyn JobSink>,
    ) -> Self {
        Self {
            client,
            poll_interval,
            rotate,
            sink,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Push the idle status. Client actions on an idle reply are answered
    /// in one follow-up POST before returning.
    pub async fn poll(&self) -> Result<PollOutcome, CloudPrntError> {
        let mac = self.client.identity().as_str();
        let mut status = self.client.post_status(&StatusReport::idle(mac)).await?;

        if !status.job_ready
            && let Some(requests) = status.client_action.take()
        {
            let results = answer_client_actions(&requests, self.poll_interval);
            if !results.is_empty() {
                debug!(count = results.len(), "Answering client actions");
                self.client
                    .post_report(&StatusReport::with_client_actions(mac, results))
                    .await?;
            }
        }

        Ok(PollOutcome::from(status))
    }

    /// Service one job and acknowledge it.
    ///
    /// The DELETE is sent whatever happened while fetching, decoding or
    /// writing; only a failure of the DELETE itself is returned as an error.
    pub async fn service(&self, notice: JobNotice) -> Result<AckCode, CloudPrntError> {
        info!(token = ?notice.token, media_types = ?notice.media_types, "Job ready");

        let mut job = PendingJob::new(notice.token.clone());
        let outcome = self.fetch_and_write(notice).await;
        job.settle(outcome);

        let ack = job.into_ack();
        self.client.acknowledge(&ack).await?;
        info!(code = %ack.code, "Job finished");
        Ok(ack.code)
    }

    async fn fetch_and_write(&self, notice: JobNotice) -> Result<(), CloudPrntError> {
        let media_type = select_media_type(notice.media_types.as_deref())?;
        let payload = self
            .client
            .fetch_job(media_type, notice.token.as_deref())
            .await?;

        let rendered = Job {
            token: notice.token,
            media_type: media_type.to_string(),
            payload,
        }
        .render(self.rotate)?;

        output::write_blocking(self.sink.clone(), rendered).await
    }
}
