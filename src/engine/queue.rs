//! Queue-fronted adapter decoupling submission from execution.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument, warn};

use crate::engine::ProfileEngine;
use crate::error::{ProfileError, Result};
use crate::model::{
    DataSource, ProfileNonFunctionalRequirements, ProfileRequest, ProfileResponse,
};

struct ProfileJob {
    datasource: DataSource,
    requests: Vec<ProfileRequest>,
    requirements: ProfileNonFunctionalRequirements,
    reply: oneshot::Sender<Result<ProfileResponse>>,
}

/// A pending profile run handed back by [`AsyncProfileEngine::submit`].
///
/// Await [`ProfileTicket::wait`] to collect the outcome; dropping the
/// ticket abandons the run without cancelling it.
pub struct ProfileTicket {
    receiver: oneshot::Receiver<Result<ProfileResponse>>,
}

impl ProfileTicket {
    /// Waits for the queued run to finish and returns its outcome.
    pub async fn wait(self) -> Result<ProfileResponse> {
        self.receiver
            .await
            .map_err(|_| ProfileError::EngineShutDown)?
    }
}

/// Adapter that serializes profile runs through a single consumer task.
///
/// Not a [`ProfileEngine`] itself: submission returns immediately with a
/// [`ProfileTicket`] while one background task drains the queue and runs
/// the inner engine's full `profile` entry point per job, so each job
/// still passes the uniqueness gate independently.
///
/// Must be constructed inside a tokio runtime.
pub struct AsyncProfileEngine {
    sender: mpsc::UnboundedSender<ProfileJob>,
    name: String,
}

impl AsyncProfileEngine {
    /// Spawns the consumer task and returns the submission handle.
    pub fn new(inner: Arc<dyn ProfileEngine>) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<ProfileJob>();
        let name = format!("async({})", inner.name());

        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                debug!(requests = job.requests.len(), "consuming queued profile job");
                let outcome = inner
                    .profile(&job.datasource, &job.requests, &job.requirements)
                    .await;
                if job.reply.send(outcome).is_err() {
                    // Ticket was dropped; the result has no recipient.
                    warn!("profile ticket dropped before completion");
                }
            }
            debug!("profile queue closed; consumer exiting");
        });

        Self { sender, name }
    }

    /// Adapter identity used for logging.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueues a profile run and returns a ticket for its result.
    ///
    /// Fails with [`ProfileError::EngineShutDown`] when the consumer task
    /// is no longer running.
    #[instrument(skip_all, fields(engine = %self.name, requests = requests.len()))]
    pub fn submit(
        &self,
        datasource: &DataSource,
        requests: &[ProfileRequest],
        requirements: &ProfileNonFunctionalRequirements,
    ) -> Result<ProfileTicket> {
        let (reply, receiver) = oneshot::channel();
        let job = ProfileJob {
            datasource: datasource.clone(),
            requests: requests.to_vec(),
            requirements: *requirements,
            reply,
        };
        self.sender
            .send(job)
            .map_err(|_| ProfileError::EngineShutDown)?;
        Ok(ProfileTicket { receiver })
    }
}
