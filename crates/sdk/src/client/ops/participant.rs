use std::future::Future;

use serde_json::json;

use hubdash_api_utils::{ApiRequest, ApiResponse, ApiSender, ApiSenderExt};

use crate::{
    client::{
        fetch::run_paged_fetch, stream::run_streaming_fetch, Client, FetchOptions, FetchOutcome,
        StreamProgress, StreamQuery,
    },
    types::{Participant, VettingStatus},
};

/// Operations for the participant screens.
pub trait ParticipantOps {
    /// Load the participant set through the paginated listing,
    /// honouring cache freshness and the single-flight guard.
    fn fetch_participants(
        &self,
        options: FetchOptions,
    ) -> impl Future<Output = crate::Result<FetchOutcome>>;

    /// Ingest the participant set through the streaming endpoint,
    /// flushing every chunk to the store and reporting progress.
    fn stream_participants(
        &self,
        query: StreamQuery,
        on_progress: impl FnMut(StreamProgress),
    ) -> impl Future<Output = crate::Result<Vec<Participant>>>;

    /// Fetch a single participant by id.
    fn get_participant(&self, id: &str) -> impl Future<Output = crate::Result<Participant>>;

    /// Approve a participant and mirror the server echo in the store.
    fn approve_participant(&self, id: &str) -> impl Future<Output = crate::Result<Participant>>;

    /// Reject a participant and mirror the server echo in the store.
    fn reject_participant(&self, id: &str) -> impl Future<Output = crate::Result<Participant>>;

    /// Delete a participant and remove it from the store.
    fn delete_participant(&self, id: &str) -> impl Future<Output = crate::Result<()>>;
}

impl<S: ApiSender> ParticipantOps for Client<S> {
    async fn fetch_participants(&self, options: FetchOptions) -> crate::Result<FetchOutcome> {
        run_paged_fetch(self.sender(), self.store(), self.fetch_config(), &options).await
    }

    async fn stream_participants(
        &self,
        query: StreamQuery,
        on_progress: impl FnMut(StreamProgress),
    ) -> crate::Result<Vec<Participant>> {
        run_streaming_fetch(self.sender(), self.store(), &query, on_progress).await
    }

    async fn get_participant(&self, id: &str) -> crate::Result<Participant> {
        let participant = self
            .sender()
            .send_api(
                ApiRequest::GetParticipant { id: id.to_string() },
                serde_json::Value::Null,
            )
            .await?;
        Ok(participant)
    }

    async fn approve_participant(&self, id: &str) -> crate::Result<Participant> {
        self.set_vetting_status(id, VettingStatus::Approved).await
    }

    async fn reject_participant(&self, id: &str) -> crate::Result<Participant> {
        self.set_vetting_status(id, VettingStatus::Rejected).await
    }

    async fn delete_participant(&self, id: &str) -> crate::Result<()> {
        let response: ApiResponse<serde_json::Value> = self
            .sender()
            .send_decoded(
                ApiRequest::DeleteParticipant { id: id.to_string() },
                serde_json::Value::Null,
            )
            .await?;
        response.ensure_success()?;
        self.store().remove_by_id(id);
        Ok(())
    }
}

impl<S: ApiSender> Client<S> {
    async fn set_vetting_status(
        &self,
        id: &str,
        status: VettingStatus,
    ) -> crate::Result<Participant> {
        tracing::debug!(id, %status, "updating vetting status");
        let updated: Participant = self
            .sender()
            .send_api(
                ApiRequest::UpdateParticipant { id: id.to_string() },
                json!({ "vetting_status": status }),
            )
            .await?;
        // Mirror the server echo instead of refetching the whole list.
        let patched = self.store().patch_by_id(id, |participant| {
            *participant = updated.clone();
        });
        if !patched {
            self.store().append_one(updated.clone());
        }
        Ok(updated)
    }
}
