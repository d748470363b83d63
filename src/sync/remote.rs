//! Outbound collaborator: the backend API
//!
//! One handler per [`ActionType`]. Every handler defaults to [`RemoteApi::call`],
//! so an implementation only has to provide the transport and can override
//! individual handlers where an endpoint needs special treatment.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::ActionError;
use crate::queue::{ActionType, OfflineAction};

pub type RemoteResult = Result<JsonValue, ActionError>;

#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Perform one mutation. `idempotency_key` is set for creates.
    async fn call(&self, action_type: ActionType, payload: &JsonValue, idempotency_key: Option<&str>) -> RemoteResult;

    /// Whether the backend is reachable right now
    async fn is_reachable(&self) -> bool;

    async fn create_ride(&self, payload: &JsonValue, idempotency_key: &str) -> RemoteResult {
        self.call(ActionType::CreateRide, payload, Some(idempotency_key)).await
    }

    async fn update_ride(&self, payload: &JsonValue) -> RemoteResult {
        self.call(ActionType::UpdateRide, payload, None).await
    }

    async fn delete_ride(&self, payload: &JsonValue) -> RemoteResult {
        self.call(ActionType::DeleteRide, payload, None).await
    }

    async fn create_group(&self, payload: &JsonValue, idempotency_key: &str) -> RemoteResult {
        self.call(ActionType::CreateGroup, payload, Some(idempotency_key)).await
    }

    async fn update_group(&self, payload: &JsonValue) -> RemoteResult {
        self.call(ActionType::UpdateGroup, payload, None).await
    }

    async fn join_group(&self, payload: &JsonValue) -> RemoteResult {
        self.call(ActionType::JoinGroup, payload, None).await
    }

    async fn leave_group(&self, payload: &JsonValue) -> RemoteResult {
        self.call(ActionType::LeaveGroup, payload, None).await
    }

    async fn create_challenge(&self, payload: &JsonValue, idempotency_key: &str) -> RemoteResult {
        self.call(ActionType::CreateChallenge, payload, Some(idempotency_key)).await
    }

    async fn update_challenge_progress(&self, payload: &JsonValue) -> RemoteResult {
        self.call(ActionType::UpdateChallengeProgress, payload, None).await
    }

    async fn create_post(&self, payload: &JsonValue, idempotency_key: &str) -> RemoteResult {
        self.call(ActionType::CreatePost, payload, Some(idempotency_key)).await
    }

    async fn toggle_post_like(&self, payload: &JsonValue) -> RemoteResult {
        self.call(ActionType::TogglePostLike, payload, None).await
    }

    async fn create_comment(&self, payload: &JsonValue, idempotency_key: &str) -> RemoteResult {
        self.call(ActionType::CreateComment, payload, Some(idempotency_key)).await
    }

    async fn create_vehicle(&self, payload: &JsonValue, idempotency_key: &str) -> RemoteResult {
        self.call(ActionType::CreateVehicle, payload, Some(idempotency_key)).await
    }

    async fn update_vehicle(&self, payload: &JsonValue) -> RemoteResult {
        self.call(ActionType::UpdateVehicle, payload, None).await
    }

    async fn delete_vehicle(&self, payload: &JsonValue) -> RemoteResult {
        self.call(ActionType::DeleteVehicle, payload, None).await
    }

    async fn promote_to_admin(&self, payload: &JsonValue) -> RemoteResult {
        self.call(ActionType::PromoteToAdmin, payload, None).await
    }

    async fn demote_from_admin(&self, payload: &JsonValue) -> RemoteResult {
        self.call(ActionType::DemoteFromAdmin, payload, None).await
    }

    async fn remove_member(&self, payload: &JsonValue) -> RemoteResult {
        self.call(ActionType::RemoveMember, payload, None).await
    }

    async fn transfer_ownership(&self, payload: &JsonValue) -> RemoteResult {
        self.call(ActionType::TransferOwnership, payload, None).await
    }

    async fn delete_group(&self, payload: &JsonValue) -> RemoteResult {
        self.call(ActionType::DeleteGroup, payload, None).await
    }

    async fn request_to_join(&self, payload: &JsonValue) -> RemoteResult {
        self.call(ActionType::RequestToJoin, payload, None).await
    }

    async fn cancel_join_request(&self, payload: &JsonValue) -> RemoteResult {
        self.call(ActionType::CancelJoinRequest, payload, None).await
    }

    async fn approve_join_request(&self, payload: &JsonValue) -> RemoteResult {
        self.call(ActionType::ApproveJoinRequest, payload, None).await
    }

    async fn reject_join_request(&self, payload: &JsonValue) -> RemoteResult {
        self.call(ActionType::RejectJoinRequest, payload, None).await
    }
}

/// Route an action to the handler for its type
pub async fn dispatch(api: &dyn RemoteApi, action: &OfflineAction) -> RemoteResult {
    let payload = &action.payload;
    let key = action.id.as_str();
    match action.action_type {
        ActionType::CreateRide => api.create_ride(payload, key).await,
        ActionType::UpdateRide => api.update_ride(payload).await,
        ActionType::DeleteRide => api.delete_ride(payload).await,
        ActionType::CreateGroup => api.create_group(payload, key).await,
        ActionType::UpdateGroup => api.update_group(payload).await,
        ActionType::JoinGroup => api.join_group(payload).await,
        ActionType::LeaveGroup => api.leave_group(payload).await,
        ActionType::CreateChallenge => api.create_challenge(payload, key).await,
        ActionType::UpdateChallengeProgress => api.update_challenge_progress(payload).await,
        ActionType::CreatePost => api.create_post(payload, key).await,
        ActionType::TogglePostLike => api.toggle_post_like(payload).await,
        ActionType::CreateComment => api.create_comment(payload, key).await,
        ActionType::CreateVehicle => api.create_vehicle(payload, key).await,
        ActionType::UpdateVehicle => api.update_vehicle(payload).await,
        ActionType::DeleteVehicle => api.delete_vehicle(payload).await,
        ActionType::PromoteToAdmin => api.promote_to_admin(payload).await,
        ActionType::DemoteFromAdmin => api.demote_from_admin(payload).await,
        ActionType::RemoveMember => api.remove_member(payload).await,
        ActionType::TransferOwnership => api.transfer_ownership(payload).await,
        ActionType::DeleteGroup => api.delete_group(payload).await,
        ActionType::RequestToJoin => api.request_to_join(payload).await,
        ActionType::CancelJoinRequest => api.cancel_join_request(payload).await,
        ActionType::ApproveJoinRequest => api.approve_join_request(payload).await,
        ActionType::RejectJoinRequest => api.reject_join_request(payload).await,
    }
}
