use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Every mutation the app can defer while offline. One remote handler per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    CreateRide,
    UpdateRide,
    DeleteRide,
    CreateGroup,
    UpdateGroup,
    JoinGroup,
    LeaveGroup,
    CreateChallenge,
    UpdateChallengeProgress,
    CreatePost,
    TogglePostLike,
    CreateComment,
    CreateVehicle,
    UpdateVehicle,
    DeleteVehicle,
    PromoteToAdmin,
    DemoteFromAdmin,
    RemoveMember,
    TransferOwnership,
    DeleteGroup,
    RequestToJoin,
    CancelJoinRequest,
    ApproveJoinRequest,
    RejectJoinRequest,
}

impl ActionType {
    pub const ALL: [ActionType; 24] = [
        ActionType::CreateRide,
        ActionType::UpdateRide,
        ActionType::DeleteRide,
        ActionType::CreateGroup,
        ActionType::UpdateGroup,
        ActionType::JoinGroup,
        ActionType::LeaveGroup,
        ActionType::CreateChallenge,
        ActionType::UpdateChallengeProgress,
        ActionType::CreatePost,
        ActionType::TogglePostLike,
        ActionType::CreateComment,
        ActionType::CreateVehicle,
        ActionType::UpdateVehicle,
        ActionType::DeleteVehicle,
        ActionType::PromoteToAdmin,
        ActionType::DemoteFromAdmin,
        ActionType::RemoveMember,
        ActionType::TransferOwnership,
        ActionType::DeleteGroup,
        ActionType::RequestToJoin,
        ActionType::CancelJoinRequest,
        ActionType::ApproveJoinRequest,
        ActionType::RejectJoinRequest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::CreateRide => "CREATE_RIDE",
            ActionType::UpdateRide => "UPDATE_RIDE",
            ActionType::DeleteRide => "DELETE_RIDE",
            ActionType::CreateGroup => "CREATE_GROUP",
            ActionType::UpdateGroup => "UPDATE_GROUP",
            ActionType::JoinGroup => "JOIN_GROUP",
            ActionType::LeaveGroup => "LEAVE_GROUP",
            ActionType::CreateChallenge => "CREATE_CHALLENGE",
            ActionType::UpdateChallengeProgress => "UPDATE_CHALLENGE_PROGRESS",
            ActionType::CreatePost => "CREATE_POST",
            ActionType::TogglePostLike => "TOGGLE_POST_LIKE",
            ActionType::CreateComment => "CREATE_COMMENT",
            ActionType::CreateVehicle => "CREATE_VEHICLE",
            ActionType::UpdateVehicle => "UPDATE_VEHICLE",
            ActionType::DeleteVehicle => "DELETE_VEHICLE",
            ActionType::PromoteToAdmin => "PROMOTE_TO_ADMIN",
            ActionType::DemoteFromAdmin => "DEMOTE_FROM_ADMIN",
            ActionType::RemoveMember => "REMOVE_MEMBER",
            ActionType::TransferOwnership => "TRANSFER_OWNERSHIP",
            ActionType::DeleteGroup => "DELETE_GROUP",
            ActionType::RequestToJoin => "REQUEST_TO_JOIN",
            ActionType::CancelJoinRequest => "CANCEL_JOIN_REQUEST",
            ActionType::ApproveJoinRequest => "APPROVE_JOIN_REQUEST",
            ActionType::RejectJoinRequest => "REJECT_JOIN_REQUEST",
        }
    }

    /// Creates are not idempotent server-side without a client key
    pub fn is_create(&self) -> bool {
        matches!(
            self,
            ActionType::CreateRide
                | ActionType::CreateGroup
                | ActionType::CreateChallenge
                | ActionType::CreatePost
                | ActionType::CreateComment
                | ActionType::CreateVehicle
        )
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deferred mutation. Only `retry_count` changes after enqueue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineAction {
    pub id: String,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub payload: JsonValue,
    /// Unix timestamp (milliseconds)
    pub enqueued_at: i64,
    #[serde(default)]
    pub retry_count: u32,
}

impl OfflineAction {
    pub fn new(action_type: ActionType, payload: JsonValue, enqueued_at: i64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            action_type,
            payload,
            enqueued_at,
            retry_count: 0,
        }
    }

    /// Key sent with every attempt of a create so the backend can collapse duplicates
    pub fn idempotency_key(&self) -> Option<&str> {
        self.action_type.is_create().then_some(self.id.as_str())
    }
}
