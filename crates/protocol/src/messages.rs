use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Target;

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

/// Credential sent in reply to `auth_required`.
///
/// The handshake message carries no id; it is the only outbound frame that
/// is not correlated.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "auth")]
pub struct AuthMessage {
    pub access_token: String,
}

impl fmt::Debug for AuthMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthMessage")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Command payloads
// ---------------------------------------------------------------------------

/// Calls a service in a domain, e.g. `light.turn_on`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallServiceRequest {
    pub domain: String,
    pub service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub return_response: bool,
}

impl CallServiceRequest {
    pub fn new(domain: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            service: service.into(),
            service_data: None,
            target: None,
            return_response: false,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.service_data = Some(data);
        self
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    /// Asks the hub to include the service response in the result.
    pub fn returning_response(mut self) -> Self {
        self.return_response = true;
        self
    }
}

/// Fires an event on the hub's event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FireEventRequest {
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_data: Option<Value>,
}

/// Validates automation fragments without saving them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidateConfigRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Value>,
}

/// Resolves a target into the entities, devices and areas it covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractFromTargetRequest {
    pub target: Target,
    #[serde(default)]
    pub expand_group: bool,
}

/// Subscribes to bus events, optionally of a single type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscribeEventsRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
}

/// Subscribes to an automation trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscribeTriggerRequest {
    pub trigger: Value,
}

/// Cancels the subscription created by the command with id `subscription`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsubscribeEventsRequest {
    pub subscription: u64,
}

// ---------------------------------------------------------------------------
// Outbound commands
// ---------------------------------------------------------------------------

/// Every command a client can send after authentication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    CallService(CallServiceRequest),
    GetStates,
    GetConfig,
    GetServices,
    GetPanels,
    Ping,
    FireEvent(FireEventRequest),
    ValidateConfig(ValidateConfigRequest),
    ExtractFromTarget(ExtractFromTargetRequest),
    SubscribeEvents(SubscribeEventsRequest),
    SubscribeTrigger(SubscribeTriggerRequest),
    UnsubscribeEvents(UnsubscribeEventsRequest),
}

impl Command {
    /// The `type` tag this command is sent with.
    pub fn message_type(&self) -> &'static str {
        match self {
            Command::CallService(_) => "call_service",
            Command::GetStates => "get_states",
            Command::GetConfig => "get_config",
            Command::GetServices => "get_services",
            Command::GetPanels => "get_panels",
            Command::Ping => "ping",
            Command::FireEvent(_) => "fire_event",
            Command::ValidateConfig(_) => "validate_config",
            Command::ExtractFromTarget(_) => "extract_from_target",
            Command::SubscribeEvents(_) => "subscribe_events",
            Command::SubscribeTrigger(_) => "subscribe_trigger",
            Command::UnsubscribeEvents(_) => "unsubscribe_events",
        }
    }
}

/// A command together with the id the connection assigned to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandFrame {
    pub id: u64,
    #[serde(flatten)]
    pub command: Command,
}

// ---------------------------------------------------------------------------
// Inbound messages
// ---------------------------------------------------------------------------

/// Error details attached to a failed `result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Reply to a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub id: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

/// Event pushed for the subscription created by command `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    pub id: u64,
    pub event: Value,
}

/// Reply to `ping`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PongMessage {
    pub id: u64,
}

/// Every message the hub can send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    AuthRequired {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ha_version: Option<String>,
    },
    AuthOk {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ha_version: Option<String>,
    },
    AuthInvalid {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Result(CommandResult),
    Event(EventMessage),
    Pong(PongMessage),
}

impl ServerMessage {
    /// All `type` tags this client understands.
    pub const KNOWN_TYPES: &'static [&'static str] = &[
        "auth_required",
        "auth_ok",
        "auth_invalid",
        "result",
        "event",
        "pong",
    ];

    pub fn message_type(&self) -> &'static str {
        match self {
            ServerMessage::AuthRequired { .. } => "auth_required",
            ServerMessage::AuthOk { .. } => "auth_ok",
            ServerMessage::AuthInvalid { .. } => "auth_invalid",
            ServerMessage::Result(_) => "result",
            ServerMessage::Event(_) => "event",
            ServerMessage::Pong(_) => "pong",
        }
    }

    /// The correlation id, for messages that carry one.
    pub fn id(&self) -> Option<u64> {
        match self {
            ServerMessage::Result(r) => Some(r.id),
            ServerMessage::Event(e) => Some(e.id),
            ServerMessage::Pong(p) => Some(p.id),
            _ => None,
        }
    }
}

fn is_false(v: &bool) -> bool {
    !*v
}
