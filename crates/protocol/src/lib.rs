//! Wire protocol types for the Home Assistant WebSocket API.
//!
//! Outbound commands and inbound server messages are closed tagged unions
//! keyed by the JSON `type` field. The [`codec`] module turns them into text
//! frames and back.

pub mod codec;
pub mod constants;
pub mod messages;
pub mod types;

pub use codec::{ProtocolError, decode, decode_command, encode_auth, encode_command};
pub use messages::{
    AuthMessage, CallServiceRequest, Command, CommandFrame, CommandResult, ErrorDetail,
    EventMessage, ExtractFromTargetRequest, FireEventRequest, PongMessage, ServerMessage,
    SubscribeEventsRequest, SubscribeTriggerRequest, UnsubscribeEventsRequest,
    ValidateConfigRequest,
};
pub use types::{EntityState, OneOrMany, Target, entity_domain};
