//! Typed wrappers over the hub's commands.

use serde_json::Value;
use tracing::debug;

use halink_protocol::{
    CallServiceRequest, Command, EntityState, ExtractFromTargetRequest, FireEventRequest, Target,
    ValidateConfigRequest, entity_domain,
};

use crate::connection::Connection;
use crate::error::ConnectionError;

impl Connection {
    /// Calls a service; the result is whatever the hub returns (a context
    /// object, or the service response when it was requested).
    pub async fn call_service(&self, request: CallServiceRequest) -> Result<Value, ConnectionError> {
        debug!(domain = %request.domain, service = %request.service, "call_service");
        self.send_command(Command::CallService(request)).await
    }

    /// Every entity the hub knows about.
    pub async fn get_states(&self) -> Result<Vec<EntityState>, ConnectionError> {
        let value = self.send_command(Command::GetStates).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Entities whose id starts with `<domain>.`.
    pub async fn get_states_in_domain(
        &self,
        domain: &str,
    ) -> Result<Vec<EntityState>, ConnectionError> {
        let mut states = self.get_states().await?;
        states.retain(|state| state.in_domain(domain));
        Ok(states)
    }

    /// A single entity, or `None` if the hub has no such id.
    pub async fn get_state(&self, entity_id: &str) -> Result<Option<EntityState>, ConnectionError> {
        let states = self.get_states().await?;
        Ok(states.into_iter().find(|state| state.entity_id == entity_id))
    }

    pub async fn get_config(&self) -> Result<Value, ConnectionError> {
        self.send_command(Command::GetConfig).await
    }

    pub async fn get_services(&self) -> Result<Value, ConnectionError> {
        self.send_command(Command::GetServices).await
    }

    pub async fn get_panels(&self) -> Result<Value, ConnectionError> {
        self.send_command(Command::GetPanels).await
    }

    pub async fn fire_event(
        &self,
        event_type: &str,
        event_data: Option<Value>,
    ) -> Result<Value, ConnectionError> {
        self.send_command(Command::FireEvent(FireEventRequest {
            event_type: event_type.to_string(),
            event_data,
        }))
        .await
    }

    pub async fn validate_config(
        &self,
        request: ValidateConfigRequest,
    ) -> Result<Value, ConnectionError> {
        self.send_command(Command::ValidateConfig(request)).await
    }

    pub async fn extract_from_target(
        &self,
        target: Target,
        expand_group: bool,
    ) -> Result<Value, ConnectionError> {
        self.send_command(Command::ExtractFromTarget(ExtractFromTargetRequest {
            target,
            expand_group,
        }))
        .await
    }

    /// Application-level ping; resolves when the hub's `pong` arrives.
    pub async fn ping(&self) -> Result<(), ConnectionError> {
        self.send_command(Command::Ping).await?;
        Ok(())
    }

    pub async fn turn_on(&self, entity_id: &str) -> Result<Value, ConnectionError> {
        self.entity_service(entity_id, "turn_on").await
    }

    pub async fn turn_off(&self, entity_id: &str) -> Result<Value, ConnectionError> {
        self.entity_service(entity_id, "turn_off").await
    }

    pub async fn toggle(&self, entity_id: &str) -> Result<Value, ConnectionError> {
        self.entity_service(entity_id, "toggle").await
    }

    /// Calls `<domain>.<service>` targeting `entity_id`, the domain taken
    /// from the id itself.
    async fn entity_service(&self, entity_id: &str, service: &str) -> Result<Value, ConnectionError> {
        let domain = entity_domain(entity_id)
            .ok_or_else(|| ConnectionError::InvalidEntityId(entity_id.to_string()))?;
        let request = CallServiceRequest::new(domain, service).with_target(Target::entities(entity_id));
        self.call_service(request).await
    }

    /// Connects (if needed) and reads the hub configuration; returns the
    /// hub's version.
    pub async fn check(&self) -> Result<Option<String>, ConnectionError> {
        let config = self.get_config().await?;
        let version = match config.get("version").and_then(Value::as_str) {
            Some(version) => Some(version.to_string()),
            None => self.ha_version().await,
        };
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Dialer;
    use crate::transport::testing::{HubSide, TestHub};
    use crate::types::ConnectionConfig;
    use serde_json::json;
    use std::future::Future;
    use std::time::Duration;

    async fn connected() -> (Connection, TestHub, HubSide) {
        let (mut hub, dialer) = TestHub::new();
        let config = ConnectionConfig {
            read_idle_timeout: Duration::from_secs(3600),
            ping_period: Duration::from_secs(3600),
            ..ConnectionConfig::default()
        };
        let conn = Connection::build("http://hub.test:8123", "T".into(), config, Dialer::Scripted(dialer));
        let c = conn.clone();
        let connecting = tokio::spawn(async move { c.connect().await });
        let mut side = hub.accept().await;
        side.authenticate().await;
        connecting.await.unwrap().unwrap();
        (conn, hub, side)
    }

    /// Runs `op`, answers its single command with `result`, and returns the
    /// frame the hub saw alongside the operation's output.
    async fn exchange<T, F>(side: &mut HubSide, op: F, result: Value) -> (Value, T)
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let task = tokio::spawn(op);
        let frame = side.recv().await;
        side.reply(&frame["id"], result);
        (frame, task.await.unwrap())
    }

    fn states() -> Value {
        json!([
            {"entity_id": "light.kitchen", "state": "on", "attributes": {"friendly_name": "Kitchen"}},
            {"entity_id": "light.hall", "state": "off", "attributes": {}},
            {"entity_id": "sensor.temp", "state": "21.5", "attributes": {"unit_of_measurement": "°C"}}
        ])
    }

    #[tokio::test(start_paused = true)]
    async fn states_filtered_by_domain() {
        let (conn, _hub, mut side) = connected().await;
        let c = conn.clone();
        let (frame, lights) =
            exchange(&mut side, async move { c.get_states_in_domain("light").await }, states()).await;

        assert_eq!(frame["type"], "get_states");
        let ids: Vec<_> = lights.unwrap().into_iter().map(|s| s.entity_id).collect();
        assert_eq!(ids, vec!["light.kitchen", "light.hall"]);
    }

    #[tokio::test(start_paused = true)]
    async fn single_state_lookup() {
        let (conn, _hub, mut side) = connected().await;

        let c = conn.clone();
        let (_, found) =
            exchange(&mut side, async move { c.get_state("sensor.temp").await }, states()).await;
        let found = found.unwrap().unwrap();
        assert_eq!(found.state, "21.5");
        assert_eq!(found.domain(), "sensor");

        let c = conn.clone();
        let (_, missing) =
            exchange(&mut side, async move { c.get_state("switch.none").await }, states()).await;
        assert!(missing.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_states_are_an_unexpected_response() {
        let (conn, _hub, mut side) = connected().await;
        let c = conn.clone();
        let (_, result) =
            exchange(&mut side, async move { c.get_states().await }, json!({"not": "a list"})).await;
        assert!(matches!(result, Err(ConnectionError::UnexpectedResponse(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_derives_domain_from_entity() {
        let (conn, _hub, mut side) = connected().await;
        let c = conn.clone();
        let (frame, result) =
            exchange(&mut side, async move { c.toggle("switch.porch").await }, json!({"context": {}})).await;

        result.unwrap();
        assert_eq!(
            frame,
            json!({
                "id": 1,
                "type": "call_service",
                "domain": "switch",
                "service": "toggle",
                "target": {"entity_id": "switch.porch"}
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn entity_without_domain_is_rejected_locally() {
        let (conn, _hub, mut side) = connected().await;
        let err = conn.turn_on("kitchen").await.unwrap_err();
        assert_eq!(err, ConnectionError::InvalidEntityId("kitchen".into()));
        assert!(side.try_recv().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn call_service_with_data_and_response() {
        let (conn, _hub, mut side) = connected().await;
        let request = CallServiceRequest::new("light", "turn_on")
            .with_data(json!({"brightness": 128}))
            .with_target(Target::entities("light.kitchen"))
            .returning_response();

        let c = conn.clone();
        let (frame, _) =
            exchange(&mut side, async move { c.call_service(request).await }, Value::Null).await;
        assert_eq!(frame["service_data"], json!({"brightness": 128}));
        assert_eq!(frame["return_response"], true);
    }

    #[tokio::test(start_paused = true)]
    async fn fire_event_and_validate_config_payloads() {
        let (conn, _hub, mut side) = connected().await;

        let c = conn.clone();
        let (frame, _) = exchange(
            &mut side,
            async move { c.fire_event("my_event", Some(json!({"a": 1}))).await },
            json!({"context": {}}),
        )
        .await;
        assert_eq!(
            frame,
            json!({"id": 1, "type": "fire_event", "event_type": "my_event", "event_data": {"a": 1}})
        );

        let c = conn.clone();
        let request = ValidateConfigRequest {
            trigger: Some(json!({"platform": "state", "entity_id": "sun.sun"})),
            ..ValidateConfigRequest::default()
        };
        let (frame, result) = exchange(
            &mut side,
            async move { c.validate_config(request).await },
            json!({"trigger": {"valid": true, "error": null}}),
        )
        .await;
        assert_eq!(frame["type"], "validate_config");
        assert!(frame.get("condition").is_none());
        assert_eq!(result.unwrap()["trigger"]["valid"], true);
    }

    #[tokio::test(start_paused = true)]
    async fn extract_from_target_sends_expand_group() {
        let (conn, _hub, mut side) = connected().await;
        let c = conn.clone();
        let target = Target {
            area_id: Some("kitchen".into()),
            ..Target::default()
        };
        let (frame, _) = exchange(
            &mut side,
            async move { c.extract_from_target(target, false).await },
            json!({"referenced_entities": []}),
        )
        .await;
        assert_eq!(
            frame,
            json!({
                "id": 1,
                "type": "extract_from_target",
                "target": {"area_id": "kitchen"},
                "expand_group": false
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn check_reports_version() {
        let (conn, _hub, mut side) = connected().await;
        let c = conn.clone();
        let (frame, version) = exchange(
            &mut side,
            async move { c.check().await },
            json!({"version": "2024.7.1", "location_name": "Home"}),
        )
        .await;
        assert_eq!(frame["type"], "get_config");
        assert_eq!(version.unwrap().as_deref(), Some("2024.7.1"));

        // Falls back to the version announced during the handshake.
        let c = conn.clone();
        let (_, version) = exchange(&mut side, async move { c.check().await }, json!({})).await;
        assert_eq!(version.unwrap().as_deref(), Some("2024.6.0"));
    }
}
