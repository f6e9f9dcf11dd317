//! Gas-warning service — fire-and-forget controls.
//!
//! Warning, fan, threshold and LED toggles are published and forgotten. The
//! caller only learns that the command left the gateway; whether the device
//! applied it shows up later, if at all, in its unsolicited pushes.

use std::sync::Arc;

use homelink_domain::command::{CommandOutcome, ControlCommand};
use homelink_domain::error::{HomeLinkError, ValidationError};
use homelink_domain::id::DeviceId;

use super::find_device;
use crate::dispatcher::CommandDispatcher;
use crate::ports::{DeviceRepository, MessagePublisher};

pub struct GasWarningService<R, P> {
    repo: R,
    dispatcher: Arc<CommandDispatcher<P>>,
}

impl<R: DeviceRepository, P: MessagePublisher> GasWarningService<R, P> {
    pub fn new(repo: R, dispatcher: Arc<CommandDispatcher<P>>) -> Self {
        Self { repo, dispatcher }
    }

    /// Publish `control` to a registered device.
    ///
    /// # Errors
    ///
    /// Returns [`HomeLinkError::NotFound`] for an unknown device,
    /// [`HomeLinkError::Validation`] for thresholds that are negative or not
    /// finite, and [`HomeLinkError::Transport`] when the publish fails.
    #[tracing::instrument(skip(self))]
    pub async fn send_control(
        &self,
        device_id: DeviceId,
        control: ControlCommand,
    ) -> Result<CommandOutcome, HomeLinkError> {
        if let ControlCommand::WarningLevel {
            gas_value,
            tem_value,
        } = control
        {
            check_threshold("gasValue", gas_value)?;
            check_threshold("temValue", tem_value)?;
        }
        find_device(&self.repo, &device_id).await?;
        self.dispatcher.send(control, device_id).await?;
        Ok(CommandOutcome::success(describe(control), None))
    }

    /// Turn the gas warning on or off.
    ///
    /// # Errors
    ///
    /// See [`send_control`](Self::send_control).
    pub async fn set_warning(
        &self,
        device_id: DeviceId,
        enabled: bool,
    ) -> Result<CommandOutcome, HomeLinkError> {
        let control = if enabled {
            ControlCommand::WarningOn
        } else {
            ControlCommand::WarningOff
        };
        self.send_control(device_id, control).await
    }

    /// Turn the ventilation fan on or off.
    ///
    /// # Errors
    ///
    /// See [`send_control`](Self::send_control).
    pub async fn set_fan(
        &self,
        device_id: DeviceId,
        enabled: bool,
    ) -> Result<CommandOutcome, HomeLinkError> {
        let control = if enabled {
            ControlCommand::FanOn
        } else {
            ControlCommand::FanOff
        };
        self.send_control(device_id, control).await
    }

    /// Change the gas and temperature alarm thresholds.
    ///
    /// # Errors
    ///
    /// See [`send_control`](Self::send_control).
    pub async fn set_warning_level(
        &self,
        device_id: DeviceId,
        gas_value: f64,
        tem_value: f64,
    ) -> Result<CommandOutcome, HomeLinkError> {
        self.send_control(
            device_id,
            ControlCommand::WarningLevel {
                gas_value,
                tem_value,
            },
        )
        .await
    }

    /// Switch a device LED.
    ///
    /// # Errors
    ///
    /// See [`send_control`](Self::send_control).
    pub async fn set_led(
        &self,
        device_id: DeviceId,
        on: bool,
    ) -> Result<CommandOutcome, HomeLinkError> {
        self.send_control(device_id, ControlCommand::Led { on }).await
    }
}

fn check_threshold(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidThreshold { field })
    }
}

fn describe(control: ControlCommand) -> &'static str {
    match control {
        ControlCommand::WarningOn => "warning enable command sent",
        ControlCommand::WarningOff => "warning disable command sent",
        ControlCommand::FanOn => "fan enable command sent",
        ControlCommand::FanOff => "fan disable command sent",
        ControlCommand::WarningLevel { .. } => "warning level command sent",
        ControlCommand::Led { on: true } => "led on command sent",
        ControlCommand::Led { on: false } => "led off command sent",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_broker::CommandBroker;
    use crate::testing::{InMemoryDeviceRepo, RecordingPublisher};
    use homelink_domain::device::{Device, DeviceState, DeviceType};
    use serde_json::json;

    fn gas_id() -> DeviceId {
        DeviceId::parse("gas-1").unwrap()
    }

    fn service(
        publisher: Arc<RecordingPublisher>,
    ) -> (
        GasWarningService<Arc<InMemoryDeviceRepo>, Arc<RecordingPublisher>>,
        CommandBroker,
    ) {
        let device = Device::builder()
            .device_id(gas_id())
            .name("Kitchen sensor")
            .device_type(DeviceType::AtmosphereSensor)
            .state(DeviceState::Inactive)
            .build()
            .unwrap();
        let broker = CommandBroker::new();
        let dispatcher = Arc::new(CommandDispatcher::new(broker.clone(), publisher));
        let repo = Arc::new(InMemoryDeviceRepo::with([device]));
        (GasWarningService::new(repo, dispatcher), broker)
    }

    #[tokio::test]
    async fn should_publish_and_return_without_waiting() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (service, broker) = service(Arc::clone(&publisher));

        let outcome = service.set_fan(gas_id(), true).await.unwrap();

        assert!(outcome.success);
        assert_eq!(broker.pending_count(), 0);
        assert_eq!(
            publisher.published(),
            vec![(
                "iot/gaswarning/onfan/gas-1".to_string(),
                json!({ "enabled": true })
            )]
        );
    }

    #[tokio::test]
    async fn should_publish_warning_level_thresholds() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (service, _) = service(Arc::clone(&publisher));

        service
            .set_warning_level(gas_id(), 300.0, 45.5)
            .await
            .unwrap();

        let (topic, payload) = publisher.published().remove(0);
        assert_eq!(topic, "iot/gaswarning/level/gas-1");
        assert_eq!(payload, json!({ "gasValue": 300.0, "temValue": 45.5 }));
    }

    #[tokio::test]
    async fn should_reject_negative_threshold() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (service, _) = service(Arc::clone(&publisher));

        let result = service.set_warning_level(gas_id(), -1.0, 20.0).await;

        assert!(matches!(
            result,
            Err(HomeLinkError::Validation(ValidationError::InvalidThreshold {
                field: "gasValue"
            }))
        ));
        assert!(publisher.published().is_empty());
    }

    #[tokio::test]
    async fn should_surface_transport_failure() {
        let (service, _) = service(Arc::new(RecordingPublisher::failing()));
        let result = service.set_warning(gas_id(), false).await;
        assert!(matches!(result, Err(HomeLinkError::Transport(_))));
    }

    #[tokio::test]
    async fn should_return_not_found_for_unknown_device() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (service, _) = service(Arc::clone(&publisher));
        let result = service
            .set_led(DeviceId::parse("ghost").unwrap(), true)
            .await;
        assert!(matches!(result, Err(HomeLinkError::NotFound(_))));
        assert!(publisher.published().is_empty());
    }

    #[tokio::test]
    async fn should_publish_led_on_device_topic() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (service, _) = service(Arc::clone(&publisher));
        service.set_led(gas_id(), false).await.unwrap();
        assert_eq!(publisher.published()[0].0, "iot/device/led/gas-1");
    }
}
