//! The reader facade: one typed method per protocol operation.
//!
//! Each operation is encoder + dispatcher round-trip + decoder; the facade
//! adds nothing to the wire behavior. Connection state is observable
//! through a watch channel, and subscriptions adapt the dispatcher's raw
//! notification fan-out into decoded [`TagReadData`] deliveries.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use cph_core::dispatcher::{DEFAULT_RESPONSE_TIMEOUT, Dispatcher, NotificationHandler};
use cph_core::error::{ReaderError, Result};
use cph_core::transport::Transport;
use cph_proto::ProtocolError;
use cph_proto::codes::{Command, LockType, MemoryBank, NotificationCode, ParamType, RelayState};
use cph_proto::commands::{DeviceInfo, TagReadData, device, misc, params as param_cmds, tags as tag_cmds};
use cph_proto::params::{AdvanceParams, ExtParams, ModbusParams, TransportParams, WorkingParams};
use cph_proto::time::CphTime;
use cph_proto::tlv::{ModemSettings, TlvMap};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Facade-level connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No channel established
    Disconnected,
    /// `connect` in progress
    Connecting,
    /// Channel up, commands accepted
    Connected,
    /// The last connect or disconnect failed
    Error,
}

/// Construction options for [`Reader`].
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Device address stamped into every command frame (0x0000 default)
    pub address: u16,
    /// Per-command response timeout
    pub response_timeout: Duration,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self { address: 0x0000, response_timeout: DEFAULT_RESPONSE_TIMEOUT }
    }
}

/// Async handler for decoded tag reads.
#[async_trait]
pub trait TagHandler: Send + Sync {
    /// Called once per uploaded tag read.
    async fn on_tag(&self, address: u16, tag: TagReadData);
}

/// Adapts the dispatcher's raw notification callback into decoded tag
/// deliveries. Decode failures are logged and the frame dropped.
struct TagAdapter {
    inner: Arc<dyn TagHandler>,
}

#[async_trait]
impl NotificationHandler for TagAdapter {
    async fn handle(&self, address: u16, code: u8, params: TlvMap) {
        match tag_cmds::tag_read_from_map(&params) {
            Ok(tag) => self.inner.on_tag(address, tag).await,
            Err(err) => {
                warn!(code, error = %err, "failed to decode tag notification");
            },
        }
    }
}

struct TagSubscription {
    handler: Arc<dyn TagHandler>,
    adapter: Arc<dyn NotificationHandler>,
}

/// High-level client for one CPH reader.
///
/// Owns the transport and dispatcher together; [`Reader::close`] tears both
/// down, cancelling every pending command. For scope-bound usage where
/// disconnect must happen even on error, see [`Reader::with_connection`].
pub struct Reader {
    transport: Arc<dyn Transport>,
    dispatcher: Dispatcher,
    address: u16,
    state_tx: watch::Sender<ConnectionState>,
    tag_subscriptions: Mutex<Vec<TagSubscription>>,
}

impl Reader {
    /// Connect through `transport` and return a ready facade.
    ///
    /// The dispatcher registers its receive sink before the channel opens,
    /// so no early bytes are lost.
    pub async fn connect(transport: Arc<dyn Transport>, options: ReaderOptions) -> Result<Self> {
        let dispatcher = Dispatcher::with_timeout(
            Arc::clone(&transport),
            options.response_timeout,
        );
        let (state_tx, _) = watch::channel(ConnectionState::Connecting);
        let reader = Self {
            transport,
            dispatcher,
            address: options.address,
            state_tx,
            tag_subscriptions: Mutex::new(Vec::new()),
        };

        match reader.transport.connect().await {
            Ok(()) => {
                debug!(address = reader.address, "reader connected");
                reader.state_tx.send_replace(ConnectionState::Connected);
                Ok(reader)
            },
            Err(err) => {
                reader.state_tx.send_replace(ConnectionState::Error);
                Err(err)
            },
        }
    }

    /// Run `body` against a connected reader, disconnecting unconditionally
    /// afterwards (even when `body` errors).
    pub async fn with_connection<F, Fut, T>(
        transport: Arc<dyn Transport>,
        options: ReaderOptions,
        body: F,
    ) -> Result<T>
    where
        F: FnOnce(Arc<Reader>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let reader = Arc::new(Self::connect(transport, options).await?);
        let result = body(Arc::clone(&reader)).await;
        let closed = reader.close().await;
        match (result, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) | (Err(err), _) => Err(err),
        }
    }

    /// Cancel pending commands and tear the channel down. Idempotent.
    pub async fn close(&self) -> Result<()> {
        self.dispatcher.cleanup();
        lock(&self.tag_subscriptions).clear();
        let result = self.transport.disconnect().await;
        let state = if result.is_ok() { ConnectionState::Disconnected } else { ConnectionState::Error };
        self.state_tx.send_replace(state);
        result
    }

    /// Current facade state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// A watch receiver that observes every state change.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Whether commands can currently be issued.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected() && self.state() == ConnectionState::Connected
    }

    // --- Device control ---

    /// Query firmware version and device type.
    pub async fn get_version(&self) -> Result<DeviceInfo> {
        let map = self.execute(Command::GetVersion, device::encode_get_version_request()).await?;
        Ok(device::decode_get_version_response(&map)?)
    }

    /// Reboot the reader.
    pub async fn reboot(&self) -> Result<()> {
        self.execute(Command::Reboot, device::encode_reboot_request()).await?;
        Ok(())
    }

    /// Restore factory-default parameters.
    pub async fn set_default_params(&self) -> Result<()> {
        self.execute(Command::SetDefaultParams, device::encode_set_default_params_request())
            .await?;
        Ok(())
    }

    /// Read the reader's real-time clock.
    pub async fn get_rtc(&self) -> Result<CphTime> {
        let map = self.execute(Command::QueryRtc, Vec::new()).await?;
        Ok(device::decode_get_rtc_response(&map)?)
    }

    /// Set the reader's real-time clock.
    pub async fn set_rtc(&self, time: &CphTime) -> Result<()> {
        let params = encoded(device::encode_set_rtc_request(time))?;
        self.execute(Command::SetRtc, params).await?;
        Ok(())
    }

    // --- Inventory ---

    /// Start continuous inventory. Tag reads arrive through registered
    /// [`TagHandler`]s; inventory behavior itself is configured through the
    /// working and advance parameter blocks.
    pub async fn start_inventory(&self) -> Result<()> {
        self.execute(Command::StartInventory, tag_cmds::encode_start_inventory_request()).await?;
        Ok(())
    }

    /// Run one inventory burst.
    pub async fn active_inventory(&self) -> Result<()> {
        self.execute(Command::ActiveInventory, tag_cmds::encode_active_inventory_request())
            .await?;
        Ok(())
    }

    /// Stop continuous inventory.
    pub async fn stop_inventory(&self) -> Result<()> {
        self.execute(Command::StopInventory, tag_cmds::encode_stop_inventory_request()).await?;
        Ok(())
    }

    // --- Single parameters ---

    /// Set RF output power in dBm (0..=30).
    pub async fn set_power(&self, power_dbm: u8) -> Result<()> {
        let params = encoded(param_cmds::encode_set_power_request(power_dbm))?;
        self.execute(Command::SetParameter, params).await?;
        Ok(())
    }

    /// Query RF output power in dBm.
    pub async fn get_power(&self) -> Result<u8> {
        let map = self.query_parameter(ParamType::Power).await?;
        Ok(param_cmds::decode_get_power_response(&map)?)
    }

    /// Turn the buzzer on or off.
    pub async fn set_buzzer(&self, enabled: bool) -> Result<()> {
        let params = encoded(param_cmds::encode_set_buzzer_request(enabled))?;
        self.execute(Command::SetParameter, params).await?;
        Ok(())
    }

    /// Query the buzzer setting.
    pub async fn get_buzzer(&self) -> Result<bool> {
        let map = self.query_parameter(ParamType::Buzzer).await?;
        Ok(param_cmds::decode_get_buzzer_response(&map)?)
    }

    /// Set the duplicate-tag filter window in seconds.
    pub async fn set_filter_time(&self, seconds: u8) -> Result<()> {
        let params = encoded(param_cmds::encode_set_filter_time_request(seconds))?;
        self.execute(Command::SetParameter, params).await?;
        Ok(())
    }

    /// Query the duplicate-tag filter window in seconds.
    pub async fn get_filter_time(&self) -> Result<u8> {
        let map = self.query_parameter(ParamType::TagFilterTime).await?;
        Ok(param_cmds::decode_get_filter_time_response(&map)?)
    }

    /// Set modem tuning values.
    pub async fn set_modem(&self, settings: &ModemSettings) -> Result<()> {
        let params = encoded(param_cmds::encode_set_modem_request(settings))?;
        self.execute(Command::SetParameter, params).await?;
        Ok(())
    }

    /// Query modem tuning values.
    pub async fn get_modem(&self) -> Result<ModemSettings> {
        let map = self.query_parameter(ParamType::Modem).await?;
        Ok(param_cmds::decode_get_modem_response(&map)?)
    }

    // --- Tag memory ---

    /// Read `word_count` 16-bit words from a tag memory bank.
    pub async fn read_tag(
        &self,
        bank: MemoryBank,
        word_ptr: u16,
        word_count: u8,
        password: Option<&[u8; 4]>,
    ) -> Result<Vec<u8>> {
        let params =
            encoded(tag_cmds::encode_read_tag_request(bank, word_ptr, word_count, password))?;
        let map = self.execute(Command::ReadTag, params).await?;
        Ok(tag_cmds::decode_read_tag_response(bank, &map)?)
    }

    /// Write `data` (a whole number of 16-bit words) to a tag memory bank.
    pub async fn write_tag(
        &self,
        bank: MemoryBank,
        word_ptr: u16,
        data: &[u8],
        password: Option<&[u8; 4]>,
    ) -> Result<()> {
        let params = encoded(tag_cmds::encode_write_tag_request(bank, word_ptr, data, password))?;
        self.execute(Command::WriteTag, params).await?;
        Ok(())
    }

    /// Apply a lock operation to the singulated tag.
    pub async fn lock_tag(&self, lock_type: LockType, password: Option<&[u8; 4]>) -> Result<()> {
        let params = encoded(tag_cmds::encode_lock_tag_request(lock_type, password))?;
        self.execute(Command::LockTag, params).await?;
        Ok(())
    }

    /// Permanently kill the singulated tag. `kill_password` must be exactly
    /// 4 bytes.
    pub async fn kill_tag(&self, kill_password: &[u8]) -> Result<()> {
        let params = encoded(tag_cmds::encode_kill_tag_request(kill_password))?;
        self.execute(Command::LockTag, params).await?;
        Ok(())
    }

    // --- Parameter blocks ---

    /// Query extended parameters.
    pub async fn get_ext_params(&self) -> Result<ExtParams> {
        let map = self.execute(Command::QueryExtParams, Vec::new()).await?;
        Ok(param_cmds::decode_get_ext_params_response(&map)?)
    }

    /// Set extended parameters.
    pub async fn set_ext_params(&self, params: &ExtParams) -> Result<()> {
        let body = encoded(param_cmds::encode_set_ext_params_request(params))?;
        self.execute(Command::SetExtParams, body).await?;
        Ok(())
    }

    /// Query working parameters.
    pub async fn get_working_params(&self) -> Result<WorkingParams> {
        let map = self.execute(Command::QueryWorkingParams, Vec::new()).await?;
        Ok(param_cmds::decode_get_working_params_response(&map)?)
    }

    /// Set working parameters.
    pub async fn set_working_params(&self, params: &WorkingParams) -> Result<()> {
        let body = encoded(param_cmds::encode_set_working_params_request(params))?;
        self.execute(Command::SetWorkingParams, body).await?;
        Ok(())
    }

    /// Query transport parameters.
    pub async fn get_transport_params(&self) -> Result<TransportParams> {
        let map = self.execute(Command::QueryTransportParams, Vec::new()).await?;
        Ok(param_cmds::decode_get_transport_params_response(&map)?)
    }

    /// Set transport parameters.
    pub async fn set_transport_params(&self, params: &TransportParams) -> Result<()> {
        let body = encoded(param_cmds::encode_set_transport_params_request(params))?;
        self.execute(Command::SetTransportParams, body).await?;
        Ok(())
    }

    /// Query advance (RF) parameters.
    pub async fn get_advance_params(&self) -> Result<AdvanceParams> {
        let map = self.execute(Command::QueryAdvanceParams, Vec::new()).await?;
        Ok(param_cmds::decode_get_advance_params_response(&map)?)
    }

    /// Set advance (RF) parameters.
    pub async fn set_advance_params(&self, params: &AdvanceParams) -> Result<()> {
        let body = encoded(param_cmds::encode_set_advance_params_request(params))?;
        self.execute(Command::SetAdvanceParams, body).await?;
        Ok(())
    }

    /// Query Modbus parameters.
    pub async fn get_modbus_params(&self) -> Result<ModbusParams> {
        let map = self.execute(Command::QueryModbusParams, Vec::new()).await?;
        Ok(misc::decode_get_modbus_response(&map)?)
    }

    /// Set Modbus parameters.
    pub async fn set_modbus_params(&self, params: &ModbusParams) -> Result<()> {
        let body = encoded(misc::encode_set_modbus_request(params))?;
        self.execute(Command::SetModbusParams, body).await?;
        Ok(())
    }

    // --- Outputs ---

    /// Drive the relay output.
    pub async fn relay(&self, state: RelayState) -> Result<()> {
        let params = encoded(misc::encode_relay_request(state))?;
        self.execute(Command::RelayOp, params).await?;
        Ok(())
    }

    /// Play audio on the reader. The caller chooses the byte encoding the
    /// firmware expects; the payload must be non-empty.
    pub async fn play_audio(&self, audio_data: &[u8]) -> Result<()> {
        let params = encoded(misc::encode_audio_request(audio_data))?;
        self.execute(Command::AudioPlay, params).await?;
        Ok(())
    }

    // --- Subscriptions ---

    /// Register a handler for decoded tag reads (live and offline uploads).
    pub fn register_tag_handler(&self, handler: Arc<dyn TagHandler>) {
        let adapter: Arc<dyn NotificationHandler> =
            Arc::new(TagAdapter { inner: Arc::clone(&handler) });
        self.dispatcher.register_notification_handler(
            NotificationCode::TagUploaded.code(),
            Arc::clone(&adapter),
        );
        self.dispatcher.register_notification_handler(
            NotificationCode::OfflineTagUploaded.code(),
            Arc::clone(&adapter),
        );
        lock(&self.tag_subscriptions).push(TagSubscription { handler, adapter });
    }

    /// Remove a previously registered tag handler.
    pub fn unregister_tag_handler(&self, handler: &Arc<dyn TagHandler>) {
        let mut subs = lock(&self.tag_subscriptions);
        if let Some(pos) = subs.iter().position(|sub| Arc::ptr_eq(&sub.handler, handler)) {
            let sub = subs.remove(pos);
            self.dispatcher.unregister_handler_from_all(&sub.adapter);
        }
    }

    /// Register a raw handler for heartbeat notifications (0x90).
    pub fn register_heartbeat_handler(&self, handler: Arc<dyn NotificationHandler>) {
        self.dispatcher
            .register_notification_handler(NotificationCode::Heartbeat.code(), handler);
    }

    /// Remove a heartbeat handler.
    pub fn unregister_heartbeat_handler(&self, handler: &Arc<dyn NotificationHandler>) {
        self.dispatcher
            .unregister_notification_handler(NotificationCode::Heartbeat.code(), handler);
    }

    /// Register a raw handler for record-upload notifications (0x82).
    pub fn register_record_handler(&self, handler: Arc<dyn NotificationHandler>) {
        self.dispatcher
            .register_notification_handler(NotificationCode::RecordUploaded.code(), handler);
    }

    /// Remove a record-upload handler.
    pub fn unregister_record_handler(&self, handler: &Arc<dyn NotificationHandler>) {
        self.dispatcher
            .unregister_notification_handler(NotificationCode::RecordUploaded.code(), handler);
    }

    /// Register a raw handler for an arbitrary notification code.
    pub fn register_notification_handler(&self, code: u8, handler: Arc<dyn NotificationHandler>) {
        self.dispatcher.register_notification_handler(code, handler);
    }

    // --- Internals ---

    async fn execute(&self, command: Command, params: Vec<u8>) -> Result<TlvMap> {
        self.dispatcher.send_command_wait_response(command.code(), self.address, &params).await
    }

    async fn query_parameter(&self, param_type: ParamType) -> Result<TlvMap> {
        let params = encoded(param_cmds::encode_query_parameter_request(param_type))?;
        self.execute(Command::QueryParameter, params).await
    }
}

/// Map an encoder failure: argument errors pass through, anything else
/// surfaces as a command-layer failure and no frame is sent.
fn encoded(result: cph_proto::Result<Vec<u8>>) -> Result<Vec<u8>> {
    result.map_err(|err| match err {
        ProtocolError::InvalidArgument(msg) => ReaderError::InvalidArgument(msg),
        other => ReaderError::Command {
            status: 0,
            message: format!("Failed to encode request: {other}"),
        },
    })
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
