//! Device runtime - runs the send and receive loops of one device

use super::behavior::{SendBehavior, TelemetrySource};
use super::state::{RuntimeEvent, RuntimeStateMachine, TransitionResult};
use super::DeviceError;
use crate::hub::{HubError, HubTransport};
use crate::method::{DispatchTable, HandlerContext};
use bytes::Bytes;
use greenhouse_shared::DeviceIdentity;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Everything that makes a concrete device: who it is, how it sends and
/// which methods it answers
pub struct DeviceProfile {
    pub identity: DeviceIdentity,
    pub behavior: SendBehavior,
    pub dispatch: DispatchTable,
}

/// A device that has not been started yet
pub struct DeviceRuntime {
    identity: DeviceIdentity,
    behavior: SendBehavior,
    dispatch: Arc<DispatchTable>,
    hub: Arc<dyn HubTransport>,
    shutdown: CancellationToken,
    poll_interval: Duration,
    state: Arc<RwLock<RuntimeStateMachine>>,
}

impl DeviceRuntime {
    /// Create a runtime observing the shared `shutdown` token
    pub fn new(
        profile: DeviceProfile,
        hub: Arc<dyn HubTransport>,
        shutdown: CancellationToken,
        poll_interval: Duration,
    ) -> Self {
        Self {
            identity: profile.identity,
            behavior: profile.behavior,
            dispatch: Arc::new(profile.dispatch),
            hub,
            shutdown,
            poll_interval,
            state: Arc::new(RwLock::new(RuntimeStateMachine::new())),
        }
    }

    /// Spawn the send and receive loops
    pub async fn start(self) -> DeviceHandle {
        transition(&self.state, self.identity.id(), RuntimeEvent::Started).await;
        info!(
            device = %self.identity.id(),
            kind = %self.identity.kind(),
            methods = ?self.dispatch.method_names(),
            "starting"
        );

        let send_task = tokio::spawn(run_send_loop(
            self.identity.clone(),
            self.hub.clone(),
            self.behavior,
            self.shutdown.clone(),
            self.poll_interval,
            self.state.clone(),
        ));

        let receive_task = tokio::spawn(run_receive_loop(
            self.identity.clone(),
            self.hub.clone(),
            self.dispatch,
            self.shutdown,
            self.poll_interval,
            self.state.clone(),
        ));

        DeviceHandle {
            identity: self.identity,
            hub: self.hub,
            state: self.state,
            send_task,
            receive_task,
        }
    }
}

/// A started device; join it after shutdown has been signalled
pub struct DeviceHandle {
    identity: DeviceIdentity,
    hub: Arc<dyn HubTransport>,
    state: Arc<RwLock<RuntimeStateMachine>>,
    send_task: JoinHandle<Result<(), HubError>>,
    receive_task: JoinHandle<()>,
}

impl DeviceHandle {
    pub fn id(&self) -> &str {
        self.identity.id()
    }

    /// Wait for both loops, close the hub link and mark the runtime stopped.
    ///
    /// A send path failure is returned here.
    pub async fn join(self) -> Result<(), DeviceError> {
        let send_result = self.send_task.await;
        let receive_result = self.receive_task.await;

        if let Err(e) = self.hub.disconnect().await {
            warn!(device = %self.identity.id(), error = %e, "hub disconnect failed");
        }
        transition(&self.state, self.identity.id(), RuntimeEvent::LoopsJoined).await;
        info!(device = %self.identity.id(), "shutdown");

        receive_result?;
        send_result??;
        Ok(())
    }
}

async fn transition(state: &RwLock<RuntimeStateMachine>, device_id: &str, event: RuntimeEvent) {
    let mut machine = state.write().await;
    let from = machine.state();
    match machine.process_event(event) {
        TransitionResult::Success(to) => debug!(device = %device_id, %from, %to, "runtime state"),
        TransitionResult::Unchanged(_) => {}
        TransitionResult::Invalid { from, event } => {
            warn!(device = %device_id, %from, ?event, "ignored invalid runtime transition");
        }
    }
}

/// Send loop: periodic telemetry or idle wait, until shutdown
async fn run_send_loop(
    identity: DeviceIdentity,
    hub: Arc<dyn HubTransport>,
    behavior: SendBehavior,
    shutdown: CancellationToken,
    poll_interval: Duration,
    state: Arc<RwLock<RuntimeStateMachine>>,
) -> Result<(), HubError> {
    match behavior {
        SendBehavior::Idle => shutdown.cancelled().await,
        SendBehavior::Periodic(mut source) => {
            let interval = identity.send_interval();
            let mut last_send: Option<Instant> = None;

            while !shutdown.is_cancelled() {
                if last_send.map_or(true, |at| at.elapsed() >= interval) {
                    if let Err(e) = send_data(&identity, hub.as_ref(), source.as_mut()).await {
                        error!(device = %identity.id(), error = %e, "failed to send telemetry");
                        return Err(e);
                    }
                    last_send = Some(Instant::now());
                }

                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = sleep(poll_interval) => {}
                }
            }
        }
    }

    transition(&state, identity.id(), RuntimeEvent::ShutdownObserved).await;
    Ok(())
}

/// Produce one reading and push it to the hub
async fn send_data(
    identity: &DeviceIdentity,
    hub: &dyn HubTransport,
    source: &mut dyn TelemetrySource,
) -> Result<(), HubError> {
    let message = source.next_message();
    let body = message.to_bytes()?;
    hub.send_telemetry(identity.id(), Bytes::from(body)).await?;
    debug!(device = %identity.id(), info_group = %message.info_group, "telemetry sent");
    Ok(())
}

/// Receive loop: poll for method requests and answer them, until shutdown
async fn run_receive_loop(
    identity: DeviceIdentity,
    hub: Arc<dyn HubTransport>,
    dispatch: Arc<DispatchTable>,
    shutdown: CancellationToken,
    poll_interval: Duration,
    state: Arc<RwLock<RuntimeStateMachine>>,
) {
    let ctx = HandlerContext::for_identity(&identity);

    loop {
        let polled = tokio::select! {
            _ = shutdown.cancelled() => break,
            polled = hub.poll_method_request(poll_interval) => polled,
        };

        match polled {
            Ok(Some(request)) => {
                debug!(
                    device = %identity.id(),
                    method = %request.method_name,
                    request_id = %request.request_id,
                    "method request received"
                );
                let response = dispatch.dispatch(&ctx, &request);
                if let Err(e) = hub.send_method_response(response).await {
                    error!(
                        device = %identity.id(),
                        request_id = %request.request_id,
                        error = %e,
                        "failed to send method response"
                    );
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(device = %identity.id(), error = %e, "polling the hub failed");
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = sleep(poll_interval) => {}
                }
            }
        }
    }

    transition(&state, identity.id(), RuntimeEvent::ShutdownObserved).await;
}
