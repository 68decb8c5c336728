use conduit_graphql_client::GraphQLResponse;
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::debug;

use super::gate::Worker;
use super::{AsyncOperation, Controller, Delivery, Gate, OperationKind, OperationState};
use crate::graphql::{self, GraphQLRequest, ResponseShape};
use crate::registry::ClientDetails;
use crate::subscription::{StreamMessage, SubscriptionEndpoint};
use crate::{ApiError, ApiEvent, Listener};

/// A GraphQL query, mutation or subscription in flight.
pub struct GraphQLOperation<R> {
    request: GraphQLRequest<R>,
    api: Arc<ClientDetails>,
    controller: Controller,
    subscription_id: Option<Arc<parking_lot::Mutex<Option<String>>>>,
}

impl<R> GraphQLOperation<R>
where
    R: DeserializeOwned + Send + 'static,
{
    /// A query or mutation answered by one HTTP response.
    pub(crate) fn single_response(
        api: Arc<ClientDetails>,
        request: GraphQLRequest<R>,
        listener: Listener<GraphQLResponse<R>>,
        runtime: Handle,
    ) -> Self {
        let gate = Arc::new(Gate::new(OperationKind::SingleResponse));
        let worker = single_response_worker(gate.clone(), api.clone(), request.clone(), listener);

        Self {
            request,
            api,
            controller: Controller::new(gate, worker, runtime),
            subscription_id: None,
        }
    }

    /// A subscription registered on the API's endpoint.
    pub(crate) fn stream(
        api: Arc<ClientDetails>,
        request: GraphQLRequest<R>,
        listener: Listener<GraphQLResponse<R>>,
        runtime: Handle,
    ) -> Self {
        let gate = Arc::new(Gate::new(OperationKind::Stream));
        let slot = Arc::new(parking_lot::Mutex::new(None::<String>));

        gate.on_cancel({
            let slot = slot.clone();
            let endpoint = api.subscription_endpoint().clone();
            let runtime = runtime.clone();
            move || {
                if let Some(id) = slot.lock().take() {
                    runtime.spawn(async move {
                        endpoint.unregister(&id).await;
                    });
                }
            }
        });

        let worker = stream_worker(gate.clone(), slot.clone(), api.clone(), request.clone(), listener);

        Self {
            request,
            api,
            controller: Controller::new(gate, worker, runtime),
            subscription_id: Some(slot),
        }
    }
}

impl<R> GraphQLOperation<R> {
    pub fn request(&self) -> &GraphQLRequest<R> {
        &self.request
    }

    /// Name of the API the operation was routed to.
    pub fn api_name(&self) -> &str {
        &self.api.configuration().name
    }

    /// Id of the registered subscription, while it is registered.
    pub fn subscription_id(&self) -> Option<String> {
        self.subscription_id.as_ref().and_then(|slot| slot.lock().clone())
    }
}

impl<R> AsyncOperation for GraphQLOperation<R> {
    fn start(&self) -> bool {
        self.controller.start()
    }

    fn pause(&self) -> bool {
        self.controller.pause()
    }

    fn resume(&self) -> bool {
        self.controller.resume()
    }

    fn cancel(&self) -> bool {
        self.controller.cancel()
    }

    fn state(&self) -> OperationState {
        self.controller.state()
    }
}

fn single_response_worker<R>(
    gate: Arc<Gate>,
    api: Arc<ClientDetails>,
    request: GraphQLRequest<R>,
    listener: Listener<GraphQLResponse<R>>,
) -> Worker
where
    R: DeserializeOwned + Send + 'static,
{
    Box::pin(async move {
        if !gate.enter_running().await {
            return;
        }

        let endpoint = &api.configuration().endpoint;
        debug!(api = %api.configuration().name, endpoint = %endpoint, "Sending GraphQL request");
        let result =
            graphql::execute::<R>(api.client(), endpoint, request.document(), request.shape()).await;

        let (terminal, event) = match result {
            Ok(response) => (OperationState::Completed, ApiEvent::Response(response)),
            Err(e) => (OperationState::Failed, ApiEvent::Failed(e)),
        };
        gate.finish(terminal, || listener.notify(event));
    })
}

/// A queued stream event, with the state it moves the operation to.
struct Pending<T> {
    terminal: Option<OperationState>,
    event: ApiEvent<T>,
}

impl<T> Pending<T> {
    fn item(event: ApiEvent<T>) -> Self {
        Self {
            terminal: None,
            event,
        }
    }

    fn terminal(state: OperationState, event: ApiEvent<T>) -> Self {
        Self {
            terminal: Some(state),
            event,
        }
    }
}

fn convert<R: DeserializeOwned>(message: StreamMessage) -> Pending<GraphQLResponse<R>> {
    match message {
        StreamMessage::Next(payload) => match graphql::decode_response(payload, ResponseShape::Stream) {
            Ok(response) => Pending::item(ApiEvent::Item(response)),
            Err(e) => Pending::terminal(OperationState::Failed, ApiEvent::Failed(e)),
        },
        StreamMessage::Error(errors) => {
            Pending::terminal(OperationState::Failed, ApiEvent::Failed(ApiError::GraphQL(errors)))
        }
        StreamMessage::Complete => Pending::terminal(OperationState::Completed, ApiEvent::Completed),
        StreamMessage::ConnectionLost(e) => Pending::terminal(OperationState::Failed, ApiEvent::Failed(e)),
    }
}

/// Deliver queued events in order. Returns `false` once the gate is closed.
fn flush<T>(gate: &Gate, listener: &Listener<T>, pending: &mut VecDeque<Pending<T>>) -> bool {
    while let Some(terminal) = pending.front().map(|next| next.terminal) {
        let notify = || {
            if let Some(next) = pending.pop_front() {
                listener.notify(next.event);
            }
        };
        let delivery = match terminal {
            Some(state) => gate.finish(state, notify),
            None => gate.deliver(notify),
        };
        match delivery {
            Delivery::Delivered => {}
            Delivery::Deferred => return true,
            Delivery::Closed => return false,
        }
    }
    true
}

fn stream_worker<R>(
    gate: Arc<Gate>,
    slot: Arc<parking_lot::Mutex<Option<String>>>,
    api: Arc<ClientDetails>,
    request: GraphQLRequest<R>,
    listener: Listener<GraphQLResponse<R>>,
) -> Worker
where
    R: DeserializeOwned + Send + 'static,
{
    Box::pin(async move {
        if !gate.enter_running().await {
            return;
        }

        let endpoint: &SubscriptionEndpoint = api.subscription_endpoint();
        let (sink, mut inbound) = mpsc::unbounded_channel();
        let mut pending = VecDeque::new();
        let mut open = true;

        match endpoint.register(request.document().clone(), sink).await {
            Ok(id) => {
                *slot.lock() = Some(id.clone());
                if gate.state().is_terminal() {
                    // cancelled during the handshake
                    let id = slot.lock().take();
                    if let Some(id) = id {
                        endpoint.unregister(&id).await;
                    }
                    return;
                }
                pending.push_back(Pending::item(ApiEvent::Established { subscription_id: id }));
            }
            Err(e) => {
                open = false;
                pending.push_back(Pending::terminal(OperationState::Failed, ApiEvent::Failed(e)));
            }
        }

        let mut states = gate.subscribe();
        loop {
            if !flush(&gate, &listener, &mut pending) || gate.state().is_terminal() {
                break;
            }
            if !open && pending.is_empty() {
                break;
            }

            tokio::select! {
                changed = states.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                message = inbound.recv(), if open => match message {
                    Some(message) => pending.push_back(convert::<R>(message)),
                    None => open = false,
                },
            }
        }

        let id = slot.lock().take();
        if let Some(id) = id {
            endpoint.unregister(&id).await;
        }
    })
}
