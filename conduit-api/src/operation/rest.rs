use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::debug;

use super::gate::Worker;
use super::{AsyncOperation, Controller, Gate, OperationKind, OperationState};
use crate::registry::ClientDetails;
use crate::rest::{RestRequest, RestResponse};
use crate::{ApiEvent, Listener};

/// A REST call in flight.
pub struct RestOperation {
    request: RestRequest,
    api: Arc<ClientDetails>,
    controller: Controller,
}

impl RestOperation {
    pub(crate) fn new(
        api: Arc<ClientDetails>,
        request: RestRequest,
        listener: Listener<RestResponse>,
        runtime: Handle,
    ) -> Self {
        let gate = Arc::new(Gate::new(OperationKind::SingleResponse));
        let worker = worker(gate.clone(), api.clone(), request.clone(), listener);
        Self {
            request,
            api,
            controller: Controller::new(gate, worker, runtime),
        }
    }

    pub fn request(&self) -> &RestRequest {
        &self.request
    }

    pub fn api_name(&self) -> &str {
        &self.api.configuration().name
    }
}

impl AsyncOperation for RestOperation {
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

fn worker(
    gate: Arc<Gate>,
    api: Arc<ClientDetails>,
    request: RestRequest,
    listener: Listener<RestResponse>,
) -> Worker {
    Box::pin(async move {
        if !gate.enter_running().await {
            return;
        }

        debug!(
            api = %api.configuration().name,
            method = %request.method(),
            path = %request.path(),
            "Sending REST request"
        );
        let result = request
            .execute(api.client(), &api.configuration().endpoint)
            .await;

        let (terminal, event) = match result {
            Ok(response) => (OperationState::Completed, ApiEvent::Response(response)),
            Err(e) => (OperationState::Failed, ApiEvent::Failed(e)),
        };
        gate.finish(terminal, || listener.notify(event));
    })
}
