use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse, WireBody};
use crate::transport::Transport;

// Replays queued results in order and records every request it receives.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_response(&self, status: u16, body: &str) {
        let response = HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        };
        self.script.lock().expect("script mutex poisoned").push_back(Ok(response));
    }

    pub(crate) fn push_error(&self, err: TransportError) {
        self.script.lock().expect("script mutex poisoned").push_back(Err(err));
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("requests mutex poisoned").clone()
    }

    pub(crate) fn body_json(request: &HttpRequest) -> serde_json::Value {
        match &request.body {
            Some(WireBody::Text(text)) => serde_json::from_str(text).expect("request body is json"),
            other => panic!("expected a JSON body, got {other:?}"),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().expect("requests mutex poisoned").push(request);
        self.script
            .lock()
            .expect("script mutex poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Other("no scripted response left".to_string())))
    }
}
