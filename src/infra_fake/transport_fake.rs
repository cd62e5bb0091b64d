use crate::domain_model::*;
use crate::domain_port::*;
use parking_lot::Mutex;

type Responder = dyn Fn(&OutboundRequest) -> Result<ApiResponse, TransportError> + Send + Sync;

/// Transport answering from a closure and remembering what it was sent.
pub struct ScriptedTransport {
    responder: Box<Responder>,
    requests: Mutex<Vec<OutboundRequest>>,
}

impl ScriptedTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&OutboundRequest) -> Result<ApiResponse, TransportError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// 200 for requests bearing one of `accepted`, 401 for everything else.
    pub fn accepting(accepted: &[&str]) -> Self {
        let accepted: Vec<String> = accepted.iter().map(|t| format!("Bearer {t}")).collect();
        Self::new(move |request| {
            let authorized = request
                .header(AUTHORIZATION)
                .map(|h| accepted.iter().any(|a| a == h))
                .unwrap_or(false);
            if authorized {
                Ok(ApiResponse::json_body(200, &serde_json::json!({ "ok": true })))
            } else {
                Ok(ApiResponse::new(401, "unauthorized"))
            }
        })
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Authorization header of every dispatched request, in order.
    pub fn authorizations(&self) -> Vec<Option<String>> {
        self.requests
            .lock()
            .iter()
            .map(|r| r.header(AUTHORIZATION).map(str::to_owned))
            .collect()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<ApiResponse, TransportError> {
        self.requests.lock().push(request.clone());
        // let concurrent callers interleave like a real network would
        tokio::task::yield_now().await;
        (self.responder)(request)
    }
}
