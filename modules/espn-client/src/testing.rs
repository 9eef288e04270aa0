//! Scripted transport for tests. Responses are routed by URL substring and
//! consumed in order; the last response of a route repeats once the queue is
//! down to one entry. Unrouted URLs answer 404.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use crate::transport::{HttpResponse, Transport, TransportError};

type Reply = Result<HttpResponse, TransportError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub url: String,
    pub user_agent: String,
}

#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<Vec<(String, VecDeque<Reply>)>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every URL containing `needle` with the given replies, in order.
    pub fn route(self, needle: impl Into<String>, replies: Vec<Reply>) -> Self {
        if let Ok(mut routes) = self.routes.lock() {
            routes.push((needle.into(), replies.into()));
        }
        self
    }

    pub fn route_ok(self, needle: impl Into<String>, body: impl Into<String>) -> Self {
        self.route(needle, vec![Ok(HttpResponse::ok(body))])
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn count_matching(&self, needle: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.url.contains(needle))
            .count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &str, user_agent: &str) -> Reply {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                url: url.to_string(),
                user_agent: user_agent.to_string(),
            });
        }

        let mut routes = match self.routes.lock() {
            Ok(routes) => routes,
            Err(_) => return Err(TransportError::Other("mock poisoned".into())),
        };
        let queue = routes
            .iter_mut()
            .find(|(needle, _)| url.contains(needle.as_str()))
            .map(|(_, queue)| queue);

        match queue {
            Some(queue) if queue.len() > 1 => queue
                .pop_front()
                .unwrap_or_else(|| Ok(HttpResponse::new(404, ""))),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| Ok(HttpResponse::new(404, ""))),
            None => Ok(HttpResponse::new(404, "")),
        }
    }
}

/// Search API body with a single player result.
pub fn search_body(display_name: &str, sport: &str, web: &str) -> String {
    json!({
        "results": [{
            "type": "player",
            "contents": [{
                "sport": sport,
                "displayName": display_name,
                "link": { "web": web }
            }]
        }]
    })
    .to_string()
}

/// Profile link for a fighter id on the site.
pub fn profile_link(id: u32, slug: &str) -> String {
    format!("https://www.espn.com/mma/fighter/_/id/{id}/{slug}")
}
