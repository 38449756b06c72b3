// tests/common/mod.rs
//
// Shared helpers: local HTTP stand-ins for the external APIs and
// recording test doubles for the bot's seams.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use axum::Router;
use content_bot::publish::Publisher;

/// Serve `router` on an ephemeral localhost port; returns `http://127.0.0.1:PORT`.
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    format!("http://{addr}")
}

/// Publisher that keeps every post in memory.
#[derive(Clone, Default)]
pub struct RecordingPublisher {
    pub posts: Arc<Mutex<Vec<String>>>,
    pub fail: bool,
}

impl RecordingPublisher {
    pub fn failing() -> Self {
        Self {
            posts: Arc::default(),
            fail: true,
        }
    }

    pub fn posts(&self) -> Vec<String> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, text: &str) -> Result<()> {
        self.posts.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(anyhow!("channel unavailable"));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
