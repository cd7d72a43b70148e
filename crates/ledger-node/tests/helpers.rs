use std::time::Duration;

use anyhow::Result;
use ledger_core::config::NodeIdentity;
use ledger_core::registry::BootstrapReport;
use ledger_core::Block;
use ledger_node::{app, AppState, HttpTransport};
use ledger_storage::SledStore;
use serde_json::Value;
use tokio::net::TcpListener;

/// A node served on an ephemeral port, backed by a temporary sled database.
pub struct TestNode {
  pub url: String,
  pub state: AppState,
  pub client: reqwest::Client,
  pub bootstrap: BootstrapReport,
}

pub async fn spawn_node(neighbour: Option<&str>) -> Result<TestNode> {
  let listener = TcpListener::bind("127.0.0.1:0").await?;
  let url = format!("http://{}", listener.local_addr()?);

  let transport = HttpTransport::new(Duration::from_secs(5))?;
  let state = AppState::new(SledStore::temporary()?, NodeIdentity::generate(url.clone()), transport)?;
  let bootstrap = state.registry.bootstrap(neighbour, &state.resolver).await?;

  let router = app(state.clone());
  tokio::spawn(async move { axum::serve(listener, router).await });

  Ok(TestNode {
    url,
    state,
    client: reqwest::Client::new(),
    bootstrap,
  })
}

impl TestNode {
  pub fn endpoint(&self, path: &str) -> String {
    format!("{}{}", self.url, path)
  }

  pub async fn get(&self, path: &str) -> Result<(u16, Value)> {
    let response = self.client.get(self.endpoint(path)).send().await?;
    let status = response.status().as_u16();
    Ok((status, response.json().await?))
  }

  pub async fn post(&self, path: &str, body: Value) -> Result<(u16, Value)> {
    let response = self.client.post(self.endpoint(path)).json(&body).send().await?;
    let status = response.status().as_u16();
    Ok((status, response.json().await?))
  }

  pub async fn chain(&self) -> Result<Vec<Block>> {
    let response = self.client.get(self.endpoint("/chain")).send().await?;
    Ok(response.error_for_status()?.json().await?)
  }

  pub async fn node_urls(&self) -> Result<Vec<String>> {
    let (_, nodes) = self.get("/nodes").await?;
    Ok(
      nodes
        .as_array()
        .map(|list| {
          list
            .iter()
            .filter_map(|n| n["url"].as_str().map(str::to_string))
            .collect()
        })
        .unwrap_or_default(),
    )
  }

  pub async fn mine(&self, times: usize) -> Result<()> {
    for _ in 0..times {
      let (status, _) = self.post("/mine", Value::Null).await?;
      anyhow::ensure!(status == 200, "mine answered {status}");
    }
    Ok(())
  }
}
