//! Management gateway backed by a JSON bridge in front of the management server.
//!
//! The bridge exposes the SDK queries the exporter needs as plain HTTP resources. Connection
//! and timeout failures are reported as disconnects so [`scom_gateway::Reconnecting`] can
//! recover them; reconnecting rebuilds the HTTP client and re-reads the management group.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::{Error, Result};

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder};
use scom_config::{Connection, Credential};
use scom_gateway::{
    Alert, Class, ClassId, Event, Group, GroupId, Instance, InstanceId, ManagementGateway,
    Monitor, MonitorId, MonitorState, PerformanceSeries, PerformanceValue, Rule, RuleId,
    TraversalDepth,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

/// Per request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const CRITERIA_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Renders a timestamp the way query criteria expect it, to the second.
#[must_use]
pub fn criteria_time(at: DateTime<Utc>) -> String {
    at.format(CRITERIA_TIME_FORMAT).to_string()
}

#[derive(Deserialize)]
struct ManagementGroupInfo {
    name: String,
}

#[derive(Serialize)]
struct ClassQuery<'a> {
    ids: &'a [ClassId],
}

#[derive(Serialize)]
struct SeriesQuery<'a> {
    rule_ids: &'a [RuleId],
}

#[derive(Serialize)]
struct MonitorStateQuery<'a> {
    instance_ids: &'a [InstanceId],
    monitor_ids: &'a [MonitorId],
}

/// [`ManagementGateway`] over HTTP.
#[derive(Debug)]
pub struct HttpGateway {
    base: Url,
    credential: Option<Credential>,
    client: RwLock<Client>,
    management_group: String,
}

impl HttpGateway {
    /// Connects to the bridge on `connection.management_server` and reads the management
    /// group name.
    ///
    /// A bare host name is reached over `http`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or the bridge cannot be reached.
    pub async fn connect(connection: &Connection) -> Result<Self> {
        let base = base_url(&connection.management_server)?;
        let client = build_client()?;
        let management_group =
            fetch_management_group(&client, &base, connection.credential.as_ref()).await?;
        info!("connected to management group {management_group} via {base}");

        Ok(Self {
            base,
            credential: connection.credential.clone(),
            client: RwLock::new(client),
            management_group,
        })
    }

    /// Bridge base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base.join(path).map_err(|source| Error::InvalidAddress {
            address: format!("{}{path}", self.base),
            source,
        })
    }

    fn get(&self, url: Url) -> RequestBuilder {
        authorize(self.client.read().get(url), self.credential.as_ref())
    }

    fn post(&self, url: Url) -> RequestBuilder {
        authorize(self.client.read().post(url), self.credential.as_ref())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        debug!("GET {url}");
        send(self.get(url)).await
    }

    async fn query_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.url(path)?;
        debug!("GET {url} {query:?}");
        send(self.get(url).query(query)).await
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.url(path)?;
        debug!("POST {url}");
        send(self.post(url).json(body)).await
    }
}

fn base_url(address: &str) -> Result<Url> {
    let invalid = |source| Error::InvalidAddress {
        address: address.to_string(),
        source,
    };
    let mut url = if address.contains("://") {
        Url::parse(address).map_err(invalid)?
    } else {
        Url::parse(&format!("http://{address}")).map_err(invalid)?
    };
    if !url.path().ends_with('/') {
        url.set_path(&format!("{}/", url.path()));
    }

    Ok(url)
}

fn build_client() -> Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(Error::Client)
}

fn authorize(request: RequestBuilder, credential: Option<&Credential>) -> RequestBuilder {
    match credential {
        Some(credential) => request.basic_auth(&credential.user, Some(&credential.password)),
        None => request,
    }
}

async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::Status {
            url: response.url().to_string(),
            status,
        });
    }

    let url = response.url().to_string();
    response
        .json()
        .await
        .map_err(|source| Error::Decode { url, source })
}

async fn fetch_management_group(
    client: &Client,
    base: &Url,
    credential: Option<&Credential>,
) -> Result<String> {
    let url = base
        .join("management-group")
        .map_err(|source| Error::InvalidAddress {
            address: base.to_string(),
            source,
        })?;
    let info: ManagementGroupInfo = send(authorize(client.get(url), credential)).await?;

    Ok(info.name)
}

#[async_trait]
impl ManagementGateway for HttpGateway {
    type Error = Error;

    fn management_group_name(&self) -> &str {
        &self.management_group
    }

    async fn reconnect(&self) -> Result<()> {
        let client = build_client()?;
        let name = fetch_management_group(&client, &self.base, self.credential.as_ref()).await?;
        if name != self.management_group {
            info!(
                "management server now reports group {name}, keeping {}",
                self.management_group
            );
        }
        *self.client.write() = client;

        Ok(())
    }

    async fn rules(&self) -> Result<Vec<Rule>> {
        self.get_json("rules").await
    }

    async fn classes(&self, ids: &[ClassId]) -> Result<Vec<Class>> {
        self.post_json("classes/query", &ClassQuery { ids }).await
    }

    async fn root_groups(&self) -> Result<Vec<Group>> {
        self.get_json("groups/root").await
    }

    async fn instances_of_class(&self, class_id: &ClassId) -> Result<Vec<Instance>> {
        self.get_json(&format!("classes/{class_id}/instances")).await
    }

    async fn monitors(&self) -> Result<Vec<Monitor>> {
        self.get_json("monitors").await
    }

    async fn most_derived_classes(&self, group_id: &GroupId) -> Result<Vec<Class>> {
        self.get_json(&format!("groups/{group_id}/classes")).await
    }

    async fn related_instances(
        &self,
        class_id: &ClassId,
        depth: TraversalDepth,
    ) -> Result<Vec<Instance>> {
        self.query_json(
            &format!("classes/{class_id}/related"),
            &[("depth", depth.to_string())],
        )
        .await
    }

    async fn performance_series(&self, rule_ids: &[RuleId]) -> Result<Vec<PerformanceSeries>> {
        self.post_json("performance/series/query", &SeriesQuery { rule_ids })
            .await
    }

    async fn performance_values(
        &self,
        series: &PerformanceSeries,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PerformanceValue>> {
        self.query_json(
            &format!("performance/series/{}/values", series.id),
            &[("start", start.to_rfc3339()), ("end", end.to_rfc3339())],
        )
        .await
    }

    async fn monitor_states(
        &self,
        instances: &[InstanceId],
        monitors: &[MonitorId],
    ) -> Result<Vec<MonitorState>> {
        self.post_json(
            "monitors/states/query",
            &MonitorStateQuery {
                instance_ids: instances,
                monitor_ids: monitors,
            },
        )
        .await
    }

    async fn alerts_since(&self, since: DateTime<Utc>) -> Result<Vec<Alert>> {
        let criteria = format!("TimeRaised >= '{}'", criteria_time(since));
        self.query_json("alerts", &[("criteria", criteria)]).await
    }

    async fn events_since(&self, since: DateTime<Utc>) -> Result<Vec<Event>> {
        let criteria = format!("TimeGenerated >= '{}'", criteria_time(since));
        self.query_json("events", &[("criteria", criteria)]).await
    }
}
