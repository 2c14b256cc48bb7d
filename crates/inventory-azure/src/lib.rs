//! Azure Resource Manager implementation of the inventory traits.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod payload;

pub use error::{Error, Result};

use async_trait::async_trait;
use fleet_inventory::{DetailProvider, IdentifierSource, InstanceDetail, InstanceId};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use payload::{VirtualMachine, VirtualMachinePage};

static DEFAULT_API_VERSION: &str = "2017-03-30";
static DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";

/// Settings for talking to one subscription.
#[derive(Clone, Debug)]
pub struct AzureConfig {
    /// Subscription holding the virtual machines.
    pub subscription_id: String,

    /// Resource group the virtual machines are listed and fetched from.
    pub resource_group: String,

    /// Bearer token for the management API.
    pub access_token: String,

    /// Management API base URL.
    pub management_endpoint: Url,

    /// Compute API version.
    pub api_version: String,
}

impl AzureConfig {
    /// Creates a config against the public Azure cloud.
    ///
    /// # Errors
    ///
    /// This function will return an error if the default endpoint fails to parse.
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            access_token: access_token.into(),
            management_endpoint: Url::parse(DEFAULT_MANAGEMENT_ENDPOINT)?,
            api_version: DEFAULT_API_VERSION.to_string(),
        })
    }
}

/// Client for the Azure compute control plane.
#[derive(Clone, Debug)]
pub struct AzureCompute {
    client: Client,
    config: AzureConfig,
}

impl AzureCompute {
    /// Creates a new client.
    #[must_use]
    pub fn new(config: AzureConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url> {
        let mut url = self.config.management_endpoint.clone();

        url.path_segments_mut()
            .map_err(|()| Error::InvalidEndpoint(self.config.management_endpoint.to_string()))?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut()
            .append_pair("api-version", &self.config.api_version);

        Ok(url)
    }

    fn list_url(&self) -> Result<Url> {
        self.endpoint([
            "subscriptions",
            self.config.subscription_id.as_str(),
            "resourceGroups",
            self.config.resource_group.as_str(),
            "providers",
            "Microsoft.Compute",
            "virtualMachines",
        ])
    }

    fn detail_url(&self, id: &InstanceId) -> Result<Url> {
        let mut url = self.endpoint([
            "subscriptions",
            self.config.subscription_id.as_str(),
            "resourceGroups",
            self.config.resource_group.as_str(),
            "providers",
            "Microsoft.Compute",
            "virtualMachines",
            id.as_str(),
        ])?;
        url.query_pairs_mut().append_pair("$expand", "instanceView");

        Ok(url)
    }

    async fn get<T>(&self, url: Url) -> Result<T>
    where
        T: DeserializeOwned,
    {
        debug!(%url, "azure request");

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.config.access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl IdentifierSource for AzureCompute {
    type Error = Error;

    async fn list_identifiers(&self) -> Result<Vec<InstanceId>> {
        let mut ids = Vec::new();
        let mut next = Some(self.list_url()?);

        while let Some(url) = next.take() {
            let page: VirtualMachinePage = self.get(url).await?;
            ids.extend(page.value.into_iter().map(|vm| InstanceId::new(vm.name)));

            next = page.next_link.as_deref().map(Url::parse).transpose()?;
        }

        Ok(ids)
    }
}

#[async_trait]
impl DetailProvider for AzureCompute {
    type Error = Error;

    async fn fetch_detail(&self, id: &InstanceId) -> Result<InstanceDetail> {
        let vm: VirtualMachine = self.get(self.detail_url(id)?).await?;

        InstanceDetail::try_from(vm)
    }
}
