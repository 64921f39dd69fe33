// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Typed client for the NetBox REST API.
///
/// Fetches device, virtual machine, and site collections with server-side
/// filtering and converts raw payloads into normalized [`InventoryItem`]
/// records at ingestion time.
use reqwest::{
    Client,
    header::{AUTHORIZATION, HeaderMap, HeaderValue}
};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::debug;

use crate::{
    error::Error,
    model::{InventoryItem, ItemKind}
};

const DEVICES_PATH: &str = "/api/dcim/devices/";
const VIRTUAL_MACHINES_PATH: &str = "/api/virtualization/virtual-machines/";
const SITES_PATH: &str = "/api/dcim/sites/";

/// Server-side filter predicates combined by logical AND.
///
/// Each entry becomes one query parameter; repeating a field name matches any
/// of the supplied values, which is how NetBox expresses list predicates such
/// as `site_id=1&site_id=2`.
///
/// # Examples
///
/// ```
/// use netbox_prom_sd::Filter;
///
/// let filter = Filter::default()
///     .fields("site_id", ["1".to_owned(), "2".to_owned()])
///     .field("status", "active");
/// assert_eq!(filter.query().len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Filter {
    params: Vec<(String, String)>
}

impl Filter {
    /// Adds a single field predicate.
    pub fn field<V>(mut self, name: &str, value: V) -> Self
    where
        V: Into<String>
    {
        self.params.push((name.to_owned(), value.into()));
        self
    }

    /// Adds one predicate per value; the server matches any of them.
    pub fn fields<I, V>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>
    {
        for value in values {
            self.params.push((name.to_owned(), value.into()));
        }
        self
    }

    /// Adds a tag predicate, the common entry point of the scrape policy.
    pub fn tag<V>(self, value: V) -> Self
    where
        V: Into<String>
    {
        self.field("tag", value)
    }

    /// Returns the accumulated query pairs.
    pub fn query(&self) -> &[(String, String)] {
        &self.params
    }
}

/// Paginated response envelope returned by every NetBox list endpoint.
#[derive(Debug, Deserialize)]
struct Page<T> {
    next:    Option<String>,
    results: Vec<T>
}

/// Reference to a related object exposing a slug.
#[derive(Debug, Deserialize)]
struct SlugRef {
    slug: String
}

/// Reference to a related object exposing only a name (racks, clusters).
#[derive(Debug, Deserialize)]
struct NamedRef {
    name: String
}

/// Primary address assignment in CIDR notation.
#[derive(Debug, Deserialize)]
struct IpRef {
    address: String
}

/// Tag attached to a record.
#[derive(Debug, Deserialize)]
struct TagRef {
    name: String
}

/// Raw device payload from the DCIM collection.
#[derive(Debug, Deserialize)]
struct DevicePayload {
    #[serde(default)]
    name:           Option<String>,
    #[serde(default)]
    primary_ip:     Option<IpRef>,
    #[serde(default)]
    tags:           Vec<TagRef>,
    #[serde(default)]
    tenant:         Option<SlugRef>,
    #[serde(default)]
    device_role:    Option<SlugRef>,
    #[serde(default)]
    role:           Option<SlugRef>,
    #[serde(default)]
    site:           Option<SlugRef>,
    #[serde(default)]
    rack:           Option<NamedRef>,
    #[serde(default)]
    config_context: Value
}

impl From<DevicePayload> for InventoryItem {
    fn from(payload: DevicePayload) -> Self {
        Self {
            kind:           ItemKind::Device,
            name:           payload.name.unwrap_or_default(),
            primary_ip:     payload.primary_ip.map(|ip| ip.address),
            tags:           payload.tags.into_iter().map(|tag| tag.name).collect(),
            tenant:         payload.tenant.map(|tenant| tenant.slug),
            // NetBox renamed device_role to role in 3.x; accept both.
            role:           payload.device_role.or(payload.role).map(|role| role.slug),
            site:           payload.site.map(|site| site.slug),
            rack:           payload.rack.map(|rack| rack.name),
            cluster:        None,
            config_context: payload.config_context
        }
    }
}

/// Raw virtual machine payload from the virtualization collection.
#[derive(Debug, Deserialize)]
struct VirtualMachinePayload {
    #[serde(default)]
    name:           Option<String>,
    #[serde(default)]
    primary_ip:     Option<IpRef>,
    #[serde(default)]
    tags:           Vec<TagRef>,
    #[serde(default)]
    tenant:         Option<SlugRef>,
    #[serde(default)]
    role:           Option<SlugRef>,
    #[serde(default)]
    site:           Option<SlugRef>,
    #[serde(default)]
    cluster:        Option<NamedRef>,
    #[serde(default)]
    config_context: Value
}

impl From<VirtualMachinePayload> for InventoryItem {
    fn from(payload: VirtualMachinePayload) -> Self {
        Self {
            kind:           ItemKind::VirtualMachine,
            name:           payload.name.unwrap_or_default(),
            primary_ip:     payload.primary_ip.map(|ip| ip.address),
            tags:           payload.tags.into_iter().map(|tag| tag.name).collect(),
            tenant:         payload.tenant.map(|tenant| tenant.slug),
            role:           payload.role.map(|role| role.slug),
            site:           payload.site.map(|site| site.slug),
            rack:           None,
            cluster:        payload.cluster.map(|cluster| cluster.name),
            config_context: payload.config_context
        }
    }
}

/// Raw site payload, only needed for resolving the base filter.
#[derive(Debug, Deserialize)]
struct SitePayload {
    id: u64
}

/// Client for one NetBox instance.
///
/// Authentication uses the static token scheme (`Authorization: Token ...`)
/// and every request inherits it from the underlying HTTP client. All fetch
/// methods follow pagination until the collection is exhausted.
#[derive(Debug, Clone)]
pub struct NetBoxClient {
    http:     Client,
    base_url: String
}

impl NetBoxClient {
    /// Creates a client for the given base URL and API token.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Root URL of the NetBox instance, with or without a
    ///   trailing slash
    /// * `token` - API token used for the static token authentication scheme
    /// * `verify_tls` - Whether the TLS certificate of the instance must
    ///   validate
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when the token contains characters not permitted
    /// in an HTTP header or the HTTP client cannot be initialized.
    pub fn new(base_url: &str, token: &str, verify_tls: bool) -> Result<Self, Error> {
        let mut auth = HeaderValue::from_str(&format!("Token {token}")).map_err(|_| {
            Error::validation("API token contains characters not permitted in an HTTP header")
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(!verify_tls)
            .build()
            .map_err(|e| Error::service(format!("failed to initialize NetBox client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned()
        })
    }

    /// Fetches devices matching the filter as normalized records.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when a request fails, the server responds with a
    /// non-success status, or a payload cannot be decoded.
    pub async fn devices(&self, filter: &Filter) -> Result<Vec<InventoryItem>, Error> {
        let payloads: Vec<DevicePayload> = self.fetch_collection(DEVICES_PATH, filter).await?;
        Ok(payloads.into_iter().map(InventoryItem::from).collect())
    }

    /// Fetches virtual machines matching the filter as normalized records.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when a request fails, the server responds with a
    /// non-success status, or a payload cannot be decoded.
    pub async fn virtual_machines(&self, filter: &Filter) -> Result<Vec<InventoryItem>, Error> {
        let payloads: Vec<VirtualMachinePayload> =
            self.fetch_collection(VIRTUAL_MACHINES_PATH, filter).await?;
        Ok(payloads.into_iter().map(InventoryItem::from).collect())
    }

    /// Resolves the identifiers of all sites carrying the given tag.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when a request fails, the server responds with a
    /// non-success status, or a payload cannot be decoded.
    pub async fn site_ids(&self, tag: &str) -> Result<Vec<u64>, Error> {
        let filter = Filter::default().tag(tag);
        let payloads: Vec<SitePayload> = self.fetch_collection(SITES_PATH, &filter).await?;
        Ok(payloads.into_iter().map(|site| site.id).collect())
    }

    /// Follows pagination for one collection endpoint, accumulating results.
    async fn fetch_collection<T>(&self, path: &str, filter: &Filter) -> Result<Vec<T>, Error>
    where
        T: DeserializeOwned
    {
        let first = format!("{}{}", self.base_url, path);
        let mut results = Vec::new();
        let mut next: Option<String> = None;

        loop {
            // Follow-up pages carry the full query in the `next` URL.
            let request = match next.as_deref() {
                Some(url) => self.http.get(url),
                None => self.http.get(&first).query(filter.query())
            };

            let response = request
                .send()
                .await
                .map_err(|e| Error::service(format!("request to {path} failed: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                return Err(Error::service(format!("NetBox returned {status} for {path}")));
            }

            let page: Page<T> = response
                .json()
                .await
                .map_err(|e| Error::service(format!("invalid payload from {path}: {e}")))?;

            results.extend(page.results);
            debug!("fetched {} records so far from {}", results.len(), path);

            match page.next {
                Some(url) => next = Some(url),
                None => break
            }
        }

        Ok(results)
    }
}
