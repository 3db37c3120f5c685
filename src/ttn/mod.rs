//! The Things Stack (TTN v3) end-device provisioning
//!
//! Registering a device touches four TTN components, in order:
//! 1. Identity server: create the end device under the application
//! 2. Network server: LoRaWAN version, frequency plan, RX windows
//! 3. Application server: bind the root AppKey
//! 4. Join server: bind server addresses and the same AppKey for OTAA
//!
//! Each step runs only after the previous one returned success. Nothing is
//! rolled back when a later step fails, so a failed registration can leave
//! a partially provisioned device on TTN that must be removed by hand.
//!
//! Reference: <https://www.thethingsindustries.com/docs/api/reference/http/>

pub mod types;

use crate::config::TtnConfig;
use crate::lorawan::keys::AppKey;
use crate::lorawan::{DevEui, ZERO_JOIN_EUI};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};
use types::{
    ApplicationIds, ApplicationServerRequest, CreateDeviceRequest, EndDeviceIds, JoinServerDevice,
    JoinServerRequest, NetworkServerRequest, AS_READ_FIELD_MASK, JS_READ_FIELD_MASK,
    NS_READ_FIELD_MASK,
};

/// Required registration input that was absent or blank
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("device name is required")]
    MissingDeviceName,
    #[error("device MAC address is required")]
    MissingDeviceMac,
    #[error("TTN application name is not configured")]
    MissingAppName,
    #[error("TTN application key is not configured")]
    MissingAppKey,
    #[error("invalid MAC address: {0}")]
    InvalidMac(String),
}

/// One of the four provisioning calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStep {
    CreateDevice,
    NetworkServer,
    ApplicationServer,
    JoinServer,
}

impl fmt::Display for RegistrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationStep::CreateDevice => write!(f, "device creation"),
            RegistrationStep::NetworkServer => write!(f, "network server registration"),
            RegistrationStep::ApplicationServer => write!(f, "application server registration"),
            RegistrationStep::JoinServer => write!(f, "join server registration"),
        }
    }
}

/// TTN sub-service queried during read-back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    NetworkServer,
    ApplicationServer,
    JoinServer,
}

impl Component {
    fn path_prefix(self) -> &'static str {
        match self {
            Component::NetworkServer => "ns",
            Component::ApplicationServer => "as",
            Component::JoinServer => "js",
        }
    }

    fn read_field_mask(self) -> &'static str {
        match self {
            Component::NetworkServer => NS_READ_FIELD_MASK,
            Component::ApplicationServer => AS_READ_FIELD_MASK,
            Component::JoinServer => JS_READ_FIELD_MASK,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::NetworkServer => write!(f, "network server"),
            Component::ApplicationServer => write!(f, "application server"),
            Component::JoinServer => write!(f, "join server"),
        }
    }
}

/// The read-back query failed after (or independently of) registration
#[derive(Debug, thiserror::Error)]
pub enum ReadBackError {
    #[error("{component} returned {status}: {body}")]
    Status {
        component: Component,
        status: StatusCode,
        body: String,
    },
    #[error("{component} returned an unreadable device: {message}")]
    Malformed { component: Component, message: String },
    #[error("{component} read timed out")]
    Timeout { component: Component },
    #[error("{component} read failed: {source}")]
    Transport {
        component: Component,
        #[source]
        source: reqwest::Error,
    },
}

impl ReadBackError {
    fn from_reqwest(component: Component, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            ReadBackError::Timeout { component }
        } else {
            ReadBackError::Transport { component, source }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{step} failed with status {status}: {body}")]
    StepFailed {
        step: RegistrationStep,
        status: StatusCode,
        body: String,
    },

    #[error("{step} timed out")]
    Timeout { step: RegistrationStep },

    #[error("{step} request failed: {source}")]
    Transport {
        step: RegistrationStep,
        #[source]
        source: reqwest::Error,
    },

    /// All four steps succeeded; the device exists on TTN
    #[error("device registered but read-back failed: {0}")]
    ReadBack(#[from] ReadBackError),
}

/// Reconciled device record returned by the read-back
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TtnDetails {
    pub dev_eui: String,
    pub app_key: AppKey,
    pub app_eui: String,
}

/// Validated registration input
#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    device_id: String,
    dev_eui: DevEui,
    app_name: String,
    app_key: AppKey,
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl RegistrationRequest {
    /// Check every required input before any network call is made.
    ///
    /// Checked in the order name, MAC, application, key; the first one
    /// missing is reported.
    pub fn validate(
        device_mac: Option<&str>,
        device_name: Option<&str>,
        app_name: Option<&str>,
        app_key: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let device_id = present(device_name).ok_or(ValidationError::MissingDeviceName)?;
        let mac = present(device_mac).ok_or(ValidationError::MissingDeviceMac)?;
        let app_name = present(app_name).ok_or(ValidationError::MissingAppName)?;
        let app_key = present(app_key).ok_or(ValidationError::MissingAppKey)?;

        let dev_eui =
            DevEui::from_mac(mac).map_err(|e| ValidationError::InvalidMac(e.to_string()))?;

        Ok(Self {
            device_id: device_id.to_string(),
            dev_eui,
            app_name: app_name.to_string(),
            app_key: AppKey::new(app_key),
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn dev_eui(&self) -> &DevEui {
        &self.dev_eui
    }

    fn ids(&self, with_application: bool) -> EndDeviceIds {
        EndDeviceIds {
            device_id: self.device_id.clone(),
            dev_eui: self.dev_eui.to_string(),
            join_eui: ZERO_JOIN_EUI.to_string(),
            application_ids: with_application.then(|| ApplicationIds {
                application_id: self.app_name.clone(),
            }),
        }
    }
}

/// Progress of a single registration
#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationState {
    Unregistered,
    DeviceCreated,
    NetworkServerBound,
    ApplicationServerBound,
    JoinServerBound,
    Registered(TtnDetails),
}

impl RegistrationState {
    /// The provisioning call that moves this state forward, if any.
    /// `JoinServerBound` advances through the read-back instead.
    pub fn next_step(&self) -> Option<RegistrationStep> {
        match self {
            RegistrationState::Unregistered => Some(RegistrationStep::CreateDevice),
            RegistrationState::DeviceCreated => Some(RegistrationStep::NetworkServer),
            RegistrationState::NetworkServerBound => Some(RegistrationStep::ApplicationServer),
            RegistrationState::ApplicationServerBound => Some(RegistrationStep::JoinServer),
            RegistrationState::JoinServerBound | RegistrationState::Registered(_) => None,
        }
    }
}

/// Anything that can put a device on the LoRaWAN network
#[async_trait]
pub trait Registrar: Send + Sync {
    async fn register(
        &self,
        device_mac: &str,
        device_name: &str,
    ) -> Result<TtnDetails, RegistrationError>;
}

/// HTTP client for the TTN v3 API, scoped to one application
pub struct TtnClient {
    config: TtnConfig,
    http: Client,
}

impl TtnClient {
    pub fn new(config: TtnConfig) -> reqwest::Result<Self> {
        let http = Client::builder().timeout(config.timeout()).build()?;

        info!(
            "TTN client configured for {} (application {})",
            config.base_url,
            config.app_name.as_deref().unwrap_or("<unset>")
        );

        Ok(Self { config, http })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v3/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn device_url(&self, component: &str, app_name: &str, device_id: &str) -> String {
        self.url(&format!(
            "{}/applications/{}/devices/{}",
            component, app_name, device_id
        ))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.config.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    /// Validate inputs against this client's application settings
    pub fn request_for(
        &self,
        device_mac: &str,
        device_name: &str,
    ) -> Result<RegistrationRequest, ValidationError> {
        RegistrationRequest::validate(
            Some(device_mac),
            Some(device_name),
            self.config.app_name.as_deref(),
            self.config.app_key.as_deref(),
        )
    }

    /// Send one provisioning call; anything but 2xx halts the registration
    async fn send_step(
        &self,
        step: RegistrationStep,
        builder: RequestBuilder,
    ) -> Result<(), RegistrationError> {
        let resp = self
            .authorized(builder)
            .send()
            .await
            .map_err(|source| {
                if source.is_timeout() {
                    RegistrationError::Timeout { step }
                } else {
                    RegistrationError::Transport { step, source }
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(%step, %status, "TTN rejected {}", step);
            return Err(RegistrationError::StepFailed { step, status, body });
        }

        info!("{} successful", step);
        Ok(())
    }

    async fn create_device(&self, req: &RegistrationRequest) -> Result<(), RegistrationError> {
        let url = self.url(&format!("applications/{}/devices", req.app_name));
        let body = CreateDeviceRequest::new(req.ids(true), &self.config.server_address);
        debug!(device_id = %req.device_id, "Device creation: {:?}", body);
        self.send_step(RegistrationStep::CreateDevice, self.http.post(url).json(&body))
            .await
    }

    async fn bind_network_server(
        &self,
        req: &RegistrationRequest,
    ) -> Result<(), RegistrationError> {
        let url = self.device_url("ns", &req.app_name, &req.device_id);
        let body = NetworkServerRequest::new(req.ids(false));
        debug!(device_id = %req.device_id, "Network server registration: {:?}", body);
        self.send_step(RegistrationStep::NetworkServer, self.http.put(url).json(&body))
            .await
    }

    async fn bind_application_server(
        &self,
        req: &RegistrationRequest,
    ) -> Result<(), RegistrationError> {
        let url = self.device_url("as", &req.app_name, &req.device_id);
        let body = ApplicationServerRequest::new(req.ids(false), req.app_key.expose());
        self.send_step(RegistrationStep::ApplicationServer, self.http.put(url).json(&body))
            .await
    }

    async fn bind_join_server(&self, req: &RegistrationRequest) -> Result<(), RegistrationError> {
        let url = self.device_url("js", &req.app_name, &req.device_id);
        let body = JoinServerRequest::new(
            req.ids(true),
            &self.config.server_address,
            req.app_key.expose(),
        );
        self.send_step(RegistrationStep::JoinServer, self.http.put(url).json(&body))
            .await
    }

    /// Perform the single transition out of `state`.
    ///
    /// `Registered` is terminal and returned unchanged without any request.
    pub async fn advance(
        &self,
        state: RegistrationState,
        req: &RegistrationRequest,
    ) -> Result<RegistrationState, RegistrationError> {
        match state {
            RegistrationState::Unregistered => {
                self.create_device(req).await?;
                Ok(RegistrationState::DeviceCreated)
            }
            RegistrationState::DeviceCreated => {
                self.bind_network_server(req).await?;
                Ok(RegistrationState::NetworkServerBound)
            }
            RegistrationState::NetworkServerBound => {
                self.bind_application_server(req).await?;
                Ok(RegistrationState::ApplicationServerBound)
            }
            RegistrationState::ApplicationServerBound => {
                self.bind_join_server(req).await?;
                Ok(RegistrationState::JoinServerBound)
            }
            RegistrationState::JoinServerBound => {
                let details = self.fetch_details(&req.device_id, &req.app_name).await?;
                Ok(RegistrationState::Registered(details))
            }
            registered @ RegistrationState::Registered(_) => Ok(registered),
        }
    }

    /// Drive a validated request from `Unregistered` to `Registered`
    pub async fn register_device(
        &self,
        req: &RegistrationRequest,
    ) -> Result<TtnDetails, RegistrationError> {
        info!(
            "Registering {} on TTN (DevEUI {})",
            req.device_id, req.dev_eui
        );

        let mut state = RegistrationState::Unregistered;
        loop {
            match self.advance(state, req).await? {
                RegistrationState::Registered(details) => {
                    info!("{} registered, DevEUI {}", req.device_id, details.dev_eui);
                    return Ok(details);
                }
                next => state = next,
            }
        }
    }

    async fn read_component(
        &self,
        component: Component,
        app_name: &str,
        device_id: &str,
    ) -> Result<String, ReadBackError> {
        let url = self.device_url(component.path_prefix(), app_name, device_id);
        let resp = self
            .authorized(self.http.get(url))
            .query(&[("field_mask", component.read_field_mask())])
            .send()
            .await
            .map_err(|source| ReadBackError::from_reqwest(component, source))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|source| ReadBackError::from_reqwest(component, source))?;
        if !status.is_success() {
            return Err(ReadBackError::Status {
                component,
                status,
                body,
            });
        }

        debug!("{} read-back: {}", component, body);
        Ok(body)
    }

    /// Query the network, application and join servers for a device and
    /// reconcile the answers.
    ///
    /// DevEUI and AppKey come from the join server; the AppEUI reported is
    /// the fixed all-zero JoinEUI used at registration.
    pub async fn fetch_details(
        &self,
        device_id: &str,
        app_name: &str,
    ) -> Result<TtnDetails, ReadBackError> {
        self.read_component(Component::NetworkServer, app_name, device_id)
            .await?;
        self.read_component(Component::ApplicationServer, app_name, device_id)
            .await?;
        let js_body = self
            .read_component(Component::JoinServer, app_name, device_id)
            .await?;

        let js: JoinServerDevice =
            serde_json::from_str(&js_body).map_err(|e| ReadBackError::Malformed {
                component: Component::JoinServer,
                message: e.to_string(),
            })?;

        Ok(TtnDetails {
            dev_eui: js.ids.dev_eui,
            app_key: AppKey::new(js.root_keys.app_key.key),
            app_eui: ZERO_JOIN_EUI.to_string(),
        })
    }

    /// Read-back for the configured application
    pub async fn details(&self, device_id: &str) -> Result<TtnDetails, RegistrationError> {
        let app_name =
            present(self.config.app_name.as_deref()).ok_or(ValidationError::MissingAppName)?;
        Ok(self.fetch_details(device_id, app_name).await?)
    }
}

#[async_trait]
impl Registrar for TtnClient {
    async fn register(
        &self,
        device_mac: &str,
        device_name: &str,
    ) -> Result<TtnDetails, RegistrationError> {
        let req = self.request_for(device_mac, device_name)?;
        self.register_device(&req).await
    }
}
