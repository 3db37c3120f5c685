//! Save-time orchestration: registration, then location sync, then storage

use super::{ChangeKind, Device, DeviceChanges, LoadedDevice, NewDevice};
use crate::geocoding::{Coordinates, Geocoder, GeocodingError, ThreeWordAddress};
use crate::storage::{DeviceStore, StoreError};
use crate::ttn::{Registrar, RegistrationError};
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("registration failed: {0}")]
    Registration(#[from] RegistrationError),

    #[error("geocoding failed: {0}")]
    Geocoding(#[from] GeocodingError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("the MAC address of {name} cannot be changed")]
    MacImmutable { name: String },

    #[error("{name} is registered on the network and cannot be renamed")]
    RegisteredName { name: String },

    #[error("{name} has neither coordinates nor a three-word address")]
    NoLocation { name: String },
}

pub struct DeviceManager {
    store: Arc<dyn DeviceStore>,
    registrar: Arc<dyn Registrar>,
    geocoder: Arc<dyn Geocoder>,
}

impl DeviceManager {
    pub fn new(
        store: Arc<dyn DeviceStore>,
        registrar: Arc<dyn Registrar>,
        geocoder: Arc<dyn Geocoder>,
    ) -> Self {
        Self {
            store,
            registrar,
            geocoder,
        }
    }

    /// Run the save workflow and return the device as stored.
    ///
    /// Works on a copy: `loaded` is untouched whatever the outcome. The
    /// device is written once, after registration and geocoding have both
    /// succeeded, so a failure leaves the stored row as it was. The one
    /// exception is a device registered during this save whose geocoding
    /// then fails: its new DevEUI is kept on the stored row (and nothing
    /// else), so the next save does not register it again.
    pub async fn save(&self, loaded: &LoadedDevice) -> Result<Device, LifecycleError> {
        let mut device = loaded.device.clone();
        let change = loaded.change();

        // Reject a bad address before anything leaves the process
        let address = match &change {
            ChangeKind::AddressChanged(raw) => Some(raw.parse::<ThreeWordAddress>()?),
            _ => None,
        };

        let mut registered = None;
        if device.network_dev_eui.is_none() {
            let details = self
                .registrar
                .register(&device.mac_address, &device.name)
                .await?;
            info!(device = %device.name, dev_eui = %details.dev_eui, "Device registered");
            device.network_dev_eui = Some(details.dev_eui.clone());
            registered = Some(details.dev_eui);
        }

        let synced = self
            .sync_location(&mut device, &change, address.as_ref())
            .await;

        let Some(id) = device.id else {
            synced?;
            let stored = self.store.insert_device(&device).await?;
            info!(device = %stored.name, id = ?stored.id, "Device created");
            return Ok(stored);
        };

        if let Err(e) = synced {
            if let Some(dev_eui) = registered {
                self.keep_registration(id, dev_eui).await?;
            }
            return Err(e);
        }
        Ok(self.store.update_device(&device).await?)
    }

    /// Record a fresh DevEUI on the stored row without the caller's changes
    async fn keep_registration(&self, id: i64, dev_eui: String) -> Result<(), LifecycleError> {
        let mut stored = self.store.device_by_id(id).await?;
        warn!(device = %stored.name, %dev_eui, "Geocoding failed; keeping registration only");
        stored.network_dev_eui = Some(dev_eui);
        self.store.update_device(&stored).await?;
        Ok(())
    }

    /// Fill in whichever location field did not change
    async fn sync_location(
        &self,
        device: &mut Device,
        change: &ChangeKind,
        address: Option<&ThreeWordAddress>,
    ) -> Result<(), LifecycleError> {
        match (change, address) {
            (ChangeKind::AddressChanged(_), Some(address)) => {
                let span = info_span!("what3words_lookup_w3w_address_change", device = %device.name);
                let coordinates = self
                    .geocoder
                    .resolve_address_to_coordinates(address)
                    .instrument(span)
                    .await?;
                device.w3w_location = Some(address.to_string());
                device.geolocation = Some(coordinates);
            }
            (ChangeKind::CoordinatesChanged(coordinates), _) => {
                let span = info_span!("what3words_lookup_coordinates_change", device = %device.name);
                let resolved = self
                    .geocoder
                    .resolve_coordinates_to_address(*coordinates)
                    .instrument(span)
                    .await?;
                device.w3w_location = Some(resolved.to_string());
            }
            _ => {}
        }
        Ok(())
    }

    /// Create a device from operator input.
    ///
    /// A taken name is rejected before the network is contacted.
    pub async fn create(&self, new: NewDevice) -> Result<Device, LifecycleError> {
        match self.store.device_by_name(&new.name).await {
            Ok(_) => return Err(StoreError::Conflict(format!("device {}", new.name)).into()),
            Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        self.save(&LoadedDevice::new(new.into())).await
    }

    /// Apply a partial update to the named device and save it
    pub async fn update(&self, name: &str, changes: DeviceChanges) -> Result<Device, LifecycleError> {
        let mut loaded = self.load(name).await?;
        let current = &loaded.device;

        if let Some(mac) = changes.mac_address.as_deref() {
            if mac != current.mac_address {
                return Err(LifecycleError::MacImmutable {
                    name: current.name.clone(),
                });
            }
        }
        if let Some(new_name) = changes.name.as_deref() {
            if new_name != current.name {
                if current.network_dev_eui.is_some() {
                    return Err(LifecycleError::RegisteredName {
                        name: current.name.clone(),
                    });
                }
                match self.store.device_by_name(new_name).await {
                    Ok(_) => {
                        return Err(StoreError::Conflict(format!("device {new_name}")).into())
                    }
                    Err(StoreError::NotFound(_)) => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        changes.apply_to(&mut loaded.device);
        self.save(&loaded).await
    }

    pub async fn load(&self, name: &str) -> Result<LoadedDevice, LifecycleError> {
        let device = self.store.device_by_name(name).await?;
        Ok(LoadedDevice::loaded(device))
    }

    pub async fn load_by_id(&self, id: i64) -> Result<LoadedDevice, LifecycleError> {
        let device = self.store.device_by_id(id).await?;
        Ok(LoadedDevice::loaded(device))
    }

    pub async fn list(&self) -> Result<Vec<Device>, LifecycleError> {
        Ok(self.store.list_devices().await?)
    }

    /// Hard delete. The network registration is left as it is.
    pub async fn delete(&self, name: &str) -> Result<(), LifecycleError> {
        let device = self.store.device_by_name(name).await?;
        if let Some(id) = device.id {
            self.store.delete_device(id).await?;
        }
        info!(device = %name, "Device deleted");
        Ok(())
    }

    /// Stored coordinates, resolving and persisting them from the address if
    /// they are missing or `(0, 0)`
    pub async fn coordinates(&self, loaded: &mut LoadedDevice) -> Result<Coordinates, LifecycleError> {
        if let Some(coordinates) = loaded.device.geolocation {
            if !coordinates.is_unset() {
                return Ok(coordinates);
            }
        }

        let name = loaded.device.name.clone();
        let address: ThreeWordAddress = loaded
            .device
            .w3w_location
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| LifecycleError::NoLocation { name: name.clone() })?
            .parse()?;

        let span = info_span!("what3words_lookup_new_geolocation", device = %name);
        let coordinates = self
            .geocoder
            .resolve_address_to_coordinates(&address)
            .instrument(span)
            .await?;

        let mut device = loaded.device.clone();
        device.geolocation = Some(coordinates);
        if device.id.is_some() {
            device = self.store.update_device(&device).await?;
        } else {
            warn!(device = %name, "Resolved coordinates for an unsaved device");
        }
        *loaded = LoadedDevice::loaded(device);
        Ok(coordinates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lorawan::keys::AppKey;
    use crate::storage::Database;
    use crate::ttn::{TtnDetails, ValidationError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const MAC: &str = "70:B3:D5:7E:D0:05:1A:2B";
    const EUI: &str = "70B3D57ED0051A2B";

    #[derive(Default)]
    struct CountingRegistrar {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingRegistrar {
        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Registrar for CountingRegistrar {
        async fn register(
            &self,
            device_mac: &str,
            _device_name: &str,
        ) -> Result<TtnDetails, RegistrationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ValidationError::MissingAppKey.into());
            }
            Ok(TtnDetails {
                dev_eui: device_mac.replace(':', ""),
                app_key: AppKey::new("00112233445566778899AABBCCDDEEFF"),
                app_eui: "0000000000000000".to_string(),
            })
        }
    }

    #[derive(Default)]
    struct CountingGeocoder {
        to_coordinates: AtomicUsize,
        to_address: AtomicUsize,
        fail: AtomicBool,
    }

    impl CountingGeocoder {
        fn failing() -> Self {
            let geocoder = Self::default();
            geocoder.set_failing(true);
            geocoder
        }

        fn set_failing(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        fn counts(&self) -> (usize, usize) {
            (
                self.to_coordinates.load(Ordering::SeqCst),
                self.to_address.load(Ordering::SeqCst),
            )
        }
    }

    #[async_trait]
    impl Geocoder for CountingGeocoder {
        async fn resolve_address_to_coordinates(
            &self,
            _address: &ThreeWordAddress,
        ) -> Result<Coordinates, GeocodingError> {
            self.to_coordinates.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(GeocodingError::Timeout);
            }
            Ok(Coordinates::new(51.520847, -0.195521))
        }

        async fn resolve_coordinates_to_address(
            &self,
            _coordinates: Coordinates,
        ) -> Result<ThreeWordAddress, GeocodingError> {
            self.to_address.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(GeocodingError::Timeout);
            }
            Ok("filled.count.soap".parse()?)
        }
    }

    struct Harness {
        manager: DeviceManager,
        db: Database,
        registrar: Arc<CountingRegistrar>,
        geocoder: Arc<CountingGeocoder>,
    }

    async fn harness_with(registrar: CountingRegistrar, geocoder: CountingGeocoder) -> Harness {
        let db = Database::open_in_memory().await.unwrap();
        let registrar = Arc::new(registrar);
        let geocoder = Arc::new(geocoder);
        let manager = DeviceManager::new(
            Arc::new(db.clone()),
            registrar.clone(),
            geocoder.clone(),
        );
        Harness {
            manager,
            db,
            registrar,
            geocoder,
        }
    }

    async fn harness() -> Harness {
        harness_with(CountingRegistrar::default(), CountingGeocoder::default()).await
    }

    fn new_device(w3w: Option<&str>, coordinates: Option<Coordinates>) -> NewDevice {
        NewDevice {
            name: "field-7".to_string(),
            mac_address: MAC.to_string(),
            w3w_location: w3w.map(str::to_string),
            geolocation: coordinates,
            is_active: false,
            deployed_at: None,
        }
    }

    #[tokio::test]
    async fn test_create_registers_once() {
        let h = harness().await;
        let device = h.manager.create(new_device(None, None)).await.unwrap();

        assert_eq!(h.registrar.calls(), 1);
        assert_eq!(device.network_dev_eui.as_deref(), Some(EUI));
        assert!(device.id.is_some());
        assert_eq!(h.geocoder.counts(), (0, 0));
    }

    #[tokio::test]
    async fn test_registered_device_is_never_registered_again() {
        let h = harness().await;
        h.manager.create(new_device(None, None)).await.unwrap();

        for _ in 0..3 {
            let loaded = h.manager.load("field-7").await.unwrap();
            h.manager.save(&loaded).await.unwrap();
        }

        assert_eq!(h.registrar.calls(), 1);
    }

    #[tokio::test]
    async fn test_registration_failure_writes_nothing() {
        let h = harness_with(CountingRegistrar::failing(), CountingGeocoder::default()).await;
        let err = h.manager.create(new_device(None, None)).await.unwrap_err();

        assert!(matches!(err, LifecycleError::Registration(_)));
        assert!(h.db.list_devices().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_address_change_resolves_coordinates() {
        let h = harness().await;
        h.manager.create(new_device(None, None)).await.unwrap();

        let changes = DeviceChanges {
            w3w_location: Some("index.home.raft".into()),
            ..Default::default()
        };
        let device = h.manager.update("field-7", changes).await.unwrap();

        assert_eq!(h.geocoder.counts(), (1, 0));
        assert_eq!(device.geolocation, Some(Coordinates::new(51.520847, -0.195521)));
        assert_eq!(device.w3w_location.as_deref(), Some("index.home.raft"));
    }

    #[tokio::test]
    async fn test_coordinates_change_resolves_address() {
        let h = harness().await;
        h.manager.create(new_device(None, None)).await.unwrap();

        let changes = DeviceChanges {
            geolocation: Some(Coordinates::new(51.5, -0.12)),
            ..Default::default()
        };
        let device = h.manager.update("field-7", changes).await.unwrap();

        assert_eq!(h.geocoder.counts(), (0, 1));
        assert_eq!(device.w3w_location.as_deref(), Some("filled.count.soap"));
        assert_eq!(device.geolocation, Some(Coordinates::new(51.5, -0.12)));
    }

    #[tokio::test]
    async fn test_unchanged_location_makes_no_calls() {
        let h = harness().await;
        h.manager
            .create(new_device(Some("index.home.raft"), None))
            .await
            .unwrap();
        assert_eq!(h.geocoder.counts(), (1, 0));

        let changes = DeviceChanges {
            is_active: Some(true),
            ..Default::default()
        };
        let device = h.manager.update("field-7", changes).await.unwrap();

        assert!(device.is_active);
        assert_eq!(h.geocoder.counts(), (1, 0));
    }

    #[tokio::test]
    async fn test_both_changed_makes_one_call() {
        let h = harness().await;
        h.manager.create(new_device(None, None)).await.unwrap();

        let changes = DeviceChanges {
            w3w_location: Some("index.home.raft".into()),
            geolocation: Some(Coordinates::new(1.0, 2.0)),
            ..Default::default()
        };
        let device = h.manager.update("field-7", changes).await.unwrap();

        assert_eq!(h.geocoder.counts(), (1, 0));
        assert_eq!(device.geolocation, Some(Coordinates::new(51.520847, -0.195521)));
    }

    #[tokio::test]
    async fn test_invalid_address_is_rejected_before_registration() {
        let h = harness().await;
        let err = h
            .manager
            .create(new_device(Some("not an address"), None))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LifecycleError::Geocoding(GeocodingError::InvalidAddress(_))
        ));
        assert_eq!(h.registrar.calls(), 0);
        assert_eq!(h.geocoder.counts(), (0, 0));
    }

    #[tokio::test]
    async fn test_geocoding_failure_on_create_leaves_no_row() {
        let h = harness_with(CountingRegistrar::default(), CountingGeocoder::failing()).await;
        let err = h
            .manager
            .create(new_device(Some("index.home.raft"), None))
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::Geocoding(GeocodingError::Timeout)));
        assert!(h.db.list_devices().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_geocoding_failure_on_update_leaves_row_unchanged() {
        let h = harness().await;
        h.manager
            .create(new_device(Some("filled.count.soap"), None))
            .await
            .unwrap();
        let before = h.db.device_by_name("field-7").await.unwrap();

        h.geocoder.set_failing(true);
        let changes = DeviceChanges {
            w3w_location: Some("filled.bucket.tree".into()),
            is_active: Some(true),
            ..Default::default()
        };
        let err = h.manager.update("field-7", changes).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Geocoding(GeocodingError::Timeout)));

        let stored = h.db.device_by_name("field-7").await.unwrap();
        assert_eq!(stored, before);

        // The address change is still pending on the next attempt
        h.geocoder.set_failing(false);
        let changes = DeviceChanges {
            w3w_location: Some("filled.bucket.tree".into()),
            ..Default::default()
        };
        let device = h.manager.update("field-7", changes).await.unwrap();
        assert_eq!(device.w3w_location.as_deref(), Some("filled.bucket.tree"));
        assert_eq!(h.geocoder.counts(), (3, 0));
    }

    #[tokio::test]
    async fn test_geocoding_failure_keeps_only_fresh_registration() {
        let h = harness_with(CountingRegistrar::default(), CountingGeocoder::failing()).await;
        let mut unregistered: Device = new_device(None, None).into();
        unregistered.w3w_location = Some("filled.count.soap".into());
        let before = h.db.insert_device(&unregistered).await.unwrap();

        let changes = DeviceChanges {
            w3w_location: Some("filled.bucket.tree".into()),
            is_active: Some(true),
            ..Default::default()
        };
        assert!(h.manager.update("field-7", changes).await.is_err());
        assert_eq!(h.registrar.calls(), 1);

        let stored = h.db.device_by_name("field-7").await.unwrap();
        assert_eq!(stored.network_dev_eui.as_deref(), Some(EUI));
        assert_eq!(stored.w3w_location, before.w3w_location);
        assert_eq!(stored.geolocation, before.geolocation);
        assert!(!stored.is_active);

        // Registered now, so a retry does not register again
        h.geocoder.set_failing(false);
        let loaded = h.manager.load("field-7").await.unwrap();
        h.manager.save(&loaded).await.unwrap();
        assert_eq!(h.registrar.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_save_leaves_caller_copy_untouched() {
        let h = harness_with(CountingRegistrar::failing(), CountingGeocoder::default()).await;
        let loaded = LoadedDevice::new(new_device(None, None).into());

        assert!(h.manager.save(&loaded).await.is_err());
        assert!(loaded.device.network_dev_eui.is_none());
        assert!(loaded.device.id.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_name_is_rejected_before_registration() {
        let h = harness().await;
        h.manager.create(new_device(None, None)).await.unwrap();
        let err = h.manager.create(new_device(None, None)).await.unwrap_err();

        assert!(matches!(err, LifecycleError::Store(StoreError::Conflict(_))));
        assert_eq!(h.registrar.calls(), 1);
    }

    #[tokio::test]
    async fn test_mac_and_registered_name_are_immutable() {
        let h = harness().await;
        h.manager.create(new_device(None, None)).await.unwrap();

        let changes = DeviceChanges {
            mac_address: Some("AA:BB:CC:DD:EE:FF:00:11".into()),
            ..Default::default()
        };
        let err = h.manager.update("field-7", changes).await.unwrap_err();
        assert!(matches!(err, LifecycleError::MacImmutable { .. }));

        let changes = DeviceChanges {
            name: Some("field-8".into()),
            ..Default::default()
        };
        let err = h.manager.update("field-7", changes).await.unwrap_err();
        assert!(matches!(err, LifecycleError::RegisteredName { .. }));
    }

    #[tokio::test]
    async fn test_lazy_coordinates_resolve_once_and_persist() {
        let h = harness().await;
        let stored = h.manager.create(new_device(None, None)).await.unwrap();

        // Stored address with zeroed coordinates, written behind the manager's back
        let mut raw = stored.clone();
        raw.w3w_location = Some("index.home.raft".into());
        raw.geolocation = Some(Coordinates::new(0.0, 0.0));
        h.db.update_device(&raw).await.unwrap();

        let mut loaded = h.manager.load("field-7").await.unwrap();
        let coordinates = h.manager.coordinates(&mut loaded).await.unwrap();
        assert_eq!(coordinates, Coordinates::new(51.520847, -0.195521));
        assert_eq!(h.geocoder.counts(), (1, 0));

        let stored = h.db.device_by_name("field-7").await.unwrap();
        assert_eq!(stored.geolocation, Some(coordinates));

        h.manager.coordinates(&mut loaded).await.unwrap();
        assert_eq!(h.geocoder.counts(), (1, 0));
        assert_eq!(h.registrar.calls(), 1);
    }

    #[tokio::test]
    async fn test_lazy_coordinates_without_address() {
        let h = harness().await;
        h.manager.create(new_device(None, None)).await.unwrap();

        let mut loaded = h.manager.load("field-7").await.unwrap();
        let err = h.manager.coordinates(&mut loaded).await.unwrap_err();
        assert!(matches!(err, LifecycleError::NoLocation { .. }));
    }

    #[tokio::test]
    async fn test_delete_and_load_by_id() {
        let h = harness().await;
        let stored = h.manager.create(new_device(None, None)).await.unwrap();
        let id = stored.id.unwrap();

        assert_eq!(h.manager.load_by_id(id).await.unwrap().device.name, "field-7");
        h.manager.delete("field-7").await.unwrap();

        let err = h.manager.load("field-7").await.unwrap_err();
        assert!(matches!(err, LifecycleError::Store(StoreError::NotFound(_))));
        assert!(h.manager.list().await.unwrap().is_empty());
    }

    mod against_ttn {
        use super::*;
        use crate::config::TtnConfig;
        use crate::testutil::{MockApi, RecordedRequest};
        use crate::ttn::{RegistrationStep, TtnClient};
        use axum::http::{Method, StatusCode};

        const APP_KEY: &str = "00112233445566778899AABBCCDDEEFF";

        fn fake_ttn(fail_prefix: Option<&'static str>) -> impl Fn(&RecordedRequest) -> (StatusCode, String) {
            move |req| {
                if fail_prefix.is_some_and(|prefix| req.path.starts_with(prefix)) {
                    return (StatusCode::INTERNAL_SERVER_ERROR, "{}".to_string());
                }
                if req.method == Method::GET && req.path.starts_with("/api/v3/js/") {
                    return (
                        StatusCode::OK,
                        format!(
                            r#"{{"ids":{{"dev_eui":"AABBCCDDEEFF"}},"root_keys":{{"app_key":{{"key":"{APP_KEY}"}}}}}}"#
                        ),
                    );
                }
                (StatusCode::OK, "{}".to_string())
            }
        }

        async fn manager_on(api: &MockApi) -> (DeviceManager, Database) {
            let config = TtnConfig {
                base_url: api.base_url.clone(),
                server_address: "eu1.cloud.thethings.network".to_string(),
                app_name: Some("farm-app".to_string()),
                app_key: Some(APP_KEY.to_string()),
                api_key: "NNSXS.test-token".to_string(),
                timeout_secs: 2,
            };
            let db = Database::open_in_memory().await.unwrap();
            let manager = DeviceManager::new(
                Arc::new(db.clone()),
                Arc::new(TtnClient::new(config).unwrap()),
                Arc::new(CountingGeocoder::default()),
            );
            (manager, db)
        }

        fn sensor() -> NewDevice {
            NewDevice {
                name: "sensor-01".to_string(),
                mac_address: "AA:BB:CC:DD:EE:FF".to_string(),
                w3w_location: None,
                geolocation: None,
                is_active: false,
                deployed_at: None,
            }
        }

        #[tokio::test]
        async fn test_save_runs_full_registration_once() {
            let api = MockApi::start(fake_ttn(None)).await;
            let (manager, _db) = manager_on(&api).await;

            let device = manager.create(sensor()).await.unwrap();
            assert_eq!(device.network_dev_eui.as_deref(), Some("AABBCCDDEEFF"));
            assert_eq!(
                api.labels(),
                vec![
                    "POST /api/v3/applications/farm-app/devices",
                    "PUT /api/v3/ns/applications/farm-app/devices/sensor-01",
                    "PUT /api/v3/as/applications/farm-app/devices/sensor-01",
                    "PUT /api/v3/js/applications/farm-app/devices/sensor-01",
                    "GET /api/v3/ns/applications/farm-app/devices/sensor-01",
                    "GET /api/v3/as/applications/farm-app/devices/sensor-01",
                    "GET /api/v3/js/applications/farm-app/devices/sensor-01",
                ]
            );

            for _ in 0..2 {
                let loaded = manager.load("sensor-01").await.unwrap();
                manager.save(&loaded).await.unwrap();
            }
            assert_eq!(api.requests().len(), 7);
        }

        #[tokio::test]
        async fn test_application_server_failure_fails_save_without_row() {
            let api = MockApi::start(fake_ttn(Some("/api/v3/as/"))).await;
            let (manager, db) = manager_on(&api).await;

            let err = manager.create(sensor()).await.unwrap_err();
            assert!(matches!(
                err,
                LifecycleError::Registration(RegistrationError::StepFailed {
                    step: RegistrationStep::ApplicationServer,
                    ..
                })
            ));
            assert_eq!(
                api.labels(),
                vec![
                    "POST /api/v3/applications/farm-app/devices",
                    "PUT /api/v3/ns/applications/farm-app/devices/sensor-01",
                    "PUT /api/v3/as/applications/farm-app/devices/sensor-01",
                ]
            );
            assert!(db.list_devices().await.unwrap().is_empty());
        }
    }
}
