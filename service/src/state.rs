use std::sync::Arc;

use common::{
    files::{FileService, IFileService},
    persistence::{local::LocalStorageArea, IStorageArea},
};
use convert::{
    converter::IConverter,
    dispatch::{ConvertService, IConvertService},
    libre::LibreConverter,
    raster::ImageConverter,
};

use crate::settings::Settings;

pub type Services = Arc<ServiceCollection>;

pub struct ServiceCollection {
    pub file_service: Arc<dyn IFileService>,
    pub convert_service: Arc<dyn IConvertService>,
    pub base_url: String,
}

impl ServiceCollection {
    pub async fn build(settings: &Settings) -> Result<Services, String> {
        let storage = LocalStorageArea::build(settings.storage_root.clone())
            .await
            .map_err(|err| format!("Could not prepare storage at {}: {}", settings.storage_root.display(), err))?;
        let libre = LibreConverter::new(settings.libre_path.clone(), settings.libre_timeout);
        Ok(Self::with_parts(Arc::new(storage), Arc::new(ImageConverter::default()), Arc::new(libre), settings))
    }

    /// Wires the services around any storage area and converters.
    pub fn with_parts(storage: Arc<dyn IStorageArea>, image_converter: Arc<dyn IConverter>, document_converter: Arc<dyn IConverter>, settings: &Settings) -> Services {
        Arc::new(ServiceCollection {
            file_service: Arc::new(FileService { storage: storage.clone() }),
            convert_service: Arc::new(ConvertService::new(storage, image_converter, document_converter, settings.deduplicate)),
            base_url: settings.base_url.clone(),
        })
    }

    pub fn download_url(&self, storage_name: &str) -> String {
        format!("{}/download/{}", &self.base_url, storage_name)
    }
}
