//! System and ECU metadata documents.

use serde::Serialize;
use serde_yaml::Value;

use crate::builder::reader::{BuildErrors, FromNode, MapReader};
use crate::core::location::FieldPath;
use crate::core::model::datatypes::BaseVersion;

/// Root metadata of a workspace (`system_metadata.flync.yaml`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemMetadata {
    /// Declared workspace name; when absent any requested name is accepted
    pub name: Option<String>,
    pub author: String,
    pub compatible_flync_version: BaseVersion,
    pub release: BaseVersion,
    pub oem: Option<String>,
    pub platform: Option<String>,
}

impl FromNode for SystemMetadata {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        let mut map = MapReader::open(node, path, errs)?;
        map.constant("type", "system", errs);
        let name = map.optional::<String>("name", errs);
        let author = map.required::<String>("author", errs);
        let compatible = map.required::<BaseVersion>("compatible_flync_version", errs);
        let release = map.required::<BaseVersion>("release", errs);
        let oem = map.optional::<String>("oem", errs);
        let platform = map.optional::<String>("platform", errs);
        map.finish(errs)?;

        Some(SystemMetadata {
            name,
            author: author?,
            compatible_flync_version: compatible?,
            release: release?,
            oem,
            platform,
        })
    }
}

/// Hardware revision of an ECU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HardwareMetadata {
    #[serde(flatten)]
    pub version: BaseVersion,
    pub supplier: Option<String>,
    pub product_id: Option<String>,
}

impl FromNode for HardwareMetadata {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        let mut map = MapReader::open(node, path, errs)?;
        let version = BaseVersion::read(&mut map, errs);
        let supplier = map.optional::<String>("supplier", errs);
        let product_id = map.optional::<String>("product_id", errs);
        map.finish(errs)?;
        Some(HardwareMetadata {
            version: version?,
            supplier,
            product_id,
        })
    }
}

/// Metadata of one ECU (`ecu_metadata.flync.yaml`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EcuMetadata {
    pub author: String,
    pub compatible_flync_version: BaseVersion,
    pub hardware: Option<HardwareMetadata>,
    pub software: Option<BaseVersion>,
}

impl FromNode for EcuMetadata {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        let mut map = MapReader::open(node, path, errs)?;
        map.constant("type", "ecu", errs);
        let author = map.required::<String>("author", errs);
        let compatible = map.required::<BaseVersion>("compatible_flync_version", errs);
        let hardware = map.optional::<HardwareMetadata>("hardware", errs);
        let software = map.optional::<BaseVersion>("software", errs);
        map.finish(errs)?;

        Some(EcuMetadata {
            author: author?,
            compatible_flync_version: compatible?,
            hardware,
            software,
        })
    }
}

/// Metadata of an embedded component (a controller or switch), given inline as `meta`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbeddedMetadata {
    pub author: String,
    pub compatible_flync_version: BaseVersion,
    pub target_system: Option<String>,
    pub hardware: Option<HardwareMetadata>,
    pub app: Option<BaseVersion>,
    pub bootloader: Option<BaseVersion>,
}

impl FromNode for EmbeddedMetadata {
    fn from_node(node: &Value, path: &FieldPath, errs: &mut BuildErrors) -> Option<Self> {
        let mut map = MapReader::open(node, path, errs)?;
        map.constant("type", "embedded", errs);
        let author = map.required::<String>("author", errs);
        let compatible = map.required::<BaseVersion>("compatible_flync_version", errs);
        let target_system = map.optional::<String>("target_system", errs);
        let hardware = map.optional::<HardwareMetadata>("hardware", errs);
        let app = map.optional::<BaseVersion>("app", errs);
        let bootloader = map.optional::<BaseVersion>("bootloader", errs);
        map.finish(errs)?;

        Some(EmbeddedMetadata {
            author: author?,
            compatible_flync_version: compatible?,
            target_system,
            hardware,
            app,
            bootloader,
        })
    }
}
