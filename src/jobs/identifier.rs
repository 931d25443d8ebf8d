use bon::bon;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, TilingError};

/// Names one cached tile set: a layer rendered on one gridset, in one
/// format, optionally for one set of parameter filter values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawCacheIdentifier")]
pub struct CacheIdentifier {
    layer_name: String,
    gridset_id: String,
    format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCacheIdentifier {
    layer_name: String,
    gridset_id: String,
    format: String,
    #[serde(default)]
    parameters_id: Option<String>,
}

impl TryFrom<RawCacheIdentifier> for CacheIdentifier {
    type Error = TilingError;

    fn try_from(raw: RawCacheIdentifier) -> Result<Self> {
        Self::builder()
            .layer_name(raw.layer_name)
            .gridset_id(raw.gridset_id)
            .format(raw.format)
            .maybe_parameters_id(raw.parameters_id)
            .build()
    }
}

#[bon]
impl CacheIdentifier {
    /// Fails with [`TilingError::MissingField`] on a blank layer name,
    /// gridset id or format.
    #[builder]
    pub fn new(
        #[builder(into)] layer_name: String,
        #[builder(into)] gridset_id: String,
        #[builder(into)] format: String,
        #[builder(into)] parameters_id: Option<String>,
    ) -> Result<Self> {
        require("layerName", &layer_name)?;
        require("gridsetId", &gridset_id)?;
        require("format", &format)?;
        Ok(Self {
            layer_name,
            gridset_id,
            format,
            parameters_id,
        })
    }
}

fn require(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(TilingError::MissingField(field));
    }
    Ok(())
}

impl CacheIdentifier {
    pub fn layer_name(&self) -> &str {
        &self.layer_name
    }

    pub fn gridset_id(&self) -> &str {
        &self.gridset_id
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn parameters_id(&self) -> Option<&str> {
        self.parameters_id.as_deref()
    }
}

impl fmt::Display for CacheIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.layer_name, self.gridset_id, self.format)?;
        if let Some(id) = &self.parameters_id {
            write!(f, "/{id}")?;
        }
        Ok(())
    }
}

/// Stable id for a set of parameter filter values: hex SHA-256 of the
/// `key=value` pairs in key order, joined by `&`.
pub fn parameters_id(parameters: &BTreeMap<String, String>) -> String {
    let canonical = parameters
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_fields() {
        let id = CacheIdentifier::builder()
            .layer_name("topp:states")
            .gridset_id("EPSG:4326")
            .format("image/png")
            .build()
            .unwrap();
        assert_eq!(id.parameters_id(), None);
        assert_eq!(id.to_string(), "topp:states/EPSG:4326/image/png");

        let err = CacheIdentifier::builder()
            .layer_name("topp:states")
            .gridset_id(" ")
            .format("image/png")
            .build()
            .unwrap_err();
        assert_eq!(err, TilingError::MissingField("gridsetId"));
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_optional_parameters_id() {
        let id = CacheIdentifier::builder()
            .layer_name("roads")
            .gridset_id("EPSG:900913")
            .format("image/jpeg")
            .maybe_parameters_id(Some("abc"))
            .build()
            .unwrap();
        assert_eq!(id.parameters_id(), Some("abc"));
        assert_eq!(id.to_string(), "roads/EPSG:900913/image/jpeg/abc");
    }

    #[test]
    fn test_json_shape() {
        let id = CacheIdentifier::builder()
            .layer_name("roads")
            .gridset_id("EPSG:4326")
            .format("image/png")
            .build()
            .unwrap();
        let json = serde_json::to_value(&id).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"layerName": "roads", "gridsetId": "EPSG:4326", "format": "image/png"})
        );
        assert_eq!(serde_json::from_value::<CacheIdentifier>(json).unwrap(), id);

        let blank = serde_json::json!({"layerName": "", "gridsetId": "EPSG:4326", "format": "image/png"});
        assert!(serde_json::from_value::<CacheIdentifier>(blank).is_err());
        let missing = serde_json::json!({"gridsetId": "EPSG:4326", "format": "image/png"});
        assert!(serde_json::from_value::<CacheIdentifier>(missing).is_err());
    }

    #[test]
    fn test_parameters_id_ignores_insertion_order() {
        let mut a = BTreeMap::new();
        a.insert("STYLES".to_string(), "night".to_string());
        a.insert("ENV".to_string(), "color:red".to_string());

        let mut b = BTreeMap::new();
        b.insert("ENV".to_string(), "color:red".to_string());
        b.insert("STYLES".to_string(), "night".to_string());

        let id = parameters_id(&a);
        assert_eq!(id, parameters_id(&b));
        assert_eq!(id.len(), 64);
        assert_eq!(
            id,
            hex::encode(Sha256::digest(b"ENV=color:red&STYLES=night"))
        );
    }
}
