//! TID-based tag identification.
//!
//! EPC Gen2 tags encode their mask-designer id and model number in the first
//! TID words. [`identify_tag`] reads those words off the air and resolves
//! them against a JSON definition database. The database is loaded once per
//! process and cached; a missing or malformed file is non-fatal,
//! identification then simply lacks human-readable names.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use cph_proto::codes::MemoryBank;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::reader::Reader;

/// EPC Gen2 allocation class identifier in TID byte 0.
const GEN2_ALLOCATION_CLASS: u8 = 0xE2;

/// The tag definition database: mask-designer id (as a decimal string) to
/// manufacturer entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagDefinitions {
    /// Manufacturer entries keyed by decimal MDID
    #[serde(default)]
    pub manufacturers: HashMap<String, ManufacturerInfo>,
}

/// One manufacturer entry from the definition file.
#[derive(Debug, Clone, Deserialize)]
pub struct ManufacturerInfo {
    /// Human-readable manufacturer name
    pub name: String,
    /// Model entries keyed by decimal tag model number; shape varies by
    /// manufacturer, kept as raw JSON
    #[serde(default)]
    pub models: HashMap<String, serde_json::Value>,
}

static DEFINITIONS: OnceLock<TagDefinitions> = OnceLock::new();

/// Load and cache the tag definition database.
///
/// The first call reads `path`; later calls return the cached value
/// regardless of the path given. Read or parse failures log a warning and
/// cache an empty database.
pub fn load_tag_definitions(path: &Path) -> &'static TagDefinitions {
    DEFINITIONS.get_or_init(|| match std::fs::read_to_string(path) {
        Ok(text) => match serde_json::from_str::<TagDefinitions>(&text) {
            Ok(definitions) => {
                debug!(
                    path = %path.display(),
                    manufacturers = definitions.manufacturers.len(),
                    "loaded tag definitions"
                );
                definitions
            },
            Err(err) => {
                warn!(path = %path.display(), error = %err, "tag definitions unparseable");
                TagDefinitions::default()
            },
        },
        Err(err) => {
            warn!(path = %path.display(), error = %err, "tag definitions unavailable");
            TagDefinitions::default()
        },
    })
}

/// Result of a tag identification attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagIdentification {
    /// EPC the caller asked about
    pub epc: String,
    /// Raw hex of the TID words read, when the read succeeded
    pub tid_raw: Option<String>,
    /// Mask-designer id parsed from the TID
    pub manufacturer_id: Option<u16>,
    /// Tag model number parsed from the TID
    pub tag_model_number: Option<u16>,
    /// Manufacturer name from the definitions, when known
    pub manufacturer_name: Option<String>,
    /// Model entry from the definitions, when known
    pub model_info: Option<serde_json::Value>,
    /// Why identification stopped short, if it did
    pub error: Option<String>,
}

/// Identify the singulated tag by reading its TID prefix and looking the
/// parsed ids up in `definitions`.
///
/// Never fails: read or parse problems are reported in the `error` field of
/// the result.
pub async fn identify_tag(
    reader: &Reader,
    epc: &str,
    definitions: &TagDefinitions,
) -> TagIdentification {
    let mut result = TagIdentification { epc: epc.to_string(), ..TagIdentification::default() };

    // Two words cover the allocation class, MDID, and model number.
    let tid = match reader.read_tag(MemoryBank::Tid, 0, 2, None).await {
        Ok(tid) => tid,
        Err(err) => {
            result.error = Some(format!("failed to read TID: {err}"));
            return result;
        },
    };
    result.tid_raw = Some(cph_proto::tlv::encode_hex_upper(&tid));

    if tid.len() < 4 {
        result.error = Some(format!("TID read returned {} bytes, need 4", tid.len()));
        return result;
    }
    if tid[0] != GEN2_ALLOCATION_CLASS {
        result.error = Some(format!("unknown TID allocation class {:#04x}", tid[0]));
        return result;
    }

    let manufacturer_id = (u16::from(tid[1]) << 4) | (u16::from(tid[2]) >> 4);
    let tag_model_number = (u16::from(tid[2] & 0x0F) << 8) | u16::from(tid[3]);
    result.manufacturer_id = Some(manufacturer_id);
    result.tag_model_number = Some(tag_model_number);

    if let Some(manufacturer) = definitions.manufacturers.get(&manufacturer_id.to_string()) {
        result.manufacturer_name = Some(manufacturer.name.clone());
        result.model_info = manufacturer.models.get(&tag_model_number.to_string()).cloned();
    }

    result
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;
    use std::sync::Arc;
    use std::time::Duration;

    use cph_core::{MockTransport, Transport};
    use cph_proto::frame::{self, FrameType};
    use cph_proto::tlv;

    use super::*;
    use crate::reader::ReaderOptions;

    fn definitions_from_json(json: &str) -> TagDefinitions {
        serde_json::from_str(json).unwrap()
    }

    const DEFS_JSON: &str = r#"{
        "manufacturers": {
            "6": {
                "name": "NXP",
                "models": { "3088": { "model_name": "UCODE 8" } }
            }
        }
    }"#;

    async fn reader_with_tid_response(tid: &[u8]) -> (Arc<MockTransport>, Reader, Vec<u8>) {
        let transport = Arc::new(MockTransport::new());
        let options =
            ReaderOptions { response_timeout: Duration::from_millis(100), ..Default::default() };
        let reader = Reader::connect(Arc::clone(&transport) as Arc<dyn Transport>, options)
            .await
            .unwrap();

        let mut params = vec![0x07, 0x01, 0x00];
        params.extend_from_slice(&tlv::build_tlv(tlv::tags::TID_DATA, tid).unwrap());
        let response = frame::build_frame(FrameType::Response, 0, 0x31, &params).unwrap();
        (transport, reader, response)
    }

    #[tokio::test]
    async fn identifies_known_gen2_tag() {
        // MDID 6, TMN 3088: E2 00 6C 10 ...
        let (transport, reader, response) =
            reader_with_tid_response(&[0xE2, 0x00, 0x6C, 0x10]).await;
        let definitions = definitions_from_json(DEFS_JSON);

        let identify = identify_tag(&reader, "E2000017021701992390217D", &definitions);
        let inject = async {
            tokio::task::yield_now().await;
            transport.inject(&response).await;
        };
        let (result, ()) = tokio::join!(identify, inject);

        assert_eq!(result.tid_raw.as_deref(), Some("E2006C10"));
        assert_eq!(result.manufacturer_id, Some(6));
        assert_eq!(result.tag_model_number, Some(0x0C10));
        assert_eq!(result.manufacturer_name.as_deref(), Some("NXP"));
        assert_eq!(
            result.model_info.as_ref().and_then(|m| m.get("model_name")),
            Some(&serde_json::json!("UCODE 8"))
        );
        assert_eq!(result.error, None);
    }

    #[tokio::test]
    async fn unknown_allocation_class_is_reported() {
        let (transport, reader, response) =
            reader_with_tid_response(&[0xE0, 0x00, 0x6C, 0x10]).await;
        let definitions = TagDefinitions::default();

        let identify = identify_tag(&reader, "AABB", &definitions);
        let inject = async {
            tokio::task::yield_now().await;
            transport.inject(&response).await;
        };
        let (result, ()) = tokio::join!(identify, inject);

        assert!(result.error.as_deref().unwrap_or_default().contains("allocation class"));
        assert_eq!(result.manufacturer_id, None);
    }

    #[tokio::test]
    async fn read_failure_is_non_fatal() {
        let transport = Arc::new(MockTransport::new());
        let options =
            ReaderOptions { response_timeout: Duration::from_millis(50), ..Default::default() };
        let reader = Reader::connect(Arc::clone(&transport) as Arc<dyn Transport>, options)
            .await
            .unwrap();

        // No response: the read times out and identification reports it
        let result = identify_tag(&reader, "AABB", &TagDefinitions::default()).await;
        assert!(result.error.as_deref().unwrap_or_default().contains("failed to read TID"));
        assert_eq!(result.tid_raw, None);
    }

    #[test]
    fn loader_caches_and_tolerates_missing_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DEFS_JSON.as_bytes()).unwrap();

        let first = load_tag_definitions(file.path());
        assert_eq!(first.manufacturers.len(), 1);

        // Second call returns the cached database even for another path
        let second = load_tag_definitions(Path::new("/nonexistent/definitions.json"));
        assert_eq!(second.manufacturers.len(), 1);
    }
}
