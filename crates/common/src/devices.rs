//! Device records extracted from the configuration document
//!
//! Test suites see each non-empty group as one intercom. Names starting
//! with `#` are treated as commented out.

use serde::Serialize;
use tracing::warn;

use crate::document::Document;

pub const DEFAULT_MAX_SCREENSHOTS: u32 = 10_000;
pub const DEFAULT_MAX_FIRMWARE_UPLOADS: u32 = 10;

/// Parameters of one intercom, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceConfig {
    params: Vec<(String, String)>,
}

impl DeviceConfig {
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Value of `name`. A repeated name resolves to its last occurrence.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn ip(&self) -> &str {
        self.get("IP_CAMERA").unwrap_or_default()
    }

    pub fn login(&self) -> &str {
        self.get("LOGIN").unwrap_or_default()
    }

    pub fn password(&self) -> &str {
        self.get("PASSWORD").unwrap_or_default()
    }

    pub fn max_screenshots(&self) -> u32 {
        self.positive_or("MAX_SCREENSHOTS", DEFAULT_MAX_SCREENSHOTS)
    }

    pub fn max_firmware_uploads(&self) -> u32 {
        self.positive_or("MAX_FIRMWARE_UPLOADS", DEFAULT_MAX_FIRMWARE_UPLOADS)
    }

    /// `k=v` pairs joined by spaces, as printed in run reports.
    pub fn summary_line(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn positive_or(&self, name: &str, default: u32) -> u32 {
        match self.get(name) {
            None => default,
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    warn!(device = self.ip(), name, value = raw, fallback = default, "invalid limit");
                    default
                }
            },
        }
    }
}

/// One device per group that has at least one non-comment pair.
pub fn devices(doc: &Document) -> Vec<DeviceConfig> {
    doc.groups()
        .iter()
        .map(|group| DeviceConfig {
            params: group
                .pairs()
                .iter()
                .filter(|p| !p.name.is_empty() && !p.name.starts_with('#'))
                .map(|p| (p.name.clone(), p.value.clone()))
                .collect(),
        })
        .filter(|device| !device.params.is_empty())
        .collect()
}

/// A firmware image listed under `FIRMWARE_VERSIONS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FirmwareVersion {
    pub version: String,
    pub path: String,
}

/// Collect `FIRMWARE_VERSIONS=version:path,version:path` entries of all
/// devices. Items without a `:` are ignored.
pub fn firmware_versions(devices: &[DeviceConfig]) -> Vec<FirmwareVersion> {
    devices
        .iter()
        .flat_map(|device| device.params.iter())
        .filter(|(k, v)| k == "FIRMWARE_VERSIONS" && !v.is_empty())
        .flat_map(|(_, v)| v.split(','))
        .filter_map(|item| {
            let (version, path) = item.split_once(':')?;
            Some(FirmwareVersion {
                version: version.trim().to_string(),
                path: path.trim().to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse;

    #[test]
    fn test_devices_skip_empty_and_comment_groups() {
        let doc = parse(
            "IP_CAMERA=10.0.0.1:85\nLOGIN=admin\n__________________\n#IP_CAMERA=10.0.0.9\n__________________\n__________________\nIP_CAMERA=10.0.0.2:85",
        );
        let list = devices(&doc);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].ip(), "10.0.0.1:85");
        assert_eq!(list[0].login(), "admin");
        assert_eq!(list[1].ip(), "10.0.0.2:85");
        assert_eq!(list[1].password(), "");
    }

    #[test]
    fn test_repeated_name_uses_last_value() {
        let list = devices(&parse("LOGIN=a\nLOGIN=b"));
        assert_eq!(list[0].get("LOGIN"), Some("b"));
        assert_eq!(list[0].summary_line(), "LOGIN=a LOGIN=b");
    }

    #[test]
    fn test_limits_fall_back_to_defaults() {
        let list = devices(&parse(
            "IP_CAMERA=a\n__________________\nIP_CAMERA=b\nMAX_SCREENSHOTS=0\nMAX_FIRMWARE_UPLOADS=x\n__________________\nIP_CAMERA=c\nMAX_SCREENSHOTS=25\nMAX_FIRMWARE_UPLOADS=3",
        ));
        assert_eq!(list[0].max_screenshots(), DEFAULT_MAX_SCREENSHOTS);
        assert_eq!(list[1].max_screenshots(), DEFAULT_MAX_SCREENSHOTS);
        assert_eq!(list[1].max_firmware_uploads(), DEFAULT_MAX_FIRMWARE_UPLOADS);
        assert_eq!(list[2].max_screenshots(), 25);
        assert_eq!(list[2].max_firmware_uploads(), 3);
    }

    #[test]
    fn test_firmware_versions() {
        let list = devices(&parse(
            "FIRMWARE_VERSIONS=2.5.03:fw/a.bin, 2.6.01 : fw/b.bin,broken\n__________________\nFIRMWARE_VERSIONS=",
        ));
        let versions = firmware_versions(&list);
        assert_eq!(
            versions,
            vec![
                FirmwareVersion { version: "2.5.03".into(), path: "fw/a.bin".into() },
                FirmwareVersion { version: "2.6.01".into(), path: "fw/b.bin".into() },
            ]
        );
    }
}
