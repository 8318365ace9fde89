//! Output helpers. Device fields are shown in the external vocabulary.

use crate::OutputFormat;
use anyhow::Result;
use ndb_core::{ContentRecord, DeviceRecord, vocabulary};
use serde_json::{Map, Value};

const W_ID: usize = 14;
const W_SYS: usize = 24;
const W_IP: usize = 15;
const W_CAT: usize = 8;

/// Device as a JSON object keyed by external field names.
pub fn device_json(device: &DeviceRecord) -> Value {
    let mut out = Map::new();
    for column in vocabulary::DEVICE_COLUMNS {
        let value = device
            .field(column)
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null);
        out.insert(vocabulary::external_field(column).to_string(), value);
    }
    for (key, value) in &device.extra {
        out.entry(key.clone())
            .or_insert_with(|| Value::String(value.clone()));
    }
    out.insert("record_hash".to_string(), Value::String(device.record_hash.clone()));
    Value::Object(out)
}

fn clip(s: Option<&str>, width: usize) -> String {
    let s = s.unwrap_or("-");
    if s.chars().count() > width {
        let mut clipped: String = s.chars().take(width - 1).collect();
        clipped.push('…');
        clipped
    } else {
        s.to_string()
    }
}

pub fn device_line(device: &DeviceRecord) -> String {
    format!(
        "{:<W_ID$}  {:<W_SYS$}  {:<W_IP$}  {:<W_CAT$}  {}",
        clip(Some(&device.id), W_ID),
        clip(device.sys.as_deref(), W_SYS),
        clip(device.ip_address.as_deref(), W_IP),
        clip(device.category.as_deref(), W_CAT),
        device.record_hash.chars().take(12).collect::<String>(),
    )
}

pub fn print_devices(devices: &[DeviceRecord], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let out: Vec<Value> = devices.iter().map(device_json).collect();
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            println!(
                "{:<W_ID$}  {:<W_SYS$}  {:<W_IP$}  {:<W_CAT$}  Source",
                "ID", "Name", "IP", "Cat"
            );
            for device in devices {
                println!("{}", device_line(device));
            }
        }
    }
    Ok(())
}

/// Print records verbatim, optionally each preceded by `@hash`.
pub fn print_contents(records: &[ContentRecord], show_hash: bool) {
    for (i, record) in records.iter().enumerate() {
        if show_hash {
            println!("@{}", record.hash);
        }
        if record.content.ends_with('\n') {
            print!("{}", record.content);
        } else {
            println!("{}", record.content);
        }
        if show_hash && i + 1 < records.len() {
            println!("---");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndb_core::RecordId;
    use std::collections::BTreeMap;

    fn device() -> DeviceRecord {
        DeviceRecord {
            id: "cp-001".to_string(),
            sys: Some("feather-a".to_string()),
            ip_address: Some("192.168.0.10".to_string()),
            category: None,
            extra: BTreeMap::from([("board".to_string(), "feather_m4".to_string())]),
            record_id: RecordId(1),
            record_hash: "ab".repeat(32),
        }
    }

    #[test]
    fn test_device_json_uses_external_names() {
        let json = device_json(&device());
        assert_eq!(json["ip"], "192.168.0.10");
        assert!(json.get("ip_address").is_none());
        assert_eq!(json["id"], "cp-001");
        assert_eq!(json["sys"], "feather-a");
        assert_eq!(json["category"], Value::Null);
        assert_eq!(json["board"], "feather_m4");
    }

    #[test]
    fn test_clip() {
        assert_eq!(clip(None, 5), "-");
        assert_eq!(clip(Some("short"), 5), "short");
        assert_eq!(clip(Some("too-long"), 5), "too-…");
    }

    #[test]
    fn test_device_line() {
        let line = device_line(&device());
        assert!(line.starts_with("cp-001 "));
        assert!(line.contains("192.168.0.10"));
        assert!(line.ends_with("abababababab"));
    }

    #[test]
    fn test_device_line_with_multibyte_hash() {
        let mut device = device();
        device.record_hash = "ünïcödé-hash-edited".to_string();
        let line = device_line(&device);
        assert!(line.ends_with("ünïcödé-hash"));
    }
}
