//! Human and JSON renderings of device lists.

use std::io::{self, Write};

use blu_types::Device;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    device_type: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Source")]
    source: String,
}

impl From<&Device> for DeviceRow {
    fn from(device: &Device) -> Self {
        Self {
            id: device.id.clone(),
            name: or_dash(&device.name),
            device_type: or_dash(&device.device_type),
            version: or_dash(&device.version),
            source: or_dash(&device.source),
        }
    }
}

fn or_dash(value: &str) -> String {
    if value.is_empty() {
        "-".to_string()
    } else {
        value.to_string()
    }
}

/// Write `devices` as a table.
pub fn write_table(out: &mut impl Write, devices: &[Device]) -> io::Result<()> {
    if devices.is_empty() {
        return writeln!(out, "no devices found");
    }

    let table = Table::new(devices.iter().map(DeviceRow::from)).to_string();
    writeln!(out, "{table}")
}

/// Write `value` as pretty JSON followed by a newline.
pub fn write_json(out: &mut impl Write, value: &impl serde::Serialize) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(devices: &[Device]) -> String {
        let mut buf = Vec::new();
        write_table(&mut buf, devices).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn empty_list() {
        assert_eq!(render(&[]), "no devices found\n");
    }

    #[test]
    fn table_has_one_row_per_device() {
        let mut first = Device::new("192.168.1.20", 11000);
        first.name = "Kitchen".to_string();
        first.device_type = "musc".to_string();
        first.version = "4.2.1".to_string();
        first.source = "mdns+lsdp".to_string();
        let second = Device::new("10.0.0.2", 11000);

        let text = render(&[first, second]);
        let lines: Vec<&str> = text.lines().collect();

        let header = lines.iter().find(|line| line.contains("ID")).unwrap();
        for column in ["Name", "Type", "Version", "Source"] {
            assert!(header.contains(column), "{header}");
        }

        let kitchen = lines
            .iter()
            .find(|line| line.contains("192.168.1.20:11000"))
            .unwrap();
        for cell in ["Kitchen", "musc", "4.2.1", "mdns+lsdp"] {
            assert!(kitchen.contains(cell), "{kitchen}");
        }

        let unnamed = lines
            .iter()
            .find(|line| line.contains("10.0.0.2:11000"))
            .unwrap();
        assert!(unnamed.contains(" - "), "{unnamed}");

        let width = lines[0].chars().count();
        assert!(lines.iter().all(|line| line.chars().count() == width));
    }

    #[test]
    fn json_omits_empty_fields() {
        let mut buf = Vec::new();
        write_json(&mut buf, &vec![Device::new("10.0.0.2", 11000)]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.ends_with('\n'));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value[0]["id"], "10.0.0.2:11000");
        assert_eq!(value[0]["port"], 11000);
        assert_eq!(value[0]["type"], "");
        assert!(value[0].get("version").is_none());
        assert!(value[0].get("source").is_none());
    }
}
