use anyhow::{Context, Result};
use std::collections::HashSet;

/// Enumerate the serial ports available on this host, in display order.
pub fn list_serial_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports().context("failed to enumerate serial ports")?;
    Ok(normalize_port_names(ports.into_iter().map(|p| p.port_name)))
}

/// Clean up a raw list of port names for the dropdown.
///
/// - surrounding whitespace is trimmed and blank names are dropped
/// - duplicates are removed (first occurrence wins)
/// - names are ordered by their alphabetic prefix, then numerically by a
///   trailing number, so `COM2` sorts before `COM10`
pub fn normalize_port_names(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out: Vec<String> = names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty() && seen.insert(n.clone()))
        .collect();
    out.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
    out
}

fn sort_key(name: &str) -> (&str, Option<u64>, &str) {
    let digits_at = name
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i);
    match digits_at {
        Some(i) => (&name[..i], name[i..].parse().ok(), name),
        None => (name, None, name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn numeric_suffixes_sort_naturally() {
        let out = normalize_port_names(names(&["COM10", "COM2", "COM1"]));
        assert_eq!(out, vec!["COM1", "COM2", "COM10"]);
    }

    #[test]
    fn dedup_and_trim() {
        let out = normalize_port_names(names(&[" /dev/ttyUSB0\n", "/dev/ttyUSB0", "", "  "]));
        assert_eq!(out, vec!["/dev/ttyUSB0"]);
    }

    #[test]
    fn groups_by_prefix() {
        let out = normalize_port_names(names(&[
            "/dev/ttyUSB1",
            "/dev/ttyACM0",
            "/dev/ttyUSB0",
        ]));
        assert_eq!(out, vec!["/dev/ttyACM0", "/dev/ttyUSB0", "/dev/ttyUSB1"]);
    }

    #[test]
    fn empty_input_is_empty() {
        assert!(normalize_port_names(Vec::new()).is_empty());
    }
}
