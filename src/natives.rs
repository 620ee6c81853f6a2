//! Native function id-to-name table, embedded at compile time.
//!
//! The game ships this as a loose text resource (`key=value` per line,
//! one function id to one name); this crate bakes a copy in via
//! [`include_str!`] so a [`crate::instruction::Instruction::decode`] call
//! never needs filesystem access.

use std::collections::HashMap;
use std::sync::OnceLock;

const RAW: &str = include_str!("../data/natives.txt");

fn table() -> &'static HashMap<u32, String> {
    static TABLE: OnceLock<HashMap<u32, String>> = OnceLock::new();
    TABLE.get_or_init(|| parse(RAW))
}

fn parse(text: &str) -> HashMap<u32, String> {
    let mut map = HashMap::new();
    for line in text.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if key.is_empty() || value.is_empty() {
            continue;
        }
        if let Ok(id) = key.parse::<u32>() {
            map.insert(id, value.to_string());
        }
    }
    map
}

/// Looks up a native function's name by id, falling back to
/// `"Unknown (<id>)"` when it isn't in the table.
pub fn native_name(id: u32) -> String {
    match table().get(&id) {
        Some(name) => name.clone(),
        None => format!("Unknown ({id})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_native_resolves_by_id() {
        assert_eq!(native_name(17), "AMBDEALER_CREATE");
    }

    #[test]
    fn unknown_native_falls_back() {
        assert_eq!(native_name(999_999), "Unknown (999999)");
    }

    #[test]
    fn parse_ignores_malformed_lines() {
        let map = parse("not-a-line\n1=FOO\n=BAR\n2=\n3=BAZ\n");
        assert_eq!(map.get(&1).map(String::as_str), Some("FOO"));
        assert_eq!(map.get(&3).map(String::as_str), Some("BAZ"));
        assert_eq!(map.len(), 2);
    }
}
