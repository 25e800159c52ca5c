/// Normalize a location id for topics and published payloads:
/// lowercase, spaces replaced with underscores
pub fn normalize_location(location: &str) -> String {
    location.to_lowercase().replace(' ', "_")
}

/// Format a MAC address as upper-case, colon-separated octets.
/// Accepts bare hex or `:`/`-`/`.` separated input; anything else is upper-cased as-is.
pub fn format_mac(mac: &str) -> String {
    let hex: String = mac
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.'))
        .collect();

    if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return mac.to_uppercase();
    }

    hex.to_uppercase()
        .as_bytes()
        .chunks(2)
        .map(|pair| String::from_utf8_lossy(pair).into_owned())
        .collect::<Vec<_>>()
        .join(":")
}
