//! Static checks on declared resource limits

use crate::models::Service;

const HIGH_MEMORY_MB: f64 = 1500.0;
const VERY_HIGH_MEMORY_MB: f64 = 4000.0;

/// Parse a docker-style memory size (`512m`, `2g`, `1.5GiB`, `1024`) into bytes.
///
/// Units are powers of 1024. Returns `None` for anything unparseable.
pub fn parse_memory_bytes(value: &str) -> Option<u64> {
    let value = value.trim();
    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);

    let number: f64 = number.parse().ok()?;
    let unit = unit.trim_start().to_ascii_lowercase();
    let unit = unit.strip_suffix('b').unwrap_or(&unit);
    let unit = unit.strip_suffix('i').unwrap_or(unit);

    let exponent = match unit {
        "" => 0,
        "k" => 1,
        "m" => 2,
        "g" => 3,
        "t" => 4,
        "p" => 5,
        _ => return None,
    };

    Some((number * 1024f64.powi(exponent)) as u64)
}

/// Warnings derived from the declared limits of a service
pub fn static_warnings(service: &Service) -> Vec<String> {
    let mut warnings = Vec::new();

    match service.metadata.get("memory_limit") {
        None => warnings.push("Memory limit not defined.".to_string()),
        Some(limit) => {
            if let Some(bytes) = parse_memory_bytes(limit) {
                let mb = bytes as f64 / (1024.0 * 1024.0);
                if mb > VERY_HIGH_MEMORY_MB {
                    warnings.push(format!(
                        "Defined memory limit ('{}' ≈ {:.0} MB) seems very high.",
                        limit, mb
                    ));
                } else if mb > HIGH_MEMORY_MB {
                    warnings.push(format!(
                        "Defined memory limit ('{}' ≈ {:.0} MB) may be high.",
                        limit, mb
                    ));
                }
            }
        }
    }

    if !service.metadata.contains_key("cpu_limit") {
        warnings.push("CPU limit not defined.".to_string());
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_memory_bytes() {
        assert_eq!(parse_memory_bytes("1024"), Some(1024));
        assert_eq!(parse_memory_bytes("512m"), Some(512 * 1024 * 1024));
        assert_eq!(parse_memory_bytes("512M"), Some(512 * 1024 * 1024));
        assert_eq!(parse_memory_bytes("2g"), Some(2 * 1024 * 1024 * 1024));
        assert_eq!(parse_memory_bytes("1.5GiB"), Some(1536 * 1024 * 1024));
        assert_eq!(parse_memory_bytes("64 kb"), Some(64 * 1024));
        assert_eq!(parse_memory_bytes("10b"), Some(10));
        assert_eq!(parse_memory_bytes("lots"), None);
        assert_eq!(parse_memory_bytes("12x"), None);
        assert_eq!(parse_memory_bytes(""), None);
    }

    #[test]
    fn test_missing_limits() {
        let warnings = static_warnings(&Service::new("db", "db"));
        assert_eq!(
            warnings,
            vec!["Memory limit not defined.", "CPU limit not defined."]
        );
    }

    #[test]
    fn test_memory_thresholds() {
        let svc = |limit: &str| {
            Service::new("db", "db")
                .with_metadata("memory_limit", limit)
                .with_metadata("cpu_limit", "1")
        };

        assert!(static_warnings(&svc("1g")).is_empty());
        assert_eq!(
            static_warnings(&svc("2g")),
            vec!["Defined memory limit ('2g' ≈ 2048 MB) may be high."]
        );
        assert_eq!(
            static_warnings(&svc("8g")),
            vec!["Defined memory limit ('8g' ≈ 8192 MB) seems very high."]
        );
        // unparseable limits are not second-guessed
        assert!(static_warnings(&svc("plenty")).is_empty());
    }
}
