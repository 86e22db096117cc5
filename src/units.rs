//! CPU and memory unit parsing/formatting.
//!
//! Grounded on the original enforcer's `patch_manager.to_cpu_num` /
//! `to_mem_bytes`: binary byte suffixes (Ki/Mi/Gi/Ti/Pi/Ei) are checked
//! before decimal ones (k/M/G/T/P/E), and CPU millicore suffix `m` divides
//! by 1000 while a trailing `k` on a CPU string multiplies by 1000 (matches
//! Kubernetes' own quantity grammar, where `k` is a valid CPU multiplier
//! even though it never appears in practice).

use tracing::warn;

/// Parses a Kubernetes CPU quantity string ("100m", "2", "1.5") into cores.
/// Returns `None` (with a warning logged) on malformed input, mirroring the
/// original's "log and return None" behavior rather than propagating an error
/// up through resource accounting.
pub fn parse_cpu(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    let result = if let Some(stripped) = s.strip_suffix('m') {
        stripped.parse::<f64>().map(|v| v / 1000.0)
    } else if let Some(stripped) = s.strip_suffix('k') {
        stripped.parse::<f64>().map(|v| v * 1000.0)
    } else {
        s.parse::<f64>()
    };

    match result {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(value = %raw, "failed to parse cpu quantity");
            None
        }
    }
}

const BINARY_SUFFIXES: &[(&str, f64)] = &[
    ("Ki", 1024.0),
    ("Mi", 1024.0 * 1024.0),
    ("Gi", 1024.0 * 1024.0 * 1024.0),
    ("Ti", 1024.0 * 1024.0 * 1024.0 * 1024.0),
    ("Pi", 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0),
    ("Ei", 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0),
];

const DECIMAL_SUFFIXES: &[(&str, f64)] = &[
    ("k", 1000.0),
    ("M", 1000.0 * 1000.0),
    ("G", 1000.0 * 1000.0 * 1000.0),
    ("T", 1000.0 * 1000.0 * 1000.0 * 1000.0),
    ("P", 1000.0 * 1000.0 * 1000.0 * 1000.0 * 1000.0),
    ("E", 1000.0 * 1000.0 * 1000.0 * 1000.0 * 1000.0 * 1000.0),
];

/// Parses a Kubernetes memory quantity string ("512Mi", "1Gi", "1000k",
/// "2048") into a byte count. Binary suffixes are tried first so "Mi" is
/// never mistaken for the decimal "M".
pub fn parse_memory(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    for (suffix, factor) in BINARY_SUFFIXES {
        if let Some(stripped) = s.strip_suffix(suffix) {
            return match stripped.parse::<f64>() {
                Ok(v) => Some(v * factor),
                Err(_) => {
                    warn!(value = %raw, "failed to parse memory quantity");
                    None
                }
            };
        }
    }

    for (suffix, factor) in DECIMAL_SUFFIXES {
        if let Some(stripped) = s.strip_suffix(suffix) {
            return match stripped.parse::<f64>() {
                Ok(v) => Some(v * factor),
                Err(_) => {
                    warn!(value = %raw, "failed to parse memory quantity");
                    None
                }
            };
        }
    }

    match s.parse::<f64>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(value = %raw, "failed to parse memory quantity");
            None
        }
    }
}

/// Formats a core count back into a Kubernetes CPU quantity, preferring
/// millicores below 1 core (the conventional Kubernetes rendering).
pub fn format_cpu(cores: f64) -> String {
    if cores < 1.0 {
        format!("{}m", (cores * 1000.0).round() as i64)
    } else if cores.fract() == 0.0 {
        format!("{}", cores as i64)
    } else {
        format!("{cores:.3}")
    }
}

/// Formats a byte count back into a Kubernetes memory quantity, preferring
/// binary units (Mi/Gi) the way `kubectl` renders them.
pub fn format_memory(bytes: f64) -> String {
    const GI: f64 = 1024.0 * 1024.0 * 1024.0;
    const MI: f64 = 1024.0 * 1024.0;
    const KI: f64 = 1024.0;

    if bytes >= GI && (bytes / GI).fract().abs() < 1e-6 {
        format!("{}Gi", (bytes / GI).round() as i64)
    } else if bytes >= MI {
        format!("{}Mi", (bytes / MI).round() as i64)
    } else if bytes >= KI {
        format!("{}Ki", (bytes / KI).round() as i64)
    } else {
        format!("{}", bytes.round() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_millicores() {
        assert_eq!(parse_cpu("100m"), Some(0.1));
        assert_eq!(parse_cpu("1500m"), Some(1.5));
    }

    #[test]
    fn parses_whole_and_fractional_cores() {
        assert_eq!(parse_cpu("2"), Some(2.0));
        assert_eq!(parse_cpu("1.5"), Some(1.5));
    }

    #[test]
    fn parses_cpu_k_suffix() {
        assert_eq!(parse_cpu("1k"), Some(1000.0));
    }

    #[test]
    fn rejects_garbage_cpu() {
        assert_eq!(parse_cpu("not-a-number"), None);
    }

    #[test]
    fn binary_suffix_checked_before_decimal() {
        // "Mi" must not be parsed by the decimal "M" branch.
        assert_eq!(parse_memory("1Mi"), Some(1024.0 * 1024.0));
        assert_eq!(parse_memory("1M"), Some(1000.0 * 1000.0));
    }

    #[test]
    fn parses_all_binary_suffixes() {
        assert_eq!(parse_memory("1Ki"), Some(1024.0));
        assert_eq!(parse_memory("1Gi"), Some(1024.0f64.powi(3)));
    }

    #[test]
    fn parses_bare_byte_count() {
        assert_eq!(parse_memory("2048"), Some(2048.0));
    }

    #[test]
    fn formats_sub_core_as_millicores() {
        assert_eq!(format_cpu(0.1), "100m");
    }

    #[test]
    fn formats_whole_cores() {
        assert_eq!(format_cpu(2.0), "2");
    }

    #[test]
    fn formats_memory_binary_units() {
        assert_eq!(format_memory(1024.0 * 1024.0 * 512.0), "512Mi");
        assert_eq!(format_memory(1024.0 * 1024.0 * 1024.0 * 2.0), "2Gi");
    }

    #[test]
    fn roundtrips_through_parse_and_format() {
        let original = "750m";
        let parsed = parse_cpu(original).unwrap();
        assert_eq!(format_cpu(parsed), "750m");
    }
}
