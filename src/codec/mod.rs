// State codec: ChartConfig <-> compact address string

pub mod field;
pub mod lexer;
pub mod table;

use crate::model::{AxisType, ChartConfig, ColumnRef, MarkerType};
use field::FieldKind;
use log::debug;
use table::Coded;

/// Result of decoding, with how many pairs were actually applied
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Decoded {
    pub config: ChartConfig,
    pub applied: usize,
}

impl Decoded {
    /// Whether the address carried any chart state at all
    pub fn has_state(&self) -> bool {
        self.applied > 0
    }
}

/// Encode every defined field as `key=value`, joined with `&`, without a leading marker
pub fn encode(config: &ChartConfig) -> String {
    let mut pairs: Vec<(&str, String)> = Vec::new();

    if !config.source_url.is_empty() {
        pairs.push(("u", config.source_url.clone()));
    }
    pairs.push(("m", config.marker_type.code().to_string()));
    if let Some(x) = config.x_column {
        pairs.push(("x", x.index().to_string()));
    }
    pairs.push(("xt", config.x_type.code().to_string()));
    if let Some(y) = config.y_column {
        pairs.push(("y", y.index().to_string()));
    }
    pairs.push(("yt", config.y_type.code().to_string()));
    if let Some(c) = config.color_column {
        pairs.push(("c", c.index().to_string()));
    }
    pairs.push(("ct", config.color_type.code().to_string()));
    if let Some(s) = config.size_column {
        pairs.push(("s", s.index().to_string()));
    }

    pairs
        .into_iter()
        .map(|(key, value)| format!("{}={}", key, lexer::percent_encode(&value)))
        .collect::<Vec<_>>()
        .join(&lexer::DELIMITER.to_string())
}

/// Decode an address; never fails, unusable input falls back to defaults
pub fn decode(address: &str) -> ChartConfig {
    decode_with_report(address).config
}

pub fn decode_with_report(address: &str) -> Decoded {
    let mut decoded = Decoded::default();

    for bit in lexer::split_bits(address) {
        let Some((key, value)) = lexer::decode_pair(bit) else {
            debug!("Skipping malformed address pair '{}'", bit);
            continue;
        };
        let Some((key, kind)) = field::lookup(&key) else {
            debug!("Ignoring unknown address key '{}'", key);
            continue;
        };
        if apply_field(&mut decoded.config, key, kind, &value) {
            decoded.applied += 1;
        } else {
            debug!("Discarding invalid value '{}' for address key '{}'", value, key);
        }
    }

    decoded
}

/// Apply one typed field; returns false (leaving the default) when the value does not parse
fn apply_field(config: &mut ChartConfig, key: &str, kind: FieldKind, value: &str) -> bool {
    match kind {
        FieldKind::Url => match field::parse_url(value) {
            Some(url) => {
                config.source_url = url;
                true
            }
            None => false,
        },
        FieldKind::Enum => {
            let known = match key {
                "m" => MarkerType::table().from_code(value).is_some(),
                _ => AxisType::table().from_code(value).is_some(),
            };
            match key {
                "m" => config.marker_type = field::parse_enum(value),
                "xt" => config.x_type = field::parse_enum(value),
                "yt" => config.y_type = field::parse_enum(value),
                "ct" => config.color_type = field::parse_enum(value),
                _ => return false,
            }
            known
        }
        FieldKind::Integer => {
            let parsed = field::parse_integer(value).map(ColumnRef);
            match key {
                "x" => config.x_column = parsed,
                "y" => config.y_column = parsed,
                _ => return false,
            }
            parsed.is_some()
        }
        FieldKind::OptionalInteger => {
            let parsed = field::parse_optional_integer(value);
            let column = parsed.flatten().map(ColumnRef);
            match key {
                "c" => config.color_column = column,
                "s" => config.size_column = column,
                _ => return false,
            }
            parsed.is_some()
        }
    }
}
