// Renderer-ready Vega-Lite specification derived from a ChartConfig

use crate::catalog::ColumnCatalog;
use crate::data::data_url;
use crate::model::{AxisType, ChartConfig};
use serde::{Deserialize, Serialize};

/// Name of the computed tooltip field
pub const TOOLTIP_FIELD: &str = "_tooltip_summary";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSpec {
    pub data: DataRef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transform: Vec<CalculateTransform>,
    pub mark: String,
    pub encoding: Encoding,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRef {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculateTransform {
    pub calculate: String,
    #[serde(rename = "as")]
    pub as_: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encoding {
    pub x: PositionChannel,
    pub y: PositionChannel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Channel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Channel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<Channel>,
}

/// X/Y channel; `bin` is always written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionChannel {
    pub field: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub bin: bool,
}

impl PositionChannel {
    fn new(field: &str, axis_type: AxisType) -> Self {
        Self {
            field: field.to_string(),
            type_: axis_type.vega_type().to_string(),
            bin: axis_type.is_binned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub field: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub bin: bool,
}

impl Channel {
    fn new(field: &str, type_: &str) -> Self {
        Self {
            field: field.to_string(),
            type_: type_.to_string(),
            bin: false,
        }
    }
}

/// Build the render specification, or `None` until both X and Y resolve against the catalog
pub fn build_render_spec(config: &ChartConfig, catalog: &ColumnCatalog) -> Option<RenderSpec> {
    if catalog.is_empty() {
        return None;
    }
    let x_field = catalog.resolve(config.x_column?)?;
    let y_field = catalog.resolve(config.y_column?)?;
    let color_field = config.color_column.and_then(|c| catalog.resolve(c));
    let size_field = config.size_column.and_then(|s| catalog.resolve(s));

    let color = color_field.map(|field| Channel {
        bin: config.color_type.is_binned(),
        ..Channel::new(field, config.color_type.vega_type())
    });
    let size = size_field.map(|field| Channel::new(field, "quantitative"));

    let mut summarised = vec![x_field, y_field];
    summarised.extend(color_field);
    summarised.extend(size_field);

    Some(RenderSpec {
        data: DataRef {
            url: data_url(&config.source_url),
        },
        transform: vec![CalculateTransform {
            calculate: tooltip_expression(&summarised),
            as_: TOOLTIP_FIELD.to_string(),
        }],
        mark: config.marker_type.mark().to_string(),
        encoding: Encoding {
            x: PositionChannel::new(x_field, config.x_type),
            y: PositionChannel::new(y_field, config.y_type),
            color,
            size,
            tooltip: Some(Channel::new(TOOLTIP_FIELD, "ordinal")),
        },
        width: Some("container".to_string()),
    })
}

/// Escape quote characters so a name cannot terminate a quoted expression literal
pub fn escape_string(s: &str) -> String {
    s.replace('"', "\\x22").replace('\'', "\\x27")
}

/// `'a: ' + datum['a'] + ', b: ' + datum['b']` over every encoded column
pub fn tooltip_expression(fields: &[&str]) -> String {
    fields
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let escaped = escape_string(field);
            let separator = if i == 0 { "" } else { ", " };
            format!("'{}{}: ' + datum['{}']", separator, escaped, escaped)
        })
        .collect::<Vec<_>>()
        .join(" + ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnRef, MarkerType};
    use serde_json::json;

    fn nba_catalog() -> ColumnCatalog {
        ColumnCatalog::new(
            [
                "rowid", "gameorder", "game_id", "lg_id", "_iscopy", "year_id", "date_game",
                "seasongame", "is_playoffs", "team_id", "fran_id", "pts", "elo_i", "elo_n",
                "win_equiv", "opp_id", "opp_fran", "opp_pts", "opp_elo_i", "opp_elo_n",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        )
    }

    #[test]
    fn test_example_address_end_to_end() {
        let catalog = nba_catalog();
        assert_eq!(catalog.len(), 20);
        let config = crate::codec::decode("?m=b&x=2&xt=c&y=11");
        let spec = build_render_spec(&config, &catalog).unwrap();

        assert_eq!(spec.mark, "bar");
        assert_eq!(
            spec.encoding.x,
            PositionChannel { field: "game_id".into(), type_: "ordinal".into(), bin: false }
        );
        assert_eq!(
            spec.encoding.y,
            PositionChannel { field: "pts".into(), type_: "ordinal".into(), bin: false }
        );
        assert!(spec.encoding.color.is_none());
        assert!(spec.encoding.size.is_none());

        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["encoding"]["x"], json!({"field": "game_id", "type": "ordinal", "bin": false}));
        assert!(value["encoding"].get("color").is_none());
        assert!(value["encoding"].get("size").is_none());
    }

    #[test]
    fn test_no_render_with_empty_catalog() {
        let config = ChartConfig {
            marker_type: MarkerType::Line,
            x_type: AxisType::Numeric,
            y_type: AxisType::Numeric,
            ..Default::default()
        };
        assert!(build_render_spec(&config, &ColumnCatalog::default()).is_none());

        let with_refs = ChartConfig {
            x_column: Some(ColumnRef(0)),
            y_column: Some(ColumnRef(1)),
            ..config
        };
        assert!(build_render_spec(&with_refs, &ColumnCatalog::default()).is_none());
    }

    #[test]
    fn test_no_render_with_unresolved_column() {
        let config = ChartConfig {
            x_column: Some(ColumnRef(2)),
            y_column: Some(ColumnRef(40)),
            ..Default::default()
        };
        assert!(build_render_spec(&config, &nba_catalog()).is_none());
        let missing_y = ChartConfig { y_column: None, ..config };
        assert!(build_render_spec(&missing_y, &nba_catalog()).is_none());
    }

    #[test]
    fn test_binned_and_temporal_types() {
        let config = ChartConfig {
            x_column: Some(ColumnRef(11)),
            x_type: AxisType::NumericBinned,
            y_column: Some(ColumnRef(6)),
            y_type: AxisType::DateTime,
            ..Default::default()
        };
        let spec = build_render_spec(&config, &nba_catalog()).unwrap();
        assert_eq!(spec.encoding.x.type_, "quantitative");
        assert!(spec.encoding.x.bin);
        assert_eq!(spec.encoding.y.type_, "temporal");
        assert!(!spec.encoding.y.bin);
    }

    #[test]
    fn test_color_and_size_channels() {
        let config = ChartConfig {
            marker_type: MarkerType::Scatter,
            x_column: Some(ColumnRef(17)),
            x_type: AxisType::Numeric,
            y_column: Some(ColumnRef(11)),
            y_type: AxisType::Numeric,
            color_column: Some(ColumnRef(9)),
            color_type: AxisType::Category,
            size_column: Some(ColumnRef(17)),
            ..Default::default()
        };
        let spec = build_render_spec(&config, &nba_catalog()).unwrap();
        assert_eq!(spec.mark, "circle");
        assert_eq!(spec.encoding.color, Some(Channel::new("team_id", "nominal")));
        assert_eq!(spec.encoding.size, Some(Channel::new("opp_pts", "quantitative")));

        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["encoding"]["color"], json!({"field": "team_id", "type": "nominal"}));
        assert_eq!(
            spec.transform[0].calculate,
            "'opp_pts: ' + datum['opp_pts'] + ', pts: ' + datum['pts'] + ', team_id: ' + datum['team_id'] + ', opp_pts: ' + datum['opp_pts']"
        );
    }

    #[test]
    fn test_unresolved_optional_channel_is_omitted() {
        let config = ChartConfig {
            x_column: Some(ColumnRef(0)),
            y_column: Some(ColumnRef(1)),
            color_column: Some(ColumnRef(99)),
            ..Default::default()
        };
        let spec = build_render_spec(&config, &nba_catalog()).unwrap();
        assert!(spec.encoding.color.is_none());
    }

    #[test]
    fn test_data_url_and_tooltip() {
        let config = ChartConfig {
            source_url: "https://example.com/db/games.json".to_string(),
            x_column: Some(ColumnRef(2)),
            y_column: Some(ColumnRef(11)),
            ..Default::default()
        };
        let spec = build_render_spec(&config, &nba_catalog()).unwrap();
        assert_eq!(spec.data.url, "https://example.com/db/games.json?_shape=array");
        assert_eq!(spec.transform[0].as_, TOOLTIP_FIELD);
        assert_eq!(
            spec.encoding.tooltip,
            Some(Channel::new(TOOLTIP_FIELD, "ordinal"))
        );
        assert_eq!(spec.width.as_deref(), Some("container"));

        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["transform"][0]["as"], TOOLTIP_FIELD);
    }

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string(r#"say "hi""#), r#"say \x22hi\x22"#);
        assert_eq!(escape_string("it's"), r"it\x27s");
        assert_eq!(escape_string("plain"), "plain");
    }

    #[test]
    fn test_tooltip_escapes_quotes() {
        let expr = tooltip_expression(&[r#"a"b"#, "c'd"]);
        assert_eq!(
            expr,
            r#"'a\x22b: ' + datum['a\x22b'] + ', c\x27d: ' + datum['c\x27d']"#
        );
        // No raw quote from a column name survives inside the expression
        assert!(!expr.contains(r#"a"b"#));
        assert!(!expr.contains("c'd"));
    }
}
