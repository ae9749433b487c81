// Chart config controller: the single owner of the live ChartConfig

use crate::address::{AddressFormat, AddressStore};
use crate::catalog::ColumnCatalog;
use crate::codec::{self, field};
use crate::data::{data_url, Row, RowSource};
use crate::error::RowSourceError;
use crate::model::{Axis, AxisType, ChartConfig, ColumnRef, MarkerType, ViewState};
use crate::render::{ChartRenderer, EmbedOptions};
use crate::spec::{build_render_spec, RenderSpec};
use log::{debug, info, warn};

/// Datasets with fewer rows than this never get a catalog
pub const MIN_ROWS: usize = 2;

/// Identifies an in-flight row fetch by the source URL that started it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    source_url: String,
}

impl LoadTicket {
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Array-shaped location to fetch rows from
    pub fn data_url(&self) -> String {
        data_url(&self.source_url)
    }
}

pub struct ChartController<S: AddressStore, R: ChartRenderer> {
    address: S,
    format: AddressFormat,
    renderer: R,
    options: EmbedOptions,
    default_source: String,
    config: ChartConfig,
    catalog: Option<ColumnCatalog>,
    view: ViewState,
    render_spec: Option<RenderSpec>,
    render_failure: Option<String>,
}

impl<S: AddressStore, R: ChartRenderer> ChartController<S, R> {
    /// Decode the initial configuration from the address store
    pub fn new(address: S, renderer: R) -> Self {
        let decoded = codec::decode_with_report(&address.read());
        Self {
            address,
            format: AddressFormat::default(),
            renderer,
            options: EmbedOptions::default(),
            default_source: String::new(),
            view: ViewState {
                config_revealed: decoded.has_state(),
            },
            config: decoded.config,
            catalog: None,
            render_spec: None,
            render_failure: None,
        }
    }

    pub fn with_format(mut self, format: AddressFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_options(mut self, options: EmbedOptions) -> Self {
        self.options = options;
        self
    }

    /// Source used whenever the address does not name one
    pub fn with_default_source(mut self, url: impl Into<String>) -> Self {
        self.default_source = url.into();
        if self.config.source_url.is_empty() {
            self.config.source_url = self.default_source.clone();
        }
        self
    }

    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    pub fn catalog(&self) -> Option<&ColumnCatalog> {
        self.catalog.as_ref()
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    pub fn options(&self) -> &EmbedOptions {
        &self.options
    }

    /// Specification of the chart currently shown, if any
    pub fn render_spec(&self) -> Option<&RenderSpec> {
        self.render_spec.as_ref()
    }

    /// Error from the most recent render attempt
    pub fn render_failure(&self) -> Option<&str> {
        self.render_failure.as_deref()
    }

    pub fn address(&self) -> &S {
        &self.address
    }

    pub fn address_mut(&mut self) -> &mut S {
        &mut self.address
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Show the configuration form
    pub fn reveal(&mut self) {
        self.view.config_revealed = true;
    }

    /// New dataset: everything but the URL goes back to defaults.
    /// A URL the address could not carry is refused and the config left as is.
    pub fn set_source_url(&mut self, url: impl Into<String>) {
        let url = url.into();
        let Some(url) = field::parse_url(&url) else {
            debug!("Refusing source URL '{}', it would not survive the address", url);
            return;
        };
        self.config = ChartConfig::for_source(url);
        self.catalog = None;
        self.commit();
    }

    pub fn set_marker_type(&mut self, marker_type: MarkerType) {
        self.config.marker_type = marker_type;
        self.commit();
    }

    /// Point an axis at a column; `None` clears color or size but is refused for X and Y
    pub fn set_axis_column(&mut self, axis: Axis, column: Option<ColumnRef>) {
        let column = match (column, &self.catalog) {
            (Some(c), Some(catalog)) if !catalog.contains(c) => {
                debug!(
                    "Column {} is outside the {}-column catalog, unsetting {:?}",
                    c.index(),
                    catalog.len(),
                    axis
                );
                None
            }
            (None, _) if axis.is_required() => {
                debug!("{:?} axis needs a column, keeping the current one", axis);
                return;
            }
            (column, _) => column,
        };
        *self.config.column_mut(axis) = column;
        self.commit();
    }

    pub fn set_axis_type(&mut self, axis: Axis, axis_type: AxisType) {
        let Some(slot) = self.config.axis_type_mut(axis) else {
            debug!("{:?} axis type is fixed, ignoring {:?}", axis, axis_type);
            return;
        };
        *slot = axis_type;
        self.commit();
    }

    pub fn swap_xy(&mut self) {
        self.config.swap_xy();
        self.commit();
    }

    /// Adopt the catalog of a freshly loaded dataset
    pub fn on_columns_loaded(&mut self, catalog: ColumnCatalog) {
        let previous = self.catalog.take();
        let x_was_unset = self.config.x_column.is_none();
        let y_was_unset = self.config.y_column.is_none();

        for axis in Axis::ALL {
            let slot = self.config.column_mut(axis);
            let Some(column) = *slot else {
                continue;
            };
            *slot = carry_over(column, previous.as_ref(), &catalog);
            match *slot {
                Some(moved) if moved != column => {
                    debug!("{:?} column moved from {} to {}", axis, column.index(), moved.index());
                }
                None => {
                    debug!("{:?} column {} is not in the new catalog", axis, column.index());
                }
                _ => {}
            }
        }

        if !catalog.is_empty() {
            if x_was_unset {
                self.config.x_column = Some(ColumnRef(0));
            }
            if y_was_unset {
                self.config.y_column = Some(ColumnRef(if catalog.len() > 1 { 1 } else { 0 }));
            }
        }

        self.catalog = Some(catalog);
        self.commit();
    }

    /// Start a fetch for the current source
    pub fn begin_load(&self) -> LoadTicket {
        LoadTicket {
            source_url: self.config.source_url.clone(),
        }
    }

    /// Finish a fetch; returns whether its rows were adopted
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<Row>, RowSourceError>,
    ) -> bool {
        if ticket.source_url != self.config.source_url {
            debug!("Discarding rows for stale source {}", ticket.source_url);
            return false;
        }
        match result {
            Err(e) => {
                warn!("Could not load rows for {}: {}", ticket.source_url, e);
                false
            }
            Ok(rows) if rows.len() < MIN_ROWS => {
                info!(
                    "{} has {} row(s), nothing to chart",
                    ticket.source_url,
                    rows.len()
                );
                false
            }
            Ok(rows) => {
                self.on_columns_loaded(ColumnCatalog::from_rows(&rows));
                true
            }
        }
    }

    /// Fetch and adopt rows for the current source in one step
    pub fn load(&mut self, source: &dyn RowSource) -> bool {
        let ticket = self.begin_load();
        let result = source.fetch_rows(&ticket.data_url());
        self.complete_load(ticket, result)
    }

    /// Re-read the address after external navigation (back/forward).
    /// Returns true when the source changed and rows must be loaded again.
    pub fn on_address_changed(&mut self) -> bool {
        let address = self.address.read();
        if address == self.format.wrap(&codec::encode(&self.config)) {
            return false;
        }

        let decoded = codec::decode_with_report(&address);
        if decoded.has_state() {
            self.view.config_revealed = true;
        }
        let mut config = decoded.config;
        if config.source_url.is_empty() {
            config.source_url = self.default_source.clone();
        }

        let source_changed = config.source_url != self.config.source_url;
        if source_changed {
            self.catalog = None;
        } else if let Some(catalog) = &self.catalog {
            for axis in Axis::ALL {
                let slot = config.column_mut(axis);
                if slot.is_some_and(|c| !catalog.contains(c)) {
                    *slot = None;
                }
            }
        }

        self.config = config;
        self.refresh_render();
        source_changed
    }

    /// Persist the config to the address, then redraw
    fn commit(&mut self) {
        let encoded = codec::encode(&self.config);
        self.address.write(&self.format.wrap(&encoded));
        self.refresh_render();
    }

    fn refresh_render(&mut self) {
        self.render_spec = self
            .catalog
            .as_ref()
            .and_then(|catalog| build_render_spec(&self.config, catalog));
        let Some(spec) = &self.render_spec else {
            self.render_failure = None;
            return;
        };
        match self.renderer.render(spec, &self.options) {
            Ok(()) => {
                self.render_failure = None;
                self.view.config_revealed = true;
            }
            Err(e) => {
                warn!("Chart render failed: {:#}", e);
                self.render_failure = Some(format!("{:#}", e));
            }
        }
    }
}

/// Where a set column lands in a new catalog: by name when the old catalog is known, else by index
fn carry_over(
    column: ColumnRef,
    previous: Option<&ColumnCatalog>,
    catalog: &ColumnCatalog,
) -> Option<ColumnRef> {
    match previous.and_then(|old| old.resolve(column)) {
        Some(name) => catalog.position(name),
        None if previous.is_some() => None,
        None => catalog.contains(column).then_some(column),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::MemoryAddressStore;
    use crate::data::StaticRowSource;
    use anyhow::{bail, Result};
    use serde_json::json;

    const SOURCE: &str = "rows.json";

    #[derive(Default)]
    struct RecordingRenderer {
        specs: Vec<RenderSpec>,
        fail: bool,
    }

    impl ChartRenderer for RecordingRenderer {
        fn render(&mut self, spec: &RenderSpec, _options: &EmbedOptions) -> Result<()> {
            if self.fail {
                bail!("surface unavailable");
            }
            self.specs.push(spec.clone());
            Ok(())
        }
    }

    type Controller = ChartController<MemoryAddressStore, RecordingRenderer>;

    fn rows(columns: &[&str], count: usize) -> Vec<Row> {
        (0..count)
            .map(|i| columns.iter().map(|c| (c.to_string(), json!(i))).collect())
            .collect()
    }

    fn nba_columns() -> Vec<&'static str> {
        vec![
            "rowid", "gameorder", "game_id", "lg_id", "_iscopy", "year_id", "date_game",
            "seasongame", "is_playoffs", "team_id", "fran_id", "pts", "elo_i", "elo_n",
            "win_equiv", "opp_id", "opp_fran", "opp_pts", "opp_elo_i", "opp_elo_n",
        ]
    }

    fn controller(address: &str) -> Controller {
        ChartController::new(MemoryAddressStore::new(address), RecordingRenderer::default())
            .with_default_source(SOURCE)
    }

    fn loaded(address: &str, columns: &[&str]) -> Controller {
        let mut controller = controller(address);
        let source = StaticRowSource::new(SOURCE, rows(columns, 3));
        assert!(controller.load(&source));
        controller
    }

    #[test]
    fn test_initial_state_from_empty_address() {
        let controller = controller("");
        assert_eq!(controller.config(), &ChartConfig::for_source(SOURCE));
        assert!(!controller.view().config_revealed);
        assert!(controller.render_spec().is_none());
        assert!(controller.address().history().is_empty());
    }

    #[test]
    fn test_address_with_state_reveals_config() {
        let controller = controller("?m=l");
        assert!(controller.view().config_revealed);
        assert_eq!(controller.config().marker_type, MarkerType::Line);
        assert_eq!(controller.config().source_url, SOURCE);
    }

    #[test]
    fn test_address_source_wins_over_default() {
        let controller = controller("?u=other.json");
        assert_eq!(controller.config().source_url, "other.json");
    }

    #[test]
    fn test_load_defaults_axes_and_renders() {
        let controller = loaded("", &["a", "b", "c"]);
        assert_eq!(controller.config().x_column, Some(ColumnRef(0)));
        assert_eq!(controller.config().y_column, Some(ColumnRef(1)));
        assert!(controller.view().config_revealed);
        let spec = controller.render_spec().unwrap();
        assert_eq!(spec.encoding.x.field, "a");
        assert_eq!(spec.encoding.y.field, "b");
        assert_eq!(spec.data.url, "rows.json?_shape=array");
        assert_eq!(controller.renderer().specs.len(), 1);
        assert_eq!(
            controller.address().read(),
            "?u=rows.json&m=b&x=0&xt=c&y=1&yt=c&ct=c"
        );
    }

    #[test]
    fn test_single_column_catalog_defaults_both_axes_to_it() {
        let controller = loaded("", &["only"]);
        assert_eq!(controller.config().x_column, Some(ColumnRef(0)));
        assert_eq!(controller.config().y_column, Some(ColumnRef(0)));
    }

    #[test]
    fn test_example_address_through_controller() {
        let controller = loaded("?m=b&x=2&xt=c&y=11", &nba_columns());
        let spec = controller.render_spec().unwrap();
        assert_eq!(spec.mark, "bar");
        assert_eq!(spec.encoding.x.field, "game_id");
        assert_eq!(spec.encoding.x.type_, "ordinal");
        assert!(!spec.encoding.x.bin);
        assert_eq!(spec.encoding.y.field, "pts");
        assert_eq!(spec.encoding.y.type_, "ordinal");
        assert!(spec.encoding.color.is_none());
        assert!(spec.encoding.size.is_none());
    }

    #[test]
    fn test_catalog_invalidation_clears_missing_column() {
        let controller = loaded("?x=11", &["a", "b"]);
        assert_eq!(controller.config().x_column, None);
        assert_eq!(controller.config().y_column, Some(ColumnRef(1)));
        assert!(controller.render_spec().is_none());
    }

    #[test]
    fn test_reload_follows_columns_by_name() {
        let mut controller = loaded("?x=2&y=0", &["a", "b", "c"]);
        assert_eq!(controller.render_spec().unwrap().encoding.x.field, "c");

        let ticket = controller.begin_load();
        assert!(controller.complete_load(ticket, Ok(rows(&["c", "a", "b"], 2))));
        assert_eq!(controller.config().x_column, Some(ColumnRef(0)));
        assert_eq!(controller.config().y_column, Some(ColumnRef(1)));
        let spec = controller.render_spec().unwrap();
        assert_eq!(spec.encoding.x.field, "c");
        assert_eq!(spec.encoding.y.field, "a");
    }

    #[test]
    fn test_reload_drops_renamed_column() {
        let mut controller = loaded("?c=2", &["a", "b", "c"]);
        let ticket = controller.begin_load();
        controller.complete_load(ticket, Ok(rows(&["a", "b", "z"], 2)));
        assert_eq!(controller.config().color_column, None);
    }

    #[test]
    fn test_swap_is_self_inverse() {
        let mut controller = loaded("?x=2&xt=n&y=0&yt=g", &["a", "b", "c"]);
        let before = controller.config().clone();
        controller.swap_xy();
        assert_eq!(controller.config().x_column, Some(ColumnRef(0)));
        assert_eq!(controller.config().x_type, AxisType::Category);
        assert_eq!(controller.config().y_column, Some(ColumnRef(2)));
        assert_eq!(controller.config().y_type, AxisType::Numeric);
        controller.swap_xy();
        assert_eq!(controller.config(), &before);
    }

    #[test]
    fn test_set_source_url_resets_everything_else() {
        let mut controller = loaded("?m=s&yt=n", &["a", "b"]);
        controller.set_source_url("next.json");
        assert_eq!(controller.config(), &ChartConfig::for_source("next.json"));
        assert!(controller.catalog().is_none());
        assert!(controller.render_spec().is_none());
        assert_eq!(controller.address().read(), "?u=next.json&m=b&xt=c&yt=c&ct=c");
    }

    #[test]
    fn test_set_source_url_survives_the_address() {
        let mut controller = loaded("?m=s", &["a", "b"]);
        controller.set_source_url("https://example.com/db/t.json?_size=max&_sort=pts");
        let decoded = codec::decode(&controller.address().read());
        assert_eq!(&decoded, controller.config());
        assert_eq!(decoded.source_url, "https://example.com/db/t.json?_size=max&_sort=pts");
    }

    #[test]
    fn test_set_source_url_refuses_unencodable_urls() {
        let mut controller = loaded("?m=s", &["a", "b"]);
        let before = controller.config().clone();
        let history = controller.address().history().len();

        for url in ["my rows.json", "", "http://[::1", "rows\u{7}.json"] {
            controller.set_source_url(url);
            assert_eq!(controller.config(), &before, "accepted {:?}", url);
        }
        assert!(controller.catalog().is_some());
        assert_eq!(controller.address().history().len(), history);
        assert_eq!(&codec::decode(&controller.address().read()), controller.config());
    }

    #[test]
    fn test_stale_load_is_discarded() {
        let mut controller = controller("");
        let stale = controller.begin_load();
        controller.set_source_url("next.json");
        assert!(!controller.complete_load(stale, Ok(rows(&["a", "b"], 3))));
        assert!(controller.catalog().is_none());

        let fresh = controller.begin_load();
        assert_eq!(fresh.source_url(), "next.json");
        assert!(controller.complete_load(fresh, Ok(rows(&["a", "b"], 3))));
        assert!(controller.render_spec().is_some());
    }

    #[test]
    fn test_fetch_error_leaves_chart_unrendered() {
        let mut controller = controller("");
        let ticket = controller.begin_load();
        let error = RowSourceError::Unsupported(ticket.data_url());
        assert!(!controller.complete_load(ticket, Err(error)));
        assert!(controller.catalog().is_none());
        assert!(controller.render_spec().is_none());
        assert!(controller.renderer().specs.is_empty());
    }

    #[test]
    fn test_too_few_rows_yields_no_catalog() {
        let mut controller = controller("");
        let ticket = controller.begin_load();
        assert!(!controller.complete_load(ticket, Ok(rows(&["a", "b"], 1))));
        assert!(controller.catalog().is_none());
    }

    #[test]
    fn test_set_axis_column() {
        let mut controller = loaded("", &["a", "b", "c"]);

        controller.set_axis_column(Axis::Color, Some(ColumnRef(2)));
        assert_eq!(controller.config().color_column, Some(ColumnRef(2)));
        assert_eq!(
            controller.render_spec().unwrap().encoding.color.as_ref().unwrap().field,
            "c"
        );

        controller.set_axis_column(Axis::Color, None);
        assert_eq!(controller.config().color_column, None);

        controller.set_axis_column(Axis::X, None);
        assert_eq!(controller.config().x_column, Some(ColumnRef(0)));

        controller.set_axis_column(Axis::Size, Some(ColumnRef(9)));
        assert_eq!(controller.config().size_column, None);

        controller.set_axis_column(Axis::Y, Some(ColumnRef(9)));
        assert_eq!(controller.config().y_column, None);
        assert!(controller.render_spec().is_none());
    }

    #[test]
    fn test_set_axis_type() {
        let mut controller = loaded("", &["a", "b"]);
        controller.set_axis_type(Axis::X, AxisType::NumericBinned);
        let spec = controller.render_spec().unwrap();
        assert_eq!(spec.encoding.x.type_, "quantitative");
        assert!(spec.encoding.x.bin);

        let history = controller.address().history().len();
        let before = controller.config().clone();
        controller.set_axis_type(Axis::Size, AxisType::Category);
        assert_eq!(controller.config(), &before);
        assert_eq!(controller.address().history().len(), history);
    }

    #[test]
    fn test_every_edit_round_trips_through_address() {
        let mut controller = loaded("", &nba_columns());
        controller.set_marker_type(MarkerType::Scatter);
        controller.set_axis_column(Axis::X, Some(ColumnRef(17)));
        controller.set_axis_type(Axis::X, AxisType::Numeric);
        controller.set_axis_column(Axis::Color, Some(ColumnRef(9)));
        controller.set_axis_type(Axis::Color, AxisType::Category);
        controller.set_axis_column(Axis::Size, Some(ColumnRef(11)));
        controller.swap_xy();

        let address = controller.address().read();
        assert!(address.starts_with('?'));
        assert_eq!(&codec::decode(&address), controller.config());
    }

    #[test]
    fn test_fragment_format() {
        let mut controller = controller("#m=l").with_format(AddressFormat::Fragment);
        controller.set_marker_type(MarkerType::Scatter);
        assert!(controller.address().read().starts_with("#u=rows.json&m=s"));
    }

    #[test]
    fn test_back_navigation_restores_previous_chart() {
        let mut controller = loaded("", &["a", "b", "c"]);
        controller.set_marker_type(MarkerType::Line);
        assert_eq!(controller.render_spec().unwrap().mark, "line");

        assert!(controller.address_mut().back());
        assert!(!controller.on_address_changed());
        assert_eq!(controller.config().marker_type, MarkerType::Bar);
        assert_eq!(controller.render_spec().unwrap().mark, "bar");
    }

    #[test]
    fn test_address_change_to_other_source_needs_load() {
        let mut controller = loaded("", &["a", "b"]);
        controller.address_mut().navigate("?u=other.json&x=1&y=0");
        assert!(controller.on_address_changed());
        assert!(controller.catalog().is_none());
        assert!(controller.render_spec().is_none());
        assert_eq!(controller.config().x_column, Some(ColumnRef(1)));

        let source = StaticRowSource::new("other.json", rows(&["p", "q"], 2));
        assert!(controller.load(&source));
        assert_eq!(controller.render_spec().unwrap().encoding.x.field, "q");
    }

    #[test]
    fn test_address_change_validates_against_catalog() {
        let mut controller = loaded("", &["a", "b"]);
        controller.address_mut().navigate("?x=1&y=7");
        assert!(!controller.on_address_changed());
        assert_eq!(controller.config().x_column, Some(ColumnRef(1)));
        assert_eq!(controller.config().y_column, None);
    }

    #[test]
    fn test_unchanged_address_is_a_no_op() {
        let mut controller = loaded("", &["a", "b"]);
        let renders = controller.renderer().specs.len();
        assert!(!controller.on_address_changed());
        assert_eq!(controller.renderer().specs.len(), renders);
    }

    #[test]
    fn test_reveal() {
        let mut controller = controller("");
        assert!(!controller.view().config_revealed);
        controller.reveal();
        assert!(controller.view().config_revealed);
    }

    #[test]
    fn test_render_failure_is_remembered() {
        let mut controller = ChartController::new(
            MemoryAddressStore::new(""),
            RecordingRenderer {
                fail: true,
                ..Default::default()
            },
        )
        .with_default_source(SOURCE);
        let source = StaticRowSource::new(SOURCE, rows(&["a", "b"], 2));
        assert!(controller.load(&source));
        assert_eq!(controller.render_failure(), Some("surface unavailable"));
        assert!(!controller.view().config_revealed);
        assert!(controller.render_spec().is_some());

        controller.renderer_mut().fail = false;
        controller.set_marker_type(MarkerType::Line);
        assert!(controller.render_failure().is_none());
    }
}
