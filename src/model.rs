// Chart configuration model

use crate::codec::table::{CodeTable, Coded};

/// Geometric primitive used for every row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MarkerType {
    #[default]
    Bar,
    Line,
    Scatter,
}

static MARKER_TABLE: CodeTable<MarkerType> = CodeTable::new(&[
    (MarkerType::Bar, "Bar", "b"),
    (MarkerType::Line, "Line", "l"),
    (MarkerType::Scatter, "Scatter", "s"),
]);

impl Coded for MarkerType {
    fn table() -> &'static CodeTable<Self> {
        &MARKER_TABLE
    }
}

impl MarkerType {
    /// Renderer-level mark kind
    pub fn mark(self) -> &'static str {
        match self {
            MarkerType::Bar => "bar",
            MarkerType::Line => "line",
            MarkerType::Scatter => "circle",
        }
    }
}

/// User-facing semantic type of an axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AxisType {
    Numeric,
    NumericBinned,
    DateTime,
    DateTimeBinned,
    #[default]
    Label,
    Category,
}

static AXIS_TYPE_TABLE: CodeTable<AxisType> = CodeTable::new(&[
    (AxisType::Numeric, "Numeric", "n"),
    (AxisType::NumericBinned, "Numeric, binned", "nb"),
    (AxisType::DateTime, "Date/time", "t"),
    (AxisType::DateTimeBinned, "Date/time, binned", "tb"),
    (AxisType::Label, "Label", "c"),
    (AxisType::Category, "Category", "g"),
]);

impl Coded for AxisType {
    fn table() -> &'static CodeTable<Self> {
        &AXIS_TYPE_TABLE
    }
}

impl AxisType {
    /// Vega-Lite semantic type (quantitative, temporal, ordinal, nominal)
    pub fn vega_type(self) -> &'static str {
        match self {
            AxisType::Numeric | AxisType::NumericBinned => "quantitative",
            AxisType::DateTime | AxisType::DateTimeBinned => "temporal",
            AxisType::Label => "ordinal",
            AxisType::Category => "nominal",
        }
    }

    pub fn is_binned(self) -> bool {
        self.label().ends_with("binned")
    }
}

/// Position of a column within the currently loaded catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnRef(pub usize);

impl ColumnRef {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Visual channel a column can be mapped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Color,
    Size,
}

impl Axis {
    pub const ALL: [Axis; 4] = [Axis::X, Axis::Y, Axis::Color, Axis::Size];

    /// X and Y must always point at a column; color and size may be "none"
    pub fn is_required(self) -> bool {
        matches!(self, Axis::X | Axis::Y)
    }
}

/// The persisted unit of chart state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChartConfig {
    pub source_url: String,
    pub marker_type: MarkerType,
    pub x_column: Option<ColumnRef>,
    pub x_type: AxisType,
    pub y_column: Option<ColumnRef>,
    pub y_type: AxisType,
    pub color_column: Option<ColumnRef>,
    pub color_type: AxisType,
    pub size_column: Option<ColumnRef>,
}

impl ChartConfig {
    /// A fresh configuration for a source; everything else defaulted
    pub fn for_source(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            ..Default::default()
        }
    }

    pub fn column(&self, axis: Axis) -> Option<ColumnRef> {
        match axis {
            Axis::X => self.x_column,
            Axis::Y => self.y_column,
            Axis::Color => self.color_column,
            Axis::Size => self.size_column,
        }
    }

    pub(crate) fn column_mut(&mut self, axis: Axis) -> &mut Option<ColumnRef> {
        match axis {
            Axis::X => &mut self.x_column,
            Axis::Y => &mut self.y_column,
            Axis::Color => &mut self.color_column,
            Axis::Size => &mut self.size_column,
        }
    }

    /// Axis type; size is always quantitative and has no user-settable type
    pub fn axis_type(&self, axis: Axis) -> Option<AxisType> {
        match axis {
            Axis::X => Some(self.x_type),
            Axis::Y => Some(self.y_type),
            Axis::Color => Some(self.color_type),
            Axis::Size => None,
        }
    }

    pub(crate) fn axis_type_mut(&mut self, axis: Axis) -> Option<&mut AxisType> {
        match axis {
            Axis::X => Some(&mut self.x_type),
            Axis::Y => Some(&mut self.y_type),
            Axis::Color => Some(&mut self.color_type),
            Axis::Size => None,
        }
    }

    /// Exchange (x column, x type) with (y column, y type) in one step
    pub(crate) fn swap_xy(&mut self) {
        std::mem::swap(&mut self.x_column, &mut self.y_column);
        std::mem::swap(&mut self.x_type, &mut self.y_type);
    }
}

/// Transient UI state, kept apart from the persisted configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewState {
    pub config_revealed: bool,
}
