// Bidirectional label <-> short code tables for closed enumerations

/// A fixed table of `(value, human label, short code)` entries
#[derive(Debug)]
pub struct CodeTable<T: 'static> {
    entries: &'static [(T, &'static str, &'static str)],
}

impl<T: Copy + PartialEq + 'static> CodeTable<T> {
    pub const fn new(entries: &'static [(T, &'static str, &'static str)]) -> Self {
        Self { entries }
    }

    pub fn code(&self, value: T) -> &'static str {
        self.entry(value).map(|(_, _, code)| *code).unwrap_or_default()
    }

    pub fn label(&self, value: T) -> &'static str {
        self.entry(value).map(|(_, label, _)| *label).unwrap_or_default()
    }

    pub fn from_code(&self, code: &str) -> Option<T> {
        self.entries
            .iter()
            .find(|(_, _, c)| *c == code)
            .map(|(value, _, _)| *value)
    }

    pub fn from_label(&self, label: &str) -> Option<T> {
        self.entries
            .iter()
            .find(|(_, l, _)| *l == label)
            .map(|(value, _, _)| *value)
    }

    pub fn values(&self) -> impl Iterator<Item = T> + '_ {
        self.entries.iter().map(|(value, _, _)| *value)
    }

    fn entry(&self, value: T) -> Option<&(T, &'static str, &'static str)> {
        self.entries.iter().find(|(v, _, _)| *v == value)
    }
}

/// Enumerations with a code table get label/code conversions for free
pub trait Coded: Copy + PartialEq + Default + 'static {
    fn table() -> &'static CodeTable<Self>;

    fn code(self) -> &'static str {
        Self::table().code(self)
    }

    fn label(self) -> &'static str {
        Self::table().label(self)
    }

    /// Unknown codes fall back to the default member
    fn from_code_or_default(code: &str) -> Self {
        Self::table().from_code(code).unwrap_or_default()
    }

    /// Accepts either the short code or the human label
    fn parse_loose(text: &str) -> Option<Self> {
        let table = Self::table();
        table
            .from_code(text)
            .or_else(|| table.from_label(text))
            .or_else(|| {
                table
                    .values()
                    .find(|v| table.label(*v).eq_ignore_ascii_case(text))
            })
    }

    fn all() -> Vec<Self> {
        Self::table().values().collect()
    }
}
