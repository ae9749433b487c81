// Page address abstraction (query string or fragment)

/// Where chart state lives in the page address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressFormat {
    #[default]
    Query,
    Fragment,
}

impl AddressFormat {
    pub fn marker(self) -> char {
        match self {
            AddressFormat::Query => '?',
            AddressFormat::Fragment => '#',
        }
    }

    /// Prefix an encoded state string with this format's marker
    pub fn wrap(self, encoded: &str) -> String {
        format!("{}{}", self.marker(), encoded)
    }

    /// Pull this format's part out of a full page URL (including its marker)
    pub fn extract(self, page_url: &str) -> String {
        let (before_fragment, fragment) = match page_url.split_once('#') {
            Some((before, fragment)) => (before, Some(fragment)),
            None => (page_url, None),
        };
        match self {
            AddressFormat::Fragment => fragment.map(|f| format!("#{}", f)).unwrap_or_default(),
            AddressFormat::Query => before_fragment
                .split_once('?')
                .map(|(_, query)| format!("?{}", query))
                .unwrap_or_default(),
        }
    }
}

/// Read/write access to the page address holding chart state
pub trait AddressStore {
    fn read(&self) -> String;
    fn write(&mut self, address: &str);
}

/// Address kept in memory, with a history of every write
#[derive(Debug, Clone, Default)]
pub struct MemoryAddressStore {
    address: String,
    history: Vec<String>,
}

impl MemoryAddressStore {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Step back to the previous address, as a browser back button would
    pub fn back(&mut self) -> bool {
        if self.history.len() < 2 {
            return false;
        }
        self.history.pop();
        if let Some(previous) = self.history.last() {
            self.address = previous.clone();
        }
        true
    }

    /// Replace the address without recording history (external navigation)
    pub fn navigate(&mut self, address: impl Into<String>) {
        self.address = address.into();
    }
}

impl AddressStore for MemoryAddressStore {
    fn read(&self) -> String {
        self.address.clone()
    }

    fn write(&mut self, address: &str) {
        if self.address != address {
            self.history.push(address.to_string());
        }
        self.address = address.to_string();
    }
}

impl<S: AddressStore + ?Sized> AddressStore for &mut S {
    fn read(&self) -> String {
        (**self).read()
    }

    fn write(&mut self, address: &str) {
        (**self).write(address)
    }
}

/// Host, port and path of a URL, ignoring scheme, query and fragment
fn host_and_path(url: &str) -> Option<&str> {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let (_, rest) = without_fragment.split_once("://")?;
    Some(rest.split('?').next().unwrap_or(rest))
}

/// Whether a link targets the same host and path as the current page
pub fn matches_current_host_and_path(link: &str, page_url: &str) -> bool {
    match (host_and_path(link), host_and_path(page_url)) {
        (Some(link), Some(page)) => link == page,
        _ => false,
    }
}

/// Carry the current fragment over to a same-page link (so form submits keep chart state)
pub fn propagate_fragment(link: &str, page_url: &str) -> Option<String> {
    let fragment = AddressFormat::Fragment.extract(page_url);
    if fragment.len() <= 1 || !matches_current_host_and_path(link, page_url) {
        return None;
    }
    let base = link.split('#').next().unwrap_or(link);
    Some(format!("{}{}", base, fragment))
}
