//! Menu items and browse controls.

/// Selectors and titles of the browse controls, plus whether each is on.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BrowseConfig {
    pub next_selector: String,
    pub next_title: String,
    pub next_available: bool,
    pub previous_selector: String,
    pub previous_title: String,
    pub previous_available: bool,
}

impl Default for BrowseConfig {
    fn default() -> Self {
        Self {
            next_selector: "11".to_string(),
            next_title: "next".to_string(),
            next_available: false,
            previous_selector: "22".to_string(),
            previous_title: "previous".to_string(),
            previous_available: false,
        }
    }
}

/// Pending menu for the next render.
///
/// Items render as `selector:title` lines. Browse controls are appended only
/// when the page count and index call for them.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Menu {
    items: Vec<(String, String)>,
    browse: BrowseConfig,
    defaults: BrowseConfig,
    page_count: usize,
    page_index: usize,
    sink: bool,
}

impl Default for Menu {
    fn default() -> Self {
        Self::new(BrowseConfig::default())
    }
}

/// Bytes `s` adds to a page, counting the line break that joins it.
fn cost(s: &str) -> usize {
    if s.is_empty() { 0 } else { s.len() + 1 }
}

impl Menu {
    /// Creates an empty menu; `defaults` is restored on every [`reset`](Self::reset).
    pub fn new(defaults: BrowseConfig) -> Self {
        Self {
            items: Vec::new(),
            browse: defaults.clone(),
            defaults,
            page_count: 0,
            page_index: 0,
            sink: false,
        }
    }

    pub fn put(&mut self, selector: &str, title: &str) {
        self.items.push((selector.to_string(), title.to_string()));
    }

    /// Enables the "next page" control.
    pub fn set_next(&mut self, selector: &str, title: &str) {
        self.browse.next_selector = selector.to_string();
        self.browse.next_title = title.to_string();
        self.browse.next_available = true;
    }

    /// Enables the "previous page" control.
    pub fn set_previous(&mut self, selector: &str, title: &str) {
        self.browse.previous_selector = selector.to_string();
        self.browse.previous_title = title.to_string();
        self.browse.previous_available = true;
    }

    pub fn browse(&self) -> &BrowseConfig {
        &self.browse
    }

    /// Paginates the items themselves instead of a mapped value.
    pub fn set_sink(&mut self) {
        self.sink = true;
    }

    pub fn is_sink(&self) -> bool {
        self.sink
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[(String, String)] {
        &self.items
    }

    /// Item lines in `selector:title` form.
    pub fn item_lines(&self) -> Vec<String> {
        self.items.iter().map(|(s, t)| format!("{s}:{t}")).collect()
    }

    /// Sets the page position that decides which browse controls show.
    pub fn set_page(&mut self, count: usize, index: usize) {
        self.page_count = count;
        self.page_index = index;
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    fn browse_lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.page_count < 2 {
            return out;
        }
        let b = &self.browse;
        if b.next_available && self.page_index + 1 < self.page_count {
            out.push(format!("{}:{}", b.next_selector, b.next_title));
        }
        if b.previous_available && self.page_index > 0 {
            out.push(format!("{}:{}", b.previous_selector, b.previous_title));
        }
        out
    }

    /// Renders the items followed by the browse controls.
    pub fn render(&self) -> String {
        self.render_with(&self.item_lines())
    }

    /// Renders `lines` in place of the items, with this menu's browse controls.
    pub fn render_with(&self, lines: &[String]) -> String {
        let mut all: Vec<&str> = lines.iter().map(String::as_str).collect();
        let browse = self.browse_lines();
        all.extend(browse.iter().map(String::as_str));
        all.join("\n")
    }

    /// Byte costs of the menu at the page positions pagination cares about.
    ///
    /// Returns `[items, next, previous, both]`: the cost of the items alone,
    /// then the extra bytes the browse controls add on a first page, a last
    /// page and a middle page.
    pub fn sizes(&self) -> [usize; 4] {
        let mut probe = Menu::new(self.browse.clone());
        let mut at = |count, index| {
            probe.set_page(count, index);
            cost(&probe.render())
        };
        let next = at(2, 0);
        let previous = at(2, 1);
        let both = at(3, 1);
        [cost(&self.render_with(&self.item_lines())), next, previous, both]
    }

    /// Clears items, sink mode and page position, and restores the default
    /// browse configuration.
    pub fn reset(&mut self) {
        self.items.clear();
        self.browse = self.defaults.clone();
        self.page_count = 0;
        self.page_index = 0;
        self.sink = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_items() -> Menu {
        let mut m = Menu::default();
        m.put("0", "one");
        m.put("1", "two");
        m
    }

    #[test]
    fn items_render_in_order() {
        assert_eq!(two_items().render(), "0:one\n1:two");
        assert_eq!(Menu::default().render(), "");
    }

    #[test]
    fn browse_hidden_until_enabled() {
        let mut m = two_items();
        m.set_page(3, 1);
        assert_eq!(m.render(), "0:one\n1:two");
        m.set_next("11", "more");
        m.set_previous("22", "back");
        assert_eq!(m.render(), "0:one\n1:two\n11:more\n22:back");
        m.set_page(3, 0);
        assert_eq!(m.render(), "0:one\n1:two\n11:more");
        m.set_page(3, 2);
        assert_eq!(m.render(), "0:one\n1:two\n22:back");
        m.set_page(1, 0);
        assert_eq!(m.render(), "0:one\n1:two");
    }

    #[test]
    fn sizes_count_separators() {
        let mut m = two_items();
        assert_eq!(m.sizes(), [12, 0, 0, 0]);
        m.set_next("11", "next");
        m.set_previous("22", "previous");
        assert_eq!(m.sizes(), [12, 8, 12, 20]);
        assert_eq!(Menu::default().sizes(), [0, 0, 0, 0]);
    }

    #[test]
    fn reset_restores_defaults() {
        let mut m = two_items();
        m.set_next("99", "go");
        m.set_sink();
        m.set_page(2, 1);
        m.reset();
        assert!(m.is_empty());
        assert!(!m.is_sink());
        assert_eq!(m.browse(), &BrowseConfig::default());
        assert_eq!(m.page_count(), 0);
    }
}
