//! Page assembly.

use crate::virtual_machine::cache::{Memory, SizeLimit};
use crate::virtual_machine::render::menu::{BrowseConfig, Menu};
use crate::virtual_machine::render::sizer::{Reserve, Sizer};
use crate::virtual_machine::render::{RenderError, template};
use crate::warn;
use std::collections::BTreeMap;

/// Label the sizer records when menu items are paginated.
const MENU_SINK: &str = "_menu";

/// Render state for the current node.
///
/// Output is laid out as an optional error line, the rendered template, then
/// the menu. Mapped values and menu items accumulate between resets.
#[derive(Clone, Debug)]
pub struct Page {
    budget: usize,
    mapped: Vec<String>,
    sink: Option<String>,
    menu: Menu,
    error: Option<String>,
    sizer: Option<Sizer>,
}

impl Page {
    /// Creates a page renderer with a byte budget (0 for unbounded).
    pub fn new(budget: usize, browse: BrowseConfig) -> Self {
        Self {
            budget,
            mapped: Vec::new(),
            sink: None,
            menu: Menu::new(browse),
            error: None,
            sizer: None,
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn menu(&self) -> &Menu {
        &self.menu
    }

    pub fn menu_mut(&mut self) -> &mut Menu {
        &mut self.menu
    }

    /// Includes a cached symbol in the next render.
    pub fn map(&mut self, sym: &str, limit: SizeLimit) -> Result<(), RenderError> {
        if self.mapped.iter().any(|s| s == sym) {
            return Ok(());
        }
        if limit.is_sink() {
            if self.menu.is_sink() {
                return Err(RenderError::DoubleSink(sym.to_string()));
            }
            if let Some(first) = &self.sink {
                return Err(RenderError::MultipleSinks {
                    first: first.clone(),
                    second: sym.to_string(),
                });
            }
            self.sink = Some(sym.to_string());
        }
        self.mapped.push(sym.to_string());
        Ok(())
    }

    pub fn mapped(&self) -> &[String] {
        &self.mapped
    }

    /// Paginates the menu items instead of a mapped value.
    pub fn set_menu_sink(&mut self) -> Result<(), RenderError> {
        if let Some(sink) = &self.sink {
            return Err(RenderError::DoubleSink(sink.clone()));
        }
        self.menu.set_sink();
        Ok(())
    }

    /// Sets a message shown above the template on the next render.
    pub fn set_error(&mut self, message: String) {
        self.error = Some(message);
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Sizer of the last paginated render.
    pub fn sizer(&self) -> Option<&Sizer> {
        self.sizer.as_ref()
    }

    /// Forgets mapped symbols and menu state. A pending error survives.
    pub fn reset(&mut self) {
        self.mapped.clear();
        self.sink = None;
        self.menu.reset();
        self.sizer = None;
    }

    fn compose(&self, with_template: bool, body: &str, menu: &str) -> String {
        let mut out = String::new();
        if let Some(err) = &self.error {
            out.push_str(err);
            out.push('\n');
        }
        out.push_str(body);
        if !menu.is_empty() {
            if with_template {
                out.push('\n');
            }
            out.push_str(menu);
        }
        out
    }

    fn check(&self, out: String) -> Result<String, RenderError> {
        if self.budget > 0 && out.len() > self.budget {
            return Err(RenderError::Capacity {
                len: out.len(),
                budget: self.budget,
            });
        }
        Ok(out)
    }

    /// Renders page `index` of `template` with the mapped values.
    pub fn render<M: Memory + ?Sized>(
        &mut self,
        template: &str,
        memory: &M,
        index: u32,
    ) -> Result<String, RenderError> {
        let mut values = BTreeMap::new();
        for sym in &self.mapped {
            values.insert(sym.clone(), memory.get(sym)?.to_string());
        }
        let with_template = !template.is_empty();
        let idx = index as usize;

        let paged = self.budget > 0 && (self.sink.is_some() || self.menu.is_sink());
        if !paged {
            if idx > 0 {
                return Err(RenderError::BrowseOutOfBounds { index, pages: 1 });
            }
            self.menu.set_page(1, 0);
            let body = template::render(template, &values);
            let out = self.check(self.compose(with_template, &body, &self.menu.render()))?;
            self.error = None;
            return Ok(out);
        }

        // Static part: the sink blanked, the menu without browse controls.
        self.menu.set_page(1, 0);
        let mut base_values = values.clone();
        if let Some(sink) = &self.sink {
            base_values.insert(sink.clone(), String::new());
            if !template::placeholders(template).contains(sink) {
                warn!("sink {} is not referenced by the template", sink);
            }
        }
        let base_menu = if self.menu.is_sink() {
            String::new()
        } else {
            self.menu.render()
        };
        let base = self.compose(
            with_template,
            &template::render(template, &base_values),
            &base_menu,
        );
        if base.len() > self.budget {
            return Err(RenderError::Capacity {
                len: base.len(),
                budget: self.budget,
            });
        }
        let remaining = self.budget - base.len();
        let reserve = Reserve::from_sizes(self.menu.sizes());

        let mut sizer = Sizer::new(self.budget);
        let count = match &self.sink {
            Some(sink) => {
                let value = values.get(sink).cloned().unwrap_or_default();
                sizer.paginate(sink, &value, remaining, reserve)?
            }
            None => {
                let items = self.menu.item_lines().join("\n");
                let cap = remaining.saturating_sub(usize::from(with_template));
                sizer.paginate(MENU_SINK, &items, cap, reserve)?
            }
        };
        if idx >= count {
            return Err(RenderError::BrowseOutOfBounds {
                index,
                pages: count,
            });
        }
        self.menu.set_page(count, idx);
        let content = sizer.page(idx).unwrap_or_default();

        let out = match &self.sink {
            Some(sink) => {
                values.insert(sink.clone(), content);
                let body = template::render(template, &values);
                self.compose(with_template, &body, &self.menu.render())
            }
            None => {
                let lines: Vec<String> = if content.is_empty() {
                    Vec::new()
                } else {
                    content.split('\n').map(str::to_string).collect()
                };
                let body = template::render(template, &values);
                self.compose(with_template, &body, &self.menu.render_with(&lines))
            }
        };
        let out = self.check(out)?;
        self.sizer = Some(sizer);
        self.error = None;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_machine::cache::Cache;

    fn page(budget: usize) -> Page {
        Page::new(budget, BrowseConfig::default())
    }

    #[test]
    fn template_only() {
        let mut pg = page(0);
        let out = pg.render("inky pinky blinky clyde", &Cache::new(0), 0).unwrap();
        assert_eq!(out, "inky pinky blinky clyde");
    }

    #[test]
    fn template_and_menu() {
        let mut pg = page(0);
        pg.menu_mut().put("0", "one");
        pg.menu_mut().put("1", "two");
        let out = pg.render("hello", &Cache::new(0), 0).unwrap();
        assert_eq!(out, "hello\n0:one\n1:two");
    }

    #[test]
    fn mapped_values_substitute() {
        let mut ca = Cache::new(0);
        ca.add("balance", "42", SizeLimit::Bounded(10)).unwrap();
        let mut pg = page(0);
        pg.map("balance", SizeLimit::Bounded(10)).unwrap();
        let out = pg.render("you have {{.balance}}{{.other}}", &ca, 0).unwrap();
        assert_eq!(out, "you have 42");
    }

    #[test]
    fn error_line_shown_once() {
        let mut pg = page(0);
        pg.set_error("load failed".into());
        let ca = Cache::new(0);
        assert_eq!(pg.render("hi", &ca, 0).unwrap(), "load failed\nhi");
        assert_eq!(pg.render("hi", &ca, 0).unwrap(), "hi");
    }

    #[test]
    fn over_budget_without_sink() {
        let mut pg = page(30);
        assert_eq!(
            pg.render(&"x".repeat(40), &Cache::new(0), 0),
            Err(RenderError::Capacity { len: 40, budget: 30 })
        );
    }

    #[test]
    fn unpaged_index_out_of_bounds() {
        let mut pg = page(0);
        assert_eq!(
            pg.render("hi", &Cache::new(0), 1),
            Err(RenderError::BrowseOutOfBounds { index: 1, pages: 1 })
        );
    }

    fn value_sink_page() -> (Page, Cache) {
        let mut ca = Cache::new(0);
        ca.add("list", "aaaa\nbbbb\ncccc\ndddd", SizeLimit::Sink).unwrap();
        let mut pg = page(30);
        pg.map("list", SizeLimit::Sink).unwrap();
        pg.menu_mut().put("0", "back");
        pg.menu_mut().set_next("11", "next");
        pg.menu_mut().set_previous("22", "prev");
        (pg, ca)
    }

    #[test]
    fn value_sink_paginates() {
        let tpl = "list:\n{{.list}}";
        let (mut pg, ca) = value_sink_page();
        let first = pg.render(tpl, &ca, 0).unwrap();
        assert_eq!(first, "list:\naaaa\nbbbb\n0:back\n11:next");
        assert_eq!(first.len(), 30);
        assert_eq!(pg.sizer().map(Sizer::pages), Some(2));

        let (mut pg, ca) = value_sink_page();
        let second = pg.render(tpl, &ca, 1).unwrap();
        assert_eq!(second, "list:\ncccc\ndddd\n0:back\n22:prev");

        let (mut pg, ca) = value_sink_page();
        assert_eq!(
            pg.render(tpl, &ca, 2),
            Err(RenderError::BrowseOutOfBounds { index: 2, pages: 2 })
        );
    }

    #[test]
    fn menu_sink_paginates() {
        let mut pg = page(24);
        for (i, t) in ["a", "b", "c", "d", "e", "f"].iter().enumerate() {
            pg.menu_mut().put(&i.to_string(), t);
        }
        pg.menu_mut().set_next("11", ">");
        pg.menu_mut().set_previous("22", "<");
        pg.set_menu_sink().unwrap();

        let mut other = pg.clone();
        let ca = Cache::new(0);
        assert_eq!(pg.render("pick:", &ca, 0).unwrap(), "pick:\n0:a\n1:b\n2:c\n11:>");
        assert_eq!(other.render("pick:", &ca, 1).unwrap(), "pick:\n3:d\n4:e\n5:f\n22:<");
    }

    #[test]
    fn line_too_long_for_page() {
        let mut ca = Cache::new(0);
        ca.add("list", &"z".repeat(50), SizeLimit::Sink).unwrap();
        let mut pg = page(30);
        pg.map("list", SizeLimit::Sink).unwrap();
        assert!(matches!(
            pg.render("{{.list}}", &ca, 0),
            Err(RenderError::LineTooLong { len: 50, .. })
        ));
    }

    #[test]
    fn sink_exclusivity() {
        let mut pg = page(30);
        pg.map("a", SizeLimit::Sink).unwrap();
        pg.map("a", SizeLimit::Sink).unwrap();
        assert_eq!(
            pg.map("b", SizeLimit::Sink),
            Err(RenderError::MultipleSinks {
                first: "a".into(),
                second: "b".into()
            })
        );
        assert_eq!(pg.set_menu_sink(), Err(RenderError::DoubleSink("a".into())));

        let mut pg = page(30);
        pg.set_menu_sink().unwrap();
        assert_eq!(
            pg.map("b", SizeLimit::Sink),
            Err(RenderError::DoubleSink("b".into()))
        );
        pg.map("c", SizeLimit::Bounded(4)).unwrap();
        pg.reset();
        assert!(pg.mapped().is_empty());
        assert!(!pg.menu().is_sink());
    }

    #[test]
    fn every_page_fits_and_rejoins() {
        let lines: Vec<String> = (0..24)
            .map(|i| format!("item {i:02} {}", "x".repeat(i % 4)))
            .collect();
        let value = lines.join("\n");
        let mut ca = Cache::new(0);
        ca.add("list", &value, SizeLimit::Sink).unwrap();
        let controls = ["0:back", "11:next", "22:prev"];

        for budget in [42usize, 50, 64, 100, 160] {
            let mut pg = page(budget);
            pg.map("list", SizeLimit::Sink).unwrap();
            pg.menu_mut().put("0", "back");
            pg.menu_mut().set_next("11", "next");
            pg.menu_mut().set_previous("22", "prev");

            pg.render("list:\n{{.list}}", &ca, 0).unwrap();
            let count = pg.sizer().map(Sizer::pages).unwrap();
            let mut seen = Vec::new();
            for idx in 0..count {
                let out = pg.render("list:\n{{.list}}", &ca, idx as u32).unwrap();
                assert!(out.len() <= budget, "budget {budget} page {idx}: {} bytes", out.len());
                let body = out.strip_prefix("list:\n").unwrap();
                let mut page_lines: Vec<&str> = body.split('\n').collect();
                while page_lines.last().is_some_and(|l| controls.contains(l)) {
                    page_lines.pop();
                }
                assert!(!page_lines.is_empty(), "budget {budget} page {idx} is empty");
                seen.extend(page_lines.into_iter().map(str::to_string));
            }
            assert_eq!(seen, lines, "budget {budget}");
            assert!(matches!(
                pg.render("list:\n{{.list}}", &ca, count as u32),
                Err(RenderError::BrowseOutOfBounds { .. })
            ));
        }
    }
}
