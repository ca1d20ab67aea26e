//! Content resolution collaborator.
//!
//! The runner asks a [`Resource`] for a node's bytecode, its render template,
//! the display title of menu symbols, and the entry function that produces
//! dynamic content for `LOAD`/`RELOAD`.

use menuvm_derive::Error;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// No bytecode registered for the node.
    #[error("no code for node {0}")]
    NoCode(String),
    /// No template registered for the node.
    #[error("no template for node {0}")]
    NoTemplate(String),
    /// No menu title registered for the symbol.
    #[error("no menu title for {0}")]
    NoMenu(String),
    /// No entry function registered for the symbol.
    #[error("no entry function for {0}")]
    NoEntry(String),
    /// The entry function ran and failed.
    #[error("{sym}: {reason}")]
    Entry { sym: String, reason: String },
}

impl ResourceError {
    /// Convenience constructor for entry functions.
    pub fn entry(sym: &str, reason: impl fmt::Display) -> Self {
        ResourceError::Entry {
            sym: sym.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Session context handed to every resource call.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExecContext {
    pub session_id: String,
    pub language: Option<String>,
    /// Node being executed when the call was made.
    pub node: String,
}

/// Output of an entry function.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ContentResult {
    pub content: String,
    pub status: u32,
    /// Caller flags to set. Indices below the user range are ignored.
    pub flag_set: Vec<u32>,
    /// Caller flags to clear. Indices below the user range are ignored.
    pub flag_reset: Vec<u32>,
}

impl ContentResult {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_set(mut self, flag: u32) -> Self {
        self.flag_set.push(flag);
        self
    }

    pub fn with_reset(mut self, flag: u32) -> Self {
        self.flag_reset.push(flag);
        self
    }
}

/// Dynamic content producer: `(context, symbol, input) -> content`.
pub type EntryFn =
    Arc<dyn Fn(&ExecContext, &str, &[u8]) -> Result<ContentResult, ResourceError> + Send + Sync>;

/// Source of node code, templates, menu titles and entry functions.
pub trait Resource {
    fn get_code(&self, ctx: &ExecContext, sym: &str) -> Result<Vec<u8>, ResourceError>;
    fn get_template(&self, ctx: &ExecContext, sym: &str) -> Result<String, ResourceError>;
    /// Display title for a menu symbol. Callers fall back to the symbol on error.
    fn get_menu(&self, ctx: &ExecContext, sym: &str) -> Result<String, ResourceError>;
    fn func_for(&self, sym: &str) -> Result<EntryFn, ResourceError>;
}

impl<R: Resource + ?Sized> Resource for &R {
    fn get_code(&self, ctx: &ExecContext, sym: &str) -> Result<Vec<u8>, ResourceError> {
        (**self).get_code(ctx, sym)
    }

    fn get_template(&self, ctx: &ExecContext, sym: &str) -> Result<String, ResourceError> {
        (**self).get_template(ctx, sym)
    }

    fn get_menu(&self, ctx: &ExecContext, sym: &str) -> Result<String, ResourceError> {
        (**self).get_menu(ctx, sym)
    }

    fn func_for(&self, sym: &str) -> Result<EntryFn, ResourceError> {
        (**self).func_for(sym)
    }
}

impl<R: Resource + ?Sized> Resource for Arc<R> {
    fn get_code(&self, ctx: &ExecContext, sym: &str) -> Result<Vec<u8>, ResourceError> {
        (**self).get_code(ctx, sym)
    }

    fn get_template(&self, ctx: &ExecContext, sym: &str) -> Result<String, ResourceError> {
        (**self).get_template(ctx, sym)
    }

    fn get_menu(&self, ctx: &ExecContext, sym: &str) -> Result<String, ResourceError> {
        (**self).get_menu(ctx, sym)
    }

    fn func_for(&self, sym: &str) -> Result<EntryFn, ResourceError> {
        (**self).func_for(sym)
    }
}

/// In-memory resource, filled with builder calls.
#[derive(Clone, Default)]
pub struct MemResource {
    code: BTreeMap<String, Vec<u8>>,
    templates: BTreeMap<String, String>,
    menus: BTreeMap<String, String>,
    entries: BTreeMap<String, EntryFn>,
}

impl MemResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_code(mut self, sym: &str, code: Vec<u8>) -> Self {
        self.code.insert(sym.to_string(), code);
        self
    }

    pub fn with_template(mut self, sym: &str, template: &str) -> Self {
        self.templates.insert(sym.to_string(), template.to_string());
        self
    }

    pub fn with_menu(mut self, sym: &str, title: &str) -> Self {
        self.menus.insert(sym.to_string(), title.to_string());
        self
    }

    pub fn with_entry<F>(mut self, sym: &str, f: F) -> Self
    where
        F: Fn(&ExecContext, &str, &[u8]) -> Result<ContentResult, ResourceError>
            + Send
            + Sync
            + 'static,
    {
        self.entries.insert(sym.to_string(), Arc::new(f));
        self
    }

    /// Registers an entry function that always returns `content`.
    pub fn with_static(self, sym: &str, content: &str) -> Self {
        let content = content.to_string();
        self.with_entry(sym, move |_, _, _| Ok(ContentResult::new(content.clone())))
    }
}

impl fmt::Debug for MemResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemResource")
            .field("code", &self.code.keys().collect::<Vec<_>>())
            .field("templates", &self.templates.keys().collect::<Vec<_>>())
            .field("menus", &self.menus.keys().collect::<Vec<_>>())
            .field("entries", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Resource for MemResource {
    fn get_code(&self, _ctx: &ExecContext, sym: &str) -> Result<Vec<u8>, ResourceError> {
        self.code
            .get(sym)
            .cloned()
            .ok_or_else(|| ResourceError::NoCode(sym.to_string()))
    }

    fn get_template(&self, _ctx: &ExecContext, sym: &str) -> Result<String, ResourceError> {
        self.templates
            .get(sym)
            .cloned()
            .ok_or_else(|| ResourceError::NoTemplate(sym.to_string()))
    }

    fn get_menu(&self, _ctx: &ExecContext, sym: &str) -> Result<String, ResourceError> {
        self.menus
            .get(sym)
            .cloned()
            .ok_or_else(|| ResourceError::NoMenu(sym.to_string()))
    }

    fn func_for(&self, sym: &str) -> Result<EntryFn, ResourceError> {
        self.entries
            .get(sym)
            .cloned()
            .ok_or_else(|| ResourceError::NoEntry(sym.to_string()))
    }
}
