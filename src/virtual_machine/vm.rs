//! Decode-dispatch runner.
//!
//! [`Vm`] executes one turn of a session: it consumes bytecode an instruction
//! at a time, moving through the node tree, loading content into the cache
//! and collecting the menu, until a `HALT` hands control back to the client
//! or the session terminates. [`Vm::render`] then produces the page for the
//! node the turn ended on.

use crate::virtual_machine::cache::{Cache, CacheError, Memory, SizeLimit};
use crate::virtual_machine::errors::{RunError, VMError};
use crate::virtual_machine::flags::{
    DIRTY, FlagNames, INMATCH, LOADFAIL, READIN, TERMINATE, USER_START, WAIT,
};
use crate::virtual_machine::input::{CATCH_NODE, Target};
use crate::virtual_machine::isa::Instruction;
use crate::virtual_machine::program::{Program, decode};
use crate::virtual_machine::render::{Page, RenderError};
use crate::virtual_machine::resource::{ContentResult, ExecContext, Resource, ResourceError};
use crate::virtual_machine::state::{State, StateError};
use crate::{debug, error, info, warn};

/// Menu-dialog virtual machine for one session.
///
/// Owns the navigation [`State`], the content cache and the page renderer.
/// Cache frames are kept one per node on the execution path, on top of the
/// base frame.
pub struct Vm<R: Resource, M: Memory = Cache> {
    state: State,
    cache: M,
    resource: R,
    page: Page,
    session_id: String,
    flag_names: Option<FlagNames>,
}

impl<R: Resource, M: Memory> Vm<R, M> {
    pub fn new(state: State, cache: M, resource: R, page: Page) -> Self {
        Self {
            state,
            cache,
            resource,
            page,
            session_id: String::new(),
            flag_names: None,
        }
    }

    /// Sets the session id handed to resource calls.
    pub fn with_session(mut self, session_id: &str) -> Self {
        self.session_id = session_id.to_string();
        self
    }

    /// Names flags in the state dumps logged at the end of each turn.
    pub fn with_flag_names(mut self, names: FlagNames) -> Self {
        self.flag_names = Some(names);
        self
    }

    pub fn flag_names(&self) -> Option<&FlagNames> {
        self.flag_names.as_ref()
    }

    /// State summary with flags named through the caller's [`FlagNames`],
    /// or as a hex bit string when none were supplied.
    pub fn describe_state(&self) -> String {
        match &self.flag_names {
            Some(names) => self.state.describe(names),
            None => self.state.to_string(),
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut State {
        &mut self.state
    }

    pub fn cache(&self) -> &M {
        &self.cache
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn resource(&self) -> &R {
        &self.resource
    }

    /// Releases the session state and cache.
    pub fn into_parts(self) -> (State, M) {
        (self.state, self.cache)
    }

    /// Forgets mapped values and the pending menu.
    pub fn reset(&mut self) {
        self.page.reset();
    }

    fn context(&self) -> ExecContext {
        ExecContext {
            session_id: self.session_id.clone(),
            language: self.state.language().map(str::to_string),
            node: self.state.location().0.to_string(),
        }
    }

    /// Executes `code` until `HALT`, termination or failure.
    ///
    /// Returns the code following the `HALT`, which the caller keeps as the
    /// pending code for the next turn. On failure the error is returned with
    /// the bytes that were not executed; state changes made before the
    /// failure are kept.
    pub fn run(&mut self, code: &[u8]) -> Result<Vec<u8>, RunError> {
        let mut code = code.to_vec();
        let result = self.run_loop(&mut code);
        debug!("turn ended: {}", self.describe_state());
        result.map_err(|error| RunError::new(error, code))
    }

    fn run_loop(&mut self, code: &mut Vec<u8>) -> Result<Vec<u8>, VMError> {
        loop {
            if self.state.get_flag(TERMINATE)? {
                return Ok(Vec::new());
            }
            if code.is_empty() {
                if let Some(next) = self.fallback()? {
                    *code = next;
                }
                continue;
            }
            if self.state.reset_flag(WAIT)? {
                self.state.reset_flag(INMATCH)?;
                self.page.reset();
            }
            self.state.set_flag(DIRTY)?;

            let (instr, rest) = decode(code)?;
            *code = rest.to_vec();
            debug!("{} {}", self.state.location().0, instr);
            if let Some(rest) = self.exec(instr, code)? {
                return Ok(rest);
            }
        }
    }

    /// Decides what runs once the code is exhausted without a `HALT`.
    ///
    /// Unmatched input sends the session to the catch-all node; otherwise the
    /// session terminates.
    fn fallback(&mut self) -> Result<Option<Vec<u8>>, VMError> {
        if !self.state.get_flag(READIN)? {
            self.state.set_flag(TERMINATE)?;
            return Ok(None);
        }
        let (node, _) = self.state.location();
        if node.is_empty() {
            return Err(VMError::DeadRunner);
        }
        if node == CATCH_NODE {
            warn!("unmatched input {:?} in {}, terminating", self.state.input(), CATCH_NODE);
            self.state.set_flag(TERMINATE)?;
            return Ok(None);
        }
        info!("no match for input {:?} in {}", self.state.input(), node);
        self.state.reset_flag(READIN)?;
        Ok(Some(Program::new().mv(CATCH_NODE).into_bytes()))
    }

    /// Executes one instruction. Returns `Some` with the rest of the code
    /// when the turn ends.
    fn exec(
        &mut self,
        instr: Instruction,
        code: &mut Vec<u8>,
    ) -> Result<Option<Vec<u8>>, VMError> {
        match instr {
            Instruction::Noop {} => {}
            Instruction::Catch { sym, flag, mode } => self.op_catch(&sym, flag, mode, code)?,
            Instruction::Croak { flag, mode } => self.op_croak(flag, mode, code)?,
            Instruction::Load { sym, size } => self.op_load(&sym, size)?,
            Instruction::Reload { sym } => self.op_reload(&sym)?,
            Instruction::Map { sym } => self.op_map(&sym)?,
            Instruction::Move { sym } => self.op_move(&sym, code)?,
            Instruction::Halt {} => {
                self.state.set_flag(WAIT)?;
                return Ok(Some(std::mem::take(code)));
            }
            Instruction::InCmp { selector, target } => self.op_incmp(&selector, &target, code)?,
            Instruction::MSink {} => self.page.set_menu_sink()?,
            Instruction::MOut { selector, title } => {
                let title = self.menu_title(&title);
                self.page.menu_mut().put(&selector, &title);
            }
            Instruction::MNext { selector, title } => {
                let title = self.menu_title(&title);
                self.page.menu_mut().set_next(&selector, &title);
            }
            Instruction::MPrev { selector, title } => {
                let title = self.menu_title(&title);
                self.page.menu_mut().set_previous(&selector, &title);
            }
        }
        Ok(None)
    }

    fn menu_title(&self, sym: &str) -> String {
        self.resource
            .get_menu(&self.context(), sym)
            .unwrap_or_else(|_| sym.to_string())
    }

    /// Applies a navigation target and returns the node whose code runs next.
    fn apply_target(&mut self, sym: &str) -> Result<String, VMError> {
        match Target::parse(sym)? {
            Target::Up => {
                if !self.state.top() {
                    self.state.up();
                    self.cache.pop()?;
                }
            }
            Target::Top => {
                while self.state.depth() > 0 {
                    self.state.up();
                    self.cache.pop()?;
                }
            }
            Target::Next => {
                self.state.next();
            }
            Target::Previous => {
                self.state.previous()?;
            }
            Target::Same => self.state.same(),
            Target::Node(node) => {
                self.state.down(&node)?;
                self.cache.push();
            }
        }
        let (node, idx) = self.state.location();
        info!("moved to {} page {} via {}", node, idx, sym);
        Ok(node.to_string())
    }

    fn node_code(&self, node: &str) -> Result<Vec<u8>, VMError> {
        Ok(self.resource.get_code(&self.context(), node)?)
    }

    fn op_move(&mut self, sym: &str, code: &mut Vec<u8>) -> Result<(), VMError> {
        let node = self.apply_target(sym)?;
        let next = self.node_code(&node)?;
        code.extend_from_slice(&next);
        self.page.reset();
        Ok(())
    }

    fn op_incmp(&mut self, selector: &str, target: &str, code: &mut Vec<u8>) -> Result<(), VMError> {
        if self.state.get_flag(INMATCH)? {
            return Ok(());
        }
        self.state.set_flag(READIN)?;
        if selector != "*" && selector != self.state.input() {
            return Ok(());
        }
        info!("input {:?} matched {} -> {}", self.state.input(), selector, target);
        self.state.set_flag(INMATCH)?;
        self.state.reset_flag(READIN)?;
        match self.apply_target(target) {
            Ok(node) => {
                let next = self.node_code(&node)?;
                code.extend_from_slice(&next);
                self.page.reset();
                Ok(())
            }
            Err(VMError::State(StateError::Index)) => {
                debug!("no previous page, awaiting input again");
                self.state.set_flag(READIN)?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn op_catch(&mut self, sym: &str, flag: u32, mode: u8, code: &mut Vec<u8>) -> Result<(), VMError> {
        if !self.state.match_flag(flag, mode != 0)? {
            return Ok(());
        }
        info!("caught flag {} (mode {}) -> {}", flag, mode, sym);
        let node = self.apply_target(sym)?;
        *code = self.node_code(&node)?;
        self.page.reset();
        Ok(())
    }

    fn op_croak(&mut self, flag: u32, mode: u8, code: &mut Vec<u8>) -> Result<(), VMError> {
        if !self.state.match_flag(flag, mode != 0)? {
            return Ok(());
        }
        info!("croaked on flag {} (mode {})", flag, mode);
        self.state.restart();
        self.state.reset_flag(READIN)?;
        self.state.reset_flag(INMATCH)?;
        self.cache.reset();
        if !self.state.path().is_empty() {
            self.cache.push();
        }
        self.page.reset();
        code.clear();
        Ok(())
    }

    fn resolve(&self, sym: &str) -> Result<ContentResult, ResourceError> {
        let entry = self.resource.func_for(sym)?;
        entry(&self.context(), sym, self.state.input().as_bytes())
    }

    /// Applies caller flag changes from a content result; reserved flags are ignored.
    fn apply_flags(&mut self, result: &ContentResult) -> Result<(), VMError> {
        for &f in &result.flag_set {
            if f < USER_START {
                debug!("ignoring set of reserved flag {}", f);
                continue;
            }
            self.state.set_flag(f)?;
        }
        for &f in &result.flag_reset {
            if f < USER_START {
                debug!("ignoring reset of reserved flag {}", f);
                continue;
            }
            self.state.reset_flag(f)?;
        }
        Ok(())
    }

    fn load_failed(&mut self, sym: &str, message: String) -> Result<(), VMError> {
        error!("loading {} failed: {}", sym, message);
        self.state.set_flag(LOADFAIL)?;
        self.page.set_error(message);
        Ok(())
    }

    fn op_load(&mut self, sym: &str, size: u32) -> Result<(), VMError> {
        if self.cache.get(sym).is_ok() {
            debug!("{} already loaded", sym);
            return Ok(());
        }
        let result = match self.resolve(sym) {
            Ok(r) => r,
            Err(e) => return self.load_failed(sym, e.to_string()),
        };
        self.apply_flags(&result)?;
        match self
            .cache
            .add(sym, &result.content, SizeLimit::from_declared(size))
        {
            Ok(()) => {
                self.state.reset_flag(LOADFAIL)?;
                Ok(())
            }
            Err(e) => self.load_failed(sym, e.to_string()),
        }
    }

    fn op_reload(&mut self, sym: &str) -> Result<(), VMError> {
        let result = match self.resolve(sym) {
            Ok(r) => r,
            Err(e) => return self.load_failed(sym, e.to_string()),
        };
        self.apply_flags(&result)?;
        if let Err(e) = self.cache.update(sym, &result.content) {
            return self.load_failed(sym, e.to_string());
        }
        self.state.reset_flag(LOADFAIL)?;
        let limit = self.cache.reserved_size(sym)?;
        self.page.map(sym, limit)?;
        Ok(())
    }

    fn op_map(&mut self, sym: &str) -> Result<(), VMError> {
        let load_failed = self.state.get_flag(LOADFAIL)?;
        match self.cache.reserved_size(sym) {
            Ok(limit) => Ok(self.page.map(sym, limit)?),
            Err(CacheError::NotFound(_)) if load_failed => {
                warn!("not mapping {}, load failed", sym);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Renders the current page if anything changed since the last render.
    ///
    /// Returns an empty string when nothing is dirty. A page index beyond the
    /// node's pages moves the session to the catch-all node and renders that
    /// instead; the code left by that move replaces the pending code.
    pub fn render(&mut self) -> Result<String, VMError> {
        if !self.state.reset_flag(DIRTY)? {
            return Ok(String::new());
        }
        let (node, idx) = self.state.location();
        let node = node.to_string();
        let template = self.resource.get_template(&self.context(), &node)?;
        match self.page.render(&template, &self.cache, idx) {
            Ok(out) => Ok(out),
            Err(RenderError::BrowseOutOfBounds { index, pages }) if node != CATCH_NODE => {
                warn!("page {} of {} out of bounds ({} pages)", index, node, pages);
                self.page.reset();
                let code = Program::new().mv(CATCH_NODE).into_bytes();
                let rest = self.run(&code).map_err(|e| e.error)?;
                self.state.set_code(rest);
                self.render()
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests;
