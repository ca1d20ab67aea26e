use crate::engine::config::{Config, ConfigError};
use crate::virtual_machine::cache::{Cache, CacheError};
use crate::virtual_machine::errors::{RunError, VMError};
use crate::virtual_machine::flags::TERMINATE;
use crate::virtual_machine::input::{InputError, validate_input};
use crate::virtual_machine::program::Program;
use crate::virtual_machine::render::Page;
use crate::virtual_machine::resource::Resource;
use crate::virtual_machine::state::{State, StateError};
use crate::virtual_machine::vm::Vm;
use crate::{info, warn};
use menuvm_derive::Error;
use std::io::Write;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    State(#[from] StateError),
    #[error("{0}")]
    Cache(#[from] CacheError),
    #[error("{0}")]
    Input(#[from] InputError),
    #[error("{0}")]
    Run(#[from] RunError),
    #[error("{0}")]
    Vm(#[from] VMError),
    #[error("output write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("session has not been started")]
    NotStarted,
}

/// One menu session driven turn by turn.
///
/// `init` enters the root node. Each `exec` feeds one client input against
/// the code the previous turn left pending, and `flush` writes the page the
/// turn ended on.
pub struct Engine<R: Resource> {
    config: Config,
    vm: Vm<R>,
}

impl<R: Resource> Engine<R> {
    pub fn new(config: Config, resource: R) -> Result<Self, EngineError> {
        let mut state = State::new(config.flag_count);
        if let Some(lang) = &config.language {
            state.set_language(lang)?;
        }
        let cache = Cache::new(config.cache_size);
        Self::from_parts(config, resource, state, cache)
    }

    /// Resumes a session from persisted state and cache.
    pub fn from_parts(
        config: Config,
        resource: R,
        state: State,
        cache: Cache,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let page = Page::new(config.output_size, config.browse.clone());
        let vm = Vm::new(state, cache, resource, page).with_session(&config.session_id);
        Ok(Self { config, vm })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> &State {
        self.vm.state()
    }

    pub fn vm(&self) -> &Vm<R> {
        &self.vm
    }

    /// True until the session terminates.
    pub fn is_active(&self) -> bool {
        !self.vm.state().get_flag(TERMINATE).unwrap_or(true)
    }

    /// Moves to the root node and runs its code.
    ///
    /// Returns whether the session continues.
    pub fn init(&mut self) -> Result<bool, EngineError> {
        info!("session {:?} starting at {}", self.config.session_id, self.config.root);
        let code = Program::new().mv(&self.config.root).into_bytes();
        self.turn(code)
    }

    /// Runs one turn with client `input`.
    ///
    /// Returns whether the session continues.
    pub fn exec(&mut self, input: &str) -> Result<bool, EngineError> {
        if self.vm.state().path().is_empty() {
            return Err(EngineError::NotStarted);
        }
        validate_input(input)?;
        self.vm.state_mut().set_input(input)?;
        let code = self.vm.state_mut().take_code();
        if code.is_empty() && self.is_active() {
            warn!("no pending code at {}", self.vm.state().location().0);
        }
        self.turn(code)
    }

    fn turn(&mut self, code: Vec<u8>) -> Result<bool, EngineError> {
        match self.vm.run(&code) {
            Ok(rest) => {
                self.vm.state_mut().set_code(rest);
                Ok(self.is_active())
            }
            Err(e) => {
                self.vm.state_mut().set_code(e.remaining.clone());
                Err(e.into())
            }
        }
    }

    /// Renders the current page into `w` and returns the bytes written.
    pub fn flush<W: Write>(&mut self, w: &mut W) -> Result<usize, EngineError> {
        let out = self.vm.render()?;
        w.write_all(out.as_bytes())?;
        Ok(out.len())
    }

    /// Releases the session state and cache for persistence.
    pub fn into_parts(self) -> (State, Cache) {
        self.vm.into_parts()
    }
}
