//! Kernel registry: game id to kernel builder

use std::collections::BTreeMap;

use thiserror::Error;

use sb_core::{KernelError, KernelFactory, SimulationKernel};

use crate::config::SimConfig;
use crate::demo::{DEMO_GAME_ID, DemoKernel};

/// Builds the kernel for one worker
pub type KernelBuilder =
    dyn Fn(&SimConfig, usize) -> Result<Box<dyn SimulationKernel>, KernelError> + Send + Sync;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown game '{game_id}' (registered: {registered})")]
pub struct UnknownGame {
    pub game_id: String,
    pub registered: String,
}

/// Games this binary can simulate
pub struct KernelRegistry {
    builders: BTreeMap<String, Box<KernelBuilder>>,
}

impl Default for KernelRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl KernelRegistry {
    /// Empty registry
    pub fn empty() -> Self {
        Self {
            builders: BTreeMap::new(),
        }
    }

    /// Registry holding the built-in demo game
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(DEMO_GAME_ID, |config, _thread_id| {
            let kernel: Box<dyn SimulationKernel> =
                Box::new(DemoKernel::new(&config.mode, config.seed)?);
            Ok(kernel)
        });
        registry
    }

    /// Register (or replace) a game
    pub fn register<B>(&mut self, game_id: &str, builder: B)
    where
        B: Fn(&SimConfig, usize) -> Result<Box<dyn SimulationKernel>, KernelError>
            + Send
            + Sync
            + 'static,
    {
        self.builders.insert(game_id.to_string(), Box::new(builder));
    }

    /// Registered game ids, sorted
    pub fn games(&self) -> Vec<&str> {
        self.builders.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, game_id: &str) -> bool {
        self.builders.contains_key(game_id)
    }

    /// Kernel factory for the configured game
    pub fn factory<'a>(
        &'a self,
        config: &'a SimConfig,
    ) -> Result<RegistryFactory<'a>, UnknownGame> {
        match self.builders.get(&config.game_id) {
            Some(builder) => Ok(RegistryFactory {
                builder: builder.as_ref(),
                config,
            }),
            None => Err(UnknownGame {
                game_id: config.game_id.clone(),
                registered: self.games().join(", "),
            }),
        }
    }
}

/// [`KernelFactory`] backed by a registered builder
pub struct RegistryFactory<'a> {
    builder: &'a KernelBuilder,
    config: &'a SimConfig,
}

impl KernelFactory for RegistryFactory<'_> {
    type Kernel = Box<dyn SimulationKernel>;

    fn create(&self, thread_id: usize) -> Result<Self::Kernel, KernelError> {
        (self.builder)(self.config, thread_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(game_id: &str, mode: &str) -> SimConfig {
        SimConfig::load(game_id, mode, None).unwrap()
    }

    #[test]
    fn test_builtin_demo() {
        let registry = KernelRegistry::with_builtin();
        assert_eq!(registry.games(), vec!["demo"]);

        let config = config("demo", "base");
        let factory = registry.factory(&config).unwrap();
        let mut kernel = factory.create(0).unwrap();
        assert_eq!(kernel.simulate(3).unwrap().trial_index(), 3);
    }

    #[test]
    fn test_unknown_game_rejected() {
        let registry = KernelRegistry::with_builtin();
        let config = config("0_0_lines", "base");
        let err = registry.factory(&config).err().unwrap();
        assert_eq!(err.game_id, "0_0_lines");
        assert_eq!(err.registered, "demo");
    }

    #[test]
    fn test_bad_mode_fails_at_create() {
        let registry = KernelRegistry::with_builtin();
        let config = config("demo", "superbonus");
        let factory = registry.factory(&config).unwrap();
        assert!(matches!(factory.create(0), Err(KernelError::Setup(_))));
    }

    #[test]
    fn test_register_custom_game() {
        let mut registry = KernelRegistry::empty();
        registry.register("lines", |_, thread_id| {
            Err(KernelError::Setup(format!("no reels for thread {thread_id}")))
        });
        assert!(registry.contains("lines"));

        let config = config("lines", "base");
        let factory = registry.factory(&config).unwrap();
        assert_eq!(
            factory.create(2).err(),
            Some(KernelError::Setup("no reels for thread 2".into()))
        );
    }
}
