//! Term-based manager engine for vectorized RL environments.
//!
//! Managers parse user-supplied configuration into executable term lists at
//! construction time and execute them each control step: the
//! [`observation::ObservationManager`] assembles grouped observation
//! batches, the [`event::EventManager`] applies domain-randomization events
//! by mode, and the [`reward::RewardManager`],
//! [`termination::TerminationManager`], and
//! [`curriculum::CurriculumManager`] drive the remaining pieces of the
//! training loop. All validation happens at preparation time; the per-step
//! paths are total functions over their valid inputs.
//!
//! # Example
//!
//! ```
//! use corral_core::batch::Batch;
//! use corral_core::env::SimEnv;
//! use corral_managers::observation::{
//!     ObservationGroupCfg, ObservationManager, ObservationManagerCfg, ObservationTermCfg,
//! };
//! use corral_managers::registry::TermRegistry;
//! use corral_managers::term::ObservationTermDef;
//!
//! let mut registry = TermRegistry::new();
//! registry
//!     .register_observation(
//!         "ones",
//!         ObservationTermDef::function(|env, _| Batch::splat(env.num_envs(), 3, 1.0)),
//!     )
//!     .unwrap();
//!
//! let env = SimEnv::new(8);
//! let cfg = ObservationManagerCfg::new().group(
//!     "policy",
//!     ObservationGroupCfg::new().term("ones", ObservationTermCfg::new("ones").with_scale(2.0)),
//! );
//! let mut manager = ObservationManager::new(cfg, &registry, &env).unwrap();
//! let obs = manager.compute(&env);
//! assert_eq!(obs.batch("policy").unwrap().shape(), &[8, 3]);
//! ```

pub mod curriculum;
pub mod event;
pub mod manager;
pub mod observation;
pub mod params;
pub mod registry;
mod resolver;
pub mod reward;
pub mod term;
pub mod termination;

pub mod prelude {
    pub use crate::curriculum::{CurriculumManager, CurriculumManagerCfg, CurriculumTermCfg};
    pub use crate::event::{modes, EventManager, EventManagerCfg, EventTermCfg};
    pub use crate::manager::{Manager, ResetMetrics};
    pub use crate::observation::{
        GroupObservations, ObservationGroupCfg, ObservationManager, ObservationManagerCfg,
        ObservationTermCfg, Observations,
    };
    pub use crate::params::{ParamValue, TermParams, TermSignature};
    pub use crate::registry::TermRegistry;
    pub use crate::reward::{RewardManager, RewardManagerCfg, RewardTermCfg};
    pub use crate::term::{
        CurriculumTermDef, EventTermDef, EventTermState, ObservationTermDef,
        ObservationTermState, RewardTermDef, TerminationTermDef,
    };
    pub use crate::termination::{TerminationManager, TerminationManagerCfg, TerminationTermCfg};
    pub use corral_core::batch::Batch;
    pub use corral_core::env::{Device, SimEnv};
    pub use corral_core::error::{ApplyError, ConfigError, CorralError, TermNotFound};
    pub use corral_core::subset::EnvIds;
    pub use corral_noise::NoiseModel;
}
