pub mod artifact;
pub mod captcha;
pub mod config;
pub mod egress;
pub mod engine;
pub mod metrics;
pub mod race;
pub mod testing;

pub use artifact::{ArtifactAssembler, ArtifactError, ArtifactRef, HostedAssembler};
pub use captcha::{
    CapSolverClient, CaptchaError, CaptchaSolver, CaptchaToken, Challenge, ChallengeKind,
};
pub use config::{
    load_config, load_config_from_str, validate_config, ArtifactConfig, CaptchaConfig, Config,
    ConfigError, EgressConfig, EgressProviderConfig, EngineConfig, SanitizedConfig, ServerConfig,
};
pub use egress::{EgressDescriptor, EgressError, EgressPool, EgressProvider, HttpEgressProvider};
pub use engine::{
    AutomationEngine, EngineError, PreparedTask, RemoteEngine, RunHistory, StepObserver, StepRecord,
};
pub use race::{
    RaceConfig, ResultValidator, RoundScheduler, SchedulerStatus, SessionGate, TaskRequest,
    TaskResult, ValidatorConfig, WorkerOutcome,
};
