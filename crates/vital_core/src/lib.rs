pub mod domain;
pub mod ports;
pub mod report;

pub use domain::{
    AuthUser, BreathingSession, DerivedStats, Profile, ReportOptions, SignInTokens, Song,
};
pub use ports::{AuthService, PortError, PortResult, StoreService};
pub use report::aggregate;
