mod configured;
mod provider;

pub use configured::ConfiguredProvider;
pub use provider::OAuthProvider;
