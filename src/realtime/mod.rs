pub mod connection;
pub mod events;
pub mod token;

pub use connection::{EventTransport, RealtimeConnection, TransportEvent};
pub use events::{
    close_warning, ClientEvent, ProviderError, ResponseSpec, ServerEvent, SessionSettings,
    TranscriptionSettings, TurnDetection,
};
pub use token::{EnvTokenProvider, RealtimeCredentials, TokenProvider};
