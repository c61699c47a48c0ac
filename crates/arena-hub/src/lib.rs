//! The hub: the tick loop that owns the world and journal, stages commands
//! off connection handlers, decides keyframe cadence, and fans broadcasts
//! out to subscribers (spec.md §4.5).

pub mod config;
pub mod error;
pub mod hub;
pub mod keyframe_service;
pub mod ratelimit;
pub mod stage;
pub mod subscriber;
pub mod world;

pub use config::HubConfig;
pub use error::HubError;
pub use hub::Hub;
pub use keyframe_service::{handle_keyframe_request, KeyframeResponse, NackReason};
pub use stage::CommandStage;
pub use subscriber::{Subscriber, SubscriberId, SubscriberRegistry};
