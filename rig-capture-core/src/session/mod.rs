pub mod notifier;
pub mod recording;
pub mod synchronizer;
