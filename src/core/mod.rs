pub mod cancel;
pub mod capture;
pub mod config;
pub mod cooldown;
pub mod imaging;
pub mod journal;
pub mod notify;
pub mod orchestrator;
pub mod trigger;
pub mod watcher;
