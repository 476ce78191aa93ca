pub mod attendance;
pub mod backup_exchange;
pub mod core;
pub mod fees;
pub mod notifications;
pub mod reports;
pub mod roster;
pub mod settings;
