pub mod alerts;
pub mod app_model;
pub mod drag;
pub mod error;
pub mod observable;
pub mod pedalboard_model;
pub mod preset_model;
pub mod property_client;
pub mod remote;
pub mod subscriptions;
