pub mod combine;
pub mod config;
pub mod export;
pub mod pipeline;
pub mod rates;
pub mod rating_store;
pub mod regression;
pub mod replacement;
pub mod sequencer;
pub mod shot_store;
pub mod shots;
pub mod validation;
