// Core modules implementing the editable model, the rule codec, and error modeling.
pub mod config;
pub mod error;
pub mod hyperkey;
pub mod rules;
