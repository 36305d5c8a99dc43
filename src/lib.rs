// Recycler: repost detection for chat communities.
//
// This is the library root. Each module corresponds to a part of the
// detection pipeline; the binary in main.rs wires them to a chat adapter.

pub mod bot;
pub mod chat;
pub mod classify;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod extract;
pub mod fetch;
pub mod imaging;
pub mod output;
pub mod scope;
pub mod stats;
pub mod store;
