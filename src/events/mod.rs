//! # Events Module
//!
//! Structured results for whoever renders them.
//!
//! ## Design
//! The engine, the watch registry and the schedule trigger emit events
//! through a channel. The CLI subscribes and prints them; without a
//! subscriber the events are dropped.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         if let Event::Pass(PassEvent::Completed { summary, .. }) = event {
//!             println!("moved {}", summary.moved);
//!         }
//!     }
//! });
//!
//! let engine = OrganizeEngine::new(&config, sender)?;
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;
