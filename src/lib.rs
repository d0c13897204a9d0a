//! formula-clip: turns images copied to the clipboard into LaTeX.
//!
//! * [`clipboard`]: clipboard access and the polling change watcher.
//! * [`ocr`]: formula recognition backends and the dispatcher.
//! * [`pipeline`]: the coordinator tying the two together.
//! * [`notify`]: how outcomes are presented to the user.
//! * [`config`]: settings and their on-disk location.

pub mod clipboard;
pub mod config;
pub mod notify;
pub mod ocr;
pub mod pipeline;
