//! An allocation free TCP core for microcontroller network stacks.
//!
//! ## Table of contents
//!
//! This is also a recommended reading order but feel free to skip ahead, each chapter tries to be
//! somewhat self-contained.
//!
//! 1. [Highlights](#highlights)
//! 2. [Design](#design-and-relevant-core-concepts)
//! 3. [The wire module](wire/index.html)
//! 4. [The layers](layer/index.html)
//!    1. [Tcp](layer/tcp/index.html)
//!    1. [Address resolution](layer/resolve/index.html)
//! 5. [Network interfaces](nic/index.html)
//! 6. Internals
//!    1. [The storage module](storage/index.html)
//!    2. [Time and the tick service](time/index.html)
//!
//! ## Highlights
//!
//! The most interesting features in overview:
//!
//! * Socket buffers in local RAM, network interface RAM or an external serial RAM
//! * Segment data moves between interface and socket buffers without an intermediate copy
//! * A fixed socket table, provisioned once per application purpose
//!
//! Also, I'm very grateful for @whitequark's [`smoltcp`]. The overall structure may be quite
//! different but the `wire` module wouldn't have been possible without and lessons learned from
//! studying it were integral to the design.
//!
//! [`smoltcp`]: https://github.com/m-labs/smoltcp
//!
//! ## Design and relevant core concepts
//!
//! The stack is cooperative. There are no threads and no interrupts besides the timer overflow
//! of the [tick service](time/tick/index.html). The main loop of the node repeatedly calls
//! `process` to consume received segments and `tick` to advance timers, and applications poll
//! their sockets in between. No operation ever blocks.
//!
//! Nothing within `emtcp` *ever* dynamically allocates memory (and there is no arbitrary
//! recursion). Setup code explicitly passes in the socket table and the memory the buffers live
//! in, and every socket is given a fixed share of it. If the memory does not suffice for the
//! requested sockets then initialization fails instead of some connection at runtime.
#![warn(missing_docs)]
#![warn(unreachable_pub)]

// tests should be able to use `std`
#![cfg_attr(all(
    not(feature = "std"),
    not(test)),
no_std)]

#[macro_use] mod macros;
pub mod layer;
pub mod nic;
pub mod storage;
pub mod time;
pub mod wire;
