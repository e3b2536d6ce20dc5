// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod filter;

pub use filter::{Filter, FilterExit};
pub use crate::messaging::{MessagingEventHandler, Transport, TransportFactory};
