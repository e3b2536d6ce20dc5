// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Filter completed successfully
pub const EXIT_SUCCESS: i32 = 0;
/// Filter reported failure with code 0 or a reserved code; substituted code
pub const EXIT_GENERIC_FAILURE: i32 = 1;
/// Launch rejected before the body ran (sysexits EX_USAGE)
pub const EXIT_CONFIGURATION_ERROR: i32 = 64;
/// Uncaught error or panic inside the body (sysexits EX_SOFTWARE)
pub const EXIT_INTERNAL_ERROR: i32 = 70;

/// Broker used for channel tokens that name only a topic
pub const DEFAULT_BROKER_ADDRESS: &str = "mqtt://localhost:1883";
/// QoS for channel tokens without `?qos=`
pub const DEFAULT_QOS_LEVEL: u8 = 1;
/// Client ids are `<prefix>-<instance>`
pub const DEFAULT_CLIENT_ID_PREFIX: &str = "filterflow";

/// Messages buffered between receive loop and delivery thread
pub const DEFAULT_DELIVERY_QUEUE_CAPACITY: usize = 16;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 60;

/// How long a subscribing built-in filter waits for its next message
pub const DEFAULT_RECEIVE_TIMEOUT_MS: u64 = 5_000;
